use std::collections::VecDeque;

use anyhow::{Context, bail};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use twilight_model::{
    channel::Message,
    id::{Id, marker::ChannelMarker},
};

use crate::state::State;
use crate::store::load_guild;
use crate::utils::discord::truncate;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
/// Turns kept per channel (a user message and a reply are two turns).
pub const CONTEXT_TURNS: usize = 12;
const MAX_REPLY_LENGTH: usize = 2000;
const MAX_PROMPT_LENGTH: usize = 1500;
const APOLOGY: &str =
    "Sorry, I couldn't come up with a reply right now. Please try again in a bit.";
const SYSTEM_PROMPT: &str = "You are Hearth, a friendly assistant in a Discord server. \
Keep replies short and conversational, at most a few sentences, \
and use Discord markdown sparingly.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// Recent conversation per chatbot channel.
#[derive(Default)]
pub struct ChatHistory {
    channels: DashMap<Id<ChannelMarker>, VecDeque<Turn>>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, channel_id: Id<ChannelMarker>, turn: Turn) {
        let mut turns = self.channels.entry(channel_id).or_default();
        turns.push_back(turn);
        while turns.len() > CONTEXT_TURNS {
            turns.pop_front();
        }
    }

    pub fn window(&self, channel_id: Id<ChannelMarker>) -> Vec<Turn> {
        self.channels
            .get(&channel_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self, channel_id: Id<ChannelMarker>) {
        self.channels.remove(&channel_id);
    }
}

#[derive(Serialize)]
struct Request {
    system_instruction: Content,
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct Response {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

/// Request body for the turns, merging consecutive turns of the same role.
fn build_request(turns: &[Turn]) -> Request {
    let mut contents: Vec<Content> = Vec::new();
    for turn in turns {
        let role = turn.role.as_str();
        match contents.last_mut() {
            Some(last) if last.role == Some(role) => last.parts.push(Part {
                text: turn.text.clone(),
            }),
            _ => contents.push(Content {
                role: Some(role),
                parts: vec![Part {
                    text: turn.text.clone(),
                }],
            }),
        }
    }
    Request {
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: SYSTEM_PROMPT.to_string(),
            }],
        },
        contents,
    }
}

fn extract_text(response: Response) -> anyhow::Result<String> {
    if let Some(error) = response.error {
        bail!("Gemini API error: {}", error.message);
    }
    let text: String = response
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .and_then(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect();
    if text.trim().is_empty() {
        bail!("Gemini returned no text");
    }
    Ok(text)
}

pub async fn generate(
    client: &reqwest::Client,
    api_key: &str,
    model: &str,
    turns: &[Turn],
) -> anyhow::Result<String> {
    let response: Response = client
        .post(format!("{API_BASE}/{model}:generateContent"))
        .query(&[("key", api_key)])
        .json(&build_request(turns))
        .send()
        .await
        .context("Gemini request failed")?
        .json()
        .await
        .context("Failed to decode Gemini response")?;
    extract_text(response)
}

/// Answers `message` if it was sent in the guild's chatbot channel.
pub async fn handle_message(state: &State, message: &Message) -> anyhow::Result<()> {
    let Some(guild_id) = message.guild_id else {
        return Ok(());
    };
    if message.content.trim().is_empty() {
        return Ok(());
    }
    let Some(api_key) = state.config.chatbot_api_key.as_deref() else {
        return Ok(());
    };
    let settings = load_guild(&*state.store, guild_id).await?;
    if settings.chatbot_channel() != Some(message.channel_id) {
        return Ok(());
    }

    let channel_id = message.channel_id;
    let name = message
        .author
        .global_name
        .as_deref()
        .unwrap_or(&message.author.name);
    state.chat_history.push(
        channel_id,
        Turn {
            role: Role::User,
            text: format!("[{name}] {}", truncate(&message.content, MAX_PROMPT_LENGTH)),
        },
    );

    if let Err(e) = state.http.create_typing_trigger(channel_id).await {
        tracing::debug!(error = ?e, %channel_id, "Failed to trigger typing");
    }

    let turns = state.chat_history.window(channel_id);
    let reply = match generate(&state.reqwest, api_key, &state.config.chatbot_model, &turns).await {
        Ok(text) => {
            let text = truncate(&text, MAX_REPLY_LENGTH);
            state.chat_history.push(
                channel_id,
                Turn {
                    role: Role::Model,
                    text: text.clone(),
                },
            );
            text
        }
        Err(e) => {
            tracing::warn!(error = ?e, %channel_id, "Chatbot reply failed");
            APOLOGY.to_string()
        }
    };

    state
        .http
        .create_message(channel_id)
        .content(&reply)
        .reply(message.id)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: Role, text: &str) -> Turn {
        Turn {
            role,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_history_window_is_bounded() {
        let history = ChatHistory::new();
        let channel = Id::new(5);
        for i in 0..(CONTEXT_TURNS + 4) {
            history.push(channel, turn(Role::User, &i.to_string()));
        }
        let window = history.window(channel);
        assert_eq!(window.len(), CONTEXT_TURNS);
        assert_eq!(window[0].text, "4");
        history.clear(channel);
        assert!(history.window(channel).is_empty());
    }

    #[test]
    fn test_request_merges_roles() {
        let turns = [
            turn(Role::User, "a"),
            turn(Role::User, "b"),
            turn(Role::Model, "c"),
        ];
        let body = serde_json::to_value(build_request(&turns)).unwrap();
        assert_eq!(body["contents"].as_array().unwrap().len(), 2);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][1]["text"], "b");
        assert!(body["system_instruction"].get("role").is_none());
    }

    #[test]
    fn test_extract_text() {
        let ok: Response = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello"},{"text":" there"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(ok).unwrap(), "Hello there");

        let err: Response = serde_json::from_str(r#"{"error":{"message":"quota"}}"#).unwrap();
        assert!(extract_text(err).unwrap_err().to_string().contains("quota"));

        let empty: Response = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(extract_text(empty).is_err());
    }
}
