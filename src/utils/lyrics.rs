use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde::Deserialize;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct LyricLine {
    line: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct LyricsApiResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    lines: Vec<LyricLine>,
}

/// Plain lyrics from a LavaLyrics response: the synced lines when present,
/// otherwise the full text.
fn parse_lyrics(body: &str) -> Result<Option<String>> {
    let response: LyricsApiResponse =
        serde_json::from_str(body).context("Failed to parse lyrics response")?;
    let text = if response.lines.is_empty() {
        response.text.unwrap_or_default()
    } else {
        response
            .lines
            .into_iter()
            .map(|line| line.line)
            .collect::<Vec<_>>()
            .join("\n")
    };
    Ok((!text.trim().is_empty()).then_some(text))
}

/// Lyrics of the track currently playing in `guild_id`, through the node's
/// lyrics plugin endpoint. `Ok(None)` when the plugin found nothing.
pub async fn get_lyrics(
    address: &str,
    session_id: &str,
    guild_id: &str,
    client: &Client,
    token: &str,
) -> Result<Option<String>> {
    let url = format!(
        "{address}/v4/sessions/{session_id}/players/{guild_id}/track/lyrics?skipTrackSource=false"
    );
    tracing::debug!(%url, "Fetching lyrics");
    let response = client
        .get(&url)
        .header("Authorization", token)
        .send()
        .await
        .context("Lyrics request failed")?;

    let status = response.status();
    if status == reqwest::StatusCode::NO_CONTENT || status == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    let body = response.text().await.context("Failed to read lyrics response")?;
    if !status.is_success() {
        tracing::warn!(%status, %body, "Lyrics request was rejected");
        bail!("The lyrics service answered with {status}.");
    }
    parse_lyrics(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_synced_lines() {
        let body = concat!(
            r#"{"sourceName":"x","text":"ignored","lines":"#,
            r#"[{"line":"one","timestamp":0},{"line":"two","timestamp":5}]}"#
        );
        assert_eq!(parse_lyrics(body).unwrap().as_deref(), Some("one\ntwo"));
    }

    #[test]
    fn test_parse_plain_text_and_empty() {
        assert_eq!(
            parse_lyrics(r#"{"text":"la la"}"#).unwrap().as_deref(),
            Some("la la")
        );
        assert_eq!(parse_lyrics(r#"{"lines":[]}"#).unwrap(), None);
        assert!(parse_lyrics("not json").is_err());
    }
}
