use chrono::{DateTime, Utc};
use twilight_http::{
    api_error::ApiError,
    error::{Error as HttpError, ErrorType},
};
use twilight_model::{
    channel::message::{
        Component,
        component::{ActionRow, Button, ButtonStyle, TextInput, TextInputStyle},
    },
    util::Timestamp,
};

/// Discord's "Unknown interaction": the token expired or was already used.
pub const UNKNOWN_INTERACTION: u64 = 10062;

fn http_error(error: &anyhow::Error) -> Option<&HttpError> {
    error.chain().find_map(|cause| cause.downcast_ref::<HttpError>())
}

pub fn api_error_code(error: &HttpError) -> Option<u64> {
    match error.kind() {
        ErrorType::Response {
            error: ApiError::General(general),
            ..
        } => Some(general.code),
        _ => None,
    }
}

pub fn is_unknown_interaction(error: &anyhow::Error) -> bool {
    http_error(error).and_then(api_error_code) == Some(UNKNOWN_INTERACTION)
}

pub fn timestamp(at: DateTime<Utc>) -> Option<Timestamp> {
    Timestamp::from_micros(at.timestamp_micros()).ok()
}

pub fn button(
    custom_id: impl Into<String>,
    label: impl Into<String>,
    style: ButtonStyle,
) -> Component {
    Component::Button(Button {
        custom_id: Some(custom_id.into()),
        disabled: false,
        emoji: None,
        label: Some(label.into()),
        style,
        url: None,
        sku_id: None,
    })
}

pub fn link_button(url: impl Into<String>, label: impl Into<String>) -> Component {
    Component::Button(Button {
        custom_id: None,
        disabled: false,
        emoji: None,
        label: Some(label.into()),
        style: ButtonStyle::Link,
        url: Some(url.into()),
        sku_id: None,
    })
}

pub fn action_row(components: Vec<Component>) -> Component {
    Component::ActionRow(ActionRow { components })
}

/// Rows of at most five buttons each, as Discord requires.
pub fn button_rows(buttons: Vec<Component>) -> Vec<Component> {
    buttons
        .chunks(5)
        .map(|chunk| action_row(chunk.to_vec()))
        .collect()
}

pub fn text_input(
    custom_id: impl Into<String>,
    label: impl Into<String>,
    style: TextInputStyle,
    required: bool,
) -> TextInput {
    TextInput {
        custom_id: custom_id.into(),
        label: label.into(),
        max_length: None,
        min_length: None,
        placeholder: None,
        required: Some(required),
        style,
        value: None,
    }
}

/// Shortens `text` to at most `max` characters, marking the cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_rows_chunk_by_five() {
        let buttons: Vec<Component> = (0..7)
            .map(|i| button(format!("b{i}"), "x", ButtonStyle::Secondary))
            .collect();
        let rows = button_rows(buttons);
        assert_eq!(rows.len(), 2);
        match &rows[1] {
            Component::ActionRow(row) => assert_eq!(row.components.len(), 2),
            other => panic!("unexpected component {other:?}"),
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
        assert_eq!(truncate("héllo wörld", 6).chars().count(), 6);
    }

    #[test]
    fn test_plain_errors_are_not_unknown_interaction() {
        assert!(!is_unknown_interaction(&anyhow::anyhow!("boom")));
    }
}
