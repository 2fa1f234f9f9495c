use std::collections::HashMap;

use anyhow::{anyhow, bail};
use twilight_model::{
    channel::message::{Component, Embed, component::TextInputStyle},
    http::interaction::InteractionResponseData,
};
use twilight_util::builder::embed::{EmbedBuilder, EmbedFooterBuilder, ImageSource};

use crate::command_handler::notice;
use crate::components::{InteractionCtx, ModalAction};
use crate::models::EmbedTemplate;
use crate::store::update_guild;
use crate::utils::discord::{action_row, text_input};

pub const DEFAULT_TEMPLATE_COLOR: u32 = 0x2b2d31;
pub const MAX_TEMPLATES: usize = 25;
const MAX_NAME_LENGTH: usize = 32;

/// Accepts `#rrggbb`, `rrggbb`, `0xrrggbb` or a decimal value.
pub fn parse_color(input: &str) -> anyhow::Result<u32> {
    let input = input.trim();
    let hex = input
        .strip_prefix('#')
        .or_else(|| input.strip_prefix("0x"))
        .or_else(|| input.strip_prefix("0X"));
    let value = match hex {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None if input.len() == 6 && input.chars().any(|c| c.is_ascii_alphabetic()) => {
            u32::from_str_radix(input, 16).ok()
        }
        None => input.parse().ok(),
    };
    match value {
        Some(color) if color <= 0xff_ff_ff => Ok(color),
        _ => bail!("`{input}` isn't a color. Use `#rrggbb` or a number up to 16777215."),
    }
}

pub fn validate_name(name: &str) -> anyhow::Result<String> {
    let name = name.trim().to_ascii_lowercase();
    if name.is_empty() || name.len() > MAX_NAME_LENGTH {
        bail!("Template names must be 1-{MAX_NAME_LENGTH} characters.");
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        bail!("Template names may only contain letters, digits, `-` and `_`.");
    }
    Ok(name)
}

pub fn template_modal(name: &str) -> InteractionResponseData {
    let mut title = text_input("title", "Title", TextInputStyle::Short, false);
    title.max_length = Some(256);
    let mut description = text_input("description", "Description", TextInputStyle::Paragraph, true);
    description.max_length = Some(4000);
    let mut color = text_input("color", "Color (#rrggbb or decimal)", TextInputStyle::Short, false);
    color.max_length = Some(10);
    let mut footer = text_input("footer", "Footer", TextInputStyle::Short, false);
    footer.max_length = Some(2048);
    let image = text_input("image", "Image URL", TextInputStyle::Short, false);

    let components = [title, description, color, footer, image]
        .into_iter()
        .map(|input| action_row(vec![Component::TextInput(input)]))
        .collect();

    InteractionResponseData {
        custom_id: Some(ModalAction::Template(name.to_string()).to_string()),
        title: Some(format!("Template: {name}")),
        components: Some(components),
        ..Default::default()
    }
}

/// Builds a template from modal values; blank fields are left unset.
pub fn template_from_values(values: &HashMap<String, String>) -> anyhow::Result<EmbedTemplate> {
    let field = |key: &str| {
        values
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let description =
        field("description").ok_or_else(|| anyhow!("A template needs a description."))?;
    let color = field("color").map(|c| parse_color(&c)).transpose()?;
    let image_url = field("image");
    if let Some(url) = &image_url {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            bail!("The image must be an http(s) URL.");
        }
    }
    Ok(EmbedTemplate {
        title: field("title"),
        description,
        color,
        footer: field("footer"),
        image_url,
    })
}

pub fn render(template: &EmbedTemplate) -> Embed {
    let mut embed = EmbedBuilder::new()
        .description(template.description.clone())
        .color(template.color.unwrap_or(DEFAULT_TEMPLATE_COLOR));
    if let Some(title) = &template.title {
        embed = embed.title(title.clone());
    }
    if let Some(footer) = &template.footer {
        embed = embed.footer(EmbedFooterBuilder::new(footer.clone()));
    }
    if let Some(image) = template.image_url.as_deref().and_then(|url| ImageSource::url(url).ok()) {
        embed = embed.image(image);
    }
    embed.build()
}

pub async fn save_from_modal(
    ctx: &InteractionCtx,
    name: &str,
    values: &HashMap<String, String>,
) -> anyhow::Result<()> {
    let guild_id = ctx.guild_id()?;
    let name = validate_name(name)?;
    let template = template_from_values(values)?;
    let preview = render(&template);

    let saved = update_guild(&*ctx.state.store, guild_id, |settings| {
        if settings.templates.len() >= MAX_TEMPLATES && !settings.templates.contains_key(&name) {
            return false;
        }
        settings.templates.insert(name.clone(), template);
        true
    })
    .await?;
    if !saved {
        bail!("This server already has {MAX_TEMPLATES} templates. Delete one first.");
    }

    tracing::info!(%guild_id, template = %name, "Embed template saved");
    let mut response = notice(format!("Saved template `{name}`. Preview:"));
    response.embeds.push(preview);
    ctx.respond(response).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#ff0000").unwrap(), 0xff0000);
        assert_eq!(parse_color("0x00FF00").unwrap(), 0x00ff00);
        assert_eq!(parse_color("abcdef").unwrap(), 0xabcdef);
        assert_eq!(parse_color("16777215").unwrap(), 0xffffff);
        assert_eq!(parse_color(" 255 ").unwrap(), 255);
        assert!(parse_color("#gggggg").is_err());
        assert!(parse_color("16777216").is_err());
        assert!(parse_color("red").is_err());
    }

    #[test]
    fn test_template_from_values() {
        let values = HashMap::from([
            ("description".to_string(), "Welcome!".to_string()),
            ("color".to_string(), "#123456".to_string()),
            ("title".to_string(), "  ".to_string()),
        ]);
        let template = template_from_values(&values).unwrap();
        assert_eq!(template.title, None);
        assert_eq!(template.color, Some(0x123456));
        assert_eq!(render(&template).description.as_deref(), Some("Welcome!"));

        let missing = HashMap::from([("title".to_string(), "x".to_string())]);
        assert!(template_from_values(&missing).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name(" Rules ").unwrap(), "rules");
        assert!(validate_name("has space").is_err());
        assert!(validate_name("").is_err());
    }
}
