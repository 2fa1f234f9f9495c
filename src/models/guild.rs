use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use twilight_model::id::{
    Id,
    marker::{ChannelMarker, GuildMarker, RoleMarker},
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatbotConfig {
    pub enabled: bool,
    pub channel_id: Option<Id<ChannelMarker>>,
}

pub const DEFAULT_TEMPVC_TEMPLATE: &str = "{user}'s channel";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempVcConfig {
    pub creator_channel_id: Id<ChannelMarker>,
    pub category_id: Option<Id<ChannelMarker>>,
    #[serde(default = "default_tempvc_template")]
    pub name_template: String,
    #[serde(default)]
    pub user_limit: Option<u16>,
}

fn default_tempvc_template() -> String {
    DEFAULT_TEMPVC_TEMPLATE.to_string()
}

impl TempVcConfig {
    pub fn channel_name(&self, username: &str) -> String {
        let mut name = self.name_template.replace("{user}", username);
        name.truncate(100);
        name
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedTemplate {
    pub title: Option<String>,
    pub description: String,
    pub color: Option<u32>,
    pub footer: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildSettings {
    pub guild_id: Id<GuildMarker>,
    #[serde(default)]
    pub chatbot: ChatbotConfig,
    #[serde(default)]
    pub autorole_id: Option<Id<RoleMarker>>,
    #[serde(default)]
    pub tempvc: Option<TempVcConfig>,
    #[serde(default)]
    pub message_link_embeds: bool,
    #[serde(default)]
    pub modlog_channel_id: Option<Id<ChannelMarker>>,
    #[serde(default)]
    pub templates: BTreeMap<String, EmbedTemplate>,
}

impl GuildSettings {
    pub fn new(guild_id: Id<GuildMarker>) -> Self {
        Self {
            guild_id,
            chatbot: ChatbotConfig::default(),
            autorole_id: None,
            tempvc: None,
            message_link_embeds: false,
            modlog_channel_id: None,
            templates: BTreeMap::new(),
        }
    }

    pub fn chatbot_channel(&self) -> Option<Id<ChannelMarker>> {
        self.chatbot.enabled.then_some(self.chatbot.channel_id).flatten()
    }
}
