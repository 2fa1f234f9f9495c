use std::env;

use thiserror::Error;
use twilight_model::id::{
    Id,
    marker::{ApplicationMarker, GuildMarker},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is not valid: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub configured_prefix: String,
    pub token: String,
    pub client_id: Option<Id<ApplicationMarker>>,
    pub guild_id: Option<Id<GuildMarker>>,
    pub mongodb_uri: Option<String>,
    pub mongodb_database: String,
    pub lavalink_host: String,
    pub lavalink_port: u16,
    pub lavalink_password: String,
    pub lavalink_ssl: bool,
    pub chatbot_api_key: Option<String>,
    pub chatbot_model: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let token = require("DISCORD_TOKEN")?;
        let lavalink_host = require("LAVALINK_HOST")?;
        let lavalink_password = require("LAVALINK_PASSWORD")?;
        let lavalink_port = parse_var("LAVALINK_PORT", &require("LAVALINK_PORT")?)?;

        let client_id = get("CLIENT_ID")
            .map(|v| parse_var::<u64>("CLIENT_ID", &v))
            .transpose()?
            .and_then(Id::new_checked);
        let guild_id = get("GUILD_ID")
            .map(|v| parse_var::<u64>("GUILD_ID", &v))
            .transpose()?
            .and_then(Id::new_checked);
        let lavalink_ssl = get("LAVALINK_SSL")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            configured_prefix: get("PREFIX").unwrap_or_else(|| ";".to_string()),
            token,
            client_id,
            guild_id,
            mongodb_uri: get("MONGODB_URI"),
            mongodb_database: get("MONGODB_DATABASE").unwrap_or_else(|| "hearth".to_string()),
            lavalink_host,
            lavalink_port,
            lavalink_password,
            lavalink_ssl,
            chatbot_api_key: get("CHATBOT_API_KEY"),
            chatbot_model: get("CHATBOT_MODEL").unwrap_or_else(|| "gemini-2.5-flash".to_string()),
        })
    }

    pub fn lavalink_address(&self) -> String {
        format!("{}:{}", self.lavalink_host, self.lavalink_port)
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("DISCORD_TOKEN", "token"),
        ("LAVALINK_HOST", "localhost"),
        ("LAVALINK_PORT", "2333"),
        ("LAVALINK_PASSWORD", "youshallnotpass"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(BASE)).unwrap();
        assert_eq!(config.configured_prefix, ";");
        assert_eq!(config.mongodb_database, "hearth");
        assert!(config.mongodb_uri.is_none());
        assert!(config.guild_id.is_none());
        assert_eq!(config.lavalink_address(), "localhost:2333");
    }

    #[test]
    fn test_missing_token() {
        let err = Config::from_lookup(lookup(&BASE[1..])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DISCORD_TOKEN")));
    }

    #[test]
    fn test_bad_port() {
        let mut pairs = BASE.to_vec();
        pairs[2] = ("LAVALINK_PORT", "lots");
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "LAVALINK_PORT", .. }));
    }

    #[test]
    fn test_empty_guild_id_is_absent() {
        let mut pairs = BASE.to_vec();
        pairs.push(("GUILD_ID", ""));
        pairs.push(("CLIENT_ID", "1234"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert!(config.guild_id.is_none());
        assert_eq!(config.client_id.map(|id| id.get()), Some(1234));
    }
}
