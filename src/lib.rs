//! Hearth: a community Discord bot with music, reminders, tickets and
//! server utilities.

pub mod command_handler;
pub mod commands;
pub mod components;
pub mod config;
pub mod deploy;
pub mod features;
pub mod gateway;
pub mod lavalink_events;
pub mod models;
pub mod music;
pub mod prefix_parser;
pub mod reminders;
pub mod state;
pub mod store;
pub mod tickets;
pub mod utils;
