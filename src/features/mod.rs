//! Guild features that are not music, reminders or tickets.

pub mod autorole;
pub mod chatbot;
pub mod lfg;
pub mod link_embed;
pub mod modlog;
pub mod selfrole;
pub mod templates;
pub mod tempvc;
