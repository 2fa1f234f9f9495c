pub mod discord;
pub mod lyrics;
