pub mod dismiss;
pub mod music;
pub mod reminder;
