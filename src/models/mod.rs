pub mod guild;
pub mod reminder;
pub mod ticket;
pub mod user;

pub use guild::*;
pub use reminder::*;
pub use ticket::*;
pub use user::*;
