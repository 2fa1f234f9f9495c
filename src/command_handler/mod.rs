pub mod context;
pub mod definition;
pub mod dispatcher;
pub mod response;

pub use context::*;
pub use definition::*;
pub use dispatcher::*;
pub use response::*;
