mod process;
mod runner;
pub mod setup;
pub mod snapshot;

use setup::{Bot, ShardInfo};

pub use process::process;
pub use runner::runner;
pub use setup::initialize_and_run_bot;
