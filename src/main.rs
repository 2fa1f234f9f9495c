#![deny(clippy::all, clippy::pedantic)]

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
#[tracing::instrument]
async fn main() -> anyhow::Result<()> {
    print_banner();
    hearth::gateway::initialize_and_run_bot().await
}

const BANNER: &str = r"
  _                     _   _
 | |__   ___  __ _ _ __| |_| |__
 | '_ \ / _ \/ _` | '__| __| '_ \
 | | | |  __/ (_| | |  | |_| | | |
 |_| |_|\___|\__,_|_|   \__|_| |_|

Hearth - music, reminders, tickets and everything in between
";

fn print_banner() {
    println!("{BANNER}");
    println!("  Version   : {}", env!("APP_VERSION"));
    println!("  Commit    : {}", env!("GIT_HASH"));
    println!("  Built at  : {}", env!("BUILD_TIME"));
    println!("--------------------------------------------------------------\n");
}
