#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::sync::Arc;

use canopy_server::{config::Config, peer::commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(Config::load()?);
    simple_logger::init_with_level(config.log.level.as_level())?;

    let (sender, receiver) = commands::channel();
    commands::spawn_stdin_intake(sender);

    canopy_server::startup(config, receiver).await
}
