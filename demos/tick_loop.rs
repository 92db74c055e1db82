//! # Tick Loop Example
//!
//! Connects to a server on `localhost:54879` as `Player2` and drives the
//! session by calling `tick()` every 20 ms until the session ends or a
//! protocol error surfaces.
//!
//! ## Running
//!
//! ```sh
//! RUST_LOG=debug cargo run --example tick_loop
//! ```

use std::time::Duration;

use tickwire::{ClientConfig, GameClient};
use tracing::{error, info};

const SERVER_HOST: &str = "localhost";
const SERVER_PORT: u16 = 54879;
const PLAYER_NAME: &str = "Player2";
const TICK_PACING: Duration = Duration::from_millis(20);

fn main() -> tickwire::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    let mut client = GameClient::new(ClientConfig::new(SERVER_HOST, SERVER_PORT))?;
    client.connect(PLAYER_NAME)?;

    while client.is_connected() {
        if let Err(e) = client.tick() {
            error!("stopping on protocol error: {e}");
            client.stop();
            break;
        }
        std::thread::sleep(TICK_PACING);
    }

    info!(
        "session over after {} responses, final state {}",
        client.responses_processed(),
        client.state()
    );
    Ok(())
}
