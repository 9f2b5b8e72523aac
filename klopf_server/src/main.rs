//! Klopf game server over WebSocket.
//!
//! Rooms run as in-process actors; there is no persistence, so all state
//! lives and dies with the process.

mod api;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Error;
use ctrlc::set_handler;
use klopf::{ConnectionRegistry, Dispatcher, RoomRegistry};
use log::info;
use pico_args::Arguments;

const HELP: &str = "\
Run a klopf game server

USAGE:
  klopf_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6969]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  RUST_LOG                 Log filter (e.g., info)
";

/// How often empty rooms are reaped.
const REAP_INTERVAL: Duration = Duration::from_secs(60);

struct Args {
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.value_from_str("--bind").unwrap_or_else(|_| {
            std::env::var("SERVER_BIND")
                .unwrap_or_else(|_| "127.0.0.1:6969".to_string())
                .parse()
                .expect("Invalid SERVER_BIND address")
        }),
    };

    // Catching signals for exit.
    set_handler(|| std::process::exit(0))?;

    env_logger::builder().format_target(false).init();
    info!("Starting klopf server at {}", args.bind);

    let connections = Arc::new(ConnectionRegistry::new());
    let rooms = Arc::new(RoomRegistry::new(connections.clone()));
    let dispatcher = Arc::new(Dispatcher::new(rooms.clone(), connections));

    // Reap rooms nobody ever joined
    let reap_rooms = rooms.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REAP_INTERVAL);
        loop {
            interval.tick().await;
            let reaped = reap_rooms.reap_empty().await;
            if reaped > 0 {
                info!("reaped {reaped} empty room(s)");
            }
        }
    });

    let app = api::create_router(api::AppState { dispatcher });
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!("Server ready, accepting websocket connections on /ws");
    axum::serve(listener, app).await?;

    Ok(())
}
