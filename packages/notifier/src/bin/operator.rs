//! Room operator console.
//!
//! Advances a room's turn or asks the displays to repeat the current
//! announcement.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin madoguchi-operator -- next --room 1
//! cargo run --bin madoguchi-operator -- --host 192.168.1.8 replay --room 2
//! ```

use std::{sync::Arc, time::Duration};

use clap::{Parser, Subcommand};

use madoguchi_notifier::{
    config::NotifierConfig,
    domain::{ChannelName, RoomId},
    infrastructure::{http::HttpQueueApi, transport::WebSocketConnector},
    ui::ConsoleListener,
    usecase::{ConnectionMultiplexer, OperatorActions},
};
use madoguchi_shared::{logger::setup_logger, time::SystemClock};

/// Time allowed for the channels to open before giving up
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Time allowed for queued frames to be written before exiting
const FLUSH_DELAY: Duration = Duration::from_millis(300);

#[derive(Parser, Debug)]
#[command(name = "madoguchi-operator")]
#[command(about = "Room operator console for the clinic queue", long_about = None)]
struct Args {
    /// Backend host
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Backend port
    #[arg(short = 'p', long, default_value = "8000")]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Advance to the next turn and announce it
    Next {
        #[arg(short = 'r', long)]
        room: RoomId,
    },
    /// Ask the displays to repeat the current announcement
    Replay {
        #[arg(short = 'r', long)]
        room: RoomId,
    },
}

impl Command {
    fn room(&self) -> RoomId {
        match self {
            Command::Next { room } | Command::Replay { room } => *room,
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_PKG_NAME"), env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let config = NotifierConfig::for_server(&args.host, args.port);
    let room = args.command.room();

    let api = Arc::new(HttpQueueApi::new(config.http_base_url.clone()));
    let multiplexer = Arc::new(ConnectionMultiplexer::new(
        Arc::new(WebSocketConnector),
        config.ws_base_url.clone(),
        config.reconnect,
    ));
    let listener = Arc::new(ConsoleListener);

    for channel in [ChannelName::Room(room), ChannelName::Notifications] {
        multiplexer.connect(channel, listener.clone()).await;
    }
    if !multiplexer
        .wait_connected(ChannelName::Room(room), CONNECT_TIMEOUT)
        .await
    {
        tracing::warn!("Room {} channel is not connected yet", room);
    }

    let actions = OperatorActions::new(api, multiplexer.clone(), listener, Arc::new(SystemClock));
    let result = match args.command {
        Command::Next { room } => actions.advance_turn(room).await.map(|delivered| {
            println!("Turn advanced for room {}", room);
            if !delivered {
                println!("Displays were not notified; they will pick up the change by polling");
            }
        }),
        Command::Replay { room } => actions.request_replay(room).await.map(|()| {
            println!("Replay requested for room {}", room);
        }),
    };

    tokio::time::sleep(FLUSH_DELAY).await;
    multiplexer.disconnect_all().await;
    tokio::time::sleep(FLUSH_DELAY).await;

    if let Err(e) = result {
        tracing::error!("Operator error: {}", e);
        std::process::exit(1);
    }
}
