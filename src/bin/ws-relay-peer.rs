//! Relay peer
//!
//! Interactive client for a relay server: every line typed on stdin is sent
//! to the relay and every payload broadcast by other peers is printed.

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use ws_relay::client::{ClientEvent, PeerMessage, RelayClient};
use ws_relay::relay::Payload;

/// Relay peer
///
/// Sends stdin lines to a relay and prints what other peers send
#[derive(Parser, Debug)]
#[command(name = "ws-relay-peer")]
#[command(version, about, long_about = None)]
struct Args {
    /// Relay URL
    #[arg(default_value = "ws://127.0.0.1:8080", env = "RELAY_URL")]
    url: String,

    /// Send lines as plain text instead of JSON peer messages
    #[arg(long)]
    raw: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let peer_id = Uuid::new_v4();
    info!("Peer id {}", peer_id);

    let mut client = RelayClient::connect(&args.url).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) if line.is_empty() => {}
                    Some(line) => {
                        let payload = if args.raw {
                            Payload::Text(line)
                        } else {
                            PeerMessage::new(peer_id, line).to_payload()?
                        };
                        client.send(payload).await?;
                    }
                    None => {
                        debug!("stdin closed");
                        break;
                    }
                }
            }
            event = client.next_event() => {
                match event {
                    Some(ClientEvent::Message(payload)) => print_payload(&payload),
                    Some(ClientEvent::Close) | None => {
                        info!("Relay closed the connection");
                        return Ok(());
                    }
                    Some(ClientEvent::Error(e)) => {
                        warn!("Connection error: {}", e);
                        return Ok(());
                    }
                }
            }
        }
    }

    client.close().await?;
    Ok(())
}

fn print_payload(payload: &Payload) {
    if let Some(message) = PeerMessage::from_payload(payload) {
        println!("[{}] {}", message.peer_id, message.body);
        return;
    }
    match payload {
        Payload::Text(text) => println!("{}", text),
        Payload::Binary(data) => println!("<{} binary bytes>", data.len()),
    }
}
