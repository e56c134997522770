//! Push structured readings from a producer to a consumer.
//!
//! The consumer sets an idle timeout; the producer's heartbeats keep the
//! session alive across pauses longer than that timeout.
//!
//! ```text
//! cargo run --example push -- consume --addr 127.0.0.1:7001
//! cargo run --example push -- produce --addr 127.0.0.1:7001 --count 5 --pause-ms 4000
//! ```

use std::time::Duration;

use clap::{Parser, Subcommand};
use keepwire::Session;
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Serialize, Deserialize, Debug)]
struct Reading {
    seq: u32,
    celsius: f32,
}

/// keepwire push demo
#[derive(Parser, Debug)]
#[command(name = "push")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Accept one producer and print its readings
    Consume {
        #[arg(long, default_value = "127.0.0.1:7001")]
        addr: String,

        /// Seconds of silence before giving up on the producer
        #[arg(long, default_value_t = 3)]
        idle_timeout: u64,

        /// Seconds to wait for each reading
        #[arg(long)]
        read_timeout: Option<u64>,
    },
    /// Connect and send readings
    Produce {
        #[arg(long, default_value = "127.0.0.1:7001")]
        addr: String,

        #[arg(long, default_value_t = 10)]
        count: u32,

        /// Pause between readings in milliseconds
        #[arg(long, default_value_t = 500)]
        pause_ms: u64,
    },
}

#[tokio::main]
async fn main() -> keepwire::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Command::Consume {
            addr,
            idle_timeout,
            read_timeout,
        } => consume(&addr, idle_timeout, read_timeout).await,
        Command::Produce {
            addr,
            count,
            pause_ms,
        } => produce(&addr, count, pause_ms).await,
    }
}

async fn consume(addr: &str, idle_timeout: u64, read_timeout: Option<u64>) -> keepwire::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    let (stream, _) = listener.accept().await?;
    let session = Session::builder()
        .heartbeat_interval(Duration::from_secs(1))
        .idle_timeout(Duration::from_secs(idle_timeout))
        .server(stream);
    info!("producer connected from {:?}", session.peer_addr());

    loop {
        if let Some(secs) = read_timeout {
            session.set_read_deadline(Some(Instant::now() + Duration::from_secs(secs)));
        }
        match session.recv_msg::<Reading>().await {
            Ok(Some(reading)) => println!("#{} {:.1} C", reading.seq, reading.celsius),
            Ok(None) => break,
            Err(e) if e.is_timeout() => info!("no reading yet, still connected"),
            Err(e) => return Err(e),
        }
    }

    info!("producer finished");
    Ok(())
}

async fn produce(addr: &str, count: u32, pause_ms: u64) -> keepwire::Result<()> {
    let session = Session::builder()
        .heartbeat_interval(Duration::from_secs(1))
        .client(TcpStream::connect(addr).await?);

    for seq in 0..count {
        let reading = Reading {
            seq,
            celsius: 20.0 + (seq % 7) as f32 * 0.5,
        };
        session.send_msg(&reading).await?;
        sleep(Duration::from_millis(pause_ms)).await;
    }

    session.close().await;
    Ok(())
}
