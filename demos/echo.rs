//! Echo server and client over keepwire sessions.
//!
//! ```text
//! cargo run --example echo -- server --addr 127.0.0.1:7000
//! cargo run --example echo -- client --addr 127.0.0.1:7000 hello world
//! ```

use std::time::Duration;

use clap::{Parser, Subcommand};
use keepwire::{Session, Termination};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// keepwire echo demo
#[derive(Parser, Debug)]
#[command(name = "echo", about = "Echo over framed, heartbeat-monitored sessions")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Accept connections and echo every frame back
    Server {
        #[arg(long, default_value = "127.0.0.1:7000")]
        addr: String,

        /// Drop peers silent for this many seconds
        #[arg(long, default_value_t = 10)]
        idle_timeout: u64,
    },
    /// Send each word as a frame and print the replies
    Client {
        #[arg(long, default_value = "127.0.0.1:7000")]
        addr: String,

        /// Words to send
        #[arg(default_value = "ping")]
        words: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> keepwire::Result<()> {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Command::Server { addr, idle_timeout } => serve(&addr, idle_timeout).await,
        Command::Client { addr, words } => talk(&addr, &words).await,
    }
}

async fn serve(addr: &str, idle_timeout: u64) -> keepwire::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        let session = Session::builder()
            .idle_timeout(Duration::from_secs(idle_timeout))
            .server(stream);
        info!("accepted {}", peer);

        tokio::spawn(async move {
            let mut buf = vec![0u8; 64 * 1024];
            loop {
                match session.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Err(e) = session.write(&buf[..n]).await {
                            warn!("{}: write failed: {}", peer, e);
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("{}: read failed: {}", peer, e);
                        break;
                    }
                }
            }
            match session.closed().await {
                Termination::Eof => info!("{} disconnected", peer),
                Termination::Failed(e) => info!("{} dropped: {}", peer, e),
            }
        });
    }
}

async fn talk(addr: &str, words: &[String]) -> keepwire::Result<()> {
    let session = Session::client(TcpStream::connect(addr).await?);

    for word in words {
        session.write(word.as_bytes()).await?;
        if let Some(reply) = session.recv().await? {
            println!("{}", String::from_utf8_lossy(&reply));
        }
    }

    session.close().await;
    Ok(())
}
