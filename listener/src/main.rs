use clap::Parser;
use listener::{EventSender, Listener, ListenerConfig, ListenerError};
use log::info;
use rcon::{RconConfig, RconConnection};
use std::sync::Arc;
use std::time::Duration;

/// How often the session's log buffer is emptied while streaming.
const LOG_DRAIN_INTERVAL: Duration = Duration::from_secs(30);

/// Streams a server's log as JSON events.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Local UDP address to receive logs on
        #[clap(short, long, default_value = "0.0.0.0:8002")]
        bind: String,
        /// Address the server should send logs to, if different from --bind
        #[clap(short, long)]
        redirect: Option<String>,
        /// RCON address of the server
        #[clap(short = 'c', long, default_value = "127.0.0.1:27015")]
        rcon: String,
        /// rcon_password of the server
        #[clap(short, long, env = "RCON_PASSWORD")]
        password: String,
        /// Check that logs arrive before starting the session
        #[clap(long)]
        verify: bool,
        /// Log every received datagram
        #[clap(long)]
        echo: bool,
        /// Also print lines that matched no known event
        #[clap(long)]
        all: bool,
    }

    env_logger::init();

    let args = Args::parse();

    let listener = Listener::bind(ListenerConfig {
        bind_addr: args.bind,
        redirect_addr: args.redirect,
        echo_logs: args.echo,
    })
    .await?;

    let config = RconConfig::new(&args.rcon, &args.password);
    let mut conn = RconConnection::from_config(&config).await?;

    if args.verify {
        if !listener.verify_delivery(&mut conn).await? {
            conn.close().await;
            let addr = listener.redirect_addr();
            return Err(format!("no logs from {} reached {}", args.rcon, addr).into());
        }
        info!("Log delivery from {} verified", args.rcon);
    }

    let (sender, mut events) = EventSender::channel();
    let session = match listener.register(Arc::new(sender), &mut conn).await {
        Ok(session) => session,
        Err(ListenerError::Setup { session, source }) => {
            listener.remove(&session, &mut conn).await;
            conn.close().await;
            return Err(source.into());
        }
        Err(e) => return Err(e.into()),
    };

    let mut drain = tokio::time::interval(LOG_DRAIN_INTERVAL);
    let mut received = 0;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if event.is_recognized() || args.all {
                    println!("{}", serde_json::to_string(&event)?);
                }
            }
            _ = drain.tick() => {
                received += session.take_logs().await.len();
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down gracefully...");
                break;
            }
        }
    }

    listener.remove(&session, &mut conn).await;
    received += session.take_logs().await.len();
    info!("Session {} received {} bytes of log text", session.secret(), received);
    conn.close().await;

    Ok(())
}
