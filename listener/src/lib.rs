//! # Log Listener Library
//!
//! Receives the logs Source-engine servers forward over UDP and turns them
//! into typed events for whoever registered interest in that server.
//!
//! ## How a session works
//!
//! 1. [`Listener::register`] picks a random numeric secret and stores a
//!    [`Session`] under it.
//! 2. Over the server's RCON connection it sends `sv_logsecret <secret>`
//!    and `logaddress_add <listener address>`.
//! 3. The server prefixes every log datagram with the secret. The receive
//!    loop strips it, finds the session and hands the line to a dispatch
//!    task, which classifies it and calls the session's [`EventHandler`].
//! 4. [`Listener::remove`] closes the session and sends `logaddress_del`.
//!
//! One socket serves any number of servers; the secret is the only thing
//! that tells their datagrams apart.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use listener::{EventHandler, Listener, ListenerConfig};
//! use events::PlayerKill;
//! use rcon::RconConnection;
//! use std::sync::Arc;
//!
//! struct Killfeed;
//!
//! impl EventHandler for Killfeed {
//!     fn on_killed(&self, kill: &PlayerKill) {
//!         println!("{} -> {} ({})", kill.trigger.player1.username,
//!                  kill.trigger.player2.username, kill.weapon);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let listener = Listener::bind(ListenerConfig {
//!         bind_addr: "0.0.0.0:8002".to_string(),
//!         redirect_addr: Some("203.0.113.7:8002".to_string()),
//!         echo_logs: false,
//!     })
//!     .await?;
//!
//!     let mut conn = RconConnection::connect("10.0.0.1:27015", "secret").await?;
//!     let session = listener.register(Arc::new(Killfeed), &mut conn).await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     listener.remove(&session, &mut conn).await;
//!     Ok(())
//! }
//! ```

pub mod dispatch;
pub mod error;
pub mod network;
pub mod packet;
pub mod registry;
pub mod secret;

pub use dispatch::{route, EventHandler, EventSender};
pub use error::{ListenerError, PacketError};
pub use network::{Listener, ListenerConfig};
pub use registry::Session;
pub use secret::Secret;
