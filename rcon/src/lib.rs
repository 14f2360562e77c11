//! # RCON Client Library
//!
//! A client for the Source-engine remote console. It keeps one authenticated
//! connection per server, correlates every command with its response by
//! request id, and wraps the console commands a match administrator needs.
//!
//! ## Module Organization
//!
//! ### Transport (`transport`, `tcp`, `packet`)
//! [`transport::Transport`] and [`transport::Dialer`] are the boundary the
//! connection talks through. The TCP implementation frames Source RCON
//! packets and performs the password handshake.
//!
//! ### Connection (`connection`)
//! [`RconConnection`] sends commands, skips stale responses, reads and writes
//! console variables and reconnects after a password change.
//!
//! ### Administration (`commands`, `players`)
//! Kicks, bans, chat, map changes, tags, log redirection and the `status`
//! player table.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use rcon::RconConnection;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), rcon::RconError> {
//!     let mut conn = RconConnection::connect("10.0.0.1:27015", "secret").await?;
//!
//!     conn.set_variable("mp_tournament", "1").await?;
//!     for player in conn.list_players().await? {
//!         println!("{} {}", player.user_id, player.username);
//!     }
//!
//!     conn.close().await;
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod connection;
pub mod error;
pub mod packet;
pub mod players;
pub mod tcp;
pub mod transport;

pub use connection::{RconConfig, RconConnection};
pub use error::RconError;
pub use players::Player;
pub use transport::{Dialer, Transport};
