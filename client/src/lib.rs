//! # Party Royale Client Library
//!
//! A headless participant for the party elimination server. It connects
//! over UDP, plays as a randomised bot and mirrors the replicated world so
//! the server can be exercised without a renderer.
//!
//! ## Module Organization
//!
//! ### Input Module (`input`)
//! - `BotInput` rolls movement, jumps and spell casts, optionally seeded
//! - `InputRelay` numbers inputs and only sends on change, jump or keepalive
//!
//! ### Mirror Module (`mirror`)
//! Observer-side copy of the world: characters from snapshots and deltas,
//! extrapolated projectiles, queued explosion effects and the phase
//! announcements. The mirror never makes gameplay decisions.
//!
//! ### Network Module (`network`)
//! UDP socket handling, packet decoding and the run loop tying the bot and
//! the mirror together.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{Client, ClientSettings};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = ClientSettings {
//!         duration: Some(Duration::from_secs(30)),
//!         seed: Some(1),
//!         ..ClientSettings::default()
//!     };
//!     let mut client = Client::new("127.0.0.1:8080", settings).await?;
//!     let stats = client.run().await?;
//!     println!("received {} deltas", stats.deltas);
//!     Ok(())
//! }
//! ```

pub mod input;
pub mod mirror;
pub mod network;
