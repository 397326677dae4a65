//! # Party Royale Server Library
//!
//! This library provides the authoritative server for a multiplayer party
//! elimination game. Players race, dodge spells and try to avoid falling
//! off the level across a sequence of phases; each phase thins the field
//! until one winner remains.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Every gameplay decision is made here: character movement, status
//! effects, projectile flight and impacts, finishes, falls and
//! eliminations. Participants only send intent (movement input and cast
//! requests) and receive replicated state back.
//!
//! ### Phase Orchestration
//! The phase orchestrator (`phase::GameStateManager`) tracks who is alive,
//! who takes part in the current phase and the finish order. Policy comes
//! from a pluggable strategy (`game_mode::GameModeLogic`): a race where the
//! top finishers qualify, or sudden death where the last one standing wins.
//!
//! ### Replication
//! Each tick produces a delta of only the fields that changed, plus
//! projectile spawn and despawn records. Full snapshots go to joiners and
//! are broadcast periodically so a lost delta heals itself.
//!
//! ## Module Organization
//!
//! ### Content (`catalog`, `level`)
//! Minigame, spell, status effect and level definitions, either built in or
//! loaded from a JSON file. Loaded once and shared read-only.
//!
//! ### Gameplay (`game_mode`, `phase`, `status_effects`, `ground`, `movement`,
//! `projectile`, `spells`)
//! The simulation building blocks. None of them touch the network.
//!
//! ### World (`game`)
//! `GameSession` owns the characters and projectiles of one minigame and
//! runs the fixed-order tick: casts, status effects, movement, projectiles,
//! respawns, outcome detection, phase evaluation.
//!
//! ### Transport (`client_manager`, `network`, `replication`)
//! UDP socket tasks, client bookkeeping with latest-wins input, and the
//! delta/snapshot builder.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::catalog::MiniGameCatalog;
//! use server::game::{GameSession, SessionSettings};
//! use server::network::{NetworkSettings, Server};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = Arc::new(MiniGameCatalog::builtin());
//!     let session = GameSession::new(catalog, "race", SessionSettings::default())?;
//!
//!     let mut server = Server::new("127.0.0.1:8080", NetworkSettings::default(), session).await?;
//!
//!     // Runs until the process is stopped:
//!     // - receives connects, inputs and cast requests
//!     // - ticks the session at a fixed rate
//!     // - broadcasts deltas, phase events and periodic snapshots
//!     // - drops clients that go silent
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod client_manager;
pub mod error;
pub mod game;
pub mod game_mode;
pub mod ground;
pub mod level;
pub mod movement;
pub mod network;
pub mod phase;
pub mod projectile;
pub mod replication;
pub mod spells;
pub mod status_effects;

pub use error::{Result, ServerError};
