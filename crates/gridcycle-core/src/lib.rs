//! The game engine: grid ownership, the player store, spawn placement, and
//! tick resolution. Everything here is single-writer — the tick
//! orchestrator (in `gridcycle-server`) is the only caller that mutates a
//! [`World`].

mod player;
mod rng;
mod world;

pub use gridcycle_proto::Color;
pub use player::{MAX_NAME_LEN, Player, PlayerStore, StoreError};
pub use rng::{Xorshift64, generate_color_palette, hsl_to_rgb};
pub use world::{SpawnError, World};
