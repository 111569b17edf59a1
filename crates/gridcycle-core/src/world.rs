//! The world: grid ownership, spawn placement, and tick resolution. This is
//! the authoritative game state; every mutation goes through
//! [`World::advance`], [`World::add_player`], or [`World::remove_player`],
//! and the tick orchestrator is the only caller that drives it.

use std::collections::HashMap;

use gridcycle_config::Config;
use gridcycle_geometry::{Direction, IVec2, inside_grid, step};
use gridcycle_proto::{Color, PlayerSnapshot, WorldSnapshot};
use thiserror::Error;
use tracing::{debug, instrument, trace};

use crate::{
    player::{Player, PlayerStore},
    rng::{Xorshift64, generate_color_palette},
};

const MAX_SPAWN_ATTEMPTS: u32 = 10_000;
const BASE_TRAIL_LENGTH: u32 = 55;
const TRAIL_GROWTH_INTERVAL: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SpawnError {
    #[error("the game is already at max_clients capacity")]
    Full,
    #[error("no empty cell found after {0} attempts")]
    GridFull(u32),
    #[error("no free id in the 1..=255 id space")]
    IdSpaceExhausted,
}

/// The shared, single-writer game state: the grid, the player table, the
/// frame counter, and everything needed to reproduce a deterministic run
/// from a given seed.
pub struct World {
    config: Config,
    grid: Vec<u8>,
    players: PlayerStore,
    frame: u32,
    rng: Xorshift64,
    palette: Vec<Color>,
    id_counter: u8,
    game_started: bool,
}

impl World {
    /// Allocates the grid as zeros, builds the deterministic color palette,
    /// and seeds the RNG from `config.rng_seed`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let grid = vec![0u8; (config.grid_width * config.grid_height) as usize];
        let palette = generate_color_palette(config.max_clients as usize);

        Self {
            grid,
            players: PlayerStore::new(),
            frame: 0,
            rng: Xorshift64::new(config.rng_seed),
            palette,
            id_counter: 1,
            game_started: false,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    fn cell_index(&self, pos: IVec2) -> usize {
        pos.y as usize * self.config.grid_width as usize + pos.x as usize
    }

    fn cell(&self, pos: IVec2) -> u8 {
        self.grid[self.cell_index(pos)]
    }

    fn set_cell(&mut self, pos: IVec2, value: u8) {
        let index = self.cell_index(pos);
        self.grid[index] = value;
    }

    /// Picks the next player id: a monotonically increasing counter over the
    /// 8-bit wire id domain (`1..=255`, `0` reserved) that skips any id still
    /// held by a connected player, so a freed id is never handed to a new
    /// player while its old owner is still around. The counter wraps back to
    /// `1` once it runs off the top of the domain, but a wrapped value is
    /// only ever returned once the scan confirms it is actually free.
    ///
    /// Returns `None` only if every id in `1..=255` is occupied, which
    /// cannot happen while `players.len() < max_clients <= 255` (the caller
    /// already checked that before spawning).
    fn next_id(&mut self) -> Option<u8> {
        for _ in 0..u8::MAX {
            let id = self.id_counter;
            self.id_counter = self.id_counter.wrapping_add(1);
            if self.id_counter == 0 {
                self.id_counter = 1;
            }
            if self.players.find(id).is_none() {
                return Some(id);
            }
        }
        None
    }

    /// Spawns a new player with `name`, placing it at a random empty cell.
    #[instrument(skip(self))]
    pub fn add_player(&mut self, name: &str) -> Result<u8, SpawnError> {
        if self.players.len() >= self.config.max_clients as usize {
            return Err(SpawnError::Full);
        }

        let width = self.config.grid_width as i32;
        let height = self.config.grid_height as i32;

        let mut position = IVec2::new(0, 0);
        let mut found = false;
        for _ in 0..MAX_SPAWN_ATTEMPTS {
            let x = (self.rng.next_f32() * width as f32) as i32;
            let y = (self.rng.next_f32() * height as f32) as i32;
            let candidate = IVec2::new(x.min(width - 1), y.min(height - 1));
            if self.cell(candidate) == 0 {
                position = candidate;
                found = true;
                break;
            }
        }
        if !found {
            return Err(SpawnError::GridFull(MAX_SPAWN_ATTEMPTS));
        }

        let Some(id) = self.next_id() else {
            return Err(SpawnError::IdSpaceExhausted);
        };
        let color = self.palette[id as usize % self.palette.len().max(1)];

        let player = Player::new(id, name.to_owned(), position, color);
        self.set_cell(position, id);
        if self.players.insert(player).is_err() {
            self.set_cell(position, 0);
            return Err(SpawnError::IdSpaceExhausted);
        }

        self.game_started = true;
        debug!(id, ?position, "player spawned");
        Ok(id)
    }

    /// Clears every cell owned by `id` and drops it from the store.
    pub fn remove_player(&mut self, id: u8) {
        if let Some(player) = self.players.remove(id) {
            self.set_cell(player.head, 0);
            for &cell in &player.trail {
                self.set_cell(cell, 0);
            }
        }
    }

    fn max_trail_length(&self) -> u32 {
        BASE_TRAIL_LENGTH + self.frame / TRAIL_GROWTH_INTERVAL
    }

    /// Resolves one tick given a direction for each player that produced a
    /// move this tick. Players absent from `directions` keep their current
    /// head and do not grow a trail. Never fails: unknown ids in
    /// `directions` are ignored (there is nothing to look up).
    #[instrument(skip(self, directions))]
    pub fn advance(&mut self, directions: &HashMap<u8, Direction>) {
        let max_trail_length = self.max_trail_length();

        let ids: Vec<u8> = self.players.iter().map(|p| p.id).collect();

        let mut new_pos: HashMap<u8, IVec2> = HashMap::new();
        for &id in &ids {
            if let Some(&direction) = directions.get(&id) {
                let head = self.players.find(id).expect("id from iter").head;
                new_pos.insert(id, step(head, direction));
            }
        }

        let width = self.config.grid_width as i32;
        let height = self.config.grid_height as i32;

        let mut dead: Vec<u8> = Vec::new();
        for (&id, &pos) in &new_pos {
            if !inside_grid(pos, width, height) {
                dead.push(id);
                continue;
            }
            if self.cell(pos) != 0 {
                dead.push(id);
            }
        }

        // head-to-head: two distinct movers landing on the same cell.
        let mut landing: HashMap<IVec2, Vec<u8>> = HashMap::new();
        for (&id, &pos) in &new_pos {
            landing.entry(pos).or_default().push(id);
        }
        for occupants in landing.values() {
            if occupants.len() > 1 {
                dead.extend(occupants.iter().copied());
            }
        }

        dead.sort_unstable();
        dead.dedup();

        for id in dead {
            trace!(id, "player eliminated");
            self.remove_player(id);
            new_pos.remove(&id);
        }

        for (&id, &pos) in &new_pos {
            let Some(player) = self.players.find_mut(id) else {
                continue;
            };
            let old_head = player.head;
            player.trail.push_front(old_head);

            while player.trail.len() as u32 > max_trail_length {
                if let Some(stale) = player.trail.pop_back() {
                    self.set_cell(stale, 0);
                }
            }

            self.set_cell(pos, id);
            let player = self.players.find_mut(id).expect("looked up above");
            player.head = pos;
        }

        self.frame += 1;
    }

    #[must_use]
    pub fn grid(&self) -> &[u8] {
        &self.grid
    }

    #[must_use]
    pub const fn grid_size(&self) -> (u32, u32) {
        (self.config.grid_width, self.config.grid_height)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    #[must_use]
    pub fn player(&self, id: u8) -> Option<&Player> {
        self.players.find(id)
    }

    #[must_use]
    pub const fn frame(&self) -> u32 {
        self.frame
    }

    pub fn set_frame(&mut self, frame: u32) {
        self.frame = frame;
    }

    #[must_use]
    pub fn is_over(&self) -> bool {
        self.game_started && self.players.len() <= 1
    }

    /// Builds the wire-format snapshot of the current world state (§6.3).
    /// The frame number embedded in the snapshot is whatever [`World::frame`]
    /// currently reports; the tick orchestrator calls [`World::set_frame`]
    /// beforehand so the broadcast snapshot carries this tick's number.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        let players = self
            .players
            .iter()
            .map(|p| PlayerSnapshot {
                head_x: p.head.x,
                head_y: p.head.y,
                r: p.color.r,
                g: p.color.g,
                b: p.color.b,
                name: p.name.clone(),
                id: p.id,
            })
            .collect();

        WorldSnapshot {
            grid_width: self.config.grid_width,
            grid_height: self.config.grid_height,
            players,
            frame_number: self.frame,
            grid: self.grid.clone(),
        }
    }
}
