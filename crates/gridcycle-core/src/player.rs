//! The player entity and its trail, and the fixed-capacity, id-indexed
//! store that owns them.

use std::collections::VecDeque;

use gridcycle_geometry::IVec2;
use gridcycle_proto::Color;

/// Longest name the server keeps; the wire protocol allows more (up to
/// `MAX_STRING`), the server trims on spawn.
pub const MAX_NAME_LEN: usize = 31;

/// A single light-cycle: its identity, head, trail, and assigned color.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: u8,
    pub name: String,
    pub head: IVec2,
    /// Newest-to-oldest trail cells, not including the head.
    pub trail: VecDeque<IVec2>,
    pub color: Color,
}

impl Player {
    #[must_use]
    pub fn new(id: u8, name: String, head: IVec2, color: Color) -> Self {
        let mut name = name;
        if name.len() > MAX_NAME_LEN {
            truncate_to_byte_budget(&mut name, MAX_NAME_LEN);
        }
        Self {
            id,
            name,
            head,
            trail: VecDeque::new(),
            color,
        }
    }
}

/// Truncates `s` to at most `max_len` bytes without splitting a UTF-8
/// character.
fn truncate_to_byte_budget(s: &mut String, max_len: usize) {
    if s.len() <= max_len {
        return;
    }
    let mut cut = max_len;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

/// Dense, id-indexed player table: 256 slots addressed directly by id, each
/// carrying an `occupied` bit. No hashing — ids are the wire id domain
/// itself (`0..=255`), so direct indexing is both simplest and fastest.
pub struct PlayerStore {
    slots: Box<[Option<Player>; 256]>,
    len: usize,
}

impl Default for PlayerStore {
    fn default() -> Self {
        Self {
            slots: Box::new(std::array::from_fn(|_| None)),
            len: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("id {0} is already occupied")]
    Duplicate(u8),
}

impl PlayerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, player: Player) -> Result<(), StoreError> {
        let slot = &mut self.slots[player.id as usize];
        if slot.is_some() {
            return Err(StoreError::Duplicate(player.id));
        }
        *slot = Some(player);
        self.len += 1;
        Ok(())
    }

    #[must_use]
    pub fn find(&self, id: u8) -> Option<&Player> {
        self.slots[id as usize].as_ref()
    }

    pub fn find_mut(&mut self, id: u8) -> Option<&mut Player> {
        self.slots[id as usize].as_mut()
    }

    /// Removes and returns the player at `id`, freeing its trail.
    pub fn remove(&mut self, id: u8) -> Option<Player> {
        let removed = self.slots[id as usize].take();
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: u8) -> Player {
        Player::new(id, format!("p{id}"), IVec2::new(0, 0), Color::default())
    }

    #[test]
    fn insert_then_find() {
        let mut store = PlayerStore::new();
        store.insert(player(5)).unwrap();
        assert_eq!(store.find(5).unwrap().id, 5);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut store = PlayerStore::new();
        store.insert(player(5)).unwrap();
        assert_eq!(store.insert(player(5)), Err(StoreError::Duplicate(5)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_clears_slot_and_leaves_others_alone() {
        let mut store = PlayerStore::new();
        store.insert(player(5)).unwrap();
        store.insert(player(9)).unwrap();

        assert!(store.remove(5).is_some());
        assert!(store.find(5).is_none());
        assert!(store.find(9).is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn removing_absent_id_is_a_no_op() {
        let mut store = PlayerStore::new();
        assert!(store.remove(200).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn iter_yields_only_occupied_slots() {
        let mut store = PlayerStore::new();
        store.insert(player(1)).unwrap();
        store.insert(player(3)).unwrap();
        let mut ids: Vec<u8> = store.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn long_name_is_truncated_to_byte_budget() {
        let name = "x".repeat(100);
        let p = Player::new(1, name, IVec2::new(0, 0), Color::default());
        assert!(p.name.len() <= MAX_NAME_LEN);
    }
}
