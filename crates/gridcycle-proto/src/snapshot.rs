use bytes::{Buf, BufMut, BytesMut};

use crate::{MAX_STRING, ProtocolError};

/// Smallest possible encoding of one player record: `i32 head_x + i32
/// head_y + u8 r + u8 g + u8 b + u32 name_len + u8 id`, with a zero-length
/// name. Used to bound `player_count` against the bytes actually remaining
/// before trusting it to size an allocation.
const MIN_PLAYER_RECORD_LEN: usize = 4 + 4 + 1 + 1 + 1 + 4 + 1;

/// One player's entry inside a world snapshot payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub head_x: i32,
    pub head_y: i32,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub name: String,
    pub id: u8,
}

/// A fully decoded (or about-to-be-encoded) world snapshot, matching the
/// server→client payload layout byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldSnapshot {
    pub grid_width: u32,
    pub grid_height: u32,
    pub players: Vec<PlayerSnapshot>,
    pub frame_number: u32,
    /// Row-major, `grid_width * grid_height` bytes, cell value is the
    /// occupying player id or `0` if empty.
    pub grid: Vec<u8>,
}

/// Encodes a world snapshot payload (inside the outer frame length prefix).
#[must_use]
pub fn encode_snapshot(snapshot: &WorldSnapshot) -> BytesMut {
    let mut out = BytesMut::with_capacity(
        12 + snapshot
            .players
            .iter()
            .map(|p| 4 + 4 + 3 + 4 + p.name.len() + 1)
            .sum::<usize>()
            + 4
            + snapshot.grid.len(),
    );

    out.put_u32(snapshot.grid_width);
    out.put_u32(snapshot.grid_height);
    out.put_u32(snapshot.players.len() as u32);

    for player in &snapshot.players {
        out.put_i32(player.head_x);
        out.put_i32(player.head_y);
        out.put_u8(player.r);
        out.put_u8(player.g);
        out.put_u8(player.b);
        out.put_u32(player.name.len() as u32);
        out.put_slice(player.name.as_bytes());
        out.put_u8(player.id);
    }

    out.put_u32(snapshot.frame_number);
    out.put_slice(&snapshot.grid);

    out
}

/// Decodes a world snapshot payload, requiring that `payload` is consumed
/// exactly (no trailing bytes) — a protocol violation per §6.3.
pub fn decode_snapshot(payload: &[u8]) -> Result<WorldSnapshot, ProtocolError> {
    let mut cursor = payload;

    let grid_width = take_u32(&mut cursor)?;
    let grid_height = take_u32(&mut cursor)?;
    let player_count = take_u32(&mut cursor)?;

    // A player record is at least `head_x + head_y + r + g + b + name_len +
    // id` bytes (an empty name contributes nothing past its `name_len`
    // prefix) — bound `player_count` against what could possibly still be in
    // `cursor` *before* sizing an allocation from it. Without this, a peer
    // can send a handful of bytes claiming `player_count = u32::MAX` and
    // turn `Vec::with_capacity` into a multi-gigabyte allocation request,
    // which aborts the process instead of failing cleanly (the whole point
    // of bounded, adversarial-input-safe decoding, §4.2/P5).
    if player_count as usize > cursor.len() / MIN_PLAYER_RECORD_LEN {
        return Err(ProtocolError::UnexpectedEof);
    }

    let mut players = Vec::with_capacity(player_count as usize);
    for _ in 0..player_count {
        let head_x = take_i32(&mut cursor)?;
        let head_y = take_i32(&mut cursor)?;
        let r = take_u8(&mut cursor)?;
        let g = take_u8(&mut cursor)?;
        let b = take_u8(&mut cursor)?;

        let name_len = take_u32(&mut cursor)?;
        if name_len > MAX_STRING {
            return Err(ProtocolError::StringTooLarge {
                len: name_len,
                max: MAX_STRING,
            });
        }
        if cursor.len() < name_len as usize {
            return Err(ProtocolError::UnexpectedEof);
        }
        let name_bytes = &cursor[..name_len as usize];
        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| ProtocolError::InvalidUtf8)?
            .to_owned();
        cursor.advance(name_len as usize);

        let id = take_u8(&mut cursor)?;

        players.push(PlayerSnapshot {
            head_x,
            head_y,
            r,
            g,
            b,
            name,
            id,
        });
    }

    let frame_number = take_u32(&mut cursor)?;

    let grid_len = (grid_width as usize)
        .checked_mul(grid_height as usize)
        .ok_or(ProtocolError::UnexpectedEof)?;
    if cursor.len() < grid_len {
        return Err(ProtocolError::UnexpectedEof);
    }
    let grid = cursor[..grid_len].to_vec();
    cursor.advance(grid_len);

    if !cursor.is_empty() {
        return Err(ProtocolError::TrailingBytes {
            remaining: cursor.len(),
        });
    }

    Ok(WorldSnapshot {
        grid_width,
        grid_height,
        players,
        frame_number,
        grid,
    })
}

fn take_u32(cursor: &mut &[u8]) -> Result<u32, ProtocolError> {
    if cursor.len() < 4 {
        return Err(ProtocolError::UnexpectedEof);
    }
    Ok(cursor.get_u32())
}

fn take_i32(cursor: &mut &[u8]) -> Result<i32, ProtocolError> {
    if cursor.len() < 4 {
        return Err(ProtocolError::UnexpectedEof);
    }
    Ok(cursor.get_i32())
}

fn take_u8(cursor: &mut &[u8]) -> Result<u8, ProtocolError> {
    if cursor.is_empty() {
        return Err(ProtocolError::UnexpectedEof);
    }
    Ok(cursor.get_u8())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WorldSnapshot {
        WorldSnapshot {
            grid_width: 4,
            grid_height: 3,
            players: vec![
                PlayerSnapshot {
                    head_x: 1,
                    head_y: 2,
                    r: 10,
                    g: 20,
                    b: 30,
                    name: "alice".to_owned(),
                    id: 1,
                },
                PlayerSnapshot {
                    head_x: -1,
                    head_y: 0,
                    r: 200,
                    g: 1,
                    b: 255,
                    name: String::new(),
                    id: 2,
                },
            ],
            frame_number: 42,
            grid: vec![0; 12],
        }
    }

    #[test]
    fn snapshot_roundtrips() {
        let original = sample();
        let encoded = encode_snapshot(&original);
        let decoded = decode_snapshot(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn empty_player_list_roundtrips() {
        let original = WorldSnapshot {
            grid_width: 2,
            grid_height: 2,
            players: vec![],
            frame_number: 0,
            grid: vec![0; 4],
        };
        let encoded = encode_snapshot(&original);
        assert_eq!(decode_snapshot(&encoded).unwrap(), original);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let original = sample();
        let mut encoded = encode_snapshot(&original);
        encoded.extend_from_slice(&[0xFF]);
        assert!(matches!(
            decode_snapshot(&encoded),
            Err(ProtocolError::TrailingBytes { remaining: 1 })
        ));
    }

    #[test]
    fn truncated_payload_fails_cleanly_not_panics() {
        let original = sample();
        let encoded = encode_snapshot(&original);
        for cut in 0..encoded.len() {
            // must not panic for any prefix length
            let _ = decode_snapshot(&encoded[..cut]);
        }
    }

    #[test]
    fn implausible_player_count_is_rejected_before_allocating() {
        // grid_width, grid_height, then a player_count no 12-byte payload
        // could possibly back; must fail, not attempt a ~100GB allocation.
        let mut payload = BytesMut::new();
        payload.put_u32(10);
        payload.put_u32(10);
        payload.put_u32(u32::MAX);
        assert!(matches!(
            decode_snapshot(&payload),
            Err(ProtocolError::UnexpectedEof)
        ));
    }
}
