//! A minimal example client (C10): connect, then loop
//! `recv_game_state` -> pick a direction -> `send_move` forever.
//!
//! Grounded in `original_source/src/client/client_c_simple.c`. The move
//! policy here — keep going the last direction, turn only to dodge an
//! immediate wall or trail cell — is a demonstration of the client library,
//! not part of the core contract (§1 Non-goals, §4.7).

use clap::Parser;
use gridcycle_client::GameClient;
use gridcycle_geometry::{Direction, inside_grid, step};
use gridcycle_proto::WorldSnapshot;
use tracing::{debug, info, warn};

#[derive(Parser)]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 7878)]
    port: u16,

    #[arg(long, default_value = "bot")]
    name: String,
}

const TURN_ORDER: [Direction; 4] = [
    Direction::North,
    Direction::East,
    Direction::South,
    Direction::West,
];

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut client = GameClient::connect(&args.name, &args.host, args.port)?;
    info!(color = ?client.color, "connected to gridcycle server");

    let mut last_direction = Direction::East;

    loop {
        let snapshot = match client.recv_game_state() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(%err, "lost connection to server");
                break;
            }
        };

        let Some(direction) = choose_direction(&snapshot, &client.name, last_direction) else {
            debug!("no live entry for this client in the snapshot, stopping");
            break;
        };
        last_direction = direction;

        debug!(frame = snapshot.frame_number, ?direction, "moving");
        if client.send_move(direction).is_err() {
            warn!("could not send move, server likely dropped us");
            break;
        }
    }

    Ok(())
}

/// Keeps going `last_direction` unless that would run into a wall or an
/// occupied cell, in which case it turns to the first safe direction in
/// `TURN_ORDER`. Not part of the core contract — see module docs.
fn choose_direction(
    snapshot: &WorldSnapshot,
    name: &str,
    last_direction: Direction,
) -> Option<Direction> {
    let me = snapshot.players.iter().find(|p| p.name == name)?;
    let head = gridcycle_geometry::IVec2::new(me.head_x, me.head_y);
    let width = snapshot.grid_width as i32;
    let height = snapshot.grid_height as i32;

    let is_safe = |direction: Direction| {
        let next = step(head, direction);
        inside_grid(next, width, height) && cell_at(snapshot, next) == 0
    };

    if is_safe(last_direction) {
        return Some(last_direction);
    }

    TURN_ORDER
        .into_iter()
        .find(|&direction| !direction.is_opposite(last_direction) && is_safe(direction))
        .or(Some(last_direction))
}

fn cell_at(snapshot: &WorldSnapshot, pos: gridcycle_geometry::IVec2) -> u8 {
    let index = pos.y as usize * snapshot.grid_width as usize + pos.x as usize;
    snapshot.grid.get(index).copied().unwrap_or(0)
}
