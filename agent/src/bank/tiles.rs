//! Discovery cache for bank map tiles.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use common::Clock;
use gameapi::{GameApi, MapFilter};

const TILE_TTL_MS: u64 = 5 * 60 * 1_000;
/// The main-town bank; used whenever discovery fails.
const FALLBACK_TILE: BankTile = BankTile { x: 4, y: 1 };

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BankTile {
    pub x: i32,
    pub y: i32,
}

impl BankTile {
    pub fn pos(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

struct TileState {
    tiles: Vec<BankTile>,
    fetched_at_ms: u64,
}

/// Read-mostly cache; the lock is held across the fetch so concurrent
/// misses collapse onto one upstream request.
pub struct BankTileCache {
    api: Arc<dyn GameApi>,
    clock: Arc<dyn Clock>,
    state: Mutex<TileState>,
}

impl BankTileCache {
    pub fn new(api: Arc<dyn GameApi>, clock: Arc<dyn Clock>) -> Self {
        Self {
            api,
            clock,
            state: Mutex::new(TileState {
                tiles: Vec::new(),
                fetched_at_ms: 0,
            }),
        }
    }

    /// Accessible bank tiles, discovered from the maps endpoint. Falls back
    /// to the hardcoded town bank when discovery fails or yields nothing.
    pub async fn tiles(&self) -> Vec<BankTile> {
        let mut state = self.state.lock().await;
        let now = self.clock.now_ms();

        let fresh = state.fetched_at_ms != 0
            && now.saturating_sub(state.fetched_at_ms) < TILE_TTL_MS
            && !state.tiles.is_empty();
        if fresh {
            return state.tiles.clone();
        }

        match self.discover().await {
            Ok(tiles) if !tiles.is_empty() => {
                debug!(count = tiles.len(), "bank tiles discovered");
                state.tiles = tiles;
            }
            Ok(_) => {
                warn!("bank discovery returned no accessible tiles, using fallback");
                state.tiles = vec![FALLBACK_TILE];
            }
            Err(e) => {
                warn!(error = %e, "bank discovery failed, using fallback");
                state.tiles = vec![FALLBACK_TILE];
            }
        }
        state.fetched_at_ms = now;
        state.tiles.clone()
    }

    async fn discover(&self) -> Result<Vec<BankTile>, gameapi::ApiError> {
        let mut tiles = Vec::new();
        let mut page = 1;
        loop {
            let batch = self
                .api
                .get_maps(MapFilter {
                    content_type: Some("bank".into()),
                    content_code: None,
                    page,
                })
                .await?;
            for tile in &batch.items {
                // Conditional banks (season passes, quest gates) are skipped.
                if tile.is_unconditional() {
                    tiles.push(BankTile {
                        x: tile.x,
                        y: tile.y,
                    });
                }
            }
            if !batch.has_more() {
                break;
            }
            page += 1;
        }
        Ok(tiles)
    }
}

pub(crate) fn manhattan(a: (i32, i32), b: (i32, i32)) -> u64 {
    (a.0.abs_diff(b.0) + a.1.abs_diff(b.1)) as u64
}

/// Closest tile by walking distance.
pub fn nearest_tile(from: (i32, i32), tiles: &[BankTile]) -> Option<BankTile> {
    tiles
        .iter()
        .min_by_key(|t| manhattan(from, t.pos()))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_picks_minimum_walk() {
        let tiles = [
            BankTile { x: 4, y: 1 },
            BankTile { x: 7, y: 13 },
            BankTile { x: 0, y: 0 },
        ];
        assert_eq!(nearest_tile((5, 2), &tiles), Some(BankTile { x: 4, y: 1 }));
        assert_eq!(nearest_tile((8, 12), &tiles), Some(BankTile { x: 7, y: 13 }));
        assert_eq!(nearest_tile((0, 0), &[]), None);
    }
}
