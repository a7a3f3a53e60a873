//! Variant cache
//!
//! Custom starting positions pasted into private games are cached client-side
//! per game id so a reload can rebuild the board. Entries are deleted when the
//! game concludes or closes.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::board::EnPassant;
use crate::errors::Result;
use crate::types::{Coords, GameId, PieceType};

// ----------------------------------------------------------------------------
// Variant Options
// ----------------------------------------------------------------------------

/// One piece of a starting position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartingPiece {
    pub coords: Coords,
    pub piece_type: PieceType,
}

/// A starting position payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantOptions {
    pub pieces: Vec<StartingPiece>,
    #[serde(default)]
    pub special_rights: Vec<Coords>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en_passant: Option<EnPassant>,
}

/// Cache key of a game's custom starting position
pub fn variant_cache_key(game_id: GameId) -> String {
    format!("online-game-variant-options{}", game_id)
}

// ----------------------------------------------------------------------------
// Cache Trait
// ----------------------------------------------------------------------------

/// Small client-side key/value store for starting positions
pub trait VariantCache {
    /// Load an entry, `None` if absent
    fn load(&self, key: &str) -> Result<Option<VariantOptions>>;

    /// Store or replace an entry
    fn store(&mut self, key: &str, options: &VariantOptions) -> Result<()>;

    /// Delete an entry, returning whether it existed
    fn delete(&mut self, key: &str) -> Result<bool>;
}

/// In-memory cache, used by tests and when no storage directory is configured
#[derive(Debug, Clone, Default)]
pub struct MemoryVariantCache {
    entries: HashMap<String, VariantOptions>,
}

impl MemoryVariantCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl VariantCache for MemoryVariantCache {
    fn load(&self, key: &str) -> Result<Option<VariantOptions>> {
        Ok(self.entries.get(key).cloned())
    }

    fn store(&mut self, key: &str, options: &VariantOptions) -> Result<()> {
        self.entries.insert(key.to_string(), options.clone());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}
