//! Board state
//!
//! The mutable board that edits operate on: a bijection between squares and
//! dense piece indices, the special-right set, the en-passant pointer, and the
//! played move list with its view cursor.
//!
//! The mutators here are deliberately low level. Everything outside this crate
//! changes the board through [`crate::change::apply_edit`] so that every
//! mutation stays reversible.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::cache::VariantOptions;
use crate::change::Edit;
use crate::errors::{BoardError, Result};
use crate::types::{Coords, PieceType};

// ----------------------------------------------------------------------------
// Board Types
// ----------------------------------------------------------------------------

/// A piece as it sits on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Piece {
    pub piece_type: PieceType,
    pub coords: Coords,
    pub index: usize,
}

/// En-passant target: the skipped square and the pawn that skipped it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnPassant {
    pub square: Coords,
    pub pawn: Coords,
}

/// One played ply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    /// Compact descriptor, e.g. `"5,2>5,4"`
    pub compact: String,
    /// Clock time of the mover after the ply, if the game is timed
    pub clock_stamp: Option<u64>,
    /// The edit the ply produced against the board it was played on
    pub edit: Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    piece_type: PieceType,
    coords: Coords,
}

// ----------------------------------------------------------------------------
// Board State
// ----------------------------------------------------------------------------

/// Board state shared by live play and the board editor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardState {
    by_coords: HashMap<Coords, usize>,
    slots: Vec<Option<Slot>>,
    special_rights: HashSet<Coords>,
    en_passant: Option<EnPassant>,
    moves: Vec<MoveRecord>,
    move_index: usize,
}

impl BoardState {
    /// Create an empty board
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the starting board of a position
    pub fn from_variant(options: &VariantOptions) -> Result<Self> {
        let mut board = Self::new();
        for entry in &options.pieces {
            board.insert_piece(entry.piece_type, entry.coords)?;
        }
        for coords in &options.special_rights {
            board.set_special_right(*coords, true);
        }
        board.set_en_passant(options.en_passant);
        Ok(board)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Piece standing on `coords`, if any
    pub fn piece_at(&self, coords: Coords) -> Option<Piece> {
        let index = *self.by_coords.get(&coords)?;
        self.piece_by_index(index)
    }

    /// Piece stored at `index`, if any
    pub fn piece_by_index(&self, index: usize) -> Option<Piece> {
        self.slots.get(index).copied().flatten().map(|slot| Piece {
            piece_type: slot.piece_type,
            coords: slot.coords,
            index,
        })
    }

    /// All pieces in index order
    pub fn pieces(&self) -> impl Iterator<Item = Piece> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.map(|slot| Piece {
                piece_type: slot.piece_type,
                coords: slot.coords,
                index,
            })
        })
    }

    pub fn piece_count(&self) -> usize {
        self.by_coords.len()
    }

    /// Length of the index array, including freed interior slots
    pub fn index_capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn has_special_right(&self, coords: Coords) -> bool {
        self.special_rights.contains(&coords)
    }

    /// Squares holding a special right, sorted for stable output
    pub fn special_rights(&self) -> Vec<Coords> {
        let mut rights: Vec<Coords> = self.special_rights.iter().copied().collect();
        rights.sort();
        rights
    }

    pub fn en_passant(&self) -> Option<EnPassant> {
        self.en_passant
    }

    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    /// Number of plies currently played forward from the start position
    pub fn move_index(&self) -> usize {
        self.move_index
    }

    /// Whether the view shows the latest ply
    pub fn is_at_front(&self) -> bool {
        self.move_index == self.moves.len()
    }

    /// Check the square/index bijection
    pub fn check_consistency(&self) -> bool {
        let occupied = self.slots.iter().filter(|slot| slot.is_some()).count();
        if occupied != self.by_coords.len() || matches!(self.slots.last(), Some(None)) {
            return false;
        }
        self.by_coords.iter().all(|(coords, index)| {
            matches!(self.slots.get(*index), Some(Some(slot)) if slot.coords == *coords)
        }) && self.move_index <= self.moves.len()
    }

    // ------------------------------------------------------------------------
    // Piece Mutators
    // ------------------------------------------------------------------------

    /// Place a piece at the lowest free index
    pub(crate) fn insert_piece(&mut self, piece_type: PieceType, coords: Coords) -> Result<usize> {
        if self.by_coords.contains_key(&coords) {
            return Err(BoardError::SquareOccupied { coords }.into());
        }
        let slot = Some(Slot { piece_type, coords });
        let index = match self.slots.iter().position(Option::is_none) {
            Some(free) => {
                self.slots[free] = slot;
                free
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };
        self.by_coords.insert(coords, index);
        Ok(index)
    }

    /// Place a piece at a specific index, used when undoing a deletion
    pub(crate) fn insert_piece_at(&mut self, piece: Piece) -> Result<()> {
        if self.by_coords.contains_key(&piece.coords) {
            return Err(BoardError::SquareOccupied {
                coords: piece.coords,
            }
            .into());
        }
        if matches!(self.slots.get(piece.index), Some(Some(_))) {
            return Err(BoardError::IndexInUse { index: piece.index }.into());
        }
        if self.slots.len() <= piece.index {
            self.slots.resize(piece.index + 1, None);
        }
        self.slots[piece.index] = Some(Slot {
            piece_type: piece.piece_type,
            coords: piece.coords,
        });
        self.by_coords.insert(piece.coords, piece.index);
        Ok(())
    }

    /// Remove whatever stands on `coords` and free its index
    pub(crate) fn remove_piece(&mut self, coords: Coords) -> Result<Piece> {
        let index = self
            .by_coords
            .remove(&coords)
            .ok_or(BoardError::NoPieceAt { coords })?;
        let slot = self
            .slots
            .get_mut(index)
            .and_then(Option::take)
            .ok_or(BoardError::IndexMismatch { index, coords })?;
        self.trim_trailing_slots();
        Ok(Piece {
            piece_type: slot.piece_type,
            coords,
            index,
        })
    }

    /// Remove exactly `piece`, failing if the board disagrees about it
    pub(crate) fn remove_exact(&mut self, piece: &Piece) -> Result<()> {
        match self.piece_at(piece.coords) {
            None => Err(BoardError::NoPieceAt {
                coords: piece.coords,
            }
            .into()),
            Some(found) if found.index != piece.index || found.piece_type != piece.piece_type => {
                Err(BoardError::IndexMismatch {
                    index: piece.index,
                    coords: piece.coords,
                }
                .into())
            }
            Some(_) => self.remove_piece(piece.coords).map(|_| ()),
        }
    }

    /// Move the piece on `from` to the empty square `to`, keeping its index
    pub(crate) fn relocate(&mut self, from: Coords, to: Coords) -> Result<()> {
        if self.by_coords.contains_key(&to) {
            return Err(BoardError::SquareOccupied { coords: to }.into());
        }
        let index = self
            .by_coords
            .remove(&from)
            .ok_or(BoardError::NoPieceAt { coords: from })?;
        match self.slots.get_mut(index) {
            Some(Some(slot)) => slot.coords = to,
            _ => return Err(BoardError::IndexMismatch { index, coords: from }.into()),
        }
        self.by_coords.insert(to, index);
        Ok(())
    }

    fn trim_trailing_slots(&mut self) {
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
    }

    // ------------------------------------------------------------------------
    // State Mutators
    // ------------------------------------------------------------------------

    pub(crate) fn set_special_right(&mut self, coords: Coords, present: bool) {
        if present {
            self.special_rights.insert(coords);
        } else {
            self.special_rights.remove(&coords);
        }
    }

    pub(crate) fn set_en_passant(&mut self, en_passant: Option<EnPassant>) {
        self.en_passant = en_passant;
    }

    // ------------------------------------------------------------------------
    // Move List
    // ------------------------------------------------------------------------

    pub(crate) fn push_move(&mut self, record: MoveRecord) {
        self.moves.push(record);
    }

    pub(crate) fn pop_move(&mut self) -> Option<MoveRecord> {
        self.moves.pop()
    }

    pub(crate) fn set_move_index(&mut self, move_index: usize) {
        self.move_index = move_index.min(self.moves.len());
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Player, RawType};

    fn rook() -> PieceType {
        PieceType::new(RawType::Rook, Player::White)
    }

    #[test]
    fn test_lowest_free_index_is_reused() {
        let mut board = BoardState::new();
        board.insert_piece(rook(), Coords::new(1, 1)).unwrap();
        board.insert_piece(rook(), Coords::new(2, 1)).unwrap();
        board.insert_piece(rook(), Coords::new(3, 1)).unwrap();

        board.remove_piece(Coords::new(1, 1)).unwrap();
        let index = board.insert_piece(rook(), Coords::new(9, 9)).unwrap();

        assert_eq!(index, 0);
        assert!(board.check_consistency());
    }

    #[test]
    fn test_trailing_slots_are_trimmed() {
        let mut board = BoardState::new();
        board.insert_piece(rook(), Coords::new(1, 1)).unwrap();
        board.insert_piece(rook(), Coords::new(2, 1)).unwrap();
        board.remove_piece(Coords::new(2, 1)).unwrap();

        assert_eq!(board.index_capacity(), 1);

        let mut fresh = BoardState::new();
        fresh.insert_piece(rook(), Coords::new(1, 1)).unwrap();
        assert_eq!(board, fresh);
    }

    #[test]
    fn test_relocate_keeps_index() {
        let mut board = BoardState::new();
        board.insert_piece(rook(), Coords::new(1, 1)).unwrap();
        board.relocate(Coords::new(1, 1), Coords::new(1, 8)).unwrap();

        let piece = board.piece_at(Coords::new(1, 8)).unwrap();
        assert_eq!(piece.index, 0);
        assert!(board.piece_at(Coords::new(1, 1)).is_none());
    }

    #[test]
    fn test_invariant_violations_are_reported() {
        let mut board = BoardState::new();
        board.insert_piece(rook(), Coords::new(1, 1)).unwrap();

        assert!(board.insert_piece(rook(), Coords::new(1, 1)).is_err());
        assert!(board.relocate(Coords::new(5, 5), Coords::new(6, 6)).is_err());
        assert!(board
            .insert_piece_at(Piece {
                piece_type: rook(),
                coords: Coords::new(4, 4),
                index: 0,
            })
            .is_err());
    }

    #[test]
    fn test_insert_at_far_index_pads_slots() {
        let mut board = BoardState::new();
        board
            .insert_piece_at(Piece {
                piece_type: rook(),
                coords: Coords::new(0, 0),
                index: 3,
            })
            .unwrap();

        assert_eq!(board.index_capacity(), 4);
        assert_eq!(board.insert_piece(rook(), Coords::new(1, 0)).unwrap(), 0);
        assert!(board.check_consistency());
    }
}
