//! Change/Edit engine
//!
//! An [`Edit`] is an ordered list of piece [`Change`]s plus [`StateChange`]s
//! with explicit before/after values. Every edit is reversible without
//! consulting anything but itself, which is what lets live play and the board
//! editor share a single undo/redo path.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::trace;

use crate::board::{BoardState, EnPassant, Piece};
use crate::errors::Result;
use crate::types::{Coords, PieceType};

// ----------------------------------------------------------------------------
// Changes
// ----------------------------------------------------------------------------

/// Atomic, self-describing piece mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Change {
    /// Insert a piece at the lowest free index
    Add {
        piece_type: PieceType,
        coords: Coords,
    },
    /// Remove a piece; remembers its index so undo restores it exactly
    Delete { piece: Piece, was_animated: bool },
    /// Relocate the piece on `from` to `to`
    Move { from: Coords, to: Coords },
}

impl Change {
    fn apply_forward(&self, board: &mut BoardState) -> Result<()> {
        match self {
            Change::Add { piece_type, coords } => board.insert_piece(*piece_type, *coords).map(|_| ()),
            Change::Delete { piece, .. } => board.remove_exact(piece),
            Change::Move { from, to } => board.relocate(*from, *to),
        }
    }

    fn apply_backward(&self, board: &mut BoardState) -> Result<()> {
        match self {
            Change::Add { coords, .. } => board.remove_piece(*coords).map(|_| ()),
            Change::Delete { piece, .. } => board.insert_piece_at(*piece),
            Change::Move { from, to } => board.relocate(*to, *from),
        }
    }
}

// ----------------------------------------------------------------------------
// State Changes
// ----------------------------------------------------------------------------

/// Delta to a board-global fact, carrying both values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StateChange {
    SpecialRight {
        coords: Coords,
        before: bool,
        after: bool,
    },
    EnPassant {
        before: Option<EnPassant>,
        after: Option<EnPassant>,
    },
}

impl StateChange {
    /// Special-right delta, or `None` when nothing would change
    pub fn special_right(coords: Coords, before: bool, after: bool) -> Option<Self> {
        (before != after).then_some(StateChange::SpecialRight {
            coords,
            before,
            after,
        })
    }

    /// En-passant delta, or `None` when nothing would change
    pub fn en_passant(before: Option<EnPassant>, after: Option<EnPassant>) -> Option<Self> {
        (before != after).then_some(StateChange::EnPassant { before, after })
    }

    fn apply(&self, board: &mut BoardState, forward: bool) {
        match self {
            StateChange::SpecialRight {
                coords,
                before,
                after,
            } => board.set_special_right(*coords, if forward { *after } else { *before }),
            StateChange::EnPassant { before, after } => {
                board.set_en_passant(if forward { *after } else { *before })
            }
        }
    }
}

/// State deltas split by lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditState {
    /// Per-ply facts, always applied
    pub local: Vec<StateChange>,
    /// Facts persisting across the whole board, applied on request
    pub global: Vec<StateChange>,
}

// ----------------------------------------------------------------------------
// Edit
// ----------------------------------------------------------------------------

/// The unit of atomicity for undo/redo and editor tools
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub changes: SmallVec<[Change; 4]>,
    pub state: EditState,
}

impl Edit {
    pub fn new() -> Self {
        Self::default()
    }

    /// An edit with no changes and no state deltas
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.state.local.is_empty() && self.state.global.is_empty()
    }

    pub fn queue_add(&mut self, piece_type: PieceType, coords: Coords) {
        self.changes.push(Change::Add { piece_type, coords });
    }

    pub fn queue_delete(&mut self, piece: Piece, was_animated: bool) {
        self.changes.push(Change::Delete {
            piece,
            was_animated,
        });
    }

    pub fn queue_move(&mut self, from: Coords, to: Coords) {
        self.changes.push(Change::Move { from, to });
    }

    /// Record a local state delta; `None` deltas are dropped
    pub fn push_local(&mut self, change: Option<StateChange>) {
        self.state.local.extend(change);
    }

    /// Record a global state delta; `None` deltas are dropped
    pub fn push_global(&mut self, change: Option<StateChange>) {
        self.state.global.extend(change);
    }

    /// Fold another edit's deltas onto the end of this one
    pub fn extend(&mut self, other: Edit) {
        self.changes.extend(other.changes);
        self.state.local.extend(other.state.local);
        self.state.global.extend(other.state.global);
    }
}

// ----------------------------------------------------------------------------
// Application
// ----------------------------------------------------------------------------

/// Apply an edit to the board
///
/// Forward replays changes in recorded order and sets `after` values.
/// Backward replays the inverse of each change in reverse order and restores
/// `before` values. Global state deltas are only touched with
/// `include_global`. On error the board may be partially modified, which is
/// an invariant violation the caller must surface.
pub fn apply_edit(
    board: &mut BoardState,
    edit: &Edit,
    forward: bool,
    include_global: bool,
) -> Result<()> {
    trace!(
        changes = edit.changes.len(),
        forward,
        include_global,
        "Applying edit"
    );

    if forward {
        for change in edit.changes.iter() {
            change.apply_forward(board)?;
        }
        for change in &edit.state.local {
            change.apply(board, true);
        }
        if include_global {
            for change in &edit.state.global {
                change.apply(board, true);
            }
        }
    } else {
        if include_global {
            for change in edit.state.global.iter().rev() {
                change.apply(board, false);
            }
        }
        for change in edit.state.local.iter().rev() {
            change.apply(board, false);
        }
        for change in edit.changes.iter().rev() {
            change.apply_backward(board)?;
        }
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Player, RawType};

    fn pawn() -> PieceType {
        PieceType::new(RawType::Pawn, Player::White)
    }

    fn board_with_pawn() -> BoardState {
        let mut board = BoardState::new();
        board.insert_piece(pawn(), Coords::new(5, 2)).unwrap();
        board.set_special_right(Coords::new(5, 2), true);
        board
    }

    #[test]
    fn test_no_op_state_changes_are_never_created() {
        assert!(StateChange::special_right(Coords::new(1, 1), true, true).is_none());
        assert!(StateChange::en_passant(None, None).is_none());

        let mut edit = Edit::new();
        edit.push_global(StateChange::special_right(Coords::new(1, 1), false, false));
        assert!(edit.is_empty());
    }

    #[test]
    fn test_forward_then_backward_restores_board() {
        let mut board = board_with_pawn();
        let before = board.clone();

        let mut edit = Edit::new();
        edit.queue_move(Coords::new(5, 2), Coords::new(5, 4));
        edit.push_global(StateChange::special_right(Coords::new(5, 2), true, false));
        edit.push_global(StateChange::en_passant(
            None,
            Some(EnPassant {
                square: Coords::new(5, 3),
                pawn: Coords::new(5, 4),
            }),
        ));

        apply_edit(&mut board, &edit, true, true).unwrap();
        assert_eq!(board.piece_at(Coords::new(5, 4)).unwrap().index, 0);
        assert!(!board.has_special_right(Coords::new(5, 2)));
        assert!(board.en_passant().is_some());

        apply_edit(&mut board, &edit, false, true).unwrap();
        assert_eq!(board, before);
    }

    #[test]
    fn test_global_state_skipped_without_flag() {
        let mut board = board_with_pawn();
        let mut edit = Edit::new();
        edit.queue_move(Coords::new(5, 2), Coords::new(5, 3));
        edit.push_global(StateChange::special_right(Coords::new(5, 2), true, false));

        apply_edit(&mut board, &edit, true, false).unwrap();
        assert!(board.has_special_right(Coords::new(5, 2)));
        assert!(board.piece_at(Coords::new(5, 3)).is_some());
    }

    #[test]
    fn test_local_state_always_applied() {
        let mut board = board_with_pawn();
        let target = EnPassant {
            square: Coords::new(5, 1),
            pawn: Coords::new(5, 2),
        };
        let mut edit = Edit::new();
        edit.push_local(StateChange::en_passant(None, Some(target)));

        apply_edit(&mut board, &edit, true, false).unwrap();
        assert_eq!(board.en_passant(), Some(target));
        apply_edit(&mut board, &edit, false, false).unwrap();
        assert_eq!(board.en_passant(), None);
    }

    #[test]
    fn test_delete_then_add_round_trip_keeps_indices() {
        let mut board = board_with_pawn();
        board
            .insert_piece(PieceType::new(RawType::Knight, Player::Black), Coords::new(7, 7))
            .unwrap();
        let before = board.clone();
        let pawn_piece = board.piece_at(Coords::new(5, 2)).unwrap();

        let mut edit = Edit::new();
        edit.queue_delete(pawn_piece, false);
        edit.queue_add(PieceType::new(RawType::Queen, Player::White), Coords::new(5, 2));

        apply_edit(&mut board, &edit, true, true).unwrap();
        assert_eq!(board.piece_at(Coords::new(5, 2)).unwrap().index, 0);
        apply_edit(&mut board, &edit, false, true).unwrap();
        assert_eq!(board, before);
    }

    #[test]
    fn test_contradicting_change_is_an_error() {
        let mut board = BoardState::new();
        let mut edit = Edit::new();
        edit.queue_move(Coords::new(1, 1), Coords::new(1, 2));

        let err = apply_edit(&mut board, &edit, true, true).unwrap_err();
        assert!(err.is_invariant_violation());
    }
}
