//! Move descriptors and move edits
//!
//! Turns compact descriptors (`"5,2>5,4"`, `"10,7>10,8Q"`) into edits against
//! the current board, and moves the board's view cursor through the played
//! plies.

use core::fmt;
use core::str::FromStr;
use tracing::debug;

use crate::board::{BoardState, EnPassant, MoveRecord};
use crate::change::{apply_edit, Edit, StateChange};
use crate::errors::{BoardError, Result, SyncError};
use crate::types::{Coords, PieceType, RawType};

// ----------------------------------------------------------------------------
// Compact Move
// ----------------------------------------------------------------------------

/// A validated move descriptor as received from the server or the rules engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoveDraft {
    pub start: Coords,
    pub end: Coords,
    pub promotion: Option<PieceType>,
}

impl MoveDraft {
    pub fn new(start: Coords, end: Coords) -> Self {
        Self {
            start,
            end,
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, promotion: PieceType) -> Self {
        self.promotion = Some(promotion);
        self
    }
}

impl fmt::Display for MoveDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}>{}", self.start, self.end)?;
        if let Some(promotion) = self.promotion {
            write!(f, "{}", promotion)?;
        }
        Ok(())
    }
}

impl FromStr for MoveDraft {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        let (start, rest) = s
            .split_once('>')
            .ok_or_else(|| SyncError::invalid_move(s, "missing '>' separator"))?;
        let start: Coords = start
            .parse()
            .map_err(|_| SyncError::invalid_move(s, "bad start coordinates"))?;

        let split = rest
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let (end, promotion) = rest.split_at(split);
        let end: Coords = end
            .parse()
            .map_err(|_| SyncError::invalid_move(s, "bad end coordinates"))?;
        let promotion = if promotion.is_empty() {
            None
        } else {
            Some(
                promotion
                    .parse::<PieceType>()
                    .map_err(|_| SyncError::invalid_move(s, "bad promotion piece"))?,
            )
        };

        Ok(Self {
            start,
            end,
            promotion,
        })
    }
}

// ----------------------------------------------------------------------------
// Edit Generation
// ----------------------------------------------------------------------------

/// Build the edit a game move produces on the current board
///
/// Handles captures, en-passant captures, castling, promotion and pawn
/// double-steps. Legality is not checked; the draft is trusted.
pub fn generate_move_edit(board: &BoardState, draft: &MoveDraft) -> Result<Edit> {
    let piece = board
        .piece_at(draft.start)
        .ok_or(BoardError::NoPieceAt {
            coords: draft.start,
        })?;
    let raw = piece.piece_type.raw;
    let mut edit = Edit::new();

    edit.push_global(StateChange::special_right(
        draft.start,
        board.has_special_right(draft.start),
        false,
    ));

    // En passant
    let en_passant = board.en_passant();
    if raw == RawType::Pawn && draft.start.x != draft.end.x && board.piece_at(draft.end).is_none() {
        if let Some(target) = en_passant.filter(|target| target.square == draft.end) {
            if let Some(captured) = board.piece_at(target.pawn) {
                edit.queue_delete(captured, true);
                edit.push_global(StateChange::special_right(
                    captured.coords,
                    board.has_special_right(captured.coords),
                    false,
                ));
            }
        }
    }

    // Regular capture
    if let Some(captured) = board.piece_at(draft.end) {
        edit.queue_delete(captured, true);
        edit.push_global(StateChange::special_right(
            draft.end,
            board.has_special_right(draft.end),
            false,
        ));
    }

    // Promotion or plain relocation
    match draft.promotion {
        Some(promoted) => {
            edit.queue_delete(piece, false);
            edit.queue_add(promoted, draft.end);
        }
        None => edit.queue_move(draft.start, draft.end),
    }

    let displacement = |from: i64, to: i64| {
        to.checked_sub(from)
            .ok_or_else(|| SyncError::invalid_move(draft.to_string(), "displacement out of range"))
    };
    let dx = displacement(draft.start.x, draft.end.x)?;
    let dy = displacement(draft.start.y, draft.end.y)?;

    // Castling: the partner jumps to the square the king crossed
    if raw == RawType::King
        && board.has_special_right(draft.start)
        && dy == 0
        && dx.unsigned_abs() >= 2
    {
        let direction = dx.signum();
        let partner = castling_partner(board, draft.start, direction);
        if let (Some(partner), Some(crossed)) = (partner, draft.end.offset(-direction, 0)) {
            edit.queue_move(partner, crossed);
            edit.push_global(StateChange::special_right(partner, true, false));
        }
    }

    // Pawn double-step sets the target; any other move clears it
    let new_en_passant = if raw == RawType::Pawn && dx == 0 && dy.unsigned_abs() == 2 {
        draft.start.offset(0, dy / 2).map(|square| EnPassant {
            square,
            pawn: draft.end,
        })
    } else {
        None
    };
    edit.push_global(StateChange::en_passant(en_passant, new_en_passant));

    Ok(edit)
}

/// Nearest piece along the king's row in `direction` that holds a special right
fn castling_partner(board: &BoardState, king: Coords, direction: i64) -> Option<Coords> {
    board
        .pieces()
        .filter(|piece| piece.coords.y == king.y && piece.coords.x.cmp(&king.x) as i64 == direction)
        .min_by_key(|piece| piece.coords.x.abs_diff(king.x))
        .map(|piece| piece.coords)
        .filter(|coords| board.has_special_right(*coords))
}

/// Build the edit of a board-editor move
///
/// Plain relocation with capture; no special moves. The special right on the
/// start square is transferred to the destination.
pub fn generate_editor_move_edit(board: &BoardState, draft: &MoveDraft) -> Result<Edit> {
    let piece = board
        .piece_at(draft.start)
        .ok_or(BoardError::NoPieceAt {
            coords: draft.start,
        })?;
    let mut edit = Edit::new();

    if let Some(captured) = board.piece_at(draft.end) {
        edit.queue_delete(captured, true);
    }
    match draft.promotion {
        Some(promoted) => {
            edit.queue_delete(piece, false);
            edit.queue_add(promoted, draft.end);
        }
        None => edit.queue_move(draft.start, draft.end),
    }

    let has_right = board.has_special_right(draft.start);
    let destination_has_right = board.has_special_right(draft.end);
    edit.push_global(StateChange::special_right(draft.start, has_right, false));
    edit.push_global(StateChange::special_right(
        draft.end,
        destination_has_right,
        has_right,
    ));

    Ok(edit)
}

// ----------------------------------------------------------------------------
// Move Sequence
// ----------------------------------------------------------------------------

/// Play a ply at the front of the game and append it to the move list
pub fn make_move(board: &mut BoardState, compact: &str, clock_stamp: Option<u64>) -> Result<()> {
    if !board.is_at_front() {
        return Err(cursor_error(board, "make a move away from the front"));
    }
    let draft: MoveDraft = compact.parse()?;
    let edit = generate_move_edit(board, &draft)?;
    apply_edit(board, &edit, true, true)?;
    board.push_move(MoveRecord {
        compact: compact.to_string(),
        clock_stamp,
        edit,
    });
    board.set_move_index(board.moves().len());
    debug!(compact, ply = board.move_index(), "Move played");
    Ok(())
}

/// Step the view back one ply, leaving global state untouched
pub fn rewind_move(board: &mut BoardState) -> Result<()> {
    let index = board.move_index();
    if index == 0 {
        return Err(cursor_error(board, "rewind past the start"));
    }
    let edit = board.moves()[index - 1].edit.clone();
    apply_edit(board, &edit, false, false)?;
    board.set_move_index(index - 1);
    Ok(())
}

/// Step the view forward one ply, leaving global state untouched
pub fn forward_move(board: &mut BoardState) -> Result<()> {
    let index = board.move_index();
    if index >= board.moves().len() {
        return Err(cursor_error(board, "forward past the front"));
    }
    let edit = board.moves()[index].edit.clone();
    apply_edit(board, &edit, true, false)?;
    board.set_move_index(index + 1);
    Ok(())
}

/// Forward the view to the latest ply, returning how many plies were replayed
pub fn go_to_front(board: &mut BoardState) -> Result<usize> {
    let mut replayed = 0;
    while !board.is_at_front() {
        forward_move(board)?;
        replayed += 1;
    }
    Ok(replayed)
}

/// Undo the latest ply including its global state and drop it from the list
pub fn remove_last_move(board: &mut BoardState) -> Result<MoveRecord> {
    if !board.is_at_front() || board.moves().is_empty() {
        return Err(cursor_error(board, "remove the last move"));
    }
    let edit = board.moves()[board.moves().len() - 1].edit.clone();
    apply_edit(board, &edit, false, true)?;
    let record = board
        .pop_move()
        .ok_or_else(|| cursor_error(board, "remove the last move"))?;
    board.set_move_index(board.moves().len());
    Ok(record)
}

fn cursor_error(board: &BoardState, operation: &'static str) -> SyncError {
    BoardError::MoveCursor {
        operation,
        move_index: board.move_index(),
        move_count: board.moves().len(),
    }
    .into()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{StartingPiece, VariantOptions};
    use crate::types::Player;

    fn piece(abbr: &str) -> PieceType {
        abbr.parse().unwrap()
    }

    fn board(pieces: &[(&str, i64, i64, bool)]) -> BoardState {
        let mut options = VariantOptions::default();
        for (abbr, x, y, right) in pieces {
            options.pieces.push(StartingPiece {
                coords: Coords::new(*x, *y),
                piece_type: piece(abbr),
            });
            if *right {
                options.special_rights.push(Coords::new(*x, *y));
            }
        }
        BoardState::from_variant(&options).unwrap()
    }

    #[test]
    fn test_parse_compact_moves() {
        let draft: MoveDraft = "5,2>5,4".parse().unwrap();
        assert_eq!(draft, MoveDraft::new(Coords::new(5, 2), Coords::new(5, 4)));

        let promo: MoveDraft = "10,7>10,8Q".parse().unwrap();
        assert_eq!(promo.promotion, Some(PieceType::new(RawType::Queen, Player::White)));
        assert_eq!(promo.to_string(), "10,7>10,8Q");

        let negative: MoveDraft = "-3,-1>-3,-2am".parse().unwrap();
        assert_eq!(negative.end, Coords::new(-3, -2));
        assert_eq!(negative.promotion.unwrap().raw, RawType::Amazon);

        assert!("5,2-5,4".parse::<MoveDraft>().is_err());
        assert!("5,2>5,4XX".parse::<MoveDraft>().is_err());
    }

    #[test]
    fn test_double_step_forward_and_backward() {
        let mut b = board(&[("P", 5, 2, true)]);
        let before = b.clone();

        make_move(&mut b, "5,2>5,4", None).unwrap();
        let pawn = b.piece_at(Coords::new(5, 4)).unwrap();
        assert_eq!(pawn.index, 0);
        assert_eq!(
            b.en_passant(),
            Some(EnPassant {
                square: Coords::new(5, 3),
                pawn: Coords::new(5, 4),
            })
        );
        assert!(!b.has_special_right(Coords::new(5, 2)));

        remove_last_move(&mut b).unwrap();
        assert_eq!(b, before);
    }

    #[test]
    fn test_en_passant_capture() {
        let mut b = board(&[("P", 4, 5, false), ("p", 5, 7, true)]);
        make_move(&mut b, "5,7>5,5", None).unwrap();
        make_move(&mut b, "4,5>5,6", None).unwrap();

        assert!(b.piece_at(Coords::new(5, 5)).is_none());
        assert_eq!(b.piece_at(Coords::new(5, 6)).unwrap().piece_type, piece("P"));
        assert!(b.en_passant().is_none());
    }

    #[test]
    fn test_castling_moves_partner() {
        let mut b = board(&[("K", 5, 1, true), ("R", 8, 1, true), ("R", 1, 1, true)]);
        make_move(&mut b, "5,1>7,1", None).unwrap();

        assert_eq!(b.piece_at(Coords::new(7, 1)).unwrap().piece_type, piece("K"));
        assert_eq!(b.piece_at(Coords::new(6, 1)).unwrap().piece_type, piece("R"));
        assert!(!b.has_special_right(Coords::new(8, 1)));
        assert!(b.has_special_right(Coords::new(1, 1)));
    }

    #[test]
    fn test_promotion_with_capture() {
        let mut b = board(&[("P", 2, 7, false), ("n", 3, 8, false)]);
        let before = b.clone();
        make_move(&mut b, "2,7>3,8Q", None).unwrap();

        assert_eq!(b.piece_at(Coords::new(3, 8)).unwrap().piece_type, piece("Q"));
        assert_eq!(b.piece_count(), 1);

        remove_last_move(&mut b).unwrap();
        assert_eq!(b, before);
    }

    #[test]
    fn test_missing_start_piece_aborts_construction() {
        let b = board(&[("K", 1, 1, false)]);
        let err = generate_move_edit(&b, &"4,4>4,5".parse().unwrap()).unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_extreme_displacement_rejected() {
        let mut b = board(&[("P", 1, 2, true)]);
        let err = make_move(&mut b, "1,2>-9223372036854775808,2", None).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Protocol(crate::errors::ProtocolError::InvalidCompactMove { .. })
        ));
        assert!(b.moves().is_empty());
        assert_eq!(b.piece_at(Coords::new(1, 2)).map(|p| p.coords), Some(Coords::new(1, 2)));
    }

    #[test]
    fn test_rewind_and_forward_view() {
        let mut b = board(&[("P", 1, 2, true), ("p", 1, 7, true)]);
        make_move(&mut b, "1,2>1,4", None).unwrap();
        make_move(&mut b, "1,7>1,5", None).unwrap();
        let front = b.clone();

        rewind_move(&mut b).unwrap();
        rewind_move(&mut b).unwrap();
        assert_eq!(b.move_index(), 0);
        assert!(b.piece_at(Coords::new(1, 2)).is_some());
        assert!(rewind_move(&mut b).is_err());
        assert!(make_move(&mut b, "1,4>1,5", None).is_err());

        assert_eq!(go_to_front(&mut b).unwrap(), 2);
        assert_eq!(b, front);
    }

    #[test]
    fn test_editor_move_transfers_special_right() {
        let mut b = board(&[("R", 1, 1, true), ("b", 1, 5, false)]);
        let edit = generate_editor_move_edit(&b, &"1,1>1,5".parse().unwrap()).unwrap();
        apply_edit(&mut b, &edit, true, true).unwrap();

        assert!(b.has_special_right(Coords::new(1, 5)));
        assert!(!b.has_special_right(Coords::new(1, 1)));
        assert_eq!(b.piece_count(), 1);
    }
}
