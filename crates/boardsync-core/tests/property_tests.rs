//! Property-based tests for the edit engine and edit history
//!
//! These verify the round-trip law of edits against arbitrary boards and
//! the cursor law of the undo/redo history.

use boardsync_core::{
    apply_edit, generate_editor_move_edit, generate_move_edit, BoardState, ClassicalPositions,
    Coords, EditHistory, MoveDraft, PieceType, Player, RawType, StartingPiece, VariantOptions,
};
use proptest::prelude::*;
use proptest::sample::Index;

/// Generate an arbitrary position on a small window of the infinite board
fn arb_board() -> impl Strategy<Value = BoardState> {
    prop::collection::btree_map(
        (-4i64..4, -4i64..4),
        (0usize..RawType::ALL.len(), any::<bool>(), any::<bool>()),
        1..24,
    )
    .prop_map(|squares| {
        let mut options = VariantOptions::default();
        for ((x, y), (raw, white, has_right)) in squares {
            let coords = Coords::new(x, y);
            let color = if white { Player::White } else { Player::Black };
            options.pieces.push(StartingPiece {
                coords,
                piece_type: PieceType::new(RawType::ALL[raw], color),
            });
            if has_right {
                options.special_rights.push(coords);
            }
        }
        BoardState::from_variant(&options).unwrap()
    })
}

/// Generate a destination near the occupied window
fn arb_destination() -> impl Strategy<Value = (i64, i64)> {
    (-5i64..5, -5i64..5)
}

/// Pick a move from an occupied square of `board`
fn pick_draft(board: &BoardState, start: Index, end: (i64, i64), promote: bool) -> MoveDraft {
    let pieces: Vec<_> = board.pieces().collect();
    let piece = pieces[start.index(pieces.len())];
    let draft = MoveDraft::new(piece.coords, Coords::from(end));
    if promote {
        draft.with_promotion(PieceType::new(RawType::Queen, piece.piece_type.color))
    } else {
        draft
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Applying a game move forward then backward restores the board
    #[test]
    fn prop_move_edit_round_trip(
        board in arb_board(),
        start in any::<Index>(),
        end in arb_destination(),
        promote in any::<bool>(),
    ) {
        let draft = pick_draft(&board, start, end, promote);
        prop_assume!(draft.start != draft.end);
        let edit = generate_move_edit(&board, &draft).unwrap();

        let mut applied = board.clone();
        // Castling onto an occupied square is rejected by the board itself
        prop_assume!(apply_edit(&mut applied, &edit, true, true).is_ok());
        prop_assert!(applied.check_consistency());

        apply_edit(&mut applied, &edit, false, true).unwrap();
        prop_assert_eq!(applied, board);
    }

    /// Editor moves obey the same law and never touch en passant
    #[test]
    fn prop_editor_edit_round_trip(
        board in arb_board(),
        start in any::<Index>(),
        end in arb_destination(),
        promote in any::<bool>(),
    ) {
        let draft = pick_draft(&board, start, end, promote);
        prop_assume!(draft.start != draft.end);
        let edit = generate_editor_move_edit(&board, &draft).unwrap();

        let mut applied = board.clone();
        apply_edit(&mut applied, &edit, true, true).unwrap();
        prop_assert_eq!(applied.en_passant(), board.en_passant());
        prop_assert_eq!(applied.piece_at(draft.end).map(|p| p.piece_type.color),
            board.piece_at(draft.start).map(|p| p.piece_type.color));

        apply_edit(&mut applied, &edit, false, true).unwrap();
        prop_assert_eq!(applied, board);
    }

    /// After n seals and k undos, exactly k redos restore the state after n seals
    #[test]
    fn prop_history_cursor_law(
        steps in prop::collection::vec((any::<Index>(), arb_destination()), 1..12),
        undo_fraction in 0.0f64..=1.0,
    ) {
        let mut board = BoardState::from_variant(&ClassicalPositions::classical()).unwrap();
        let mut history = EditHistory::new();
        let mut snapshots = vec![board.clone()];

        for (start, end) in &steps {
            let draft = pick_draft(&board, *start, *end, false);
            if draft.start == draft.end {
                continue;
            }
            let edit = generate_editor_move_edit(&board, &draft).unwrap();
            apply_edit(&mut board, &edit, true, true).unwrap();
            prop_assert!(history.record(edit));
            snapshots.push(board.clone());
        }
        let n = history.len();
        prop_assume!(n > 0);
        let after_seals = board.clone();

        let k = ((n as f64) * undo_fraction).round() as usize;
        for _ in 0..k {
            prop_assert!(history.undo(&mut board).unwrap());
        }
        prop_assert_eq!(&board, &snapshots[n - k]);
        prop_assert_eq!(history.can_redo(), k > 0);

        for _ in 0..k {
            prop_assert!(history.redo(&mut board).unwrap());
        }
        prop_assert!(!history.can_redo());
        prop_assert_eq!(board, after_seals);
    }

    /// A new edit after undoing discards the redo branch
    #[test]
    fn prop_branch_truncation(
        steps in prop::collection::vec((any::<Index>(), arb_destination()), 1..8),
        branch in (any::<Index>(), arb_destination()),
    ) {
        let mut board = BoardState::from_variant(&ClassicalPositions::classical()).unwrap();
        let mut history = EditHistory::new();
        for (start, end) in &steps {
            let draft = pick_draft(&board, *start, *end, false);
            if draft.start == draft.end {
                continue;
            }
            let edit = generate_editor_move_edit(&board, &draft).unwrap();
            apply_edit(&mut board, &edit, true, true).unwrap();
            history.record(edit);
        }
        let n = history.len();
        prop_assume!(n > 0);

        prop_assert!(history.undo(&mut board).unwrap());
        prop_assert!(history.can_redo());

        let draft = pick_draft(&board, branch.0, branch.1, false);
        prop_assume!(draft.start != draft.end);
        let edit = generate_editor_move_edit(&board, &draft).unwrap();
        apply_edit(&mut board, &edit, true, true).unwrap();
        prop_assert!(history.record(edit));

        prop_assert!(!history.can_redo());
        prop_assert_eq!(history.len(), n);
        prop_assert_eq!(history.cursor(), n);
    }
}

#[test]
fn test_empty_edit_not_recorded() {
    let mut history = EditHistory::new();
    assert!(!history.record(boardsync_core::Edit::new()));
    assert_eq!(history.len(), 0);
    assert!(!history.can_undo());
}
