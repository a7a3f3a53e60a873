//! Starting positions
//!
//! Variant rules live outside the core. A [`StartingPositionProvider`]
//! supplies the starting position for a variant name; the built-in
//! [`ClassicalPositions`] knows the classical layout.

use tracing::warn;

use crate::cache::{StartingPiece, VariantOptions};
use crate::errors::Result;
use crate::types::{Coords, PieceType, Player, RawType};

/// Source of starting positions by variant name
pub trait StartingPositionProvider {
    fn starting_position(&self, variant: Option<&str>) -> Result<VariantOptions>;
}

/// Classical 8x8 layout on squares `1..=8`
///
/// Unknown variants fall back to the classical layout with a warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicalPositions;

const BACK_RANK: [RawType; 8] = [
    RawType::Rook,
    RawType::Knight,
    RawType::Bishop,
    RawType::Queen,
    RawType::King,
    RawType::Bishop,
    RawType::Knight,
    RawType::Rook,
];

impl ClassicalPositions {
    pub fn classical() -> VariantOptions {
        let mut options = VariantOptions::default();
        for (player, back, pawns) in [(Player::White, 1, 2), (Player::Black, 8, 7)] {
            for (file, raw) in (1..=8).zip(BACK_RANK) {
                let coords = Coords::new(file, back);
                options.pieces.push(StartingPiece {
                    coords,
                    piece_type: PieceType::new(raw, player),
                });
                if matches!(raw, RawType::Rook | RawType::King) {
                    options.special_rights.push(coords);
                }
            }
            for file in 1..=8 {
                let coords = Coords::new(file, pawns);
                options.pieces.push(StartingPiece {
                    coords,
                    piece_type: PieceType::new(RawType::Pawn, player),
                });
                options.special_rights.push(coords);
            }
        }
        options
    }
}

impl StartingPositionProvider for ClassicalPositions {
    fn starting_position(&self, variant: Option<&str>) -> Result<VariantOptions> {
        match variant {
            None | Some("Classical") => {}
            Some(other) => warn!(variant = other, "Unknown variant, using the classical layout"),
        }
        Ok(Self::classical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardState;

    #[test]
    fn test_classical_layout() {
        let board = BoardState::from_variant(&ClassicalPositions::classical()).unwrap();

        assert_eq!(board.piece_count(), 32);
        assert_eq!(
            board.piece_at(Coords::new(5, 1)).unwrap().piece_type,
            PieceType::new(RawType::King, Player::White)
        );
        assert_eq!(
            board.piece_at(Coords::new(4, 8)).unwrap().piece_type,
            PieceType::new(RawType::Queen, Player::Black)
        );
        assert!(board.has_special_right(Coords::new(5, 2)));
        assert!(!board.has_special_right(Coords::new(2, 1)));
    }
}
