//! Core types for board synchronization
//!
//! This module defines the fundamental types used throughout the core,
//! using newtype patterns for semantic validation and type safety.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, SyncError};

// ----------------------------------------------------------------------------
// Coordinates
// ----------------------------------------------------------------------------

/// A square on the unbounded board
///
/// Serialized as its textual key so it can be used as a JSON map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coords {
    pub x: i64,
    pub y: i64,
}

impl Coords {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// The textual key used on the wire and in exported positions (`"x,y"`)
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Offset this square by a displacement, `None` past the edge of `i64`
    pub fn offset(&self, dx: i64, dy: i64) -> Option<Self> {
        Some(Self::new(self.x.checked_add(dx)?, self.y.checked_add(dy)?))
    }
}

impl fmt::Display for Coords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl FromStr for Coords {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| SyncError::invalid_move(s, "coordinates must be \"x,y\""))?;
        let x = x
            .trim()
            .parse::<i64>()
            .map_err(|_| SyncError::invalid_move(s, "x is not an integer"))?;
        let y = y
            .trim()
            .parse::<i64>()
            .map_err(|_| SyncError::invalid_move(s, "y is not an integer"))?;
        Ok(Self::new(x, y))
    }
}

impl From<Coords> for String {
    fn from(coords: Coords) -> String {
        coords.key()
    }
}

impl TryFrom<String> for Coords {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<(i64, i64)> for Coords {
    fn from((x, y): (i64, i64)) -> Self {
        Self::new(x, y)
    }
}

// ----------------------------------------------------------------------------
// Players
// ----------------------------------------------------------------------------

/// One side of the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Player {
    White,
    Black,
}

impl Player {
    pub fn opponent(self) -> Self {
        match self {
            Player::White => Player::Black,
            Player::Black => Player::White,
        }
    }

    /// The player to move after `plies` half-moves from the start
    pub fn to_move_after(plies: usize) -> Self {
        if plies % 2 == 0 {
            Player::White
        } else {
            Player::Black
        }
    }

    /// Forward direction of this player's pawns along the y axis
    pub fn pawn_direction(self) -> i64 {
        match self {
            Player::White => 1,
            Player::Black => -1,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::White => write!(f, "white"),
            Player::Black => write!(f, "black"),
        }
    }
}

// ----------------------------------------------------------------------------
// Piece Types
// ----------------------------------------------------------------------------

/// Kind of piece, independent of its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawType {
    King,
    Giraffe,
    Camel,
    Zebra,
    Knightrider,
    Amazon,
    Queen,
    RoyalQueen,
    Hawk,
    Chancellor,
    Archbishop,
    Centaur,
    RoyalCentaur,
    Rose,
    Knight,
    Guard,
    Huygen,
    Rook,
    Bishop,
    Pawn,
    Obstacle,
    Void,
}

impl RawType {
    pub const ALL: [RawType; 22] = [
        RawType::King,
        RawType::Giraffe,
        RawType::Camel,
        RawType::Zebra,
        RawType::Knightrider,
        RawType::Amazon,
        RawType::Queen,
        RawType::RoyalQueen,
        RawType::Hawk,
        RawType::Chancellor,
        RawType::Archbishop,
        RawType::Centaur,
        RawType::RoyalCentaur,
        RawType::Rose,
        RawType::Knight,
        RawType::Guard,
        RawType::Huygen,
        RawType::Rook,
        RawType::Bishop,
        RawType::Pawn,
        RawType::Obstacle,
        RawType::Void,
    ];

    /// Upper-case abbreviation used in compact notation
    pub fn abbreviation(self) -> &'static str {
        match self {
            RawType::King => "K",
            RawType::Giraffe => "GI",
            RawType::Camel => "CA",
            RawType::Zebra => "ZE",
            RawType::Knightrider => "NR",
            RawType::Amazon => "AM",
            RawType::Queen => "Q",
            RawType::RoyalQueen => "RQ",
            RawType::Hawk => "HA",
            RawType::Chancellor => "CH",
            RawType::Archbishop => "AR",
            RawType::Centaur => "CE",
            RawType::RoyalCentaur => "RC",
            RawType::Rose => "RO",
            RawType::Knight => "N",
            RawType::Guard => "GU",
            RawType::Huygen => "HU",
            RawType::Rook => "R",
            RawType::Bishop => "B",
            RawType::Pawn => "P",
            RawType::Obstacle => "OB",
            RawType::Void => "VO",
        }
    }

    fn from_abbreviation(upper: &str) -> Option<Self> {
        RawType::ALL
            .iter()
            .copied()
            .find(|raw| raw.abbreviation() == upper)
    }

    /// Whether losing this piece loses the game
    pub fn is_royal(self) -> bool {
        matches!(
            self,
            RawType::King | RawType::RoyalQueen | RawType::RoyalCentaur
        )
    }
}

/// A piece kind together with its owner
///
/// Serialized as its abbreviation (`"Q"`, `"am"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PieceType {
    pub raw: RawType,
    pub color: Player,
}

impl PieceType {
    pub const fn new(raw: RawType, color: Player) -> Self {
        Self { raw, color }
    }

    /// Abbreviation, upper case for white and lower case for black
    pub fn abbreviation(&self) -> String {
        let abbr = self.raw.abbreviation();
        match self.color {
            Player::White => abbr.to_string(),
            Player::Black => abbr.to_ascii_lowercase(),
        }
    }
}

impl fmt::Display for PieceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

impl From<PieceType> for String {
    fn from(piece_type: PieceType) -> String {
        piece_type.abbreviation()
    }
}

impl TryFrom<String> for PieceType {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for PieceType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || {
            SyncError::Protocol(ProtocolError::UnknownPieceAbbreviation {
                abbreviation: s.to_string(),
            })
        };
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(unknown());
        }
        let color = if s.chars().all(|c| c.is_ascii_uppercase()) {
            Player::White
        } else if s.chars().all(|c| c.is_ascii_lowercase()) {
            Player::Black
        } else {
            return Err(unknown());
        };
        let raw = RawType::from_abbreviation(&s.to_ascii_uppercase()).ok_or_else(unknown)?;
        Ok(Self::new(raw, color))
    }
}

// ----------------------------------------------------------------------------
// Game Identifier
// ----------------------------------------------------------------------------

/// Server-assigned identifier of an online game
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(u32);

impl GameId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Millisecond timestamp since Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

use core::ops::{Add, Sub};

impl Add<u64> for Timestamp {
    type Output = Timestamp;

    fn add(self, other: u64) -> Timestamp {
        Timestamp(self.0.saturating_add(other))
    }
}

impl Sub for Timestamp {
    type Output = u64;

    fn sub(self, other: Timestamp) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

impl Timestamp {
    /// Create a new timestamp
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Get current wall-clock timestamp
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as u64)
    }

    /// Get the raw milliseconds
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Shift by a signed number of milliseconds, saturating at the epoch
    pub fn offset_by(&self, millis: i64) -> Self {
        if millis >= 0 {
            Self(self.0.saturating_add(millis as u64))
        } else {
            Self(self.0.saturating_sub(millis.unsigned_abs()))
        }
    }

    /// Signed milliseconds from `earlier` to `self`
    pub fn signed_millis_since(&self, earlier: Timestamp) -> i64 {
        let diff = i128::from(self.0) - i128::from(earlier.0);
        diff.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
    }

    /// Get duration since another timestamp
    pub fn duration_since(&self, other: Self) -> core::time::Duration {
        core::time::Duration::from_millis(self.0.saturating_sub(other.0))
    }
}

// ----------------------------------------------------------------------------
// Time Source Trait
// ----------------------------------------------------------------------------

/// Trait for providing timestamps
///
/// Clock reconciliation and navigation throttling read time only through
/// this trait so tests can drive them deterministically.
pub trait TimeSource {
    /// Get the current timestamp
    fn now(&self) -> Timestamp;
}

/// Wall-clock implementation of TimeSource
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for std::sync::Arc<T> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coords_parse_and_display() {
        let coords: Coords = "-5,12".parse().unwrap();
        assert_eq!(coords, Coords::new(-5, 12));
        assert_eq!(coords.key(), "-5,12");
        assert!("5;12".parse::<Coords>().is_err());
        assert!("a,1".parse::<Coords>().is_err());
    }

    #[test]
    fn test_piece_abbreviations() {
        let queen: PieceType = "Q".parse().unwrap();
        assert_eq!(queen, PieceType::new(RawType::Queen, Player::White));

        let amazon: PieceType = "am".parse().unwrap();
        assert_eq!(amazon, PieceType::new(RawType::Amazon, Player::Black));
        assert_eq!(amazon.abbreviation(), "am");

        assert!("Am".parse::<PieceType>().is_err());
        assert!("XX".parse::<PieceType>().is_err());
    }

    #[test]
    fn test_player_turns() {
        assert_eq!(Player::to_move_after(0), Player::White);
        assert_eq!(Player::to_move_after(3), Player::Black);
        assert_eq!(Player::White.opponent(), Player::Black);
    }

    #[test]
    fn test_timestamp_offset() {
        let ts = Timestamp::new(1_000);
        assert_eq!(ts.offset_by(500).as_millis(), 1_500);
        assert_eq!(ts.offset_by(-2_000).as_millis(), 0);
        assert_eq!(Timestamp::new(700).signed_millis_since(ts), -300);
        assert_eq!((ts + u64::MAX).as_millis(), u64::MAX);
        assert_eq!(Timestamp::new(u64::MAX).signed_millis_since(Timestamp::new(0)), i64::MAX);
    }

    #[test]
    fn test_coords_offset_stops_at_edge() {
        let coords = Coords::new(i64::MAX, 3);
        assert_eq!(coords.offset(-1, 1), Some(Coords::new(i64::MAX - 1, 4)));
        assert_eq!(coords.offset(1, 0), None);
        assert_eq!(Coords::new(0, i64::MIN).offset(0, -1), None);
    }
}
