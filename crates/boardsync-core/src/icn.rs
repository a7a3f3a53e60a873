//! Logged game records
//!
//! Finished games arrive as a compact text record: bracketed metadata
//! headers followed by `|`-separated compact moves, each optionally carrying
//! a `{[%clk h:mm:ss.d]}` clock stamp.
//!
//! ```text
//! [Variant "Classical"] [WhiteID "3q"] [Result "1-0"] [Termination "checkmate"] 5,2>5,4{[%clk 0:09:56.7]}|5,7>5,5
//! ```

use tracing::debug;

use crate::errors::{Result, SyncError};
use crate::moves::MoveDraft;
use crate::protocol::{GameMetadata, ServerMove};

/// A parsed game record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameRecord {
    pub metadata: GameMetadata,
    pub moves: Vec<ServerMove>,
}

impl GameRecord {
    /// Conclusion string derived from the `Result` and `Termination` headers
    ///
    /// `"1-0"` → `"white <termination>"`, `"0-1"` → `"black <termination>"`,
    /// `"1/2-1/2"` → `"draw <termination>"`; anything else is `"aborted"`.
    pub fn conclusion(&self) -> String {
        let termination = self
            .metadata
            .get("Termination")
            .map(String::as_str)
            .unwrap_or("unknown");
        match self.metadata.get("Result").map(String::as_str) {
            Some("1-0") => format!("white {}", termination),
            Some("0-1") => format!("black {}", termination),
            Some("1/2-1/2") => format!("draw {}", termination),
            _ => "aborted".to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Parsing
// ----------------------------------------------------------------------------

/// Parse a game record; every move must be a valid compact descriptor
pub fn parse_game_record(input: &str) -> Result<GameRecord> {
    let mut record = GameRecord::default();
    let mut rest = input.trim_start();

    while let Some(header) = rest.strip_prefix('[') {
        let close = header
            .find(']')
            .ok_or_else(|| SyncError::invalid_record("unterminated header"))?;
        let (key, value) = parse_header(&header[..close])?;
        record.metadata.insert(key, value);
        rest = header[close + 1..].trim_start();
    }

    let rest = rest.trim();
    if !rest.is_empty() {
        for token in rest.split('|') {
            record.moves.push(parse_move(token.trim())?);
        }
    }

    debug!(
        headers = record.metadata.len(),
        moves = record.moves.len(),
        "Parsed game record"
    );
    Ok(record)
}

fn parse_header(body: &str) -> Result<(String, String)> {
    let (key, value) = body
        .split_once(' ')
        .ok_or_else(|| SyncError::invalid_record(format!("header without value: [{}]", body)))?;
    let value = value
        .trim()
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .ok_or_else(|| SyncError::invalid_record(format!("unquoted header value: [{}]", body)))?;
    if key.is_empty() {
        return Err(SyncError::invalid_record("empty header key"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_move(token: &str) -> Result<ServerMove> {
    let (compact, comment) = match token.find('{') {
        Some(open) => {
            let comment = token[open..]
                .strip_prefix('{')
                .and_then(|c| c.strip_suffix('}'))
                .ok_or_else(|| SyncError::invalid_record(format!("bad move comment: {}", token)))?;
            (token[..open].trim(), Some(comment))
        }
        None => (token, None),
    };

    compact
        .parse::<MoveDraft>()
        .map_err(|e| SyncError::invalid_record(e.to_string()))?;
    let clock_stamp = comment.map(parse_clock_comment).transpose()?.flatten();

    Ok(ServerMove {
        compact: compact.to_string(),
        clock_stamp,
    })
}

/// `[%clk h:mm:ss.d]` → milliseconds; other comments carry no clock
fn parse_clock_comment(comment: &str) -> Result<Option<u64>> {
    let Some(clock) = comment
        .trim()
        .strip_prefix("[%clk ")
        .and_then(|c| c.strip_suffix(']'))
    else {
        return Ok(None);
    };
    let bad = || SyncError::invalid_record(format!("bad clock stamp: {}", comment));

    let mut parts = clock.trim().split(':');
    let (Some(hours), Some(minutes), Some(seconds), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(bad());
    };
    let hours: u64 = hours.parse().map_err(|_| bad())?;
    let minutes: u64 = minutes.parse().map_err(|_| bad())?;
    let (whole, tenths) = match seconds.split_once('.') {
        Some((whole, fraction)) => {
            let digit = fraction.chars().next().and_then(|c| c.to_digit(10)).ok_or_else(bad)?;
            (whole, u64::from(digit))
        }
        None => (seconds, 0),
    };
    let whole: u64 = whole.parse().map_err(|_| bad())?;

    Ok(Some(((hours * 60 + minutes) * 60 + whole) * 1_000 + tenths * 100))
}

// ----------------------------------------------------------------------------
// Base-62 Identifiers
// ----------------------------------------------------------------------------

const BASE62_ALPHABET: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Decode a base-62 account id
pub fn base62_to_base10(encoded: &str) -> Option<u64> {
    if encoded.is_empty() {
        return None;
    }
    encoded.chars().try_fold(0u64, |acc, c| {
        let digit = BASE62_ALPHABET.find(c)? as u64;
        acc.checked_mul(62)?.checked_add(digit)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"[Event "Rated game"] [Variant "Classical"] [WhiteID "1a"] [BlackID "Z"] [Result "0-1"] [Termination "time"] 5,2>5,4{[%clk 0:09:56.7]}|5,7>5,5{[%clk 0:10:00]}|2,1>3,3"#;

    #[test]
    fn test_parse_record() {
        let record = parse_game_record(RECORD).unwrap();

        assert_eq!(record.metadata.get("Variant").unwrap(), "Classical");
        assert_eq!(record.moves.len(), 3);
        assert_eq!(record.moves[0].compact, "5,2>5,4");
        assert_eq!(record.moves[0].clock_stamp, Some(596_700));
        assert_eq!(record.moves[1].clock_stamp, Some(600_000));
        assert_eq!(record.moves[2].clock_stamp, None);
        assert_eq!(record.conclusion(), "black time");
    }

    #[test]
    fn test_record_without_moves() {
        let record = parse_game_record(r#"[Result "*"]"#).unwrap();
        assert!(record.moves.is_empty());
        assert_eq!(record.conclusion(), "aborted");
    }

    #[test]
    fn test_malformed_records() {
        assert!(parse_game_record(r#"[Variant "Classical""#).is_err());
        assert!(parse_game_record(r#"[Variant Classical]"#).is_err());
        assert!(parse_game_record("5,2>5,4|garbage").is_err());
        assert!(parse_game_record("5,2>5,4{[%clk 9:xx:00]}").is_err());
    }

    #[test]
    fn test_base62() {
        assert_eq!(base62_to_base10("0"), Some(0));
        assert_eq!(base62_to_base10("Z"), Some(61));
        assert_eq!(base62_to_base10("1a"), Some(72));
        assert_eq!(base62_to_base10("!"), None);
        assert_eq!(base62_to_base10(""), None);
    }
}
