//! Game protocol messages
//!
//! Wire shapes of the `game` subscription: the generic envelope, the typed
//! inbound actions and their payloads, and the outbound requests.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::clock::ClockValues;
use crate::errors::{ProtocolError, Result, SyncError};
use crate::types::{GameId, Player};

/// Free-form game metadata (`Variant`, `TimeControl`, `WhiteID`, ...)
pub type GameMetadata = BTreeMap<String, String>;

// ----------------------------------------------------------------------------
// Envelope
// ----------------------------------------------------------------------------

/// Subscription a message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Game,
    Invites,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Game => write!(f, "game"),
            Channel::Invites => write!(f, "invites"),
        }
    }
}

/// Inbound message envelope: `{"sub", "action", "value", "id"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub sub: String,
    pub action: String,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl ServerMessage {
    pub fn game<A: Into<String>>(action: A, value: serde_json::Value) -> Self {
        Self {
            sub: Channel::Game.to_string(),
            action: action.into(),
            value,
            id: None,
        }
    }

    /// Decode the payload as `T`, reporting failures against this action
    pub fn payload<T: de::DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.value).map_err(|e| SyncError::malformed(&self.action, e.to_string()))
    }
}

// ----------------------------------------------------------------------------
// Inbound Actions
// ----------------------------------------------------------------------------

/// Actions the server sends on the `game` subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundAction {
    JoinGame,
    LoggedGameInfo,
    Move,
    Clock,
    GameUpdate,
    Unsub,
    Login,
    NoGame,
    LeaveGame,
    OpponentAfk,
    OpponentAfkReturn,
    OpponentDisconnect,
    OpponentDisconnectReturn,
    ServerRestart,
    DrawOffer,
    DeclineDraw,
}

impl InboundAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InboundAction::JoinGame => "joingame",
            InboundAction::LoggedGameInfo => "logged-game-info",
            InboundAction::Move => "move",
            InboundAction::Clock => "clock",
            InboundAction::GameUpdate => "gameupdate",
            InboundAction::Unsub => "unsub",
            InboundAction::Login => "login",
            InboundAction::NoGame => "nogame",
            InboundAction::LeaveGame => "leavegame",
            InboundAction::OpponentAfk => "opponentafk",
            InboundAction::OpponentAfkReturn => "opponentafkreturn",
            InboundAction::OpponentDisconnect => "opponentdisconnect",
            InboundAction::OpponentDisconnectReturn => "opponentdisconnectreturn",
            InboundAction::ServerRestart => "serverrestart",
            InboundAction::DrawOffer => "drawoffer",
            InboundAction::DeclineDraw => "declinedraw",
        }
    }

    /// Actions handled even when no game is active
    pub fn accepted_without_game(&self) -> bool {
        matches!(self, InboundAction::JoinGame | InboundAction::LoggedGameInfo)
    }
}

impl fmt::Display for InboundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InboundAction {
    type Err = ProtocolError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        let action = match s {
            "joingame" => InboundAction::JoinGame,
            "logged-game-info" => InboundAction::LoggedGameInfo,
            "move" => InboundAction::Move,
            "clock" => InboundAction::Clock,
            "gameupdate" => InboundAction::GameUpdate,
            "unsub" => InboundAction::Unsub,
            "login" => InboundAction::Login,
            "nogame" => InboundAction::NoGame,
            "leavegame" => InboundAction::LeaveGame,
            "opponentafk" => InboundAction::OpponentAfk,
            "opponentafkreturn" => InboundAction::OpponentAfkReturn,
            "opponentdisconnect" => InboundAction::OpponentDisconnect,
            "opponentdisconnectreturn" => InboundAction::OpponentDisconnectReturn,
            "serverrestart" => InboundAction::ServerRestart,
            "drawoffer" => InboundAction::DrawOffer,
            "declinedraw" => InboundAction::DeclineDraw,
            other => {
                return Err(ProtocolError::UnknownAction {
                    sub: Channel::Game.to_string(),
                    action: other.to_string(),
                })
            }
        };
        Ok(action)
    }
}

// ----------------------------------------------------------------------------
// Inbound Payloads
// ----------------------------------------------------------------------------

/// A ply as the server reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMove {
    pub compact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_stamp: Option<u64>,
}

impl ServerMove {
    pub fn new<C: Into<String>>(compact: C) -> Self {
        Self {
            compact: compact.into(),
            clock_stamp: None,
        }
    }
}

/// Draw offer state of a game
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawOfferInfo {
    /// The opponent has an offer open we have not answered
    #[serde(default)]
    pub unconfirmed: bool,
    /// Ply at which we last offered a draw
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_offer_ply: Option<usize>,
}

/// Opponent disconnection info
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectInfo {
    /// Server-relative time until auto-resign
    pub millis_until_auto_disconnect_resign: u64,
    /// Whether the opponent left on purpose
    pub was_by_choice: bool,
}

/// Participant-only state of a game
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantState {
    #[serde(default)]
    pub draw_offer: DrawOfferInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disconnect: Option<DisconnectInfo>,
    #[serde(
        default,
        rename = "millisUntilAutoAFKResign",
        skip_serializing_if = "Option::is_none"
    )]
    pub millis_until_auto_afk_resign: Option<u64>,
}

/// Whether the game is listed publicly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Publicity {
    Public,
    Private,
}

/// `joingame` payload: the fullest description of a game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGamePayload {
    pub id: GameId,
    #[serde(default)]
    pub metadata: GameMetadata,
    #[serde(default)]
    pub rated: bool,
    pub publicity: Publicity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub you_are_color: Option<Player>,
    #[serde(flatten)]
    pub update: GameUpdatePayload,
}

/// `gameupdate` payload: everything that changes during a game
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameUpdatePayload {
    #[serde(default, with = "game_conclusion")]
    pub game_conclusion: Option<String>,
    #[serde(default)]
    pub moves: Vec<ServerMove>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_state: Option<ParticipantState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_values: Option<ClockValues>,
    /// Server time of a scheduled restart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_restarting_at: Option<u64>,
}

/// `move` payload: the opponent's ply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentsMovePayload {
    #[serde(rename = "move")]
    pub played: ServerMove,
    #[serde(default, with = "game_conclusion")]
    pub game_conclusion: Option<String>,
    /// 1-based number of the ply
    pub move_number: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_values: Option<ClockValues>,
}

/// `opponentafk` payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentAfkPayload {
    #[serde(rename = "millisUntilAutoAFKResign")]
    pub millis_until_auto_afk_resign: u64,
}

/// `logged-game-info` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedGameInfoPayload {
    pub game_id: GameId,
    #[serde(default)]
    pub rated: u8,
    #[serde(default)]
    pub private: u8,
    #[serde(default)]
    pub termination: String,
    pub icn: String,
}

// ----------------------------------------------------------------------------
// Outbound Requests
// ----------------------------------------------------------------------------

/// `report` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    pub reason: String,
    /// 1-based number of the opponent's disputed ply
    pub opponents_move_number: usize,
}

/// `submitmove` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMovePayload {
    #[serde(rename = "move")]
    pub compact: String,
    /// 1-based number of the ply being submitted
    pub move_number: usize,
    #[serde(default, with = "game_conclusion")]
    pub game_conclusion: Option<String>,
}

/// Requests the client sends on the `game` subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "lowercase")]
pub enum GameRequest {
    Resync(GameId),
    Resign,
    Abort,
    RemoveFromPlayersInActiveGames,
    Report(ReportPayload),
    SubmitMove(SubmitMovePayload),
    OfferDraw,
    AcceptDraw,
    DeclineDraw,
}

impl GameRequest {
    pub fn action(&self) -> &'static str {
        match self {
            GameRequest::Resync(_) => "resync",
            GameRequest::Resign => "resign",
            GameRequest::Abort => "abort",
            GameRequest::RemoveFromPlayersInActiveGames => "removefromplayersinactivegames",
            GameRequest::Report(_) => "report",
            GameRequest::SubmitMove(_) => "submitmove",
            GameRequest::OfferDraw => "offerdraw",
            GameRequest::AcceptDraw => "acceptdraw",
            GameRequest::DeclineDraw => "declinedraw",
        }
    }
}

/// Outbound message envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub sub: Channel,
    #[serde(flatten)]
    pub request: GameRequest,
}

impl OutboundMessage {
    pub fn game(request: GameRequest) -> Self {
        Self {
            sub: Channel::Game,
            request,
        }
    }
}

// ----------------------------------------------------------------------------
// Game Conclusion Encoding
// ----------------------------------------------------------------------------

/// `gameConclusion` is `false` while the game runs, else a conclusion string
mod game_conclusion {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<String>, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        match value {
            Some(conclusion) => serializer.serialize_str(conclusion),
            None => serializer.serialize_bool(false),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Option<String>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Conclusion(String),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None | Some(Raw::Flag(false)) => Ok(None),
            Some(Raw::Flag(true)) => Err(de::Error::custom(
                "gameConclusion must be false or a string",
            )),
            Some(Raw::Conclusion(conclusion)) => Ok(Some(conclusion)),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
