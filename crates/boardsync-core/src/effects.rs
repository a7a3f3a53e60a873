//! Effects and application events
//!
//! Handlers never perform I/O. They return [`Effect`]s for the runtime to
//! execute against the connection and [`AppEvent`]s for the user interface.

use serde::{Deserialize, Serialize};

use crate::clock::ClockValues;
use crate::navigation::NavigationDirection;
use crate::protocol::{Channel, GameRequest, OutboundMessage};
use crate::timers::CountdownKind;
use crate::types::{GameId, Player};

// ----------------------------------------------------------------------------
// Effects
// ----------------------------------------------------------------------------

/// Side effects requested from the runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "camelCase")]
pub enum Effect {
    /// Send a message to the server
    Send { message: OutboundMessage },
    /// Start receiving a subscription
    Subscribe { channel: Channel },
    /// Stop receiving a subscription
    Unsubscribe { channel: Channel },
    /// Delete a variant cache entry
    DeleteCachedVariant { key: String },
}

impl Effect {
    pub fn send(request: GameRequest) -> Self {
        Effect::Send {
            message: OutboundMessage::game(request),
        }
    }

    /// The outbound request, if this effect sends one
    pub fn request(&self) -> Option<&GameRequest> {
        match self {
            Effect::Send { message } => Some(&message.request),
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Application Events
// ----------------------------------------------------------------------------

/// Events for the user interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum AppEvent {
    /// Status text shown to the user
    Notice { text: String, is_error: bool },
    GameLoaded {
        game_id: GameId,
        our_color: Option<Player>,
    },
    GameConcluded { conclusion: String },
    GameUnloaded,
    TitleScreenOpened,
    MovePlayed { compact: String, by_opponent: bool },
    /// A local move was played but not sent
    MoveHeld { compact: String, reason: String },
    /// The board was brought back into agreement with the server
    BoardResynced { rewound: usize, played: usize },
    ClocksUpdated { clocks: ClockValues },
    ClocksFrozen,
    SelectionCleared,
    BoardDarkened,
    ViewNavigated { direction: NavigationDirection, move_index: usize },
    CountdownStarted { kind: CountdownKind, millis: u64 },
    CountdownStopped { kind: CountdownKind },
    CountdownExpired { kind: CountdownKind },
    DrawOfferReceived,
    DrawOfferDeclined,
}

impl AppEvent {
    pub fn notice<T: Into<String>>(text: T) -> Self {
        AppEvent::Notice {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error_notice<T: Into<String>>(text: T) -> Self {
        AppEvent::Notice {
            text: text.into(),
            is_error: true,
        }
    }
}

// ----------------------------------------------------------------------------
// Handler Output
// ----------------------------------------------------------------------------

/// Effects and events produced by one turn
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerOutput {
    pub effects: Vec<Effect>,
    pub events: Vec<AppEvent>,
}

impl HandlerOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn send(&mut self, request: GameRequest) {
        self.effects.push(Effect::send(request));
    }

    pub fn event(&mut self, event: AppEvent) {
        self.events.push(event);
    }

    pub fn extend(&mut self, other: HandlerOutput) {
        self.effects.extend(other.effects);
        self.events.extend(other.events);
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty() && self.events.is_empty()
    }

    /// Outbound requests in order
    pub fn requests(&self) -> Vec<&GameRequest> {
        self.effects.iter().filter_map(Effect::request).collect()
    }

    pub fn into_parts(self) -> (Vec<Effect>, Vec<AppEvent>) {
        (self.effects, self.events)
    }
}
