//! Linear Online Session State Machine
//!
//! The client's belief about the server-hosted game it is in. Each state must
//! be consumed to transition, and every transition yields the effects that
//! install or remove subscriptions and notify the server, plus an audit entry.
//!
//! ```text
//! Idle → Joining → Active(in sync) ⇄ Active(out of sync) → Concluded → Idle
//! ```

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::cache::variant_cache_key;
use crate::effects::Effect;
use crate::errors::StateTransitionError;
use crate::protocol::{Channel, GameRequest};
use crate::types::{GameId, Player, Timestamp};

// ----------------------------------------------------------------------------
// Session State Types
// ----------------------------------------------------------------------------

/// Static facts of an online game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineGameInfo {
    pub id: GameId,
    pub is_private: bool,
    pub rated: bool,
    /// `None` when spectating
    pub our_color: Option<Player>,
}

/// Linear session state that must be consumed to transition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnlineSession {
    /// Not in an online game
    #[default]
    Idle,
    /// Join received, board being loaded
    Joining(JoiningState),
    /// Game loaded and subscribed
    Active(ActiveState),
    /// The server has declared the result
    Concluded(ConcludedState),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoiningState {
    pub info: OnlineGameInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveState {
    pub info: OnlineGameInfo,
    /// While false no locally generated move is transmitted
    pub in_sync: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcludedState {
    pub info: OnlineGameInfo,
}

// ----------------------------------------------------------------------------
// State Transition Events
// ----------------------------------------------------------------------------

/// Events that trigger session transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A game was received; `live` games subscribe to updates
    Join { info: OnlineGameInfo, live: bool },
    /// The board finished loading
    Loaded,
    /// The connection dropped
    ConnectionLost,
    /// The socket closed
    SocketClosed,
    /// We asked the server for a full game update
    ResyncRequested,
    /// The server's game update was applied
    Resynced,
    /// The server declared the result
    ServerConcluded,
    /// The user left through the main menu
    MainMenuPressed { resignable: bool },
    /// The game is unloaded
    Close,
}

impl SessionEvent {
    fn name(&self) -> &'static str {
        match self {
            SessionEvent::Join { .. } => "Join",
            SessionEvent::Loaded => "Loaded",
            SessionEvent::ConnectionLost => "ConnectionLost",
            SessionEvent::SocketClosed => "SocketClosed",
            SessionEvent::ResyncRequested => "ResyncRequested",
            SessionEvent::Resynced => "Resynced",
            SessionEvent::ServerConcluded => "ServerConcluded",
            SessionEvent::MainMenuPressed { .. } => "MainMenuPressed",
            SessionEvent::Close => "Close",
        }
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ----------------------------------------------------------------------------
// State Transition Results
// ----------------------------------------------------------------------------

/// Result of a session transition
#[derive(Debug, Clone)]
pub struct StateTransition {
    /// New session state
    pub new_state: OnlineSession,
    /// Effects to execute as result of transition
    pub effects: Vec<Effect>,
    /// Audit trail entry
    pub audit_entry: AuditEntry,
}

/// Audit trail entry for session transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: Timestamp,
    pub game_id: Option<GameId>,
    pub from_state: String,
    pub to_state: String,
    pub event: String,
    pub effects_count: usize,
}

// ----------------------------------------------------------------------------
// State Machine Implementation
// ----------------------------------------------------------------------------

impl OnlineSession {
    /// Game facts for any non-idle state
    pub fn info(&self) -> Option<&OnlineGameInfo> {
        match self {
            OnlineSession::Idle => None,
            OnlineSession::Joining(s) => Some(&s.info),
            OnlineSession::Active(s) => Some(&s.info),
            OnlineSession::Concluded(s) => Some(&s.info),
        }
    }

    pub fn game_id(&self) -> Option<GameId> {
        self.info().map(|info| info.id)
    }

    /// Get current state name for logging/audit
    pub fn state_name(&self) -> &'static str {
        match self {
            OnlineSession::Idle => "Idle",
            OnlineSession::Joining(_) => "Joining",
            OnlineSession::Active(s) if s.in_sync => "Active(InSync)",
            OnlineSession::Active(_) => "Active(OutOfSync)",
            OnlineSession::Concluded(_) => "Concluded",
        }
    }

    pub fn is_in_game(&self) -> bool {
        !matches!(self, OnlineSession::Idle)
    }

    /// Whether locally generated moves may be transmitted
    pub fn is_in_sync(&self) -> bool {
        matches!(self, OnlineSession::Active(ActiveState { in_sync: true, .. }))
    }

    pub fn has_server_concluded(&self) -> bool {
        matches!(self, OnlineSession::Concluded(_))
    }

    /// Whether we play in this game rather than spectate
    pub fn do_we_have_role(&self) -> bool {
        self.info().is_some_and(|info| info.our_color.is_some())
    }

    pub fn our_color(&self) -> Option<Player> {
        self.info().and_then(|info| info.our_color)
    }

    /// Process an event and transition to new state (consumes self)
    pub fn transition(
        self,
        event: SessionEvent,
        now: Timestamp,
    ) -> Result<StateTransition, StateTransitionError> {
        let from_state = self.state_name().to_string();
        let event_name = event.to_string();
        let game_id = match &event {
            SessionEvent::Join { info, .. } => Some(info.id),
            _ => self.game_id(),
        };

        let (new_state, effects) = match (self, event) {
            // Joining replaces any current game
            (_, SessionEvent::Join { info, live }) => {
                let effects = if live {
                    vec![
                        Effect::Unsubscribe {
                            channel: Channel::Invites,
                        },
                        Effect::Subscribe {
                            channel: Channel::Game,
                        },
                    ]
                } else {
                    Vec::new()
                };
                (OnlineSession::Joining(JoiningState { info }), effects)
            }

            (OnlineSession::Joining(state), SessionEvent::Loaded) => (
                OnlineSession::Active(ActiveState {
                    info: state.info,
                    in_sync: true,
                }),
                Vec::new(),
            ),

            // Transport signals only matter while active
            (OnlineSession::Active(mut state), SessionEvent::ConnectionLost | SessionEvent::SocketClosed) => {
                state.in_sync = false;
                (OnlineSession::Active(state), Vec::new())
            }
            (other, SessionEvent::ConnectionLost | SessionEvent::SocketClosed) => (other, Vec::new()),

            (OnlineSession::Active(mut state), SessionEvent::ResyncRequested) => {
                state.in_sync = false;
                let effects = vec![Effect::send(GameRequest::Resync(state.info.id))];
                (OnlineSession::Active(state), effects)
            }

            (OnlineSession::Active(mut state), SessionEvent::Resynced) => {
                state.in_sync = true;
                (OnlineSession::Active(state), Vec::new())
            }

            (OnlineSession::Active(ActiveState { info, .. }), SessionEvent::ServerConcluded) => {
                let effects = conclusion_effects(&info);
                (OnlineSession::Concluded(ConcludedState { info }), effects)
            }

            (OnlineSession::Active(ActiveState { info, .. }), SessionEvent::MainMenuPressed { resignable }) => {
                let mut effects = vec![Effect::Unsubscribe {
                    channel: Channel::Game,
                }];
                effects.push(Effect::send(if resignable {
                    GameRequest::Resign
                } else {
                    GameRequest::Abort
                }));
                effects.extend(cache_cleanup(&info));
                (OnlineSession::Idle, effects)
            }

            (OnlineSession::Concluded(_), SessionEvent::MainMenuPressed { .. }) => (
                OnlineSession::Idle,
                vec![Effect::Unsubscribe {
                    channel: Channel::Game,
                }],
            ),

            (OnlineSession::Idle, SessionEvent::Close) => (OnlineSession::Idle, Vec::new()),
            (state, SessionEvent::Close) => {
                let effects = match state.info() {
                    Some(info) if !state.has_server_concluded() => cache_cleanup(info),
                    _ => Vec::new(),
                };
                (OnlineSession::Idle, effects)
            }

            // Invalid transitions
            (state, event) => {
                return Err(StateTransitionError::InvalidTransition {
                    from_state: from_state.clone(),
                    event: event_name.clone(),
                    reason: format!("Event {} not valid for state {}", event, state.state_name()),
                });
            }
        };

        let audit_entry = AuditEntry {
            timestamp: now,
            game_id,
            from_state,
            to_state: new_state.state_name().to_string(),
            event: event_name,
            effects_count: effects.len(),
        };

        Ok(StateTransition {
            new_state,
            effects,
            audit_entry,
        })
    }
}

/// Effects of the server concluding a game we are in
fn conclusion_effects(info: &OnlineGameInfo) -> Vec<Effect> {
    let mut effects = cache_cleanup(info);
    effects.push(Effect::send(GameRequest::RemoveFromPlayersInActiveGames));
    effects
}

/// Delete the cached custom position of a private game
fn cache_cleanup(info: &OnlineGameInfo) -> Vec<Effect> {
    if info.is_private {
        vec![Effect::DeleteCachedVariant {
            key: variant_cache_key(info.id),
        }]
    } else {
        Vec::new()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn info(is_private: bool) -> OnlineGameInfo {
        OnlineGameInfo {
            id: GameId::new(9),
            is_private,
            rated: false,
            our_color: Some(Player::White),
        }
    }

    fn step(session: OnlineSession, event: SessionEvent) -> (OnlineSession, Vec<Effect>) {
        let transition = session.transition(event, Timestamp::new(0)).unwrap();
        (transition.new_state, transition.effects)
    }

    fn active(is_private: bool) -> OnlineSession {
        let (joining, _) = step(
            OnlineSession::Idle,
            SessionEvent::Join {
                info: info(is_private),
                live: true,
            },
        );
        step(joining, SessionEvent::Loaded).0
    }

    #[test]
    fn test_join_subscribes() {
        let transition = OnlineSession::Idle
            .transition(
                SessionEvent::Join {
                    info: info(false),
                    live: true,
                },
                Timestamp::new(5),
            )
            .unwrap();

        assert_eq!(transition.new_state.state_name(), "Joining");
        assert_eq!(
            transition.effects,
            vec![
                Effect::Unsubscribe {
                    channel: Channel::Invites
                },
                Effect::Subscribe {
                    channel: Channel::Game
                },
            ]
        );
        assert_eq!(transition.audit_entry.from_state, "Idle");
        assert_eq!(transition.audit_entry.game_id, Some(GameId::new(9)));
        assert_eq!(transition.audit_entry.effects_count, 2);
    }

    #[test]
    fn test_sync_flag_transitions() {
        let session = active(false);
        assert!(session.is_in_sync());

        let (session, effects) = step(session, SessionEvent::SocketClosed);
        assert!(!session.is_in_sync());
        assert!(effects.is_empty());

        let (session, _) = step(session, SessionEvent::Resynced);
        assert!(session.is_in_sync());

        let (session, effects) = step(session, SessionEvent::ResyncRequested);
        assert!(!session.is_in_sync());
        assert_eq!(
            effects[0].request(),
            Some(&GameRequest::Resync(GameId::new(9)))
        );
    }

    #[test]
    fn test_transport_signals_are_no_ops_when_idle() {
        let (session, effects) = step(OnlineSession::Idle, SessionEvent::ConnectionLost);
        assert_eq!(session, OnlineSession::Idle);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_conclusion_of_private_game() {
        let (session, effects) = step(active(true), SessionEvent::ServerConcluded);
        assert!(session.has_server_concluded());
        assert_eq!(
            effects,
            vec![
                Effect::DeleteCachedVariant {
                    key: "online-game-variant-options9".to_string()
                },
                Effect::send(GameRequest::RemoveFromPlayersInActiveGames),
            ]
        );
    }

    #[test]
    fn test_main_menu_resigns_or_aborts() {
        let (session, effects) = step(active(false), SessionEvent::MainMenuPressed { resignable: true });
        assert_eq!(session, OnlineSession::Idle);
        assert_eq!(effects[1].request(), Some(&GameRequest::Resign));

        let (_, effects) = step(active(false), SessionEvent::MainMenuPressed { resignable: false });
        assert_eq!(effects[1].request(), Some(&GameRequest::Abort));

        let (concluded, _) = step(active(false), SessionEvent::ServerConcluded);
        let (_, effects) = step(concluded, SessionEvent::MainMenuPressed { resignable: true });
        assert_eq!(
            effects,
            vec![Effect::Unsubscribe {
                channel: Channel::Game
            }]
        );
    }

    #[test]
    fn test_invalid_transition() {
        let err = OnlineSession::Idle
            .transition(SessionEvent::Loaded, Timestamp::new(0))
            .unwrap_err();
        assert!(matches!(err, StateTransitionError::InvalidTransition { .. }));

        assert!(OnlineSession::Idle
            .transition(SessionEvent::ServerConcluded, Timestamp::new(0))
            .is_err());
    }
}
