//! Synchronization router
//!
//! Dispatches inbound `game` messages to the [`GameClient`]. The router never
//! fails: unknown actions, malformed payloads and unparsable records become
//! user-visible notices and leave the board as it was. A move or game update
//! that cannot be applied, like a board invariant violation, is followed by
//! a resync request.

use std::str::FromStr;

use tracing::{debug, error, warn};

use crate::client::{GameClient, TransportSignal};
use crate::clock::ClockValues;
use crate::effects::{AppEvent, Effect, HandlerOutput};
use crate::errors::{Result, SyncError};
use crate::icn::{base62_to_base10, parse_game_record, GameRecord};
use crate::protocol::{
    Channel, DisconnectInfo, GameUpdatePayload, InboundAction, JoinGamePayload,
    LoggedGameInfoPayload, OpponentAfkPayload, OpponentsMovePayload, Publicity, ServerMessage,
};
use crate::session::OnlineGameInfo;
use crate::types::Player;

// ----------------------------------------------------------------------------
// Sync Router
// ----------------------------------------------------------------------------

/// Routes server messages and transport signals into the client
pub struct SyncRouter;

impl SyncRouter {
    /// Route one inbound message
    pub fn route_message(client: &mut GameClient, message: &ServerMessage) -> HandlerOutput {
        let mut out = HandlerOutput::new();
        if message.sub != Channel::Game.to_string() {
            debug!(sub = %message.sub, action = %message.action, "Ignoring message for another subscription");
            return out;
        }

        let action = match InboundAction::from_str(&message.action) {
            Ok(action) => action,
            Err(e) => {
                warn!(action = %message.action, "{}", e);
                out.event(AppEvent::error_notice(format!(
                    "Unknown action \"{}\" received from server in 'game' route.",
                    message.action
                )));
                return out;
            }
        };

        if !action.accepted_without_game() && !client.session().is_in_game() {
            debug!(%action, "Ignoring action, no game active");
            return out;
        }

        if let Err(e) = Self::dispatch(client, action, message, &mut out) {
            Self::report_failure(client, action, e, &mut out);
        }
        out
    }

    /// Route a connection signal
    pub fn route_transport_signal(client: &mut GameClient, signal: TransportSignal) -> HandlerOutput {
        match client.on_transport_signal(signal) {
            Ok(out) => out,
            Err(e) => {
                error!(?signal, "Failed to apply transport signal: {}", e);
                HandlerOutput::new()
            }
        }
    }

    fn dispatch(
        client: &mut GameClient,
        action: InboundAction,
        message: &ServerMessage,
        out: &mut HandlerOutput,
    ) -> Result<()> {
        debug!(%action, game_id = ?client.session().game_id(), "Routing message");
        match action {
            InboundAction::JoinGame => {
                let payload: JoinGamePayload = message.payload()?;
                Self::handle_join_game(client, payload, out)
            }
            InboundAction::LoggedGameInfo => {
                let payload: LoggedGameInfoPayload = message.payload()?;
                Self::handle_logged_game_info(client, payload, out)
            }
            InboundAction::Move => {
                let payload: OpponentsMovePayload = message.payload()?;
                client.handle_opponents_move(payload, out)
            }
            InboundAction::Clock => {
                let values: ClockValues = message.payload()?;
                client.handle_clock(values, out)
            }
            InboundAction::GameUpdate => {
                let payload: GameUpdatePayload = message.payload()?;
                client.handle_game_update(payload, out)
            }
            InboundAction::Unsub => {
                out.effect(Effect::Unsubscribe {
                    channel: Channel::Game,
                });
                Ok(())
            }
            InboundAction::Login => client.handle_login(out),
            InboundAction::NoGame => client.handle_no_game(out),
            InboundAction::LeaveGame => client.handle_leave_game(out),
            InboundAction::OpponentAfk => {
                let payload: OpponentAfkPayload = message.payload()?;
                client.start_afk_countdown(payload.millis_until_auto_afk_resign, out);
                Ok(())
            }
            InboundAction::OpponentAfkReturn => {
                client.stop_afk_countdown(out);
                Ok(())
            }
            InboundAction::OpponentDisconnect => {
                let payload: DisconnectInfo = message.payload()?;
                client.start_disconnect_countdown(payload, out);
                Ok(())
            }
            InboundAction::OpponentDisconnectReturn => {
                client.stop_disconnect_countdown(out);
                Ok(())
            }
            InboundAction::ServerRestart => {
                let restarting_at: u64 = message.payload()?;
                client.start_server_restart_countdown(restarting_at, out);
                Ok(())
            }
            InboundAction::DrawOffer => {
                client.on_opponent_draw_offer(out);
                Ok(())
            }
            InboundAction::DeclineDraw => {
                client.on_opponent_declined_draw(out);
                Ok(())
            }
        }
    }

    fn handle_join_game(
        client: &mut GameClient,
        payload: JoinGamePayload,
        out: &mut HandlerOutput,
    ) -> Result<()> {
        let info = OnlineGameInfo {
            id: payload.id,
            is_private: payload.publicity == Publicity::Private,
            rated: payload.rated,
            our_color: payload.you_are_color,
        };
        client.load_game(info, payload.metadata, payload.update, true, out)
    }

    /// Load a finished game from its record and conclude it
    fn handle_logged_game_info(
        client: &mut GameClient,
        payload: LoggedGameInfoPayload,
        out: &mut HandlerOutput,
    ) -> Result<()> {
        let mut record = parse_game_record(&payload.icn)?;
        if !payload.termination.is_empty() {
            record
                .metadata
                .entry("Termination".to_string())
                .or_insert_with(|| payload.termination.clone());
        }

        if client.session().is_in_game() || client.game().is_some() {
            out.effect(Effect::Unsubscribe {
                channel: Channel::Game,
            });
            client.close_game(out)?;
        }

        let info = OnlineGameInfo {
            id: payload.game_id,
            is_private: payload.private == 1,
            rated: payload.rated == 1,
            our_color: Self::our_color_in_record(client.config().session.user_id, &record),
        };
        let conclusion = record.conclusion();
        let update = GameUpdatePayload {
            moves: record.moves,
            ..GameUpdatePayload::default()
        };
        client.load_game(info, record.metadata, update, false, out)?;
        client.conclude_game(conclusion, out)
    }

    /// Our color in a logged game, from the base-62 player ids in its record
    fn our_color_in_record(user_id: Option<u64>, record: &GameRecord) -> Option<Player> {
        let user_id = user_id?;
        let player_id = |key: &str| record.metadata.get(key).and_then(|id| base62_to_base10(id));
        if player_id("WhiteID") == Some(user_id) {
            Some(Player::White)
        } else if player_id("BlackID") == Some(user_id) {
            Some(Player::Black)
        } else {
            None
        }
    }

    fn report_failure(
        client: &mut GameClient,
        action: InboundAction,
        e: SyncError,
        out: &mut HandlerOutput,
    ) {
        match &e {
            SyncError::Board(_) => {
                error!(%action, "Board diverged from the server: {}", e);
                out.event(AppEvent::error_notice(format!(
                    "An internal error occurred while handling \"{}\". Resyncing.",
                    action
                )));
                client.recover_from_divergence(out);
            }
            SyncError::Protocol(_) | SyncError::Serialization(_) => {
                warn!(%action, "Rejected server message: {}", e);
                let text = match action {
                    InboundAction::LoggedGameInfo => {
                        "There was an error loading the logged game.".to_string()
                    }
                    _ => format!("Received an invalid \"{}\" message from the server.", action),
                };
                out.event(AppEvent::error_notice(text));
                // A ply we could not apply means our game no longer matches
                if matches!(action, InboundAction::Move | InboundAction::GameUpdate) {
                    client.recover_from_divergence(out);
                }
            }
            _ => {
                warn!(%action, "Failed to handle server message: {}", e);
                out.event(AppEvent::error_notice(e.to_string()));
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryVariantCache;
    use crate::config::ClientConfig;
    use crate::timers::ManualScheduler;
    use crate::types::{GameId, SystemTimeSource};
    use serde_json::json;

    fn client() -> GameClient {
        GameClient::new(
            ClientConfig::testing(),
            Box::new(ManualScheduler::new()),
            Box::new(MemoryVariantCache::new()),
            Box::new(SystemTimeSource::new()),
        )
    }

    fn join(client: &mut GameClient) -> HandlerOutput {
        let message = ServerMessage::game(
            "joingame",
            json!({
                "id": 7,
                "publicity": "public",
                "youAreColor": "white",
                "moves": [],
            }),
        );
        SyncRouter::route_message(client, &message)
    }

    #[test]
    fn test_unknown_action_produces_notice() {
        let mut client = client();
        join(&mut client);
        let before = client.session().clone();
        let board_before = client.board().cloned();

        let out = SyncRouter::route_message(&mut client, &ServerMessage::game("dance", json!(null)));
        assert!(out.effects.is_empty());
        assert!(matches!(
            out.events.as_slice(),
            [AppEvent::Notice { is_error: true, .. }]
        ));
        assert_eq!(client.session(), &before);
        assert_eq!(client.board().cloned(), board_before);
    }

    #[test]
    fn test_actions_ignored_without_game() {
        let mut client = client();
        let out = SyncRouter::route_message(&mut client, &ServerMessage::game("nogame", json!(null)));
        assert!(out.is_empty());
        assert!(!client.session().is_in_game());
    }

    #[test]
    fn test_join_subscribes() {
        let mut client = client();
        let out = join(&mut client);
        assert!(out.effects.contains(&Effect::Subscribe {
            channel: Channel::Game
        }));
        assert!(client.session().is_in_sync());
        assert_eq!(client.session().game_id(), Some(GameId::new(7)));
    }

    #[test]
    fn test_malformed_payload_leaves_state() {
        let mut client = client();
        join(&mut client);
        let out = SyncRouter::route_message(
            &mut client,
            &ServerMessage::game("move", json!({"move": 3})),
        );
        assert!(matches!(
            out.events.as_slice(),
            [AppEvent::Notice { is_error: true, .. }]
        ));
        assert_eq!(client.board().map(|b| b.moves().len()), Some(0));
        assert_eq!(
            out.requests(),
            vec![&crate::protocol::GameRequest::Resync(GameId::new(7))]
        );
        assert!(!client.session().is_in_sync());
    }

    #[test]
    fn test_other_subscriptions_ignored() {
        let mut client = client();
        let mut message = ServerMessage::game("joingame", json!({}));
        message.sub = "invites".to_string();
        assert!(SyncRouter::route_message(&mut client, &message).is_empty());
    }
}
