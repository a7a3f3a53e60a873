//! Game client context
//!
//! [`GameClient`] owns everything that belongs to the active online game:
//! the session state, the board, clocks, countdowns, draw offers and the
//! navigator. It is created once per client and reset when a game closes.
//! All operations run to completion within one turn and report what the
//! runtime should do through a [`HandlerOutput`].

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::board::BoardState;
use crate::cache::{variant_cache_key, VariantCache, VariantOptions};
use crate::clock::{ClockValues, LatencyTracker};
use crate::config::ClientConfig;
use crate::draw_offers::DrawOffers;
use crate::effects::{AppEvent, Effect, HandlerOutput};
use crate::errors::{Result, SessionError};
use crate::history::Selection;
use crate::moves::{go_to_front, make_move, remove_last_move};
use crate::navigation::{MoveNavigator, NavigationDirection};
use crate::position::{ClassicalPositions, StartingPositionProvider};
use crate::protocol::{
    Channel, DisconnectInfo, GameMetadata, GameRequest, GameUpdatePayload, OpponentsMovePayload,
    ParticipantState, ReportPayload, ServerMove, SubmitMovePayload,
};
use crate::session::{AuditEntry, OnlineGameInfo, OnlineSession, SessionEvent};
use crate::timers::{CountdownKind, Countdowns, TaskHandle, TaskScheduler};
use crate::types::{Player, TimeSource, Timestamp};

// ----------------------------------------------------------------------------
// Loaded Game
// ----------------------------------------------------------------------------

/// The board and displayed state of the loaded game
#[derive(Debug, Clone)]
pub struct LoadedGame {
    pub board: BoardState,
    pub metadata: GameMetadata,
    pub clocks: Option<ClockValues>,
    /// Local conclusion, set once the server reports the result
    pub conclusion: Option<String>,
    pub darkened: bool,
    /// Subscribed to server updates, as opposed to a logged game
    pub live: bool,
}

impl LoadedGame {
    /// Player whose turn it is at the front of the game
    pub fn whos_turn(&self) -> Player {
        Player::to_move_after(self.board.moves().len())
    }
}

/// Connection signals delivered outside the message stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportSignal {
    ConnectionLost,
    SocketClosed,
}

// ----------------------------------------------------------------------------
// Game Client
// ----------------------------------------------------------------------------

/// Session transitions kept in the audit log before the oldest is dropped
pub const MAX_AUDIT_ENTRIES: usize = 256;

/// Explicit context of the client's online game
pub struct GameClient {
    config: ClientConfig,
    session: OnlineSession,
    game: Option<LoadedGame>,
    selection: Selection,
    navigator: MoveNavigator,
    countdowns: Countdowns,
    draw_offers: DrawOffers,
    latency: LatencyTracker,
    audit_log: VecDeque<AuditEntry>,
    scheduler: Box<dyn TaskScheduler + Send>,
    cache: Box<dyn VariantCache + Send>,
    positions: Box<dyn StartingPositionProvider + Send>,
    time_source: Box<dyn TimeSource + Send>,
}

impl GameClient {
    /// Create a client with the classical starting position provider
    pub fn new(
        config: ClientConfig,
        scheduler: Box<dyn TaskScheduler + Send>,
        cache: Box<dyn VariantCache + Send>,
        time_source: Box<dyn TimeSource + Send>,
    ) -> Self {
        Self {
            navigator: MoveNavigator::new(config.navigation.clone()),
            draw_offers: DrawOffers::new(config.session.min_plies_between_draw_offers),
            latency: LatencyTracker::new(config.latency.clone()),
            config,
            session: OnlineSession::Idle,
            game: None,
            selection: Selection::default(),
            countdowns: Countdowns::new(),
            audit_log: VecDeque::new(),
            scheduler,
            cache,
            positions: Box::new(ClassicalPositions),
            time_source,
        }
    }

    /// Replace the starting position provider
    pub fn with_positions(mut self, positions: Box<dyn StartingPositionProvider + Send>) -> Self {
        self.positions = positions;
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &OnlineSession {
        &self.session
    }

    pub fn game(&self) -> Option<&LoadedGame> {
        self.game.as_ref()
    }

    pub fn board(&self) -> Option<&BoardState> {
        self.game.as_ref().map(|game| &game.board)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn countdowns(&self) -> &Countdowns {
        &self.countdowns
    }

    pub fn draw_offers(&self) -> &DrawOffers {
        &self.draw_offers
    }

    pub fn navigator(&self) -> &MoveNavigator {
        &self.navigator
    }

    pub fn latency(&self) -> &LatencyTracker {
        &self.latency
    }

    /// The most recent session transitions, oldest first
    pub fn audit_log(&self) -> &VecDeque<AuditEntry> {
        &self.audit_log
    }

    pub fn variant_cache(&self) -> &dyn VariantCache {
        self.cache.as_ref()
    }

    pub fn variant_cache_mut(&mut self) -> &mut dyn VariantCache {
        self.cache.as_mut()
    }

    pub fn now(&self) -> Timestamp {
        self.time_source.now()
    }

    /// Whether it is our turn in the online game
    pub fn is_our_turn(&self) -> Result<bool> {
        let info = self.session.info().ok_or(SessionError::NotInOnlineGame)?;
        let game = self.game.as_ref().ok_or(SessionError::NoGameLoaded)?;
        Ok(info.our_color == Some(game.whos_turn()))
    }

    /// Whether we are a player rather than a spectator
    pub fn do_we_have_role(&self) -> Result<bool> {
        if !self.session.is_in_game() {
            return Err(SessionError::NotInOnlineGame.into());
        }
        Ok(self.session.do_we_have_role())
    }

    /// Record a measured round trip to the server
    pub fn record_round_trip(&mut self, millis: u64) {
        self.latency.record_round_trip(millis);
    }

    // ------------------------------------------------------------------------
    // Session Plumbing
    // ------------------------------------------------------------------------

    /// Run a session transition, executing cache effects locally
    fn transition(&mut self, event: SessionEvent, out: &mut HandlerOutput) -> Result<()> {
        let now = self.now();
        let transition = self.session.clone().transition(event, now)?;
        info!(
            from = %transition.audit_entry.from_state,
            to = %transition.audit_entry.to_state,
            event = %transition.audit_entry.event,
            "Session transition"
        );
        self.session = transition.new_state;
        self.audit_log.push_back(transition.audit_entry);
        if self.audit_log.len() > MAX_AUDIT_ENTRIES {
            self.audit_log.pop_front();
        }

        for effect in transition.effects {
            match effect {
                Effect::DeleteCachedVariant { key } => match self.cache.delete(&key) {
                    Ok(existed) => debug!(%key, existed, "Deleted cached variant"),
                    Err(e) => warn!(%key, "Failed to delete cached variant: {}", e),
                },
                other => out.effect(other),
            }
        }
        Ok(())
    }

    fn game_mut(&mut self) -> Result<&mut LoadedGame> {
        self.game
            .as_mut()
            .ok_or_else(|| SessionError::NoGameLoaded.into())
    }

    fn start_countdown(&mut self, kind: CountdownKind, millis: u64, out: &mut HandlerOutput) {
        let now = self.now();
        self.countdowns
            .start(self.scheduler.as_mut(), kind, millis, now);
        out.event(AppEvent::CountdownStarted { kind, millis });
    }

    fn stop_countdown(&mut self, kind: CountdownKind, out: &mut HandlerOutput) {
        if self.countdowns.stop(self.scheduler.as_mut(), kind) {
            out.event(AppEvent::CountdownStopped { kind });
        }
    }

    fn update_clocks(&mut self, values: ClockValues, out: &mut HandlerOutput) -> Result<()> {
        let adjusted = self.latency.adjust(values, self.now());
        self.game_mut()?.clocks = Some(adjusted);
        out.event(AppEvent::ClocksUpdated { clocks: adjusted });
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Loading and Closing
    // ------------------------------------------------------------------------

    /// Load a game received from the server
    ///
    /// The board is built before any state is touched, so a bad payload
    /// leaves the client unchanged. `live` games subscribe to updates.
    pub(crate) fn load_game(
        &mut self,
        info: OnlineGameInfo,
        metadata: GameMetadata,
        update: GameUpdatePayload,
        live: bool,
        out: &mut HandlerOutput,
    ) -> Result<()> {
        let board = self.build_board(&info, &metadata, &update.moves)?;

        // Rejoining the same game keeps its cached variant
        if self.session.game_id() == Some(info.id) {
            self.unload_locally(out);
        } else if self.session.is_in_game() || self.game.is_some() {
            self.close_game(out)?;
        }
        self.transition(SessionEvent::Join { info, live }, out)?;
        self.game = Some(LoadedGame {
            board,
            metadata,
            clocks: None,
            conclusion: None,
            darkened: false,
            live,
        });
        if let Some(values) = update.clock_values {
            self.update_clocks(values, out)?;
        }
        if let Some(state) = update.participant_state {
            self.apply_participant_state(state, out);
        }
        self.apply_server_restart(update.server_restarting_at, out);
        self.transition(SessionEvent::Loaded, out)?;

        info!(game_id = %info.id, our_color = ?info.our_color, live, "Online game loaded");
        out.event(AppEvent::GameLoaded {
            game_id: info.id,
            our_color: info.our_color,
        });

        if let Some(conclusion) = update.game_conclusion {
            self.conclude_game(conclusion, out)?;
        }
        Ok(())
    }

    fn build_board(
        &self,
        info: &OnlineGameInfo,
        metadata: &GameMetadata,
        moves: &[ServerMove],
    ) -> Result<BoardState> {
        let cached = if info.is_private {
            match self.cache.load(&variant_cache_key(info.id)) {
                Ok(options) => options,
                Err(e) => {
                    warn!(game_id = %info.id, "Failed to load cached variant: {}", e);
                    None
                }
            }
        } else {
            None
        };
        let options: VariantOptions = match cached {
            Some(options) => options,
            None => self
                .positions
                .starting_position(metadata.get("Variant").map(String::as_str))?,
        };

        let mut board = BoardState::from_variant(&options)?;
        for played in moves {
            make_move(&mut board, &played.compact, played.clock_stamp)?;
        }
        Ok(board)
    }

    fn apply_participant_state(&mut self, state: ParticipantState, out: &mut HandlerOutput) {
        self.draw_offers.set(state.draw_offer);
        match state.disconnect {
            Some(disconnect) => self.start_disconnect_countdown(disconnect, out),
            None => self.stop_countdown(CountdownKind::OpponentDisconnect, out),
        }
        match state.millis_until_auto_afk_resign {
            Some(millis) => self.start_afk_countdown(millis, out),
            None => self.stop_countdown(CountdownKind::OpponentAfk, out),
        }
    }

    fn apply_server_restart(&mut self, restarting_at: Option<u64>, out: &mut HandlerOutput) {
        match restarting_at {
            Some(at) => self.start_server_restart_countdown(at, out),
            None => self.stop_countdown(CountdownKind::ServerRestart, out),
        }
    }

    /// Mark the game as concluded by the server
    pub(crate) fn conclude_game(&mut self, conclusion: String, out: &mut HandlerOutput) -> Result<()> {
        let now = self.now();
        let game = self.game_mut()?;
        game.conclusion = Some(conclusion.clone());
        if let Some(clocks) = game.clocks.as_mut() {
            clocks.freeze(now);
        }
        let live = game.live;
        self.countdowns.stop_all(self.scheduler.as_mut());
        self.draw_offers.reset();

        if matches!(self.session, OnlineSession::Active(_)) {
            // A logged game was never among the server's active games
            let mut concluded = HandlerOutput::new();
            self.transition(SessionEvent::ServerConcluded, &mut concluded)?;
            if live {
                out.extend(concluded);
            }
        }
        info!(%conclusion, "Game concluded");
        out.event(AppEvent::GameConcluded { conclusion });
        Ok(())
    }

    /// Unload the game and reset the session
    pub fn close_game(&mut self, out: &mut HandlerOutput) -> Result<()> {
        if self.session.is_in_game() {
            self.transition(SessionEvent::Close, out)?;
        }
        self.unload_locally(out);
        Ok(())
    }

    fn unload_locally(&mut self, out: &mut HandlerOutput) {
        self.countdowns.stop_all(self.scheduler.as_mut());
        self.navigator.reset(self.scheduler.as_mut());
        self.draw_offers.reset();
        self.selection.unselect();
        if self.game.take().is_some() {
            out.event(AppEvent::GameUnloaded);
        }
    }

    // ------------------------------------------------------------------------
    // Server-Driven Updates
    // ------------------------------------------------------------------------

    /// Apply the opponent's ply
    pub(crate) fn handle_opponents_move(
        &mut self,
        payload: OpponentsMovePayload,
        out: &mut HandlerOutput,
    ) -> Result<()> {
        let game = self.game_mut()?;
        let expected = game.board.moves().len() + 1;
        let duplicate = payload.move_number + 1 == expected
            && game.board.moves().last().map(|m| m.compact.as_str())
                == Some(payload.played.compact.as_str());
        if duplicate {
            debug!(compact = %payload.played.compact, "Ignoring echo of our last ply");
            return Ok(());
        }
        if payload.move_number != expected {
            warn!(
                expected,
                actual = payload.move_number,
                "Desynced from the game, resyncing"
            );
            return self.resync_to_game(out);
        }

        let mut board = game.board.clone();
        go_to_front(&mut board)?;
        make_move(&mut board, &payload.played.compact, payload.played.clock_stamp)?;
        game.board = board;
        self.navigator.lock_rewind(self.scheduler.as_mut());
        self.draw_offers.on_move_played(true);
        out.event(AppEvent::MovePlayed {
            compact: payload.played.compact,
            by_opponent: true,
        });

        if let Some(values) = payload.clock_values {
            self.update_clocks(values, out)?;
        }
        if let Some(conclusion) = payload.game_conclusion {
            self.conclude_game(conclusion, out)?;
        }
        Ok(())
    }

    pub(crate) fn handle_clock(&mut self, values: ClockValues, out: &mut HandlerOutput) -> Result<()> {
        self.update_clocks(values, out)
    }

    /// Replace our view of the game with the server's
    ///
    /// Local plies after the longest common prefix are undone and the
    /// server's remaining plies played. If the server's list is our list minus
    /// exactly one trailing ply of ours, that ply is kept and resubmitted,
    /// unless the game is over, in which case it is undone. The replay runs
    /// on a copy of the board that replaces ours only once every ply has
    /// applied.
    pub(crate) fn handle_game_update(
        &mut self,
        update: GameUpdatePayload,
        out: &mut HandlerOutput,
    ) -> Result<()> {
        let our_color = self.session.our_color();
        let game = self.game_mut()?;
        let mut board = game.board.clone();
        go_to_front(&mut board)?;

        let local: Vec<String> = board
            .moves()
            .iter()
            .map(|record| record.compact.clone())
            .collect();
        let common = local
            .iter()
            .zip(update.moves.iter())
            .take_while(|(ours, theirs)| **ours == theirs.compact)
            .count();

        let server_len = update.moves.len();
        let already_concluded = game.conclusion.is_some();
        let keeps_own_ply = common == server_len
            && local.len() == server_len + 1
            && our_color == Some(Player::to_move_after(server_len))
            && update.game_conclusion.is_none()
            && !already_concluded;

        let mut rewound = 0;
        let mut played = 0;
        if !keeps_own_ply {
            while board.moves().len() > common {
                remove_last_move(&mut board)?;
                rewound += 1;
            }
            for server_move in &update.moves[common..] {
                make_move(&mut board, &server_move.compact, server_move.clock_stamp)?;
                played += 1;
            }
        }
        game.board = board;
        let resubmit = keeps_own_ply.then(|| local[server_len].clone());

        info!(common, rewound, played, resubmit = resubmit.is_some(), "Applied game update");
        out.event(AppEvent::BoardResynced { rewound, played });

        if let Some(values) = update.clock_values {
            self.update_clocks(values, out)?;
        }
        if let Some(state) = update.participant_state {
            self.apply_participant_state(state, out);
        }
        self.apply_server_restart(update.server_restarting_at, out);

        if matches!(self.session, OnlineSession::Active(_)) {
            self.transition(SessionEvent::Resynced, out)?;
        }
        if let Some(compact) = resubmit {
            info!(%compact, "Resubmitting held move");
            out.send(GameRequest::SubmitMove(SubmitMovePayload {
                compact,
                move_number: server_len + 1,
                game_conclusion: None,
            }));
        }
        if let Some(conclusion) = update.game_conclusion {
            if !already_concluded {
                self.conclude_game(conclusion, out)?;
            }
        }
        Ok(())
    }

    /// The server logged us out of the game; it is not concluded
    pub(crate) fn handle_login(&mut self, out: &mut HandlerOutput) -> Result<()> {
        out.event(AppEvent::error_notice(
            "You are not logged in, the game is no longer updating.",
        ));
        out.effect(Effect::Unsubscribe {
            channel: Channel::Game,
        });
        let now = self.now();
        let game = self.game_mut()?;
        if let Some(clocks) = game.clocks.as_mut() {
            clocks.freeze(now);
        }
        game.darkened = true;
        out.event(AppEvent::ClocksFrozen);
        if self.selection.unselect() {
            out.event(AppEvent::SelectionCleared);
        }
        out.event(AppEvent::BoardDarkened);
        Ok(())
    }

    /// The game no longer exists on the server
    pub(crate) fn handle_no_game(&mut self, out: &mut HandlerOutput) -> Result<()> {
        out.event(AppEvent::notice("The game no longer exists."));
        out.effect(Effect::Unsubscribe {
            channel: Channel::Game,
        });
        self.conclude_game("aborted".to_string(), out)
    }

    /// We joined the same game from another window
    pub(crate) fn handle_leave_game(&mut self, out: &mut HandlerOutput) -> Result<()> {
        out.event(AppEvent::notice(
            "You connected to this game from another window.",
        ));
        out.effect(Effect::Unsubscribe {
            channel: Channel::Game,
        });
        self.close_game(out)?;
        out.event(AppEvent::TitleScreenOpened);
        Ok(())
    }

    pub(crate) fn start_afk_countdown(&mut self, millis: u64, out: &mut HandlerOutput) {
        let millis = self.latency.adjust_duration(millis);
        self.start_countdown(CountdownKind::OpponentAfk, millis, out);
    }

    pub(crate) fn stop_afk_countdown(&mut self, out: &mut HandlerOutput) {
        self.stop_countdown(CountdownKind::OpponentAfk, out);
    }

    pub(crate) fn start_disconnect_countdown(&mut self, info: DisconnectInfo, out: &mut HandlerOutput) {
        let millis = self
            .latency
            .adjust_duration(info.millis_until_auto_disconnect_resign);
        debug!(was_by_choice = info.was_by_choice, "Opponent disconnected");
        self.start_countdown(CountdownKind::OpponentDisconnect, millis, out);
    }

    pub(crate) fn stop_disconnect_countdown(&mut self, out: &mut HandlerOutput) {
        self.stop_countdown(CountdownKind::OpponentDisconnect, out);
    }

    pub(crate) fn start_server_restart_countdown(&mut self, restarting_at: u64, out: &mut HandlerOutput) {
        let millis = Timestamp::new(restarting_at) - self.now();
        self.start_countdown(CountdownKind::ServerRestart, millis, out);
    }

    pub(crate) fn on_opponent_draw_offer(&mut self, out: &mut HandlerOutput) {
        self.draw_offers.on_opponent_extended_offer();
        out.event(AppEvent::DrawOfferReceived);
    }

    pub(crate) fn on_opponent_declined_draw(&mut self, out: &mut HandlerOutput) {
        self.draw_offers.on_opponent_declined_offer();
        out.event(AppEvent::notice("Your opponent declined the draw offer."));
        out.event(AppEvent::DrawOfferDeclined);
    }

    // ------------------------------------------------------------------------
    // Local Commands
    // ------------------------------------------------------------------------

    /// Request a full game update from the server
    pub fn resync_to_game(&mut self, out: &mut HandlerOutput) -> Result<()> {
        if !matches!(self.session, OnlineSession::Active(_)) {
            return Err(SessionError::NotInOnlineGame.into());
        }
        self.transition(SessionEvent::ResyncRequested, out)
    }

    /// Play a local move and submit it when allowed
    ///
    /// The move is applied locally even when out of sync; it is then held
    /// rather than sent and gets resubmitted by the next game update.
    pub fn submit_local_move(&mut self, compact: &str) -> Result<HandlerOutput> {
        let mut out = HandlerOutput::new();
        let info = *self.session.info().ok_or(SessionError::NotInOnlineGame)?;
        if self.session.has_server_concluded() {
            return Err(SessionError::GameOver.into());
        }
        let in_sync = self.session.is_in_sync();
        let game = self.game_mut()?;
        if game.conclusion.is_some() {
            return Err(SessionError::GameOver.into());
        }
        if info.our_color != Some(game.whos_turn()) {
            return Err(SessionError::NotOurTurn.into());
        }

        go_to_front(&mut game.board)?;
        make_move(&mut game.board, compact, None)?;
        let move_number = game.board.moves().len();
        self.draw_offers.on_move_played(false);
        out.event(AppEvent::MovePlayed {
            compact: compact.to_string(),
            by_opponent: false,
        });

        if in_sync {
            out.send(GameRequest::SubmitMove(SubmitMovePayload {
                compact: compact.to_string(),
                move_number,
                game_conclusion: None,
            }));
        } else {
            info!(compact, game_id = %info.id, "Out of sync, holding move");
            out.event(AppEvent::MoveHeld {
                compact: compact.to_string(),
                reason: SessionError::OutOfSync {
                    game_id: info.id.value(),
                }
                .to_string(),
            });
        }
        Ok(out)
    }

    /// Leave through the main menu, resigning or aborting if still running
    pub fn on_main_menu_press(&mut self) -> Result<HandlerOutput> {
        let mut out = HandlerOutput::new();
        match self.session {
            OnlineSession::Idle => return Ok(out),
            OnlineSession::Active(_) | OnlineSession::Concluded(_) => {
                let plies = self.game.as_ref().map_or(0, |game| game.board.moves().len());
                let resignable = plies >= self.config.session.plies_to_resign;
                self.transition(SessionEvent::MainMenuPressed { resignable }, &mut out)?;
            }
            OnlineSession::Joining(_) => self.transition(SessionEvent::Close, &mut out)?,
        }
        self.unload_locally(&mut out);
        Ok(out)
    }

    /// Report the opponent's latest move as illegal
    pub fn report_opponents_move(&mut self, reason: &str) -> Result<HandlerOutput> {
        if !self.session.is_in_game() {
            return Err(SessionError::NotInOnlineGame.into());
        }
        let game = self.game.as_ref().ok_or(SessionError::NoGameLoaded)?;
        let mut out = HandlerOutput::new();
        out.send(GameRequest::Report(ReportPayload {
            reason: reason.to_string(),
            opponents_move_number: game.board.moves().len() + 1,
        }));
        Ok(out)
    }

    fn require_playing(&self) -> Result<usize> {
        if !matches!(self.session, OnlineSession::Active(_)) {
            return Err(SessionError::NotInOnlineGame.into());
        }
        if !self.session.do_we_have_role() {
            return Err(SessionError::NotOurTurn.into());
        }
        Ok(self.board().map_or(0, |board| board.moves().len()))
    }

    pub fn offer_draw(&mut self) -> Result<HandlerOutput> {
        let ply = self.require_playing()?;
        let mut out = HandlerOutput::new();
        match self.draw_offers.offer(ply) {
            Some(request) => out.send(request),
            None => out.event(AppEvent::notice("You cannot offer a draw right now.")),
        }
        Ok(out)
    }

    pub fn accept_draw(&mut self) -> Result<HandlerOutput> {
        self.require_playing()?;
        let mut out = HandlerOutput::new();
        if let Some(request) = self.draw_offers.accept() {
            out.send(request);
        }
        Ok(out)
    }

    pub fn decline_draw(&mut self) -> Result<HandlerOutput> {
        self.require_playing()?;
        let mut out = HandlerOutput::new();
        if let Some(request) = self.draw_offers.decline() {
            out.send(request);
        }
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // Navigation and Timers
    // ------------------------------------------------------------------------

    /// Press a navigation button
    pub fn navigate(&mut self, direction: NavigationDirection) -> Result<HandlerOutput> {
        let mut out = HandlerOutput::new();
        let now = self.now();
        let game = self.game.as_mut().ok_or(SessionError::NoGameLoaded)?;
        if self
            .navigator
            .press(&mut game.board, self.scheduler.as_mut(), direction, now)?
        {
            self.selection.unselect();
            out.event(AppEvent::ViewNavigated {
                direction,
                move_index: game.board.move_index(),
            });
        }
        Ok(out)
    }

    /// Release a navigation button
    pub fn release_navigation(&mut self) {
        self.navigator.release(self.scheduler.as_mut());
    }

    /// Route a fired timer to its owner
    pub fn on_timer_fired(&mut self, handle: TaskHandle) -> Result<HandlerOutput> {
        let mut out = HandlerOutput::new();
        if let Some(kind) = self.countdowns.on_fired(handle) {
            debug!(?kind, "Countdown expired");
            out.event(AppEvent::CountdownExpired { kind });
            return Ok(out);
        }
        let now = self.now();
        if let Some(game) = self.game.as_mut() {
            let before = game.board.move_index();
            self.navigator
                .on_timer_fired(handle, &mut game.board, self.scheduler.as_mut(), now)?;
            let after = game.board.move_index();
            if after != before {
                let direction = if after < before {
                    NavigationDirection::Rewind
                } else {
                    NavigationDirection::Forward
                };
                out.event(AppEvent::ViewNavigated {
                    direction,
                    move_index: after,
                });
            }
        }
        Ok(out)
    }

    /// Deliver a connection signal; only an active session reacts
    pub fn on_transport_signal(&mut self, signal: TransportSignal) -> Result<HandlerOutput> {
        let mut out = HandlerOutput::new();
        let event = match signal {
            TransportSignal::ConnectionLost => SessionEvent::ConnectionLost,
            TransportSignal::SocketClosed => SessionEvent::SocketClosed,
        };
        if matches!(self.session, OnlineSession::Active(_)) {
            self.transition(event, &mut out)?;
            warn!(?signal, "Out of sync with the server");
        } else {
            debug!(?signal, "Transport signal ignored, no active game");
        }
        Ok(out)
    }

    /// Surface a board invariant violation and ask the server for the truth
    pub(crate) fn recover_from_divergence(&mut self, out: &mut HandlerOutput) {
        if matches!(self.session, OnlineSession::Active(_)) {
            if let Err(e) = self.resync_to_game(out) {
                error!("Failed to request resync: {}", e);
            }
        }
    }
}

impl core::fmt::Debug for GameClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GameClient")
            .field("session", &self.session)
            .field("game", &self.game)
            .field("audit_entries", &self.audit_log.len())
            .finish()
    }
}
