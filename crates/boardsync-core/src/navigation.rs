//! Move navigation
//!
//! Rewind/forward through played plies with a minimum step interval,
//! hold-to-repeat, and a reference-counted rewind lock taken whenever an
//! opponent's move is forwarded to the front.

use core::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::board::BoardState;
use crate::config::NavigationConfig;
use crate::errors::Result;
use crate::moves::{forward_move, rewind_move};
use crate::timers::{ActionLock, TaskHandle, TaskScheduler, TimerKind};
use crate::types::Timestamp;

/// Direction of a navigation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationDirection {
    Rewind,
    Forward,
}

#[derive(Debug, Clone, Copy)]
struct HeldButton {
    direction: NavigationDirection,
    timer: TaskHandle,
}

/// View-cursor navigation for the active board
#[derive(Debug)]
pub struct MoveNavigator {
    config: NavigationConfig,
    last_step_at: Option<Timestamp>,
    held: Option<HeldButton>,
    rewind_lock: ActionLock,
}

impl MoveNavigator {
    pub fn new(config: NavigationConfig) -> Self {
        Self {
            config,
            last_step_at: None,
            held: None,
            rewind_lock: ActionLock::new(),
        }
    }

    /// Take a timed hold on the rewind lock
    pub fn lock_rewind(&mut self, scheduler: &mut dyn TaskScheduler) {
        self.rewind_lock.lock_for(
            scheduler,
            TimerKind::RewindLock,
            Duration::from_millis(self.config.rewind_lock_ms),
        );
    }

    pub fn is_rewind_locked(&self) -> bool {
        self.rewind_lock.is_locked()
    }

    /// Take one step, returning whether the view moved
    ///
    /// Steps are refused at either end of the move list, while rewinding is
    /// locked, and when requested sooner than the minimum step interval.
    pub fn step(
        &mut self,
        board: &mut BoardState,
        direction: NavigationDirection,
        now: Timestamp,
    ) -> Result<bool> {
        if let Some(last) = self.last_step_at {
            if now - last < self.config.min_step_interval_ms {
                trace!(?direction, "Navigation step throttled");
                return Ok(false);
            }
        }
        match direction {
            NavigationDirection::Rewind => {
                if self.rewind_lock.is_locked() || board.move_index() == 0 {
                    return Ok(false);
                }
                rewind_move(board)?;
            }
            NavigationDirection::Forward => {
                if board.is_at_front() {
                    return Ok(false);
                }
                forward_move(board)?;
            }
        }
        self.last_step_at = Some(now);
        Ok(true)
    }

    /// Button pressed: step once, then repeat after the hold delay
    pub fn press(
        &mut self,
        board: &mut BoardState,
        scheduler: &mut dyn TaskScheduler,
        direction: NavigationDirection,
        now: Timestamp,
    ) -> Result<bool> {
        self.release(scheduler);
        let moved = self.step(board, direction, now)?;
        let timer = scheduler.start(
            TimerKind::NavigationRepeat,
            Duration::from_millis(self.config.hold_delay_ms),
        );
        self.held = Some(HeldButton { direction, timer });
        Ok(moved)
    }

    /// Button released: stop repeating
    pub fn release(&mut self, scheduler: &mut dyn TaskScheduler) {
        if let Some(held) = self.held.take() {
            scheduler.cancel(held.timer);
        }
    }

    /// Route a fired timer; returns whether it belonged to the navigator
    pub fn on_timer_fired(
        &mut self,
        handle: TaskHandle,
        board: &mut BoardState,
        scheduler: &mut dyn TaskScheduler,
        now: Timestamp,
    ) -> Result<bool> {
        if self.rewind_lock.on_fired(handle) {
            return Ok(true);
        }
        let Some(held) = self.held.filter(|held| held.timer == handle) else {
            return Ok(false);
        };
        let moved = self.step(board, held.direction, now)?;
        if moved {
            let timer = scheduler.start(
                TimerKind::NavigationRepeat,
                Duration::from_millis(self.config.repeat_interval_ms),
            );
            self.held = Some(HeldButton {
                direction: held.direction,
                timer,
            });
        } else {
            self.held = None;
        }
        Ok(true)
    }

    /// Drop every hold and lock, used when a game is unloaded
    pub fn reset(&mut self, scheduler: &mut dyn TaskScheduler) {
        self.release(scheduler);
        self.rewind_lock.release_all(scheduler);
        self.last_step_at = None;
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{StartingPiece, VariantOptions};
    use crate::moves::make_move;
    use crate::timers::ManualScheduler;
    use crate::types::Coords;

    fn played_board(plies: usize) -> BoardState {
        let options = VariantOptions {
            pieces: vec![StartingPiece {
                coords: Coords::new(0, 0),
                piece_type: "K".parse().unwrap(),
            }],
            ..VariantOptions::default()
        };
        let mut board = BoardState::from_variant(&options).unwrap();
        for ply in 0..plies as i64 {
            make_move(&mut board, &format!("{},0>{},0", ply, ply + 1), None).unwrap();
        }
        board
    }

    #[test]
    fn test_minimum_step_interval() {
        let mut board = played_board(3);
        let mut navigator = MoveNavigator::new(NavigationConfig::default());

        assert!(navigator
            .step(&mut board, NavigationDirection::Rewind, Timestamp::new(1_000))
            .unwrap());
        assert!(!navigator
            .step(&mut board, NavigationDirection::Rewind, Timestamp::new(1_010))
            .unwrap());
        assert!(navigator
            .step(&mut board, NavigationDirection::Rewind, Timestamp::new(1_020))
            .unwrap());
        assert_eq!(board.move_index(), 1);
    }

    #[test]
    fn test_rewind_lock_blocks_rewind_only() {
        let mut board = played_board(2);
        let mut scheduler = ManualScheduler::new();
        let mut navigator = MoveNavigator::new(NavigationConfig::default());

        navigator.lock_rewind(&mut scheduler);
        assert!(!navigator
            .step(&mut board, NavigationDirection::Rewind, Timestamp::new(0))
            .unwrap());

        for (handle, _) in scheduler.advance(Duration::from_millis(750)) {
            assert!(navigator
                .on_timer_fired(handle, &mut board, &mut scheduler, Timestamp::new(750))
                .unwrap());
        }
        assert!(!navigator.is_rewind_locked());
        assert!(navigator
            .step(&mut board, NavigationDirection::Rewind, Timestamp::new(800))
            .unwrap());
        assert!(navigator
            .step(&mut board, NavigationDirection::Forward, Timestamp::new(900))
            .unwrap());
    }

    #[test]
    fn test_hold_to_repeat() {
        let mut board = played_board(10);
        let mut scheduler = ManualScheduler::new();
        let mut navigator = MoveNavigator::new(NavigationConfig::default());
        let mut now = 0;

        navigator
            .press(&mut board, &mut scheduler, NavigationDirection::Rewind, Timestamp::new(now))
            .unwrap();
        assert_eq!(board.move_index(), 9);

        // Nothing repeats before the hold delay
        assert!(scheduler.advance(Duration::from_millis(200)).is_empty());
        now += 200;

        let fired = scheduler.advance(Duration::from_millis(50));
        now += 50;
        for (handle, _) in fired {
            navigator
                .on_timer_fired(handle, &mut board, &mut scheduler, Timestamp::new(now))
                .unwrap();
        }
        assert_eq!(board.move_index(), 8);

        for _ in 0..3 {
            let fired = scheduler.advance(Duration::from_millis(40));
            now += 40;
            for (handle, _) in fired {
                navigator
                    .on_timer_fired(handle, &mut board, &mut scheduler, Timestamp::new(now))
                    .unwrap();
            }
        }
        assert_eq!(board.move_index(), 5);

        navigator.release(&mut scheduler);
        assert_eq!(scheduler.pending_count(), 0);
    }
}
