//! Route replay: re-emit the recent history of a focused route as a short
//! sequence of transient draws.

use crate::flows::{assign_lanes, LaneSlot};
use crate::model::TransferEvent;
use crate::timeline::Timeline;

/// Most recent same-route events replayed per focus action
pub const REPLAY_DEPTH: usize = 8;
/// Gap between replayed draws
pub const REPLAY_SPACING_MS: u64 = 170;
/// Gap between the two pulses of the fallback burst
pub const BURST_SPACING_MS: u64 = 120;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayPhase {
    Idle,
    /// Cues scheduled, none fired yet
    Armed,
    Emitting,
    Settled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawKind {
    Replay,
    /// A flow that showed up in a refresh
    Fresh,
}

impl DrawKind {
    pub fn ttl_ms(self) -> u64 {
        match self {
            DrawKind::Replay => 2100,
            DrawKind::Fresh => 3200,
        }
    }
}

/// One transient arc + pulse, owning its event so it outlives the snapshot
#[derive(Clone, Debug, PartialEq)]
pub struct TransientDraw {
    pub event: TransferEvent,
    pub lane: LaneSlot,
    pub kind: DrawKind,
}

#[derive(Debug)]
pub struct ReplayEngine {
    cues: Timeline<TransientDraw>,
    phase: ReplayPhase,
}

impl Default for ReplayEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayEngine {
    pub fn new() -> Self {
        Self {
            cues: Timeline::new(),
            phase: ReplayPhase::Idle,
        }
    }

    pub fn phase(&self) -> ReplayPhase {
        self.phase
    }

    /// Cues not yet fired
    pub fn pending(&self) -> usize {
        self.cues.len()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.cues.next_deadline()
    }

    /// Arm a replay of `focus`'s route.
    ///
    /// `events` is the current snapshot, newest first. Any cues left from an
    /// earlier replay are dropped before the new batch is scheduled. Returns
    /// the number of cues scheduled, never zero.
    pub fn replay(&mut self, focus: &TransferEvent, events: &[TransferEvent], now_ms: u64) -> usize {
        let dropped = self.cues.cancel_all();
        if dropped > 0 {
            tracing::debug!(dropped, "cancelled in-flight replay");
        }

        let key = focus.route_key();
        let mut history: Vec<&TransferEvent> = events
            .iter()
            .filter(|e| e.route_key() == key)
            .take(REPLAY_DEPTH)
            .collect();
        history.reverse();

        if history.len() <= 1 {
            // Nothing to replay: double-tap the focused flow instead
            for pulse in 0..2 {
                self.cues.schedule(
                    now_ms + pulse as u64 * BURST_SPACING_MS,
                    TransientDraw {
                        event: focus.clone(),
                        lane: LaneSlot { index: pulse, total: 2 },
                        kind: DrawKind::Replay,
                    },
                );
            }
        } else {
            let lanes = assign_lanes(&history);
            for (step, (event, lane)) in history.iter().zip(lanes).enumerate() {
                self.cues.schedule(
                    now_ms + step as u64 * REPLAY_SPACING_MS,
                    TransientDraw {
                        event: (*event).clone(),
                        lane,
                        kind: DrawKind::Replay,
                    },
                );
            }
        }

        self.phase = ReplayPhase::Armed;
        tracing::debug!(route = %key, cues = self.cues.len(), "replay armed");
        self.cues.len()
    }

    /// Fire every cue due at `now_ms`
    pub fn tick(&mut self, now_ms: u64) -> Vec<TransientDraw> {
        let fired = self.cues.pop_due(now_ms);
        if !fired.is_empty() && self.phase == ReplayPhase::Armed {
            self.phase = ReplayPhase::Emitting;
        }
        if self.cues.is_empty() && matches!(self.phase, ReplayPhase::Armed | ReplayPhase::Emitting) {
            self.phase = ReplayPhase::Settled;
        }
        fired
    }

    /// Drop all pending cues, e.g. when the focus is cleared
    pub fn cancel(&mut self) {
        self.cues.cancel_all();
        if self.phase != ReplayPhase::Idle {
            self.phase = ReplayPhase::Settled;
        }
    }
}
