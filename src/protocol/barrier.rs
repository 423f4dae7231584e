// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Cross-node barriers.
//!
//! The server coordinates: it broadcasts `REQUEST(seq)`, waits until every
//! participant answered `ACK_LOCK(seq)` (or the timeout passes), then
//! broadcasts `UNLOCK(seq)`. A client follows: its barrier call consumes the
//! next pending `REQUEST`, acknowledges it and blocks until the matching
//! `UNLOCK`. Messages that arrive before the client calls in are queued by
//! sequence number, so an `UNLOCK` that overtook the call is not lost.
//!
//! ```text
//! server: IDLE ──barrier()──▶ AWAITING_ACKS(seq, pending) ──all acked / timeout──▶ IDLE
//! ```

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::consts::BARRIER_POLL_INTERVAL_MS;
use crate::errors::ProtocolError;
use crate::observability::messages::protocol::{BarrierCompleted, BarrierStarted, BarrierTimedOut};
use crate::observability::messages::StructuredLog;
use crate::proto::BarrierStage;
use crate::utils::ConnectionTag;

fn poll_interval() -> Duration {
    Duration::from_millis(BARRIER_POLL_INTERVAL_MS)
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CoordinatorState {
    #[default]
    Idle,
    AwaitingAcks {
        sequence: u64,
        pending: BTreeSet<ConnectionTag>,
    },
}

/// Server side of the barrier.
pub struct BarrierCoordinator {
    state: Mutex<CoordinatorState>,
    next_sequence: AtomicU64,
    round: tokio::sync::Mutex<()>,
}

impl BarrierCoordinator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CoordinatorState::Idle),
            next_sequence: AtomicU64::new(1),
            round: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state.lock().clone()
    }

    /// Record an `ACK_LOCK`. Acks for other rounds are ignored.
    pub fn acknowledge(&self, tag: ConnectionTag, sequence: u64) -> bool {
        match &mut *self.state.lock() {
            CoordinatorState::AwaitingAcks {
                sequence: current,
                pending,
            } if *current == sequence => pending.remove(&tag),
            _ => false,
        }
    }

    /// Stop waiting for a participant that disconnected.
    pub fn forget(&self, tag: ConnectionTag) {
        if let CoordinatorState::AwaitingAcks { pending, .. } = &mut *self.state.lock() {
            pending.remove(&tag);
        }
    }

    fn pending(&self) -> usize {
        match &*self.state.lock() {
            CoordinatorState::AwaitingAcks { pending, .. } => pending.len(),
            CoordinatorState::Idle => 0,
        }
    }

    /// Run one barrier round over `participants`. `broadcast` sends a stage
    /// message to all of them. Rounds are serialized.
    ///
    /// On timeout the participants are still unlocked and the call fails.
    pub async fn run<F>(&self, participants: Vec<ConnectionTag>, timeout: Duration, broadcast: F) -> Result<u64, ProtocolError>
    where
        F: Fn(BarrierStage, u64),
    {
        let _round = self.round.lock().await;
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        BarrierStarted {
            sequence,
            participants: participants.len(),
        }
        .log();

        *self.state.lock() = CoordinatorState::AwaitingAcks {
            sequence,
            pending: participants.into_iter().collect(),
        };
        broadcast(BarrierStage::Request, sequence);

        let outcome = loop {
            let pending = self.pending();
            if pending == 0 {
                break Ok(sequence);
            }
            if started.elapsed() >= timeout {
                BarrierTimedOut { sequence, pending }.log();
                break Err(ProtocolError::Timeout(timeout));
            }
            tokio::time::sleep(poll_interval()).await;
        };

        *self.state.lock() = CoordinatorState::Idle;
        broadcast(BarrierStage::Unlock, sequence);
        if outcome.is_ok() {
            BarrierCompleted {
                sequence,
                elapsed_ms: started.elapsed().as_millis(),
            }
            .log();
        }
        outcome
    }
}

impl Default for BarrierCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct FollowerState {
    requests: BTreeSet<u64>,
    unlocks: BTreeSet<u64>,
    consumed: u64,
}

/// Client side of the barrier.
pub struct BarrierFollower {
    state: Mutex<FollowerState>,
    round: tokio::sync::Mutex<()>,
}

impl BarrierFollower {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FollowerState::default()),
            round: tokio::sync::Mutex::new(()),
        }
    }

    pub fn on_request(&self, sequence: u64) {
        let mut state = self.state.lock();
        if sequence > state.consumed {
            state.requests.insert(sequence);
        }
    }

    pub fn on_unlock(&self, sequence: u64) {
        let mut state = self.state.lock();
        if sequence > state.consumed {
            state.unlocks.insert(sequence);
        }
    }

    /// Oldest request not yet consumed.
    pub fn pending_request(&self) -> Option<u64> {
        self.state.lock().requests.first().copied()
    }

    fn take_request(&self) -> Option<u64> {
        self.state.lock().requests.pop_first()
    }

    fn take_unlock(&self, sequence: u64) -> bool {
        let mut state = self.state.lock();
        if !state.unlocks.remove(&sequence) {
            return false;
        }
        state.consumed = sequence;
        state.requests.retain(|s| *s > sequence);
        state.unlocks.retain(|s| *s > sequence);
        true
    }

    /// Wait for the next barrier request, acknowledge it through `acknowledge`
    /// and block until it is unlocked.
    pub async fn run<F>(&self, timeout: Duration, acknowledge: F) -> Result<u64, ProtocolError>
    where
        F: Fn(u64),
    {
        let _round = self.round.lock().await;
        let deadline = Instant::now() + timeout;

        let sequence = loop {
            if let Some(sequence) = self.take_request() {
                break sequence;
            }
            if Instant::now() >= deadline {
                return Err(ProtocolError::Timeout(timeout));
            }
            tokio::time::sleep(poll_interval()).await;
        };

        acknowledge(sequence);

        loop {
            if self.take_unlock(sequence) {
                return Ok(sequence);
            }
            if Instant::now() >= deadline {
                BarrierTimedOut { sequence, pending: 1 }.log();
                return Err(ProtocolError::Timeout(timeout));
            }
            tokio::time::sleep(poll_interval()).await;
        }
    }
}

impl Default for BarrierFollower {
    fn default() -> Self {
        Self::new()
    }
}
