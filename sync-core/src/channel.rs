//! Realtime channel state machine for albumsync.
//!
//! This module provides a pure, side-effect-free state machine for the
//! lifecycle of the duplex channel. The machine takes events as input and
//! produces a new machine plus a list of actions to execute.
//!
//! ```text
//! Idle → Connecting → Open → Closed(reason) → Connecting (retry)
//! ```
//!
//! `Closed(Intentional)` and `Closed(Exhausted)` are terminal until the
//! caller connects again. The actual I/O (opening sockets, arming timers)
//! is performed by sync-client.

use serde::Serialize;
use std::time::Duration;

/// Why the channel is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CloseReason {
    /// The caller disconnected; no reconnect is attempted.
    Intentional,
    /// The connection dropped or failed to open; a reconnect may be pending.
    Lost(String),
    /// Reconnect attempts ran out.
    Exhausted {
        /// Number of reconnects that were attempted.
        attempts: u32,
    },
}

/// Connection state - NO I/O, just state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ChannelState {
    /// Never connected.
    Idle,
    /// Socket open in progress.
    Connecting,
    /// Socket open; messages flow.
    Open,
    /// Socket closed.
    Closed(CloseReason),
}

impl ChannelState {
    /// Check if messages can be sent.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Check if a socket is being opened.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    /// Check if the channel gave up after running out of reconnects.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Closed(CloseReason::Exhausted { .. }))
    }
}

/// Exponential reconnect schedule.
///
/// Attempt `n` (starting at 1) waits `base_delay * 2^(n-1)`. No jitter is
/// added, so the schedule is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first reconnect.
    pub base_delay: Duration,
    /// Reconnects attempted before giving up.
    pub max_attempts: u32,
}

impl BackoffPolicy {
    /// Create a policy.
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), 5)
    }
}

/// Events that drive the channel lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Caller asked to connect.
    ConnectRequested,
    /// The socket opened.
    OpenSucceeded,
    /// The socket failed to open.
    OpenFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// An open socket closed without the caller asking.
    ConnectionLost {
        /// Reason for the closure.
        reason: String,
    },
    /// The reconnect timer expired.
    ReconnectTimerFired,
    /// A send found the channel closed.
    SendWhileClosed,
    /// Caller asked to disconnect.
    DisconnectRequested,
}

/// Actions to be executed by the channel manager.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelAction {
    /// Open a new socket.
    OpenSocket,
    /// Close the current socket.
    CloseSocket,
    /// Arm the reconnect timer.
    ScheduleReconnect {
        /// Which reconnect this is (1-based).
        attempt: u32,
        /// How long to wait.
        delay: Duration,
    },
    /// Disarm the pending reconnect timer.
    CancelReconnect,
    /// Drop every registered message handler.
    ClearHandlers,
    /// Report a lifecycle change to the application.
    Emit(ChannelNotice),
}

/// Lifecycle changes reported to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelNotice {
    /// The socket opened.
    Opened,
    /// The socket closed unexpectedly or failed to open.
    Lost {
        /// Reason for the closure.
        reason: String,
    },
    /// The caller disconnected.
    Disconnected,
    /// Reconnect attempts ran out.
    Exhausted {
        /// Number of reconnects that were attempted.
        attempts: u32,
    },
}

/// Channel state plus reconnect bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMachine {
    state: ChannelState,
    attempts: u32,
    timer_pending: bool,
    policy: BackoffPolicy,
}

impl ChannelMachine {
    /// Create a machine in the Idle state.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            state: ChannelState::Idle,
            attempts: 0,
            timer_pending: false,
            policy,
        }
    }

    /// Current state.
    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    /// Consecutive reconnects attempted since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether a reconnect timer is armed.
    pub fn timer_pending(&self) -> bool {
        self.timer_pending
    }

    /// The reconnect schedule.
    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }

    /// Process an event and return the new machine plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller is responsible
    /// for executing the returned actions.
    pub fn on_event(mut self, event: ChannelEvent) -> (Self, Vec<ChannelAction>) {
        let current = self.state.clone();
        match (current, event) {
            // Connecting from rest; a manual connect resets the counter
            (ChannelState::Idle | ChannelState::Closed(_), ChannelEvent::ConnectRequested) => {
                let mut actions = Vec::new();
                if self.timer_pending {
                    self.timer_pending = false;
                    actions.push(ChannelAction::CancelReconnect);
                }
                self.attempts = 0;
                self.state = ChannelState::Connecting;
                actions.push(ChannelAction::OpenSocket);
                (self, actions)
            }

            // Already connecting or open - idempotent
            (ChannelState::Connecting | ChannelState::Open, ChannelEvent::ConnectRequested) => {
                (self, vec![])
            }

            (ChannelState::Connecting, ChannelEvent::OpenSucceeded) => {
                self.attempts = 0;
                self.state = ChannelState::Open;
                (self, vec![ChannelAction::Emit(ChannelNotice::Opened)])
            }

            (ChannelState::Connecting, ChannelEvent::OpenFailed { error }) => self.lost(error),
            (
                ChannelState::Connecting | ChannelState::Open,
                ChannelEvent::ConnectionLost { reason },
            ) => self.lost(reason),

            (ChannelState::Closed(CloseReason::Lost(_)), ChannelEvent::ReconnectTimerFired) => {
                self.timer_pending = false;
                self.state = ChannelState::Connecting;
                (self, vec![ChannelAction::OpenSocket])
            }
            (_, ChannelEvent::ReconnectTimerFired) => {
                self.timer_pending = false;
                (self, vec![])
            }

            // A send may open a socket early but never resets the counter.
            // An armed timer already owns the next attempt; Intentional and
            // Exhausted stay closed until a manual connect.
            (ChannelState::Idle, ChannelEvent::SendWhileClosed) => {
                self.state = ChannelState::Connecting;
                (self, vec![ChannelAction::OpenSocket])
            }
            (ChannelState::Closed(CloseReason::Lost(_)), ChannelEvent::SendWhileClosed)
                if !self.timer_pending =>
            {
                self.state = ChannelState::Connecting;
                (self, vec![ChannelAction::OpenSocket])
            }

            (ChannelState::Idle, ChannelEvent::DisconnectRequested) => {
                (self, vec![ChannelAction::ClearHandlers])
            }
            (state, ChannelEvent::DisconnectRequested) => {
                let mut actions = Vec::new();
                if self.timer_pending {
                    self.timer_pending = false;
                    actions.push(ChannelAction::CancelReconnect);
                }
                if matches!(state, ChannelState::Connecting | ChannelState::Open) {
                    actions.push(ChannelAction::CloseSocket);
                }
                actions.push(ChannelAction::ClearHandlers);
                actions.push(ChannelAction::Emit(ChannelNotice::Disconnected));
                self.attempts = 0;
                self.state = ChannelState::Closed(CloseReason::Intentional);
                (self, actions)
            }

            // Invalid transitions - stay in current state
            (_, _) => (self, vec![]),
        }
    }

    /// Handle an unintentional closure: retry or give up.
    fn lost(mut self, reason: String) -> (Self, Vec<ChannelAction>) {
        let mut actions = vec![ChannelAction::Emit(ChannelNotice::Lost {
            reason: reason.clone(),
        })];

        if self.timer_pending {
            // A reconnect is already armed; never arm a second one.
            self.state = ChannelState::Closed(CloseReason::Lost(reason));
            return (self, actions);
        }

        if self.attempts < self.policy.max_attempts {
            self.attempts += 1;
            self.timer_pending = true;
            self.state = ChannelState::Closed(CloseReason::Lost(reason));
            actions.push(ChannelAction::ScheduleReconnect {
                attempt: self.attempts,
                delay: self.policy.delay(self.attempts),
            });
        } else {
            self.state = ChannelState::Closed(CloseReason::Exhausted {
                attempts: self.attempts,
            });
            actions.push(ChannelAction::Emit(ChannelNotice::Exhausted {
                attempts: self.attempts,
            }));
        }
        (self, actions)
    }
}

impl Default for ChannelMachine {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}
