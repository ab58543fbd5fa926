//! Reconnect scheduling for the Gateway client.
//!
//! Provides a single-shot, fixed-delay retry timer designed to sit in a
//! `tokio::select!` loop. The timer is armed when a previously
//! authenticated connection drops, fires once after the configured
//! delay, and is re-armed by the caller if the retry fails — repeating
//! indefinitely until the policy is disabled, the client disconnects, or
//! a connection succeeds.
//!
//! The delay is fixed (no exponential growth); optional uniform jitter
//! keeps a fleet of clients from retrying in lockstep.
//!
//! # Integration
//!
//! The timer sits inside the connection task's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         attempt = timer.fire() => { /* dial the gateway again */ }
//!     }
//! }
//! ```
//!
//! When the timer is unarmed or the policy is disabled, [`fire`] pends
//! forever — `select!` simply services the other branches.
//!
//! [`fire`]: ReconnectTimer::fire

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::debug;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// The reconnect policy: whether to retry at all, and how long to wait.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Whether automatic reconnection is enabled.
    pub enabled: bool,

    /// Fixed delay between a connection loss and the retry.
    pub delay: Duration,

    /// Random jitter (0–max ms) added to each delay. 0 disables jitter.
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay: Duration::from_secs(10),
            jitter_ms: 0,
        }
    }
}

impl RetryConfig {
    /// Creates a config with the given delay and defaults otherwise.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// Single-shot reconnect timer.
///
/// At most one deadline is armed at a time; arming an armed timer keeps
/// the existing deadline. Disabling the policy cancels any armed
/// deadline, so the timer never fires while the policy is off.
#[derive(Debug)]
pub struct ReconnectTimer {
    config: RetryConfig,
    /// When the next retry should fire. `None` = unarmed.
    deadline: Option<Instant>,
    /// Consecutive fired retries since the last recorded success.
    attempts: u32,
}

impl ReconnectTimer {
    /// Creates an unarmed timer from config.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            deadline: None,
            attempts: 0,
        }
    }

    /// Arms the timer for one retry after the configured delay.
    ///
    /// Returns `false` (and does nothing) when the policy is disabled or
    /// a deadline is already armed.
    pub fn arm(&mut self) -> bool {
        if !self.config.enabled || self.deadline.is_some() {
            return false;
        }

        let jitter = if self.config.jitter_ms > 0 {
            let ms = rand::rng().random_range(0..self.config.jitter_ms);
            Duration::from_millis(ms)
        } else {
            Duration::ZERO
        };
        self.deadline = Some(Instant::now() + self.config.delay + jitter);

        debug!(
            delay_ms = self.config.delay.as_millis() as u64,
            attempt = self.attempts + 1,
            "reconnect timer armed"
        );
        true
    }

    /// Cancels an armed deadline, if any.
    pub fn cancel(&mut self) {
        if self.deadline.take().is_some() {
            debug!("reconnect timer cancelled");
        }
    }

    /// Whether a deadline is currently armed.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Enables or disables the policy at runtime.
    ///
    /// Disabling cancels any armed deadline.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
        if !enabled {
            self.cancel();
        }
    }

    /// Whether the policy is enabled.
    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Consecutive fired retries since the last success.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Records a successful connection: resets the attempt counter and
    /// cancels any armed deadline.
    pub fn record_success(&mut self) {
        self.attempts = 0;
        self.cancel();
    }

    /// Waits until the armed deadline, then disarms and returns the
    /// attempt number (1-based).
    ///
    /// Pends forever when unarmed (including whenever the policy is
    /// disabled) — `select!` will still process other branches. The
    /// future is cancel-safe: dropping it leaves the deadline armed.
    pub async fn fire(&mut self) -> u32 {
        let Some(deadline) = self.deadline else {
            // Never resolves — select! handles other branches.
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(deadline).await;
        self.deadline = None;
        self.attempts += 1;

        debug!(attempt = self.attempts, "reconnect timer fired");
        self.attempts
    }
}
