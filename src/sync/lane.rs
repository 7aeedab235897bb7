//! Per-lane synchronization state machine.
//!
//! A lane is the unit of synchronization for one (property, message kind)
//! pair. All transitions are pure functions over the lane value plus an
//! explicit `now`; the orchestrator serializes calls per lane and the
//! repository persists snapshots after each transition. The health score is
//! derived at read time and never stored.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, thread_rng};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Message families exchanged with the distribution network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Inventory,
    Rates,
    Reservations,
    Restrictions,
    GroupBlocks,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Inventory => "inventory",
            MessageKind::Rates => "rates",
            MessageKind::Reservations => "reservations",
            MessageKind::Restrictions => "restrictions",
            MessageKind::GroupBlocks => "group_blocks",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "inventory" => Ok(MessageKind::Inventory),
            "rates" => Ok(MessageKind::Rates),
            "reservations" => Ok(MessageKind::Reservations),
            "restrictions" => Ok(MessageKind::Restrictions),
            "group_blocks" => Ok(MessageKind::GroupBlocks),
            other => Err(format!("unknown message kind: {other}")),
        }
    }
}

/// Canonical lane lifecycle states.
///
/// The upstream system grew overlapping vocabulary for these ("completed"
/// vs "success", "failed" vs "error"); this is the collapsed set and the
/// duplication is deliberately not resurrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LaneState {
    Idle,
    Pending,
    Running,
    Completed,
    Failed,
    RetryPending,
    Degraded,
}

impl LaneState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LaneState::Idle => "idle",
            LaneState::Pending => "pending",
            LaneState::Running => "running",
            LaneState::Completed => "completed",
            LaneState::Failed => "failed",
            LaneState::RetryPending => "retry_pending",
            LaneState::Degraded => "degraded",
        }
    }
}

impl fmt::Display for LaneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LaneState {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "idle" => Ok(LaneState::Idle),
            "pending" => Ok(LaneState::Pending),
            "running" => Ok(LaneState::Running),
            "completed" => Ok(LaneState::Completed),
            "failed" => Ok(LaneState::Failed),
            "retry_pending" => Ok(LaneState::RetryPending),
            "degraded" => Ok(LaneState::Degraded),
            other => Err(format!("unknown lane state: {other}")),
        }
    }
}

/// Lane identity: one lane per (property, message kind).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LaneKey {
    pub property_id: String,
    pub kind: MessageKind,
}

impl LaneKey {
    pub fn new<S: Into<String>>(property_id: S, kind: MessageKind) -> Self {
        Self {
            property_id: property_id.into(),
            kind,
        }
    }
}

impl fmt::Display for LaneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.property_id, self.kind)
    }
}

/// Exponential backoff policy for retry scheduling.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// First retry delay in seconds.
    pub base_seconds: u64,
    /// Upper bound for the exponential growth.
    pub cap_seconds: u64,
    /// Random factor 0.0..=1.0 applied on top of the computed delay to
    /// avoid thundering herds; 0.0 keeps delays exact.
    pub jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_seconds: 300,
            cap_seconds: 3_600,
            jitter_factor: 0.0,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `retry_count` (1-based):
    /// `min(cap, base * 2^(n-1))` plus optional jitter.
    pub fn delay(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1).min(16);
        let raw = (self.base_seconds as f64 * 2_f64.powi(exponent as i32))
            .min(self.cap_seconds as f64);

        let jittered = if self.jitter_factor > 0.0 {
            raw + thread_rng().gen_range(0.0..(self.jitter_factor * raw))
        } else {
            raw
        };

        Duration::seconds(jittered as i64)
    }
}

/// Sliding-window degradation thresholds.
#[derive(Debug, Clone)]
pub struct HealthPolicy {
    /// Number of most recent outcomes considered.
    pub window_size: usize,
    /// Minimum samples before the window rate is acted on.
    pub min_samples: usize,
    /// Failure rate at or above which a lane degrades.
    pub degrade_threshold: f64,
    /// Failure rate below which a degraded lane recovers.
    pub recover_threshold: f64,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            window_size: 50,
            min_samples: 10,
            degrade_threshold: 0.30,
            recover_threshold: 0.05,
        }
    }
}

/// Rolling record of the most recent dispatch outcomes for one lane.
#[derive(Debug, Clone, Default)]
pub struct OutcomeWindow {
    outcomes: VecDeque<bool>,
    capacity: usize,
}

impl OutcomeWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, success: bool) {
        if self.outcomes.len() == self.capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(success);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn failure_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let failures = self.outcomes.iter().filter(|ok| !**ok).count();
        failures as f64 / self.outcomes.len() as f64
    }
}

/// What a transition asks the surrounding orchestration to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Lane moved to RetryPending; the external scheduler will wake it.
    RetryScheduled,
    /// Lane is terminally Failed until an operator resets it.
    GaveUp,
    /// Outcome arrived against an already-terminal lane; nothing changed.
    Ignored,
}

/// One synchronization lane and its full mutable state.
#[derive(Debug, Clone)]
pub struct SyncLane {
    pub key: LaneKey,
    pub state: LaneState,
    pub records_total: u32,
    pub records_processed: u32,
    pub retry_count: u32,
    pub max_retries: u32,
    pub consecutive_failures: u32,
    pub auto_retry_enabled: bool,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    window: OutcomeWindow,
    health: HealthPolicy,
    backoff: BackoffPolicy,
}

impl SyncLane {
    pub fn new(key: LaneKey) -> Self {
        Self::with_policies(key, BackoffPolicy::default(), HealthPolicy::default(), 3)
    }

    pub fn with_policies(
        key: LaneKey,
        backoff: BackoffPolicy,
        health: HealthPolicy,
        max_retries: u32,
    ) -> Self {
        let window = OutcomeWindow::new(health.window_size);
        Self {
            key,
            state: LaneState::Idle,
            records_total: 0,
            records_processed: 0,
            retry_count: 0,
            max_retries,
            consecutive_failures: 0,
            auto_retry_enabled: true,
            last_error: None,
            last_attempt_at: None,
            last_success_at: None,
            next_retry_at: None,
            window,
            health,
            backoff,
        }
    }

    /// Idle → Pending on the first message registered for this lane.
    /// A known up-front record count grows the total.
    pub fn register_records(&mut self, count: u32) {
        self.records_total = self.records_total.saturating_add(count);
        if self.state == LaneState::Idle {
            self.state = LaneState::Pending;
        }
    }

    /// A dispatch attempt begins. Pending/RetryPending (and Idle for lanes
    /// created on the fly) move to Running; a Degraded lane keeps its
    /// degraded marker while still attempting. Terminal Failed lanes only
    /// leave via [`SyncLane::manual_reset`].
    pub fn begin_attempt(&mut self, now: DateTime<Utc>) {
        self.last_attempt_at = Some(now);
        // Dispatches without an up-front total count themselves in, so the
        // success rate keeps a denominator.
        if self.records_total <= self.records_processed {
            self.records_total = self.records_total.saturating_add(1);
        }
        match self.state {
            LaneState::Failed | LaneState::Degraded => {}
            _ => self.state = LaneState::Running,
        }
    }

    /// Running → Completed on a success outcome. Idempotent against an
    /// already-Completed lane beyond the counters.
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.records_processed = self.records_processed.saturating_add(1);
        self.consecutive_failures = 0;
        self.retry_count = 0;
        self.last_success_at = Some(now);
        self.last_error = None;
        self.next_retry_at = None;
        self.window.push(true);

        if self.state == LaneState::Degraded {
            self.apply_recovery();
        } else {
            self.state = LaneState::Completed;
        }
    }

    /// Running → RetryPending | Failed on a failure outcome.
    ///
    /// `can_retry` and `recommended_delay_seconds` come from the error
    /// classifier; a non-retryable failure forces terminal Failed no matter
    /// how many retries remain. The scheduled delay is the larger of the
    /// exponential backoff and the classifier's recommendation.
    pub fn record_failure(
        &mut self,
        now: DateTime<Utc>,
        can_retry: bool,
        recommended_delay_seconds: u64,
        message: &str,
    ) -> FailureDisposition {
        if self.state == LaneState::Failed {
            // Late outcome against a terminal lane: keep the books as-is.
            return FailureDisposition::Ignored;
        }

        let was_degraded = self.state == LaneState::Degraded;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.retry_count = self.retry_count.saturating_add(1).min(self.max_retries);
        self.last_error = Some(message.to_string());
        self.window.push(false);

        let disposition = if !can_retry {
            self.fail_terminally();
            FailureDisposition::GaveUp
        } else if self.retry_count < self.max_retries && self.auto_retry_enabled {
            let backoff = self.backoff.delay(self.retry_count);
            let recommended = Duration::seconds(recommended_delay_seconds as i64);
            self.state = LaneState::RetryPending;
            self.next_retry_at = Some(now + backoff.max(recommended));
            FailureDisposition::RetryScheduled
        } else {
            self.fail_terminally();
            FailureDisposition::GaveUp
        };

        if disposition == FailureDisposition::RetryScheduled {
            if was_degraded && self.window.failure_rate() >= self.health.recover_threshold {
                // Still unhealthy; retry scheduling must not clear the marker.
                self.state = LaneState::Degraded;
            } else {
                self.apply_degradation();
            }
        }
        disposition
    }

    /// Failed/RetryPending/Degraded → Pending by operator action.
    pub fn manual_reset(&mut self) {
        if !matches!(
            self.state,
            LaneState::Failed | LaneState::RetryPending | LaneState::Degraded
        ) {
            return;
        }
        self.state = LaneState::Pending;
        self.retry_count = 0;
        self.last_error = None;
        self.next_retry_at = None;
        self.auto_retry_enabled = true;
    }

    /// True when the external scheduler should redispatch this lane now.
    ///
    /// Degradation is a health marker, not a terminal state: a Degraded
    /// lane that still carries a scheduled wake-up retries on schedule.
    pub fn is_retry_due(&self, now: DateTime<Utc>) -> bool {
        if !self.auto_retry_enabled {
            return false;
        }
        match self.state {
            LaneState::RetryPending => self.next_retry_at.is_none_or(|at| at <= now),
            LaneState::Degraded => self.next_retry_at.is_some_and(|at| at <= now),
            _ => false,
        }
    }

    /// Success percentage over registered records, 0..=100.
    pub fn success_rate(&self) -> f64 {
        if self.records_total == 0 {
            return 100.0;
        }
        (self.records_processed as f64 / self.records_total as f64) * 100.0
    }

    /// Failure rate over the sliding outcome window.
    pub fn window_failure_rate(&self) -> f64 {
        self.window.failure_rate()
    }

    /// Derived health indicator, 0..=100, recomputed on every read.
    ///
    /// The penalties apply to the running value in this exact order; they
    /// are not independent deductions from 100.
    pub fn health_score(&self, now: DateTime<Utc>) -> f64 {
        let mut score: f64 = 100.0;
        score = score.min(self.success_rate());
        score -= (self.retry_count as f64 * 10.0).min(30.0);
        match self.last_success_at {
            None => score -= 50.0,
            Some(at) => {
                let days = (now - at).num_days();
                if days > 1 {
                    score -= (days as f64 * 5.0).min(40.0);
                }
            }
        }
        if self.state == LaneState::Failed {
            score -= 20.0;
        }
        score.clamp(0.0, 100.0)
    }

    fn fail_terminally(&mut self) {
        self.state = LaneState::Failed;
        self.auto_retry_enabled = false;
        self.next_retry_at = None;
    }

    /// Degrade when the recent failure rate crosses the threshold. Failed
    /// wins over Degraded, so this only runs for retry-scheduled outcomes.
    fn apply_degradation(&mut self) {
        if self.window.len() >= self.health.min_samples
            && self.window.failure_rate() >= self.health.degrade_threshold
        {
            self.state = LaneState::Degraded;
        }
    }

    /// Leave Degraded once the window calms down; Running when records are
    /// still in flight, Idle otherwise.
    fn apply_recovery(&mut self) {
        if self.window.failure_rate() < self.health.recover_threshold {
            self.state = if self.records_processed < self.records_total {
                LaneState::Running
            } else {
                LaneState::Idle
            };
        }
    }
}
