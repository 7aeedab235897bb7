//! Synchronization orchestrator facade.
//!
//! Producer jobs call through here: record a dispatch, report an outcome,
//! ask whether a retry is due, resolve linked rates. The orchestrator owns
//! the per-lane mutexes (all transitions for one (property, kind) pair are
//! serialized), consults the deduplication ledger before dispatch, and runs
//! every failure through the classifier before it can touch lane state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use metrics::counter;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::classify::{Classification, classify};
use crate::dedup::DedupCache;
use crate::rates::{RateEntry, RateError, RateResolver, ResolutionPolicy};
use crate::sync::lane::{
    BackoffPolicy, FailureDisposition, HealthPolicy, LaneKey, LaneState, MessageKind, SyncLane,
};
use crate::sync::store::{NewDispatch, StoreError, SyncStore};
use crate::transport::FailureSignal;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Rates(#[from] RateError),
}

/// Answer to `begin_dispatch`. Duplicates are recorded and flagged, never
/// blocked, so `proceed` is always true today; it stays in the contract so
/// a future guard policy does not change call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchTicket {
    pub proceed: bool,
    pub is_duplicate: bool,
    pub first_message_id: Option<Uuid>,
}

/// Dispatch registration input.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub property_id: String,
    pub kind: MessageKind,
    pub message_id: Uuid,
    pub content_fingerprint: String,
    pub parent_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
}

/// What `report_outcome` did with a failure.
#[derive(Debug, Clone)]
pub struct OutcomeReport {
    pub lane_state: LaneState,
    /// Present for failure outcomes.
    pub classification: Option<Classification>,
}

/// Retry/backoff knobs shared by every lane this orchestrator creates.
#[derive(Debug, Clone)]
pub struct OrchestratorPolicy {
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
    pub health: HealthPolicy,
}

impl Default for OrchestratorPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffPolicy::default(),
            health: HealthPolicy::default(),
        }
    }
}

type LaneCell = Arc<Mutex<SyncLane>>;

pub struct SyncOrchestrator {
    lanes: StdMutex<HashMap<LaneKey, LaneCell>>,
    dedup: Arc<dyn DedupCache>,
    store: Arc<dyn SyncStore>,
    resolver: RateResolver,
    policy: OrchestratorPolicy,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn SyncStore>,
        dedup: Arc<dyn DedupCache>,
        policy: OrchestratorPolicy,
    ) -> Self {
        Self {
            lanes: StdMutex::new(HashMap::new()),
            dedup,
            store,
            resolver: RateResolver::new(),
            policy,
        }
    }

    /// Register an outbound dispatch: consult the dedup ledger, move the
    /// lane to Running, persist the lane snapshot and the message record.
    pub async fn begin_dispatch(
        &self,
        request: DispatchRequest,
    ) -> Result<DispatchTicket, OrchestratorError> {
        let key = LaneKey::new(request.property_id.clone(), request.kind);
        let now = Utc::now();

        let dedup = self
            .dedup
            .check_and_record(&request.content_fingerprint, request.message_id);

        let cell = self.lane_cell(&key).await?;
        {
            let mut lane = cell.lock().await;
            if lane.state == LaneState::Idle {
                lane.register_records(0);
            }
            lane.begin_attempt(now);
            if dedup.is_duplicate {
                // Diagnostic note only; a duplicate never blocks the lane.
                lane.last_error = dedup
                    .first_message_id
                    .map(|first| format!("duplicate content of message {first}"));
            }
            self.store.save_lane(&lane).await?;
        }

        self.store
            .record_dispatch(&NewDispatch {
                message_id: request.message_id,
                parent_id: request.parent_id,
                batch_id: request.batch_id,
                key: key.clone(),
                content_fingerprint: request.content_fingerprint,
                duplicate_of: dedup.first_message_id,
                sent_at: now,
            })
            .await?;

        let labels = vec![("kind", key.kind.as_str().to_string())];
        counter!("channelsync_dispatch_total", &labels).increment(1);
        if dedup.is_duplicate {
            counter!("channelsync_duplicate_total", &labels).increment(1);
            warn!(
                lane = %key,
                message_id = %request.message_id,
                first_message_id = ?dedup.first_message_id,
                "dispatching content already sent within the dedup window"
            );
        }

        Ok(DispatchTicket {
            proceed: true,
            is_duplicate: dedup.is_duplicate,
            first_message_id: dedup.first_message_id,
        })
    }

    /// Report the outcome of a dispatch attempt.
    ///
    /// Failures are classified first; only the classification reaches lane
    /// state. A non-retryable classification forces the lane terminal even
    /// with retries left in the budget.
    pub async fn report_outcome(
        &self,
        property_id: &str,
        kind: MessageKind,
        message_id: Uuid,
        success: bool,
        failure: Option<FailureSignal>,
    ) -> Result<OutcomeReport, OrchestratorError> {
        let key = LaneKey::new(property_id, kind);
        let now = Utc::now();
        let cell = self.lane_cell(&key).await?;
        let labels = vec![("kind", kind.as_str().to_string())];

        if success {
            let state = {
                let mut lane = cell.lock().await;
                lane.record_success(now);
                self.store.save_lane(&lane).await?;
                lane.state
            };
            self.store.mark_message_outcome(message_id, true, now).await?;
            counter!("channelsync_outcome_total", &labels).increment(1);
            info!(lane = %key, message_id = %message_id, "dispatch succeeded");
            return Ok(OutcomeReport {
                lane_state: state,
                classification: None,
            });
        }

        let signal = failure
            .unwrap_or_else(|| FailureSignal::text("failure reported without a signal"));
        let classification = classify(&signal);

        self.store.record_error(message_id, &classification).await?;
        self.store.mark_message_outcome(message_id, false, now).await?;

        let (state, disposition) = {
            let mut lane = cell.lock().await;
            let disposition = lane.record_failure(
                now,
                classification.can_retry,
                classification.retry_delay_seconds,
                &classification.message,
            );
            self.store.save_lane(&lane).await?;
            (lane.state, disposition)
        };

        counter!("channelsync_failure_total", &labels).increment(1);
        match disposition {
            FailureDisposition::RetryScheduled => warn!(
                lane = %key,
                message_id = %message_id,
                kind = classification.kind.as_str(),
                "dispatch failed; retry scheduled"
            ),
            FailureDisposition::GaveUp => warn!(
                lane = %key,
                message_id = %message_id,
                kind = classification.kind.as_str(),
                "dispatch failed terminally; operator reset required"
            ),
            FailureDisposition::Ignored => {}
        }
        if state == LaneState::Degraded {
            // Escalation hook for the notification path outside the core;
            // must never block the transition.
            counter!("channelsync_lane_degraded_total", &labels).increment(1);
            warn!(lane = %key, "lane degraded by sliding-window failure rate");
        }

        Ok(OutcomeReport {
            lane_state: state,
            classification: Some(classification),
        })
    }

    /// True when the lane is awaiting a retry whose wake-up time has
    /// passed (or was never scheduled).
    pub async fn is_retry_due(
        &self,
        property_id: &str,
        kind: MessageKind,
    ) -> Result<bool, OrchestratorError> {
        let key = LaneKey::new(property_id, kind);
        let cell = self.lane_cell(&key).await?;
        let lane = cell.lock().await;
        Ok(lane.is_retry_due(Utc::now()))
    }

    /// Operator reset: Failed/RetryPending/Degraded lanes go back to
    /// Pending with a fresh retry budget.
    pub async fn manual_reset(
        &self,
        property_id: &str,
        kind: MessageKind,
    ) -> Result<LaneState, OrchestratorError> {
        let key = LaneKey::new(property_id, kind);
        let cell = self.lane_cell(&key).await?;
        let mut lane = cell.lock().await;
        lane.manual_reset();
        self.store.save_lane(&lane).await?;
        info!(lane = %key, "lane manually reset");
        Ok(lane.state)
    }

    /// Thin pass-through to the rate resolver.
    pub fn resolve_rates(
        &self,
        batch: Vec<RateEntry>,
        policy: ResolutionPolicy,
    ) -> Result<Vec<RateEntry>, OrchestratorError> {
        Ok(self.resolver.resolve(batch, policy)?)
    }

    /// Read-only snapshot of one lane, if it exists in memory or storage.
    pub async fn lane(&self, property_id: &str, kind: MessageKind) -> Option<SyncLane> {
        let key = LaneKey::new(property_id, kind);
        let cached = {
            let lanes = self.lanes.lock().expect("lane map lock poisoned");
            lanes.get(&key).cloned()
        };
        if let Some(cell) = cached {
            return Some(cell.lock().await.clone());
        }
        match self.store.load_lane(&key).await {
            Ok(found) => found,
            Err(err) => {
                warn!(lane = %key, error = %err, "failed to load lane snapshot");
                None
            }
        }
    }

    /// Find-or-create the serialized cell for a lane key. Lanes survive
    /// restarts through the store; creation is lazy on first use.
    async fn lane_cell(&self, key: &LaneKey) -> Result<LaneCell, StoreError> {
        {
            let lanes = self.lanes.lock().expect("lane map lock poisoned");
            if let Some(cell) = lanes.get(key) {
                return Ok(cell.clone());
            }
        }

        let loaded = self.store.load_lane(key).await?.unwrap_or_else(|| {
            SyncLane::with_policies(
                key.clone(),
                self.policy.backoff.clone(),
                self.policy.health.clone(),
                self.policy.max_retries,
            )
        });

        let mut lanes = self.lanes.lock().expect("lane map lock poisoned");
        // Another worker may have won the race while we were loading.
        let cell = lanes
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(loaded)));
        Ok(cell.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ErrorKind;
    use crate::dedup::InMemoryDedupCache;
    use crate::sync::store::NullStore;

    fn orchestrator() -> SyncOrchestrator {
        SyncOrchestrator::new(
            Arc::new(NullStore),
            Arc::new(InMemoryDedupCache::default()),
            OrchestratorPolicy::default(),
        )
    }

    fn request(fingerprint: &str) -> DispatchRequest {
        DispatchRequest {
            property_id: "42".to_string(),
            kind: MessageKind::Inventory,
            message_id: Uuid::new_v4(),
            content_fingerprint: fingerprint.to_string(),
            parent_id: None,
            batch_id: None,
        }
    }

    #[tokio::test]
    async fn test_begin_dispatch_moves_lane_to_running() {
        let orch = orchestrator();
        let ticket = orch.begin_dispatch(request("fp-1")).await.unwrap();
        assert!(ticket.proceed);
        assert!(!ticket.is_duplicate);

        let lane = orch.lane("42", MessageKind::Inventory).await.unwrap();
        assert_eq!(lane.state, LaneState::Running);
    }

    #[tokio::test]
    async fn test_duplicate_dispatch_is_flagged_but_proceeds() {
        let orch = orchestrator();
        let first = request("fp-same");
        let first_id = first.message_id;
        orch.begin_dispatch(first).await.unwrap();

        let ticket = orch.begin_dispatch(request("fp-same")).await.unwrap();
        assert!(ticket.proceed);
        assert!(ticket.is_duplicate);
        assert_eq!(ticket.first_message_id, Some(first_id));

        let lane = orch.lane("42", MessageKind::Inventory).await.unwrap();
        assert_eq!(lane.state, LaneState::Running);
        assert!(lane.last_error.unwrap().contains(&first_id.to_string()));
    }

    #[tokio::test]
    async fn test_success_outcome_completes_lane() {
        let orch = orchestrator();
        let req = request("fp-1");
        let id = req.message_id;
        orch.begin_dispatch(req).await.unwrap();

        let report = orch
            .report_outcome("42", MessageKind::Inventory, id, true, None)
            .await
            .unwrap();
        assert_eq!(report.lane_state, LaneState::Completed);
        assert!(report.classification.is_none());
    }

    #[tokio::test]
    async fn test_timeout_failure_schedules_retry() {
        let orch = orchestrator();
        let req = request("fp-1");
        let id = req.message_id;
        orch.begin_dispatch(req).await.unwrap();

        let report = orch
            .report_outcome(
                "42",
                MessageKind::Inventory,
                id,
                false,
                Some(FailureSignal::text("partner timed out")),
            )
            .await
            .unwrap();

        assert_eq!(report.lane_state, LaneState::RetryPending);
        let classification = report.classification.unwrap();
        assert_eq!(classification.kind, ErrorKind::Timeout);

        // backoff(1) = 5 minutes dominates the 60s recommendation
        let lane = orch.lane("42", MessageKind::Inventory).await.unwrap();
        let wait = lane.next_retry_at.unwrap() - Utc::now();
        assert!(wait.num_seconds() > 290 && wait.num_seconds() <= 300);
        assert!(!orch.is_retry_due("42", MessageKind::Inventory).await.unwrap());
    }

    #[tokio::test]
    async fn test_validation_failure_fails_lane_immediately() {
        let orch = orchestrator();
        let req = request("fp-1");
        let id = req.message_id;
        orch.begin_dispatch(req).await.unwrap();

        let report = orch
            .report_outcome(
                "42",
                MessageKind::Inventory,
                id,
                false,
                Some(FailureSignal::categorized(
                    ErrorKind::Validation,
                    "rate plan rejected",
                )),
            )
            .await
            .unwrap();

        assert_eq!(report.lane_state, LaneState::Failed);

        // Reset reopens the lane
        let state = orch.manual_reset("42", MessageKind::Inventory).await.unwrap();
        assert_eq!(state, LaneState::Pending);
    }

    #[tokio::test]
    async fn test_missing_failure_signal_classifies_unknown() {
        let orch = orchestrator();
        let req = request("fp-1");
        let id = req.message_id;
        orch.begin_dispatch(req).await.unwrap();

        let report = orch
            .report_outcome("42", MessageKind::Inventory, id, false, None)
            .await
            .unwrap();
        assert_eq!(report.classification.unwrap().kind, ErrorKind::Unknown);
    }

    #[tokio::test]
    async fn test_lanes_are_independent() {
        let orch = orchestrator();
        let inv = request("fp-inv");
        let inv_id = inv.message_id;
        orch.begin_dispatch(inv).await.unwrap();

        let mut rates = request("fp-rates");
        rates.kind = MessageKind::Rates;
        orch.begin_dispatch(rates).await.unwrap();

        orch.report_outcome(
            "42",
            MessageKind::Inventory,
            inv_id,
            false,
            Some(FailureSignal::categorized(ErrorKind::Validation, "bad")),
        )
        .await
        .unwrap();

        let inv_lane = orch.lane("42", MessageKind::Inventory).await.unwrap();
        let rates_lane = orch.lane("42", MessageKind::Rates).await.unwrap();
        assert_eq!(inv_lane.state, LaneState::Failed);
        assert_eq!(rates_lane.state, LaneState::Running);
    }

    #[tokio::test]
    async fn test_resolve_rates_passes_through_resolver_errors() {
        use crate::rates::{DateRange, LinkAdjustment, RateLink};
        use chrono::NaiveDate;

        let orch = orchestrator();
        let entry = RateEntry {
            room_type_code: "DBL".to_string(),
            rate_plan_code: "LOOP".to_string(),
            range: DateRange::new(
                NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 9, 30).unwrap(),
            ),
            first_adult_rate: 0.0,
            second_adult_rate: 0.0,
            additional_adult_rate: None,
            child_rate: None,
            currency_code: "EUR".to_string(),
            link: Some(RateLink {
                master_rate_plan_code: "LOOP".to_string(),
                adjustment: LinkAdjustment::Offset(-5.0),
            }),
        };

        let err = orch
            .resolve_rates(
                vec![entry],
                ResolutionPolicy {
                    allow_linked: true,
                    is_creation: true,
                },
            )
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Rates(_)));
    }
}
