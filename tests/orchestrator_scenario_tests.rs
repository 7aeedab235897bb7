//! End-to-end orchestration scenarios against an in-memory database.
//!
//! Exercises the full path a producer job takes: dispatch registration,
//! transport outcome reporting, classification, lane transitions and the
//! persisted records behind them.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

use channelsync::classify::ErrorKind;
use channelsync::dedup::InMemoryDedupCache;
use channelsync::fingerprint::content_fingerprint;
use channelsync::repositories::{
    DbSyncStore, ErrorRecordRepository, MessageRecordRepository, SyncLaneRepository,
};
use channelsync::sync::lane::{BackoffPolicy, HealthPolicy, LaneKey, LaneState, MessageKind};
use channelsync::sync::orchestrator::{DispatchRequest, OrchestratorPolicy, SyncOrchestrator};
use channelsync::transport::{ChannelTransport, DispatchReply, FailureSignal};

/// Transport double that plays back a script of replies.
struct ScriptedTransport {
    replies: Mutex<Vec<DispatchReply>>,
}

impl ScriptedTransport {
    fn new(mut replies: Vec<DispatchReply>) -> Self {
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
        }
    }
}

#[async_trait]
impl ChannelTransport for ScriptedTransport {
    async fn send(&self, _serialized_message: &str) -> DispatchReply {
        self.replies
            .lock()
            .expect("script lock")
            .pop()
            .unwrap_or_else(|| DispatchReply::Accepted {
                raw_response: "<Success/>".to_string(),
            })
    }
}

async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("create in-memory db");
    Migrator::up(&db, None).await.expect("apply migrations");
    db
}

fn orchestrator_for(db: &DatabaseConnection) -> SyncOrchestrator {
    let store = Arc::new(DbSyncStore::new(
        db.clone(),
        BackoffPolicy::default(),
        HealthPolicy::default(),
    ));
    SyncOrchestrator::new(
        store,
        Arc::new(InMemoryDedupCache::default()),
        OrchestratorPolicy::default(),
    )
}

fn dispatch(property_id: &str, kind: MessageKind, payload: &str) -> DispatchRequest {
    DispatchRequest {
        property_id: property_id.to_string(),
        kind,
        message_id: Uuid::new_v4(),
        content_fingerprint: content_fingerprint(payload),
        parent_id: None,
        batch_id: None,
    }
}

#[tokio::test]
async fn test_timeout_then_success_cycle() {
    let db = setup_db().await;
    let orch = orchestrator_for(&db);
    let transport = ScriptedTransport::new(vec![
        DispatchReply::Rejected(FailureSignal::text("partner request timed out")),
        DispatchReply::Accepted {
            raw_response: "<Success/>".to_string(),
        },
    ]);

    // First dispatch fails with a timeout.
    let payload = "<HotelInvCountNotif hotel=\"42\"/>";
    let request = dispatch("42", MessageKind::Inventory, payload);
    let first_id = request.message_id;
    let ticket = orch.begin_dispatch(request).await.unwrap();
    assert!(ticket.proceed);

    let lane = orch.lane("42", MessageKind::Inventory).await.unwrap();
    assert_eq!(lane.state, LaneState::Running);

    let reply = transport.send(payload).await;
    let report = match reply {
        DispatchReply::Rejected(signal) => orch
            .report_outcome("42", MessageKind::Inventory, first_id, false, Some(signal))
            .await
            .unwrap(),
        DispatchReply::Accepted { .. } => panic!("script should reject first"),
    };

    assert_eq!(report.lane_state, LaneState::RetryPending);
    let classification = report.classification.expect("failure is classified");
    assert_eq!(classification.kind, ErrorKind::Timeout);

    // backoff(1) = 5 minutes dominates the classifier's 60s recommendation
    let lane = orch.lane("42", MessageKind::Inventory).await.unwrap();
    let wait = lane.next_retry_at.expect("retry scheduled") - Utc::now();
    assert!(wait.num_seconds() > 290 && wait.num_seconds() <= 300);
    assert!(!orch.is_retry_due("42", MessageKind::Inventory).await.unwrap());

    // The failure is on the books.
    let errors = ErrorRecordRepository::new(db.clone())
        .list_for_message(first_id)
        .await
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_kind, "timeout");
    assert!(errors[0].can_retry);

    let message = MessageRecordRepository::new(db.clone())
        .find_by_id(first_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.processing_state, "failed");

    // Redispatch (same content, new message) succeeds and completes the lane.
    let retry = dispatch("42", MessageKind::Inventory, payload);
    let retry_id = retry.message_id;
    let ticket = orch.begin_dispatch(retry).await.unwrap();
    // Same payload within the dedup window: flagged, never blocked.
    assert!(ticket.is_duplicate);
    assert_eq!(ticket.first_message_id, Some(first_id));

    match transport.send(payload).await {
        DispatchReply::Accepted { .. } => {
            let report = orch
                .report_outcome("42", MessageKind::Inventory, retry_id, true, None)
                .await
                .unwrap();
            assert_eq!(report.lane_state, LaneState::Completed);
        }
        DispatchReply::Rejected(_) => panic!("script should accept second"),
    }

    let lane = orch.lane("42", MessageKind::Inventory).await.unwrap();
    assert_eq!(lane.retry_count, 0);
    assert!(lane.last_error.is_none());

    let retry_message = MessageRecordRepository::new(db.clone())
        .find_by_id(retry_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(retry_message.processing_state, "processed");
    assert_eq!(retry_message.duplicate_of, Some(first_id));
}

#[tokio::test]
async fn test_validation_failure_persists_terminal_lane() {
    let db = setup_db().await;
    let orch = orchestrator_for(&db);

    let request = dispatch("77", MessageKind::Rates, "<RatePlanNotif hotel=\"77\"/>");
    let message_id = request.message_id;
    orch.begin_dispatch(request).await.unwrap();

    let report = orch
        .report_outcome(
            "77",
            MessageKind::Rates,
            message_id,
            false,
            Some(FailureSignal::text(
                "validation failed: rate plan BAR missing currency",
            )),
        )
        .await
        .unwrap();
    assert_eq!(report.lane_state, LaneState::Failed);

    // The persisted row reflects the terminal state with auto retry off.
    let row = SyncLaneRepository::new(db.clone())
        .find_by_key(&LaneKey::new("77", MessageKind::Rates))
        .await
        .unwrap()
        .expect("lane row persisted");
    assert_eq!(row.state, "failed");
    assert!(!row.auto_retry_enabled);
    assert!(row.next_retry_at.is_none());

    // Nothing is due for the scheduler.
    let due = SyncLaneRepository::new(db.clone())
        .find_due_retries()
        .await
        .unwrap();
    assert!(due.is_empty());

    // Operator reset reopens the lane in storage too.
    let state = orch.manual_reset("77", MessageKind::Rates).await.unwrap();
    assert_eq!(state, LaneState::Pending);
    let row = SyncLaneRepository::new(db.clone())
        .find_by_key(&LaneKey::new("77", MessageKind::Rates))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.state, "pending");
    assert_eq!(row.retry_count, 0);
    assert!(row.auto_retry_enabled);
}

#[tokio::test]
async fn test_operator_note_lands_on_the_message_audit_trail() {
    let db = setup_db().await;
    let orch = orchestrator_for(&db);

    let request = dispatch("42", MessageKind::Inventory, "<HotelInvCountNotif/>");
    let id = request.message_id;
    orch.begin_dispatch(request).await.unwrap();
    orch.report_outcome(
        "42",
        MessageKind::Inventory,
        id,
        false,
        Some(FailureSignal::text("validation failed: missing inv code")),
    )
    .await
    .unwrap();

    let repo = MessageRecordRepository::new(db.clone());
    let annotated = repo
        .annotate(id, "resynced after fixing the inv code mapping")
        .await
        .unwrap()
        .expect("message exists");
    assert_eq!(
        annotated.resolution_note.as_deref(),
        Some("resynced after fixing the inv code mapping")
    );

    let listed = repo
        .list_for_property("42", Some("inventory"), None, None)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);
    assert_eq!(listed[0].processing_state, "failed");

    // Nothing to annotate for an unknown message.
    assert!(
        repo.annotate(Uuid::new_v4(), "n/a")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_lane_survives_orchestrator_restart() {
    let db = setup_db().await;

    {
        let orch = orchestrator_for(&db);
        let request = dispatch("42", MessageKind::Reservations, "<ResNotif/>");
        let id = request.message_id;
        orch.begin_dispatch(request).await.unwrap();
        orch.report_outcome(
            "42",
            MessageKind::Reservations,
            id,
            false,
            Some(FailureSignal::text("connection refused")),
        )
        .await
        .unwrap();
    }

    // A fresh orchestrator (new process) loads the lane from storage.
    let orch = orchestrator_for(&db);
    let lane = orch.lane("42", MessageKind::Reservations).await.unwrap();
    assert_eq!(lane.state, LaneState::RetryPending);
    assert_eq!(lane.retry_count, 1);
    assert!(lane.next_retry_at.is_some());
}

#[tokio::test]
async fn test_degraded_lane_is_still_polled_for_retries() {
    let db = setup_db().await;
    let orch = orchestrator_for(&db);

    // Mixed outcomes: 4 failures in a 10-sample window crosses the 30%
    // degradation threshold while every failure streak stays retryable.
    let outcomes = [
        true, true, true, false, true, true, false, true, false, false,
    ];
    for (i, ok) in outcomes.iter().enumerate() {
        let req = dispatch(
            "42",
            MessageKind::Inventory,
            &format!("<HotelInvCountNotif day=\"{i}\"/>"),
        );
        let id = req.message_id;
        orch.begin_dispatch(req).await.unwrap();
        let signal = if *ok {
            None
        } else {
            Some(FailureSignal::text("connection reset by peer"))
        };
        orch.report_outcome("42", MessageKind::Inventory, id, *ok, signal)
            .await
            .unwrap();
    }

    let lane = orch.lane("42", MessageKind::Inventory).await.unwrap();
    assert_eq!(lane.state, LaneState::Degraded);
    assert!(lane.next_retry_at.is_some());

    // Rewind the scheduled wake-up into the past.
    let repo = SyncLaneRepository::new(db.clone());
    let mut snapshot = lane.clone();
    snapshot.next_retry_at = Some(Utc::now() - chrono::Duration::minutes(1));
    repo.upsert(&snapshot).await.unwrap();

    // The scheduler poll picks the degraded lane up.
    let due = repo.find_due_retries().await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].state, "degraded");

    // A fresh orchestrator (restart) agrees, and an operator can reset it.
    let orch = orchestrator_for(&db);
    assert!(orch.is_retry_due("42", MessageKind::Inventory).await.unwrap());
    let state = orch.manual_reset("42", MessageKind::Inventory).await.unwrap();
    assert_eq!(state, LaneState::Pending);
}

#[tokio::test]
async fn test_distinct_payloads_are_not_duplicates() {
    let db = setup_db().await;
    let orch = orchestrator_for(&db);

    let first = dispatch("42", MessageKind::Restrictions, "<RestrictionNotif day=\"1\"/>");
    let second = dispatch("42", MessageKind::Restrictions, "<RestrictionNotif day=\"2\"/>");

    assert!(!orch.begin_dispatch(first).await.unwrap().is_duplicate);
    assert!(!orch.begin_dispatch(second).await.unwrap().is_duplicate);
}
