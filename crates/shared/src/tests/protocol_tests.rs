use serde_json::json;

use crate::{
    domain::{BatchId, BatchStatus, ValidationStatus},
    error::{SchemaViolation, ServiceErrorBody},
    protocol::{BatchJob, HealthStatus},
};

fn completed_payload() -> serde_json::Value {
    json!({
        "batch_id": "5f0c6a2e-3d1b-4d8e-9a8f-1f2e3d4c5b6a",
        "status": "COMPLETED",
        "total_merchants": 2,
        "processed_merchants": 2,
        "created_at": "2024-03-01T10:15:30.123456",
        "completed_at": "2024-03-01T10:16:02.000001",
        "results": [
            {
                "search_query": "name: Corner Bakery",
                "validation_status": "VALID",
                "risk_assessment": {
                    "risk_score": 12.5,
                    "risk_level": "LOW",
                    "risk_factors": [],
                    "recommendations": ["No action required"]
                },
                "merchant_info": {
                    "place_id": "abc",
                    "name": "Corner Bakery",
                    "address": "1 Main St, Springfield",
                    "rating": 4.5,
                    "types": ["bakery"],
                    "location": {"lat": 1.0, "lng": 2.0},
                    "photos": []
                },
                "timestamp": "2024-03-01T10:15:40"
            },
            {
                "search_query": "name: Ghost Shop",
                "validation_status": "ERROR",
                "risk_assessment": {"risk_score": 100, "risk_level": "CRITICAL"},
                "merchant_info": null,
                "cnpj_comparison": {"cnpj_found": false}
            }
        ]
    })
}

#[test]
fn decodes_completed_snapshot_with_naive_timestamps_and_extra_fields() {
    let job: BatchJob = serde_json::from_value(completed_payload()).expect("decode");
    let job = job.into_validated().expect("valid");

    assert_eq!(job.status, BatchStatus::Completed);
    assert_eq!(job.results().len(), 2);
    assert_eq!(job.created_at.to_rfc3339(), "2024-03-01T10:15:30.123456+00:00");
    assert!(job.completed_at.is_some());
    assert_eq!(job.results()[1].validation_status, ValidationStatus::Error);
    assert!(job.results()[1].merchant_info.is_none());
    assert!(job.results()[1].cnpj_comparison.is_some());
    assert_eq!(
        job.results()[0].merchant_info.as_ref().and_then(|m| m.rating),
        Some(4.5)
    );
}

#[test]
fn rejects_unknown_status_values() {
    let mut payload = completed_payload();
    payload["status"] = json!("DONE");
    assert!(serde_json::from_value::<BatchJob>(payload).is_err());
}

#[test]
fn rejects_missing_required_fields() {
    let mut payload = completed_payload();
    payload
        .as_object_mut()
        .expect("object")
        .remove("total_merchants");
    assert!(serde_json::from_value::<BatchJob>(payload).is_err());
}

#[test]
fn rejects_completed_job_with_wrong_result_count() {
    let mut payload = completed_payload();
    payload["total_merchants"] = json!(3);
    payload["processed_merchants"] = json!(3);
    let job: BatchJob = serde_json::from_value(payload).expect("decode");
    assert_eq!(
        job.into_validated().expect_err("must fail"),
        SchemaViolation::ResultCountMismatch {
            expected: 3,
            actual: 2
        }
    );
}

#[test]
fn rejects_progress_beyond_total() {
    let job: BatchJob = serde_json::from_value(json!({
        "batch_id": "b-1",
        "status": "PROCESSING",
        "total_merchants": 2,
        "processed_merchants": 3,
        "created_at": "2024-03-01T10:15:30Z"
    }))
    .expect("decode");
    assert_eq!(
        job.into_validated().expect_err("must fail"),
        SchemaViolation::ProcessedExceedsTotal {
            processed: 3,
            total: 2
        }
    );
}

#[test]
fn rejects_out_of_range_risk_score() {
    let mut payload = completed_payload();
    payload["results"][0]["risk_assessment"]["risk_score"] = json!(140.0);
    let job: BatchJob = serde_json::from_value(payload).expect("decode");
    assert!(matches!(
        job.into_validated(),
        Err(SchemaViolation::RiskScoreOutOfRange { index: 0, .. })
    ));
}

#[test]
fn accepts_failed_job_without_completed_at_and_drops_empty_results() {
    let job: BatchJob = serde_json::from_value(json!({
        "batch_id": "b-2",
        "status": "FAILED",
        "total_merchants": 4,
        "processed_merchants": 1,
        "created_at": "2024-03-01T10:15:30",
        "completed_at": null,
        "results": []
    }))
    .expect("decode");
    let job = job.into_validated().expect("valid");
    assert!(job.results.is_none());
    assert!(job.is_terminal());
}

#[test]
fn rejects_completed_at_on_running_job() {
    let job: BatchJob = serde_json::from_value(json!({
        "batch_id": "b-3",
        "status": "PROCESSING",
        "total_merchants": 4,
        "processed_merchants": 1,
        "created_at": "2024-03-01T10:15:30",
        "completed_at": "2024-03-01T10:16:30"
    }))
    .expect("decode");
    assert!(matches!(
        job.into_validated(),
        Err(SchemaViolation::UnexpectedCompletedAt { .. })
    ));
}

#[test]
fn status_transitions_only_move_forward() {
    use BatchStatus::*;

    assert!(Pending.can_advance_to(Pending));
    assert!(Pending.can_advance_to(Processing));
    assert!(Pending.can_advance_to(Failed));
    assert!(Processing.can_advance_to(Completed));
    assert!(!Processing.can_advance_to(Pending));
    assert!(!Completed.can_advance_to(Processing));
    assert!(!Completed.can_advance_to(Failed));
    assert!(Failed.can_advance_to(Failed));
}

#[test]
fn progress_handles_empty_batches() {
    let mut job: BatchJob = serde_json::from_value(json!({
        "batch_id": "b-4",
        "status": "PENDING",
        "total_merchants": 0,
        "processed_merchants": 0,
        "created_at": "2024-03-01T10:15:30"
    }))
    .expect("decode");
    assert_eq!(job.progress_percent(), 0);
    job.status = BatchStatus::Completed;
    assert_eq!(job.progress_percent(), 100);

    job.total_merchants = 3;
    job.processed_merchants = 2;
    job.status = BatchStatus::Processing;
    assert_eq!(job.progress_percent(), 67);
}

#[test]
fn short_batch_id_takes_eight_characters() {
    assert_eq!(BatchId::new("5f0c6a2e-3d1b").short(), "5f0c6a2e");
    assert_eq!(BatchId::new("abc").short(), "abc");
}

#[test]
fn error_body_message_handles_structured_detail() {
    let body: ServiceErrorBody =
        serde_json::from_value(json!({"detail": "File must be a CSV"})).expect("decode");
    assert_eq!(body.message(), "File must be a CSV");

    let body: ServiceErrorBody =
        serde_json::from_value(json!({"detail": [{"loc": ["body"], "msg": "field required"}]}))
            .expect("decode");
    assert!(body.message().contains("field required"));
}

#[test]
fn health_status_tolerates_missing_optional_fields() {
    let health: HealthStatus =
        serde_json::from_value(json!({"status": "healthy"})).expect("decode");
    assert_eq!(health.status, "healthy");
    assert!(health.timestamp.is_none());
}
