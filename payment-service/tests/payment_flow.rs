mod support;

use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use common_security::{Principal, RoleSet};
use payment_service::dto::PaymentRequest;
use payment_service::gateway::{ProcessorOutcome, Verdict};
use payment_service::repo::PaymentStore;
use payment_service::{PaymentError, PaymentStatus};
use support::{approved, declined, unavailable, CountingStore, Harness, RecordingPublisher, ScriptedGateway};

fn user(id: &str) -> Principal { Principal::new(id, RoleSet::parse(Some("ROLE_USER"))) }

fn request(user_id: &str) -> PaymentRequest {
    PaymentRequest {
        payment_method_token: "pm_card_4242".into(),
        amount: BigDecimal::from_str("100.50").unwrap(),
        currency: "USD".into(),
        order_id: "O1".into(),
        user_id: user_id.into(),
        description: Some("test order".into()),
    }
}

#[tokio::test]
async fn approved_submission_is_saved_once_as_success() {
    let h = Harness::new(ScriptedGateway::new(vec![approved("tx_1")]));
    let resp = h.engine.process_payment(request("U1"), &user("U1")).await.unwrap();

    assert_eq!(resp.status, PaymentStatus::Success);
    assert_eq!(resp.processor_transaction_id.as_deref(), Some("tx_1"));
    assert!(resp.error_code.is_none() && resp.error_message.is_none());
    assert_eq!(resp.amount.to_string(), "100.50");
    assert_eq!(h.store.saves(), 1);
    assert!(h.publisher.published().is_empty(), "sync path emits no event");
}

#[tokio::test]
async fn declined_submission_keeps_transaction_id() {
    let h = Harness::new(ScriptedGateway::new(vec![declined("tx_2")]));
    let resp = h.engine.process_payment(request("U1"), &user("U1")).await.unwrap();

    assert_eq!(resp.status, PaymentStatus::Failed);
    assert_eq!(resp.processor_transaction_id.as_deref(), Some("tx_2"));
    assert!(resp.error_code.is_none());
}

#[tokio::test]
async fn processor_error_is_recorded_not_raised() {
    let h = Harness::new(ScriptedGateway::new(vec![unavailable()]));
    let resp = h.engine.process_payment(request("U1"), &user("U1")).await.unwrap();

    assert_eq!(resp.status, PaymentStatus::Failed);
    assert_eq!(resp.error_code.as_deref(), Some("API_ERROR"));
    assert_eq!(resp.error_message.as_deref(), Some("External API unavailable"));
    assert!(resp.processor_transaction_id.is_none());
    assert_eq!(h.store.saves(), 1);

    let stored = h.store.find_by_id(resp.id.as_deref().unwrap()).await.unwrap().unwrap();
    assert_eq!(stored.status(), PaymentStatus::Failed);
}

#[tokio::test]
async fn failed_save_is_overwritten_by_a_failure_record() {
    let h = Harness::with_parts(ScriptedGateway::new(vec![approved("tx_3")]), CountingStore::failing_first(1), RecordingPublisher::new());
    let resp = h.engine.process_payment(request("U1"), &user("U1")).await.unwrap();

    assert_eq!(h.store.saves(), 2);
    assert_eq!(resp.status, PaymentStatus::Failed);
    assert_eq!(resp.error_code.as_deref(), Some("API_ERROR"));
    assert_eq!(resp.error_message.as_deref(), Some("Database error"));
}

#[tokio::test]
async fn second_save_failure_surfaces() {
    let h = Harness::with_parts(ScriptedGateway::new(vec![approved("tx_4")]), CountingStore::failing_first(2), RecordingPublisher::new());
    let err = h.engine.process_payment(request("U1"), &user("U1")).await.unwrap_err();
    assert!(matches!(err, PaymentError::Store(_)));
}

#[tokio::test]
async fn foreign_submission_never_reaches_processor() {
    let h = Harness::new(ScriptedGateway::approving());
    let err = h.engine.process_payment(request("U2"), &user("U1")).await.unwrap_err();

    match err {
        PaymentError::Unauthorized(denied) => assert_eq!(denied.message, "You are not authorized to perform this payment!"),
        other => panic!("expected access denial, got {other:?}"),
    }
    assert_eq!(h.gateway.calls(), 0);
    assert_eq!(h.store.saves(), 0);
}

#[tokio::test]
async fn admin_may_submit_for_anyone() {
    let h = Harness::new(ScriptedGateway::approving());
    let admin = Principal::new("A1", RoleSet::parse(Some("ROLE_ADMIN")));
    let resp = h.engine.process_payment(request("U2"), &admin).await.unwrap();
    assert_eq!(resp.user_id, "U2");
}

#[tokio::test]
async fn invalid_request_is_rejected_before_processing() {
    let h = Harness::new(ScriptedGateway::approving());
    let mut req = request("U1");
    req.currency = "usd".into();
    let err = h.engine.process_payment(req, &user("U1")).await.unwrap_err();
    assert!(matches!(err, PaymentError::Validation { code: "invalid_currency", .. }));
    assert_eq!(h.gateway.calls(), 0);
}

#[tokio::test]
async fn classifier_is_pluggable() {
    let h = Harness::new(ScriptedGateway::new(vec![declined("tx_odd")]));
    let approve_all = |_: &ProcessorOutcome| Verdict::Approved;
    let engine = payment_service::PaymentEngine::new(h.store.clone(), h.gateway.clone(), h.publisher.clone())
        .with_classifier(Arc::new(approve_all));
    let resp = engine.process_payment(request("U1"), &user("U1")).await.unwrap();
    assert_eq!(resp.status, PaymentStatus::Success);
}

#[tokio::test]
async fn metrics_count_terminal_outcomes() {
    let h = Harness::new(ScriptedGateway::new(vec![approved("a"), unavailable()]));
    h.engine.process_payment(request("U1"), &user("U1")).await.unwrap();
    h.engine.process_payment(request("U1"), &user("U1")).await.unwrap();

    let m = &h.metrics;
    assert_eq!(m.payments_processed.with_label_values(&["sync", "SUCCESS"]).get(), 1);
    assert_eq!(m.payments_processed.with_label_values(&["sync", "FAILED"]).get(), 1);
    assert_eq!(m.gateway_errors.with_label_values(&["transient"]).get(), 1);
}
