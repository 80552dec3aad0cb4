//! Webhook Dispatcher integration tests against a local mock HTTP server.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hub_common::{
    EventDirection, IntegrationEvent, ManualClock, SystemClock, WebhookEndpoint,
    ENDPOINT_FAILURE_CEILING,
};
use hub_webhook::{
    verify_signature, EndpointRepository, InMemoryEndpointRepository, WebhookDispatcher,
    WebhookDispatcherConfig, WebhookEnvelope, SIGNATURE_HEADER,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn outbound_event(tenant: &str, event_type: &str) -> IntegrationEvent {
    IntegrationEvent::new(
        EventDirection::Outbound,
        tenant.into(),
        "conn-1".into(),
        event_type,
        serde_json::json!({"order_id": 42, "total": "129.90"}),
        Utc::now(),
    )
}

fn dispatcher(repo: Arc<InMemoryEndpointRepository>) -> WebhookDispatcher {
    WebhookDispatcher::new(repo, Arc::new(SystemClock), WebhookDispatcherConfig::default())
        .unwrap()
}

#[tokio::test]
async fn delivers_signed_envelope_to_subscribed_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let repo = Arc::new(InMemoryEndpointRepository::new());
    let endpoint = WebhookEndpoint::new(
        "tenant-a".into(),
        format!("{}/hook", server.uri()),
        vec![],
        Utc::now(),
    );
    let endpoint_id = endpoint.id.clone();
    let secret = endpoint.secret.clone();
    repo.insert(endpoint).await.unwrap();

    let event = outbound_event("tenant-a", "order.paid");
    let report = dispatcher(repo.clone()).deliver(&event).await.unwrap();
    assert_eq!(report.attempted, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 0);

    // The receiver can recompute and verify the signature over the exact body.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    let header_name: wiremock::http::HeaderName =
        SIGNATURE_HEADER.to_lowercase().parse().unwrap();
    let signature = request
        .headers
        .get(&header_name)
        .expect("signature header present")
        .last()
        .as_str()
        .to_string();
    assert!(verify_signature(&secret, &request.body, &signature));
    assert!(!verify_signature("whsec_wrong", &request.body, &signature));

    let envelope: WebhookEnvelope = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(envelope.event_type, "order.paid");
    assert_eq!(envelope.payload, event.payload);

    // Success bookkeeping: counter reset, trigger time stamped.
    let stored = repo.find(&"tenant-a".into(), &endpoint_id).await.unwrap().unwrap();
    assert_eq!(stored.consecutive_failures, 0);
    assert!(stored.last_triggered_at.is_some());
    assert!(stored.active);
}

#[tokio::test]
async fn non_success_response_counts_as_endpoint_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let repo = Arc::new(InMemoryEndpointRepository::new());
    let endpoint = WebhookEndpoint::new("tenant-a".into(), server.uri(), vec![], Utc::now());
    let endpoint_id = endpoint.id.clone();
    repo.insert(endpoint).await.unwrap();

    let report = dispatcher(repo.clone())
        .deliver(&outbound_event("tenant-a", "order.paid"))
        .await
        .unwrap();
    assert_eq!(report.failed, 1);

    let stored = repo.find(&"tenant-a".into(), &endpoint_id).await.unwrap().unwrap();
    assert_eq!(stored.consecutive_failures, 1);
    assert!(stored.active);
    assert!(stored.last_triggered_at.is_some());
}

#[tokio::test]
async fn timeout_counts_as_endpoint_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let repo = Arc::new(InMemoryEndpointRepository::new());
    let endpoint = WebhookEndpoint::new("tenant-a".into(), server.uri(), vec![], Utc::now());
    let endpoint_id = endpoint.id.clone();
    repo.insert(endpoint).await.unwrap();

    let dispatcher = WebhookDispatcher::new(
        repo.clone(),
        Arc::new(SystemClock),
        WebhookDispatcherConfig {
            connect_timeout: Duration::from_millis(500),
            request_timeout: Duration::from_millis(200),
        },
    )
    .unwrap();

    let report = dispatcher
        .deliver(&outbound_event("tenant-a", "order.paid"))
        .await
        .unwrap();
    assert_eq!(report.failed, 1);

    let stored = repo.find(&"tenant-a".into(), &endpoint_id).await.unwrap().unwrap();
    assert_eq!(stored.consecutive_failures, 1);
}

#[tokio::test]
async fn circuit_breaks_after_failure_ceiling() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(u64::from(ENDPOINT_FAILURE_CEILING))
        .mount(&server)
        .await;

    let repo = Arc::new(InMemoryEndpointRepository::new());
    let endpoint = WebhookEndpoint::new("tenant-a".into(), server.uri(), vec![], Utc::now());
    let endpoint_id = endpoint.id.clone();
    repo.insert(endpoint).await.unwrap();
    let dispatcher = dispatcher(repo.clone());

    for i in 1..ENDPOINT_FAILURE_CEILING {
        dispatcher
            .deliver(&outbound_event("tenant-a", "order.paid"))
            .await
            .unwrap();
        let stored = repo.find(&"tenant-a".into(), &endpoint_id).await.unwrap().unwrap();
        assert!(stored.active, "still active through failure {}", i);
    }

    // The tenth consecutive failure clears the active flag.
    dispatcher
        .deliver(&outbound_event("tenant-a", "order.paid"))
        .await
        .unwrap();
    let stored = repo.find(&"tenant-a".into(), &endpoint_id).await.unwrap().unwrap();
    assert!(!stored.active);
    assert_eq!(stored.consecutive_failures, ENDPOINT_FAILURE_CEILING);

    // A deactivated endpoint is never attempted again.
    let report = dispatcher
        .deliver(&outbound_event("tenant-a", "order.paid"))
        .await
        .unwrap();
    assert_eq!(report.attempted, 0);
}

#[tokio::test]
async fn subscription_filter_skips_non_matching_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let repo = Arc::new(InMemoryEndpointRepository::new());
    repo.insert(WebhookEndpoint::new(
        "tenant-a".into(),
        server.uri(),
        vec!["order.paid".to_string()],
        Utc::now(),
    ))
    .await
    .unwrap();

    // A non-matching event type is silently skipped, not a failure.
    let report = dispatcher(repo.clone())
        .deliver(&outbound_event("tenant-a", "order.refunded"))
        .await
        .unwrap();
    assert_eq!(report, hub_webhook::FanoutReport::default());
}

#[tokio::test]
async fn endpoint_failures_are_independent() {
    let good = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&good)
        .await;
    let bad = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&bad)
        .await;

    let repo = Arc::new(InMemoryEndpointRepository::new());
    let good_endpoint = WebhookEndpoint::new("tenant-a".into(), good.uri(), vec![], Utc::now());
    let bad_endpoint = WebhookEndpoint::new("tenant-a".into(), bad.uri(), vec![], Utc::now());
    let good_id = good_endpoint.id.clone();
    let bad_id = bad_endpoint.id.clone();
    repo.insert(good_endpoint).await.unwrap();
    repo.insert(bad_endpoint).await.unwrap();

    let report = dispatcher(repo.clone())
        .deliver(&outbound_event("tenant-a", "order.paid"))
        .await
        .unwrap();
    assert_eq!(report.attempted, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);

    let good_stored = repo.find(&"tenant-a".into(), &good_id).await.unwrap().unwrap();
    let bad_stored = repo.find(&"tenant-a".into(), &bad_id).await.unwrap().unwrap();
    assert_eq!(good_stored.consecutive_failures, 0);
    assert_eq!(bad_stored.consecutive_failures, 1);
}

#[tokio::test]
async fn fanout_is_scoped_to_the_events_tenant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let repo = Arc::new(InMemoryEndpointRepository::new());
    repo.insert(WebhookEndpoint::new("tenant-b".into(), server.uri(), vec![], Utc::now()))
        .await
        .unwrap();

    // Tenant A's event must never reach tenant B's endpoint.
    let report = dispatcher(repo)
        .deliver(&outbound_event("tenant-a", "order.paid"))
        .await
        .unwrap();
    assert_eq!(report.attempted, 0);
}

#[tokio::test]
async fn fanout_sends_one_body_signed_per_endpoint_secret() {
    let first = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&first)
        .await;
    let second = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&second)
        .await;

    let repo = Arc::new(InMemoryEndpointRepository::new());
    let first_endpoint = WebhookEndpoint::new("tenant-a".into(), first.uri(), vec![], Utc::now());
    let second_endpoint = WebhookEndpoint::new("tenant-a".into(), second.uri(), vec![], Utc::now());
    let first_secret = first_endpoint.secret.clone();
    let second_secret = second_endpoint.secret.clone();
    repo.insert(first_endpoint).await.unwrap();
    repo.insert(second_endpoint).await.unwrap();

    dispatcher(repo)
        .deliver(&outbound_event("tenant-a", "order.paid"))
        .await
        .unwrap();

    // The envelope is serialized once: both endpoints see the same bytes,
    // each signed with its own secret.
    let first_request = &first.received_requests().await.unwrap()[0];
    let second_request = &second.received_requests().await.unwrap()[0];
    assert_eq!(first_request.body, second_request.body);

    let header_name: wiremock::http::HeaderName =
        SIGNATURE_HEADER.to_lowercase().parse().unwrap();
    let first_sig = first_request.headers.get(&header_name).unwrap().last().as_str();
    let second_sig = second_request.headers.get(&header_name).unwrap().last().as_str();
    assert_ne!(first_sig, second_sig);
    assert!(verify_signature(&first_secret, &first_request.body, first_sig));
    assert!(verify_signature(&second_secret, &second_request.body, second_sig));
}

#[tokio::test]
async fn sent_at_comes_from_the_injected_clock() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let repo = Arc::new(InMemoryEndpointRepository::new());
    repo.insert(WebhookEndpoint::new("tenant-a".into(), server.uri(), vec![], Utc::now()))
        .await
        .unwrap();

    let frozen = Utc::now();
    let clock = Arc::new(ManualClock::new(frozen));
    let dispatcher =
        WebhookDispatcher::new(repo, clock, WebhookDispatcherConfig::default()).unwrap();
    dispatcher
        .deliver(&outbound_event("tenant-a", "order.paid"))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let envelope: WebhookEnvelope = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(envelope.sent_at, frozen);
}
