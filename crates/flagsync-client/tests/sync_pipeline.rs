//! End-to-end synchronization pipeline tests against mock HTTP servers

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signer, SigningKey};
use flagsync_client::{
    ConfigurationSync, Ed25519Verifier, FetchSource, Fetcher, RoxyFetcher, SdkSettings,
    SignatureVerifier, SyncOutcome, SyncSettings,
};
use flagsync_core::{
    ConfigurationFetchedArgs, ConfigurationFetchedInvoker, FetcherError, FetcherStatus,
    NoopReporter, StaticPropertySource,
};
use rand::rngs::OsRng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const APP_KEY: &str = "5e579ecfc45c395c43b42893";
const BUID: &str = "buid-1";

const DOCUMENT: &str = r#"{"application":"5e579ecfc45c395c43b42893","experiments":[{"_id":"exp1","name":"login button","deploymentConfiguration":{"condition":"true"},"featureFlags":[{"name":"login.color"}]},{"_id":"exp2","name":"empty"}],"targetGroups":[{"_id":"tg1","condition":"false"}]}"#;

fn signed_envelope(signing: &SigningKey, document: &str) -> String {
    let signature = BASE64.encode(signing.sign(document.as_bytes()).to_bytes());
    serde_json::json!({
        "data": document,
        "signature_v0": signature,
        "signed_date": "2026-08-30T12:00:00Z"
    })
    .to_string()
}

/// Handler recording every notification it observes
#[derive(Debug, Default)]
struct RecordingHandler {
    events: Mutex<Vec<ConfigurationFetchedArgs>>,
}

impl RecordingHandler {
    fn record_into(self: &Arc<Self>, invoker: &Arc<ConfigurationFetchedInvoker>) {
        let this = Arc::clone(self);
        invoker.register_handler(Arc::new(move |args: &ConfigurationFetchedArgs| {
            this.events.lock().unwrap().push(args.clone());
        }));
    }

    fn events(&self) -> Vec<ConfigurationFetchedArgs> {
        self.events.lock().unwrap().clone()
    }
}

struct TestPipeline {
    sync: ConfigurationSync,
    handler: Arc<RecordingHandler>,
    _signing: SigningKey,
}

async fn network_pipeline(cdn: &MockServer, api: &MockServer, signing: SigningKey) -> TestPipeline {
    pipeline_at(cdn.uri(), api.uri(), signing).await
}

async fn pipeline_at(cdn_uri: String, api_uri: String, signing: SigningKey) -> TestPipeline {
    let verifier = Ed25519Verifier::new(signing.verifying_key().as_bytes()).unwrap();
    let sdk = SdkSettings::new(APP_KEY).unwrap();
    let settings = SyncSettings::new(BUID)
        .with_cdn_base(cdn_uri)
        .with_api_base(api_uri)
        .with_timeout(Duration::from_millis(500));

    let sync = ConfigurationSync::new(
        sdk,
        settings,
        Arc::new(StaticPropertySource::new("device-1").with_property("platform", "linux")),
        Arc::new(verifier),
        Arc::new(NoopReporter),
    )
    .unwrap();

    let handler = Arc::new(RecordingHandler::default());
    handler.record_into(sync.invoker());

    TestPipeline {
        sync,
        handler,
        _signing: signing,
    }
}

fn signing_key() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

#[tokio::test]
async fn round_trip_applies_cdn_snapshot() {
    let cdn = MockServer::start().await;
    let api = MockServer::start().await;
    let signing = signing_key();

    Mock::given(method("GET"))
        .and(path(format!("/{APP_KEY}/{BUID}")))
        .and(query_param("distinct_id", "device-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(signed_envelope(&signing, DOCUMENT)))
        .expect(1)
        .mount(&cdn)
        .await;

    let pipeline = network_pipeline(&cdn, &api, signing).await;
    let outcome = pipeline.sync.sync().await;

    assert_eq!(
        outcome,
        SyncOutcome::Applied {
            status: FetcherStatus::AppliedFromNetwork,
            has_changes: true,
        }
    );

    let config = pipeline.sync.store().current().unwrap();
    assert_eq!(config.experiments.len(), 2);
    assert_eq!(config.experiments[0].id, "exp1");
    assert_eq!(config.experiments[1].id, "exp2");
    assert_eq!(config.target_groups.len(), 1);
    assert_eq!(config.target_groups[0].id, "tg1");
    assert!(config.signed_at.is_some());

    let events = pipeline.handler.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].fetcher_status, FetcherStatus::AppliedFromNetwork);
    assert_eq!(events[0].error_details, FetcherError::NoError);
    assert!(events[0].has_changes);
    assert!(events[0].creation_date.is_some());
}

#[tokio::test]
async fn cdn_not_found_falls_back_to_exactly_one_api_request() {
    let cdn = MockServer::start().await;
    let api = MockServer::start().await;
    let signing = signing_key();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&cdn)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/{APP_KEY}/{BUID}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(signed_envelope(&signing, DOCUMENT)))
        .expect(1)
        .mount(&api)
        .await;

    let pipeline = network_pipeline(&cdn, &api, signing).await;
    let outcome = pipeline.sync.sync().await;

    assert!(matches!(outcome, SyncOutcome::Applied { .. }));
    let events = pipeline.handler.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].fetcher_status, FetcherStatus::AppliedFromNetwork);
}

#[tokio::test]
async fn cdn_forbidden_falls_back_to_api() {
    let cdn = MockServer::start().await;
    let api = MockServer::start().await;
    let signing = signing_key();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&cdn)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(signed_envelope(&signing, DOCUMENT)))
        .expect(1)
        .mount(&api)
        .await;

    let pipeline = network_pipeline(&cdn, &api, signing).await;
    assert!(matches!(pipeline.sync.sync().await, SyncOutcome::Applied { .. }));
}

#[tokio::test]
async fn cdn_internal_not_found_marker_triggers_fallback() {
    let cdn = MockServer::start().await;
    let api = MockServer::start().await;
    let signing = signing_key();

    // HTTP 200 but the body carries the service's own not-found marker.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"result": 404}"#))
        .mount(&cdn)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(signed_envelope(&signing, DOCUMENT)))
        .expect(1)
        .mount(&api)
        .await;

    let pipeline = network_pipeline(&cdn, &api, signing).await;
    assert!(matches!(pipeline.sync.sync().await, SyncOutcome::Applied { .. }));
}

#[tokio::test]
async fn both_sources_failing_notifies_exactly_once() {
    let cdn = MockServer::start().await;
    let api = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&cdn)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&api)
        .await;

    let pipeline = network_pipeline(&cdn, &api, signing_key()).await;
    assert_eq!(pipeline.sync.sync().await, SyncOutcome::Failed);
    assert!(pipeline.sync.store().current().is_none());

    let events = pipeline.handler.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].fetcher_status, FetcherStatus::ErrorFetchedFailed);
    assert_eq!(events[0].error_details, FetcherError::NetworkError);
}

#[tokio::test]
async fn rejected_signature_yields_single_verification_error() {
    let cdn = MockServer::start().await;
    let api = MockServer::start().await;

    // Envelope signed with a key the verifier does not trust.
    let attacker = signing_key();
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(signed_envelope(&attacker, DOCUMENT)),
        )
        .mount(&cdn)
        .await;

    let pipeline = network_pipeline(&cdn, &api, signing_key()).await;
    assert_eq!(pipeline.sync.sync().await, SyncOutcome::Failed);
    assert!(pipeline.sync.store().current().is_none());

    let events = pipeline.handler.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].error_details, FetcherError::SignatureVerification);
}

#[tokio::test]
async fn app_key_mismatch_is_reported() {
    let cdn = MockServer::start().await;
    let api = MockServer::start().await;
    let signing = signing_key();

    let foreign_document =
        r#"{"application":"someone-elses-app","experiments":[],"targetGroups":[]}"#;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(signed_envelope(&signing, foreign_document)),
        )
        .mount(&cdn)
        .await;

    let pipeline = network_pipeline(&cdn, &api, signing).await;
    assert_eq!(pipeline.sync.sync().await, SyncOutcome::Failed);

    let events = pipeline.handler.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].error_details, FetcherError::MismatchAppKey);
}

#[tokio::test]
async fn corrupt_payload_is_reported() {
    let cdn = MockServer::start().await;
    let api = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&cdn)
        .await;

    let pipeline = network_pipeline(&cdn, &api, signing_key()).await;
    assert_eq!(pipeline.sync.sync().await, SyncOutcome::Failed);
    assert_eq!(
        pipeline.handler.events()[0].error_details,
        FetcherError::CorruptPayload
    );
}

#[tokio::test]
async fn timed_out_attempts_classify_as_network_error() {
    let cdn = MockServer::start().await;
    let api = MockServer::start().await;
    let signing = signing_key();

    let slow = ResponseTemplate::new(200)
        .set_body_string(signed_envelope(&signing, DOCUMENT))
        .set_delay(Duration::from_secs(5));
    Mock::given(method("GET")).respond_with(slow.clone()).mount(&cdn).await;
    Mock::given(method("POST")).respond_with(slow).mount(&api).await;

    let pipeline = network_pipeline(&cdn, &api, signing).await;
    assert_eq!(pipeline.sync.sync().await, SyncOutcome::Failed);

    let events = pipeline.handler.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].error_details, FetcherError::NetworkError);
}

#[tokio::test]
async fn cdn_stalled_body_falls_back_to_api() {
    let api = MockServer::start().await;
    let signing = signing_key();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(signed_envelope(&signing, DOCUMENT)))
        .expect(1)
        .mount(&api)
        .await;

    // A raw socket that sends headers, a fragment of the promised body and
    // then stalls, so the failure happens while reading the body rather
    // than while sending the request.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let cdn_uri = format!("http://{}", listener.local_addr().unwrap());
    std::thread::spawn(move || {
        use std::io::{Read, Write};
        if let Ok((mut stream, _)) = listener.accept() {
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request);
            let _ = stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 4096\r\n\r\n{\"data\":");
            let _ = stream.flush();
            std::thread::sleep(Duration::from_secs(2));
        }
    });

    let pipeline = pipeline_at(cdn_uri, api.uri(), signing).await;
    let outcome = pipeline.sync.sync().await;

    assert!(matches!(outcome, SyncOutcome::Applied { .. }));
    let events = pipeline.handler.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].fetcher_status, FetcherStatus::AppliedFromNetwork);
}

fn roxy_fixture(server_uri: &str) -> (RoxyFetcher, Arc<ConfigurationFetchedInvoker>, Arc<AtomicUsize>) {
    let invoker = Arc::new(ConfigurationFetchedInvoker::new(Arc::new(NoopReporter)));
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = Arc::clone(&calls);
    invoker.register_handler(Arc::new(move |args: &ConfigurationFetchedArgs| {
        assert!(args.error_details.is_error());
        calls_clone.fetch_add(1, Ordering::SeqCst);
    }));

    let sdk = SdkSettings::new(APP_KEY)
        .unwrap()
        .with_dev_mode_secret("dev-secret");
    let settings = SyncSettings::new(BUID)
        .with_roxy_url(server_uri)
        .with_timeout(Duration::from_millis(500));
    let fetcher = RoxyFetcher::new(
        sdk,
        &settings,
        Arc::new(StaticPropertySource::new("device-1")),
        Arc::clone(&invoker),
    )
    .unwrap();

    (fetcher, invoker, calls)
}

#[tokio::test]
async fn roxy_success_returns_raw_body_without_notification() {
    let roxy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("app_key", APP_KEY))
        .and(query_param("distinct_id", "device-1"))
        .and(query_param("devModeSecret", "dev-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"a":"harti"}"#))
        .expect(1)
        .mount(&roxy)
        .await;

    let (fetcher, _invoker, handler_calls) = roxy_fixture(&roxy.uri());
    let result = fetcher.fetch().await.unwrap();

    assert_eq!(result.source, FetchSource::Roxy);
    let parsed: serde_json::Value = serde_json::from_str(&result.body).unwrap();
    assert_eq!(parsed, serde_json::json!({"a": "harti"}));
    assert_eq!(handler_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn roxy_not_found_notifies_once() {
    let roxy = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&roxy)
        .await;

    let (fetcher, _invoker, handler_calls) = roxy_fixture(&roxy.uri());
    assert!(fetcher.fetch().await.is_none());
    assert_eq!(handler_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn roxy_pipeline_applies_plain_document() {
    let roxy = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"experiments":[{"_id":"dev-exp","name":"local"}],"targetGroups":[]}"#,
        ))
        .mount(&roxy)
        .await;

    // The Roxy path never consults a signature verifier; wiring one that
    // rejects everything proves it is bypassed.
    #[derive(Debug)]
    struct RejectAll;
    impl SignatureVerifier for RejectAll {
        fn verify(&self, _payload: &[u8], _signature_b64: &str) -> bool {
            false
        }
    }

    let sdk = SdkSettings::new(APP_KEY).unwrap();
    let settings = SyncSettings::new(BUID)
        .with_roxy_url(roxy.uri())
        .with_timeout(Duration::from_millis(500));
    let sync = ConfigurationSync::new(
        sdk,
        settings,
        Arc::new(StaticPropertySource::new("device-1")),
        Arc::new(RejectAll),
        Arc::new(NoopReporter),
    )
    .unwrap();

    let handler = Arc::new(RecordingHandler::default());
    handler.record_into(sync.invoker());

    let outcome = sync.sync().await;
    assert_eq!(
        outcome,
        SyncOutcome::Applied {
            status: FetcherStatus::AppliedFromRoxy,
            has_changes: true,
        }
    );
    assert_eq!(
        sync.store().current().unwrap().experiment("dev-exp").unwrap().name,
        "local"
    );

    let events = handler.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].fetcher_status, FetcherStatus::AppliedFromRoxy);
    assert_eq!(events[0].creation_date, None);
}

#[tokio::test]
async fn second_sync_with_same_document_reports_no_changes() {
    let cdn = MockServer::start().await;
    let api = MockServer::start().await;
    let signing = signing_key();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(signed_envelope(&signing, DOCUMENT)))
        .mount(&cdn)
        .await;

    let pipeline = network_pipeline(&cdn, &api, signing).await;
    pipeline.sync.sync().await;
    let outcome = pipeline.sync.sync().await;

    assert_eq!(
        outcome,
        SyncOutcome::Applied {
            status: FetcherStatus::AppliedFromNetwork,
            has_changes: false,
        }
    );

    let events = pipeline.handler.events();
    assert_eq!(events.len(), 2);
    assert!(events[0].has_changes);
    assert!(!events[1].has_changes);
}
