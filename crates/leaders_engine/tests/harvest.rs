use std::sync::{Arc, Mutex};

use leaders_core::{CountryStage, LeaderAggregate, LeaderRecord, NO_PARAGRAPH_SENTINEL};
use leaders_engine::{
    AggregateSink, ClientSettings, HarvestEngine, HarvestError, HarvestEvent, HarvestSettings,
    PersistError, ProgressSink, SessionClient,
};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Clone, Default)]
struct RecordingSink {
    snapshots: Arc<Mutex<Vec<Value>>>,
}

impl RecordingSink {
    fn snapshots(&self) -> Vec<Value> {
        self.snapshots.lock().unwrap().clone()
    }
}

impl AggregateSink for RecordingSink {
    fn persist(&self, aggregate: &LeaderAggregate) -> Result<(), PersistError> {
        let value = serde_json::to_value(aggregate)?;
        self.snapshots.lock().unwrap().push(value);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct RecordingProgress {
    events: Arc<Mutex<Vec<HarvestEvent>>>,
}

impl RecordingProgress {
    fn stages(&self, country: &str) -> Vec<CountryStage> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                HarvestEvent::Stage { country: c, stage } if c == country => Some(*stage),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn emit(&self, event: HarvestEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn init_logging() {
    harvest_logging::initialize_for_tests();
}

fn engine_for(server: &MockServer, sink: RecordingSink) -> HarvestEngine {
    let session = SessionClient::new(&server.uri(), ClientSettings::default()).unwrap();
    HarvestEngine::new(session, sink)
}

async fn mount_cookie(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/cookie"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "user_cookie=ok; Path=/"))
        .mount(server)
        .await;
}

async fn mount_countries(server: &MockServer, countries: Value) {
    Mock::given(method("GET"))
        .and(path("/countries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(countries))
        .mount(server)
        .await;
}

async fn mount_leaders(server: &MockServer, country: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/leaders"))
        .and(query_param("country", country))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, page: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/wiki/{page}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(html.to_string(), "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn run_enriches_leaders_and_omits_failed_country() {
    init_logging();
    let server = MockServer::start().await;
    mount_cookie(&server).await;
    mount_countries(&server, json!(["A", "B"])).await;
    mount_leaders(
        &server,
        "A",
        ResponseTemplate::new(200).set_body_json(json!([
            { "first_name": "Ada", "wikipedia_url": format!("{}/wiki/Ada", server.uri()) },
            { "first_name": "Nemo" }
        ])),
    )
    .await;
    mount_leaders(&server, "B", ResponseTemplate::new(403)).await;
    mount_page(
        &server,
        "Ada",
        "<html><body><p>Intro without bold.</p><p><b>Ada</b> was a leader (1900–1950) [1] .</p></body></html>",
    )
    .await;

    let sink = RecordingSink::default();
    let progress = RecordingProgress::default();
    let mut engine = engine_for(&server, sink.clone()).with_progress(progress.clone());
    let report = engine.run().await.unwrap();

    let snapshots = sink.snapshots();
    assert_eq!(snapshots.len(), 1);
    let output = &snapshots[0];
    assert_eq!(output.as_object().unwrap().len(), 1);
    assert!(output.get("B").is_none());
    assert_eq!(output["A"][0]["biography_intro"], "Ada was a leader.");
    assert!(output["A"][1].get("biography_intro").is_none());

    assert_eq!(report.stage("A"), Some(CountryStage::Persisted));
    assert_eq!(report.stage("B"), Some(CountryStage::Skipped));
    assert_eq!(report.leaders(), 2);
    assert_eq!(report.biographies_found(), 1);
    assert_eq!(
        progress.stages("A"),
        vec![
            CountryStage::LeadersFetched,
            CountryStage::Enriched,
            CountryStage::Persisted
        ]
    );
    assert_eq!(progress.stages("B"), vec![CountryStage::Skipped]);
}

#[tokio::test]
async fn expired_token_triggers_one_reauth_and_retry_with_new_token() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cookie"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "user_cookie=first"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cookie"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "user_cookie=second"))
        .expect(1)
        .mount(&server)
        .await;
    mount_countries(&server, json!(["be"])).await;
    Mock::given(method("GET"))
        .and(path("/leaders"))
        .and(header("cookie", "user_cookie=first"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/leaders"))
        .and(query_param("country", "be"))
        .and(header("cookie", "user_cookie=second"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "first_name": "Charles" }])))
        .expect(1)
        .mount(&server)
        .await;

    let sink = RecordingSink::default();
    let mut engine = engine_for(&server, sink.clone());
    engine.run().await.unwrap();

    assert_eq!(engine.session().token().get("user_cookie"), Some("second"));
    let snapshots = sink.snapshots();
    assert_eq!(
        snapshots.last().unwrap(),
        &json!({ "be": [{ "first_name": "Charles" }] })
    );
}

#[tokio::test]
async fn second_forbidden_answer_skips_country_without_more_reauth() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cookie"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "user_cookie=x"))
        .expect(2)
        .mount(&server)
        .await;
    mount_countries(&server, json!(["fr"])).await;
    Mock::given(method("GET"))
        .and(path("/leaders"))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&server)
        .await;

    let sink = RecordingSink::default();
    let mut engine = engine_for(&server, sink.clone());
    let report = engine.run().await.unwrap();

    assert_eq!(report.skipped().collect::<Vec<_>>(), vec!["fr"]);
    assert_eq!(sink.snapshots(), vec![json!({})]);
}

#[tokio::test]
async fn countries_outage_persists_empty_aggregate() {
    init_logging();
    let server = MockServer::start().await;
    mount_cookie(&server).await;
    Mock::given(method("GET"))
        .and(path("/countries"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let sink = RecordingSink::default();
    let mut engine = engine_for(&server, sink.clone());
    let report = engine.run().await.unwrap();

    assert_eq!(report.country_count(), 0);
    assert!(report.is_complete());
    assert_eq!(sink.snapshots(), vec![json!({})]);
}

#[tokio::test]
async fn countries_body_tolerates_unexpected_shapes() {
    init_logging();
    let server = MockServer::start().await;
    mount_countries(&server, json!(["us", 7, null, "ma"])).await;

    let engine = engine_for(&server, RecordingSink::default());
    assert_eq!(engine.fetch_countries().await, vec!["us", "ma"]);
}

#[tokio::test]
async fn aggregate_is_persisted_after_every_country() {
    init_logging();
    let server = MockServer::start().await;
    mount_cookie(&server).await;
    mount_countries(&server, json!(["us", "fr"])).await;
    mount_leaders(
        &server,
        "us",
        ResponseTemplate::new(200).set_body_json(json!([{ "first_name": "Joe" }])),
    )
    .await;
    mount_leaders(&server, "fr", ResponseTemplate::new(200).set_body_json(json!([]))).await;

    let sink = RecordingSink::default();
    let mut engine = engine_for(&server, sink.clone());
    engine.run().await.unwrap();

    assert_eq!(
        sink.snapshots(),
        vec![
            json!({ "us": [{ "first_name": "Joe" }] }),
            json!({ "us": [{ "first_name": "Joe" }], "fr": [] }),
        ]
    );
    assert_eq!(engine.aggregate().len(), 2);
}

#[tokio::test]
async fn unreadable_leaders_body_skips_country() {
    init_logging();
    let server = MockServer::start().await;
    mount_cookie(&server).await;
    mount_countries(&server, json!(["us", "ru"])).await;
    mount_leaders(&server, "us", ResponseTemplate::new(200).set_body_string("<html>")).await;
    mount_leaders(
        &server,
        "ru",
        ResponseTemplate::new(200).set_body_json(json!([{ "first_name": "Boris" }, "junk", 3])),
    )
    .await;

    let sink = RecordingSink::default();
    let mut engine = engine_for(&server, sink.clone());
    let report = engine.run().await.unwrap();

    assert_eq!(report.stage("us"), Some(CountryStage::Skipped));
    assert_eq!(
        sink.snapshots().last().unwrap(),
        &json!({ "ru": [{ "first_name": "Boris" }] })
    );
}

#[tokio::test]
async fn profile_failures_set_sentinel() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wiki/Missing"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_raw("<p><b>Missing</b> page text.</p>", "text/html"),
        )
        .mount(&server)
        .await;
    mount_page(&server, "Plain", "<p>No bold anywhere.</p>").await;

    let engine = engine_for(&server, RecordingSink::default());
    let cases = [
        json!({ "wikipedia_url": format!("{}/wiki/Missing", server.uri()) }),
        json!({ "wikipedia_url": format!("{}/wiki/Plain", server.uri()) }),
        json!({ "wikipedia_url": null }),
        json!({ "wikipedia_url": "" }),
    ];
    for case in cases {
        let mut leader = LeaderRecord::from_value(case).unwrap();
        assert_eq!(engine.enrich_leader(&mut leader).await, Some(false));
        assert_eq!(
            leader.get("biography_intro"),
            Some(&Value::String(NO_PARAGRAPH_SENTINEL.to_string()))
        );
    }
}

#[tokio::test]
async fn leader_without_profile_field_is_untouched() {
    init_logging();
    let server = MockServer::start().await;
    let engine = engine_for(&server, RecordingSink::default());

    let original = LeaderRecord::from_value(json!({ "first_name": "Nemo", "url": "x" })).unwrap();
    let mut leader = original.clone();
    assert_eq!(engine.enrich_leader(&mut leader).await, None);
    assert_eq!(leader, original);
}

#[tokio::test]
async fn custom_field_names_are_honoured() {
    init_logging();
    let server = MockServer::start().await;
    mount_page(&server, "Zed", "<p><b>Zed</b> governs .</p>").await;

    let settings = HarvestSettings {
        profile_url_field: "profile".to_string(),
        intro_field: "intro".to_string(),
    };
    let engine = engine_for(&server, RecordingSink::default()).with_settings(settings);
    let mut leader =
        LeaderRecord::from_value(json!({ "profile": format!("{}/wiki/Zed", server.uri()) }))
            .unwrap();
    assert_eq!(engine.enrich_leader(&mut leader).await, Some(true));
    assert_eq!(leader.get("intro"), Some(&json!("Zed governs.")));
    assert!(!leader.contains("biography_intro"));
}

#[tokio::test]
async fn unreachable_api_fails_the_run() {
    init_logging();
    let session = SessionClient::new("http://127.0.0.1:9", ClientSettings::default()).unwrap();
    let sink = RecordingSink::default();
    let mut engine = HarvestEngine::new(session, sink.clone());

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, HarvestError::Authenticate(_)));
    assert!(sink.snapshots().is_empty());
}

#[tokio::test]
async fn oversized_profile_page_sets_sentinel() {
    init_logging();
    let server = MockServer::start().await;
    mount_page(&server, "Long", "<p><b>Long</b> biography text.</p>").await;

    let settings = ClientSettings {
        max_bytes: 16,
        ..ClientSettings::default()
    };
    let session = SessionClient::new(&server.uri(), settings).unwrap();
    let engine = HarvestEngine::new(session, RecordingSink::default());
    let mut leader =
        LeaderRecord::from_value(json!({ "wikipedia_url": format!("{}/wiki/Long", server.uri()) }))
            .unwrap();

    assert_eq!(engine.enrich_leader(&mut leader).await, Some(false));
    assert_eq!(leader.get("biography_intro"), Some(&json!(NO_PARAGRAPH_SENTINEL)));
}
