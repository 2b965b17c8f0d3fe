//! End-to-end bootstrap runs against a fake CouchDB + Kubernetes API

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use couchdb_bootstrap::common::config::REQUEST_TIMEOUT;
use couchdb_bootstrap::common::{Config, Credentials, Error, OrchestratorConfig};
use couchdb_bootstrap::coordinator::{
    build_client, AdminApi, Cardinality, CouchAdmin, MemberIdentity, StatefulSetClient,
};
use couchdb_bootstrap::{Bootstrap, Outcome, Phase};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// base64("admin:password")
const BASIC_AUTH: &str = "Basic YWRtaW46cGFzc3dvcmQ=";
const TOKEN: &str = "token-123";

#[derive(Default)]
struct Fake {
    unready_probes: u32,
    configured: bool,
    replicas: i64,
    status_code: Option<u16>,
    reject_action: Option<&'static str>,

    users_auth: Vec<Option<String>>,
    setup_auth: Vec<Option<String>>,
    setup_calls: Vec<Value>,
    status_calls: Vec<(String, String, Option<String>)>,
}

type Shared = Arc<Mutex<Fake>>;

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

async fn root(State(fake): State<Shared>) -> (StatusCode, Json<Value>) {
    let mut fake = fake.lock().unwrap();
    if fake.unready_probes > 0 {
        fake.unready_probes -= 1;
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({})));
    }
    (StatusCode::OK, Json(json!({ "couchdb": "Welcome" })))
}

async fn users(State(fake): State<Shared>, headers: HeaderMap) -> StatusCode {
    let mut fake = fake.lock().unwrap();
    fake.users_auth.push(header(&headers, "authorization"));
    if fake.configured {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn cluster_setup(
    State(fake): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut fake = fake.lock().unwrap();
    fake.setup_auth.push(header(&headers, "authorization"));
    let rejected = fake.reject_action.is_some_and(|a| body["action"] == a);
    fake.setup_calls.push(body);

    if rejected {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "setup_error" })),
        )
    } else {
        (StatusCode::CREATED, Json(json!({ "ok": true })))
    }
}

async fn statefulset_status(
    State(fake): State<Shared>,
    Path((namespace, name)): Path<(String, String)>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let mut fake = fake.lock().unwrap();
    fake.status_calls
        .push((namespace, name, header(&headers, "authorization")));

    if let Some(code) = fake.status_code {
        let code = StatusCode::from_u16(code).unwrap();
        return (code, Json(json!({ "kind": "Status", "code": code.as_u16() })));
    }
    (
        StatusCode::OK,
        Json(json!({
            "kind": "StatefulSet",
            "spec": { "replicas": fake.replicas, "serviceName": "couchdb-internal" }
        })),
    )
}

async fn serve(fake: Fake) -> (Shared, String) {
    let shared = Arc::new(Mutex::new(fake));
    let app = Router::new()
        .route("/", get(root))
        .route("/_users", get(users))
        .route("/_cluster_setup", post(cluster_setup))
        .route(
            "/apis/apps/v1/namespaces/:namespace/statefulsets/:name/status",
            get(statefulset_status),
        )
        .with_state(shared.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (shared, format!("http://{addr}"))
}

fn config(hostname: &str, base_url: &str) -> Config {
    Config {
        identity: MemberIdentity::resolve(hostname, None).unwrap(),
        headless_service: "couchdb-internal".into(),
        namespace: "databases".into(),
        credentials: Credentials::default(),
        service_url: base_url.to_string(),
        admin_url: base_url.to_string(),
        target_port: 5984,
        orchestrator: OrchestratorConfig {
            base_url: base_url.to_string(),
            token: Some(TOKEN.into()),
            ca_certificate: None,
        },
        request_timeout: REQUEST_TIMEOUT,
        readiness_interval: Duration::from_millis(10),
    }
}

fn bootstrap(config: Config) -> Bootstrap<CouchAdmin, StatefulSetClient> {
    let client = build_client(&config).unwrap();
    let admin = CouchAdmin::new(client.clone(), &config);
    let orchestrator = StatefulSetClient::new(client, &config);
    Bootstrap::new(config, admin, orchestrator)
}

fn peer(ordinal: u32) -> String {
    format!("couchdb-{ordinal}.couchdb-internal.databases.svc.cluster.local")
}

#[tokio::test]
async fn test_coordinator_forms_three_member_cluster() {
    let (fake, url) = serve(Fake {
        unready_probes: 2,
        replicas: 3,
        ..Default::default()
    })
    .await;
    let bootstrap = bootstrap(config("couchdb-2", &url));

    let outcome = bootstrap.run().await.unwrap();

    assert_eq!(
        outcome,
        Outcome::Formed {
            members: Cardinality::new(3).unwrap()
        }
    );
    assert_eq!(bootstrap.phase(), Phase::Idle);

    let fake = fake.lock().unwrap();
    assert_eq!(fake.unready_probes, 0);
    assert_eq!(fake.users_auth, vec![Some(BASIC_AUTH.to_string())]);
    assert_eq!(
        fake.status_calls,
        vec![(
            "databases".to_string(),
            "couchdb".to_string(),
            Some(format!("Bearer {TOKEN}"))
        )]
    );

    let calls = &fake.setup_calls;
    assert_eq!(calls.len(), 8);
    assert_eq!(
        calls[0],
        json!({
            "action": "enable_cluster",
            "bind_address": "0.0.0.0",
            "username": "admin",
            "password": "password",
            "node_count": 3
        })
    );
    for ordinal in 0..3u32 {
        let enable = &calls[1 + 2 * ordinal as usize];
        let add = &calls[2 + 2 * ordinal as usize];
        assert_eq!(enable["action"], "enable_cluster");
        assert_eq!(enable["remote_node"], peer(ordinal));
        assert_eq!(enable["port"], 5984);
        assert_eq!(enable["remote_current_user"], "admin");
        assert_eq!(add["action"], "add_node");
        assert_eq!(add["host"], peer(ordinal));
        assert_eq!(add["port"], 5984);
    }
    assert_eq!(calls[7], json!({ "action": "finish_cluster" }));
    assert!(fake
        .setup_auth
        .iter()
        .all(|auth| auth.as_deref() == Some(BASIC_AUTH)));
}

#[tokio::test]
async fn test_follower_only_enables_itself() {
    let (fake, url) = serve(Fake {
        replicas: 3,
        ..Default::default()
    })
    .await;
    let bootstrap = bootstrap(config("couchdb-1", &url));

    let outcome = bootstrap.run().await.unwrap();

    assert!(matches!(outcome, Outcome::Joined { .. }));
    let fake = fake.lock().unwrap();
    assert_eq!(fake.setup_calls.len(), 1);
    assert_eq!(fake.setup_calls[0]["action"], "enable_cluster");
    assert_eq!(fake.setup_calls[0]["node_count"], 3);
    assert!(fake.setup_calls[0].get("remote_node").is_none());
}

#[tokio::test]
async fn test_configured_cluster_is_left_alone() {
    let (fake, url) = serve(Fake {
        configured: true,
        replicas: 3,
        ..Default::default()
    })
    .await;
    let bootstrap = bootstrap(config("couchdb-2", &url));

    let outcome = bootstrap.run().await.unwrap();

    assert_eq!(outcome, Outcome::AlreadyConfigured);
    assert_eq!(bootstrap.phase(), Phase::AlreadyConfigured);
    let fake = fake.lock().unwrap();
    assert!(fake.setup_calls.is_empty());
    assert!(fake.status_calls.is_empty());
}

#[tokio::test]
async fn test_orchestrator_failure_is_fatal() {
    let (fake, url) = serve(Fake {
        replicas: 3,
        status_code: Some(403),
        ..Default::default()
    })
    .await;
    let bootstrap = bootstrap(config("couchdb-2", &url));

    let err = bootstrap.run().await.unwrap_err();

    assert!(matches!(err, Error::Orchestrator { status: 403, .. }));
    assert!(!err.is_configuration());
    assert_eq!(bootstrap.phase(), Phase::ResolvingCardinality);
    assert!(fake.lock().unwrap().setup_calls.is_empty());
}

#[tokio::test]
async fn test_rejected_action_aborts_formation() {
    let (fake, url) = serve(Fake {
        replicas: 3,
        reject_action: Some("add_node"),
        ..Default::default()
    })
    .await;
    let bootstrap = bootstrap(config("couchdb-2", &url));

    let err = bootstrap.run().await.unwrap_err();

    match err {
        Error::ActionRejected {
            action, status, ..
        } => {
            assert_eq!(action, "AddNode");
            assert_eq!(status, 500);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(bootstrap.phase(), Phase::Forming);

    let fake = fake.lock().unwrap();
    let actions: Vec<&str> = fake
        .setup_calls
        .iter()
        .map(|c| c["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["enable_cluster", "enable_cluster", "add_node"]);
}

#[tokio::test]
async fn test_unreachable_couchdb_for_users_check_is_fatal() {
    // Nothing listens here once the listener is dropped
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let mut config = config("couchdb-0", &url);
    config.request_timeout = Duration::from_secs(2);
    let client = build_client(&config).unwrap();
    let admin = CouchAdmin::new(client, &config);

    assert!(!admin.is_ready().await);
    assert!(matches!(admin.is_configured().await, Err(Error::Http(_))));
}
