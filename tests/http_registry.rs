//! `HttpRegistry` against an in-process registry server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use symbol_sync::config::{RegistryConfig, RegistryTimeouts};
use symbol_sync::registry::{HttpRegistry, RegistryApi, RegistryClient};
use symbol_sync::symbol::{NewSymbol, SymbolPatch};
use symbol_sync::{ErrorCode, Fragment, RegistryError, Scope, Symbol};
use time::OffsetDateTime;
use uuid::Uuid;

const TOKEN: &str = "tok-123";
const TEAM: Uuid = Uuid::from_u128(0x5d1c_3e6a_7b2f_4e8d_8c9a_1f2e_3d4c_5b6a);
const USER: Uuid = Uuid::from_u128(0xa11c_e000_0000_4000_8000_0000_0000_0001);

// =============================================================================
// FAKE SERVER
// =============================================================================

#[derive(Debug, Clone)]
struct Recorded {
    method: &'static str,
    path: String,
    cookie: Option<String>,
    body: Value,
}

#[derive(Default)]
struct Registry {
    symbols: Mutex<Vec<Symbol>>,
    requests: Mutex<Vec<Recorded>>,
}

type Shared = Arc<Registry>;

impl Registry {
    fn record(&self, method: &'static str, path: String, headers: &HeaderMap, body: Value) -> bool {
        let cookie = headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let authorized = cookie.as_deref() == Some(format!("session_token={TOKEN}").as_str());
        self.requests.lock().unwrap().push(Recorded { method, path, cookie, body });
        authorized
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn unauthorized() -> Response {
    error(StatusCode::UNAUTHORIZED, "unauthorized")
}

fn not_found() -> Response {
    error(StatusCode::NOT_FOUND, "Symbol not found")
}

async fn list(State(reg): State<Shared>, Path(team_id): Path<Uuid>, headers: HeaderMap) -> Response {
    if !reg.record("GET", format!("/teams/{team_id}/symbols"), &headers, Value::Null) {
        return unauthorized();
    }
    let symbols = reg.symbols.lock().unwrap().clone();
    Json(json!({ "symbols": symbols })).into_response()
}

async fn create(
    State(reg): State<Shared>,
    Path(team_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !reg.record("POST", format!("/teams/{team_id}/symbols"), &headers, body.clone()) {
        return unauthorized();
    }
    let Ok(new) = serde_json::from_value::<NewSymbol>(body) else {
        return error(StatusCode::BAD_REQUEST, "invalid body");
    };
    let now = OffsetDateTime::now_utc();
    let symbol = Symbol {
        id: Uuid::new_v4(),
        name: new.name,
        scope: new.scope,
        owner_team_id: team_id,
        owner_prototype_id: new.prototype_id,
        created_by: USER,
        fragment_data: new.fragment_data,
        created_at: now,
        updated_at: now,
    };
    reg.symbols.lock().unwrap().push(symbol.clone());
    (StatusCode::CREATED, Json(symbol)).into_response()
}

async fn update(
    State(reg): State<Shared>,
    Path((team_id, id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !reg.record("PATCH", format!("/teams/{team_id}/symbols/{id}"), &headers, body.clone()) {
        return unauthorized();
    }
    let Ok(patch) = serde_json::from_value::<SymbolPatch>(body) else {
        return error(StatusCode::BAD_REQUEST, "invalid body");
    };
    let mut symbols = reg.symbols.lock().unwrap();
    let Some(symbol) = symbols.iter_mut().find(|s| s.id == id) else {
        return not_found();
    };
    if let Some(name) = patch.name {
        symbol.name = name;
    }
    if let Some(data) = patch.fragment_data {
        symbol.fragment_data = data;
    }
    symbol.updated_at = OffsetDateTime::now_utc();
    Json(symbol.clone()).into_response()
}

async fn delete(State(reg): State<Shared>, Path((team_id, id)): Path<(Uuid, Uuid)>, headers: HeaderMap) -> Response {
    if !reg.record("DELETE", format!("/teams/{team_id}/symbols/{id}"), &headers, Value::Null) {
        return unauthorized();
    }
    let mut symbols = reg.symbols.lock().unwrap();
    let before = symbols.len();
    symbols.retain(|s| s.id != id);
    if symbols.len() == before {
        return not_found();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn promote(
    State(reg): State<Shared>,
    Path((team_id, id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !reg.record("POST", format!("/teams/{team_id}/symbols/{id}/promote"), &headers, body.clone()) {
        return unauthorized();
    }
    let Some(target) = body["targetScope"].as_str().and_then(Scope::parse) else {
        return error(StatusCode::BAD_REQUEST, "targetScope is required");
    };
    let mut symbols = reg.symbols.lock().unwrap();
    let Some(source) = symbols.iter().find(|s| s.id == id).cloned() else {
        return not_found();
    };
    let copy = Symbol { id: Uuid::new_v4(), scope: target, owner_prototype_id: None, ..source };
    symbols.push(copy.clone());
    (StatusCode::CREATED, Json(copy)).into_response()
}

async fn spawn_server(seed: Vec<Symbol>) -> (SocketAddr, Shared) {
    let reg: Shared = Arc::new(Registry { symbols: Mutex::new(seed), ..Registry::default() });
    let app = Router::new()
        .route("/api/teams/{team_id}/symbols", get(list).post(create))
        .route("/api/teams/{team_id}/symbols/{id}", patch(update).delete(delete))
        .route("/api/teams/{team_id}/symbols/{id}/promote", post(promote))
        .with_state(reg.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, reg)
}

fn http_registry(addr: SocketAddr, token: Option<&str>) -> HttpRegistry {
    let config = RegistryConfig::new(
        format!("http://{addr}/api/"),
        token.map(str::to_owned),
        RegistryTimeouts { request_secs: 5, connect_secs: 2 },
    )
    .unwrap();
    HttpRegistry::new(&config).unwrap()
}

fn seeded(name: &str, scope: Scope, fragment_id: &str) -> Symbol {
    Symbol {
        id: Uuid::new_v4(),
        name: name.to_owned(),
        scope,
        owner_team_id: TEAM,
        owner_prototype_id: None,
        created_by: USER,
        fragment_data: Fragment::new(json!({ "id": fragment_id, "tagName": "section" })),
        created_at: OffsetDateTime::UNIX_EPOCH,
        updated_at: OffsetDateTime::UNIX_EPOCH,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[tokio::test]
async fn list_sends_session_cookie_and_parses_symbols() {
    let (addr, reg) = spawn_server(vec![
        seeded("Card", Scope::Team, "team-card"),
        seeded("Footer", Scope::Organization, "org-footer"),
    ])
    .await;
    let api = http_registry(addr, Some(TOKEN));

    let symbols = api.list(TEAM).await.unwrap();

    assert_eq!(symbols.len(), 2);
    assert_eq!(symbols[1].scope, Scope::Organization);
    let requests = reg.requests();
    assert_eq!(requests[0].path, format!("/teams/{TEAM}/symbols"));
    assert_eq!(requests[0].cookie.as_deref(), Some("session_token=tok-123"));
}

#[tokio::test]
async fn error_body_message_is_surfaced() {
    let (addr, _reg) = spawn_server(Vec::new()).await;
    let api = http_registry(addr, None);

    let err = api.list(TEAM).await.unwrap_err();

    match &err {
        RegistryError::Response { status, message } => {
            assert_eq!(*status, 401);
            assert_eq!(message, "unauthorized");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.error_code(), "E_REGISTRY_RESPONSE");
    assert!(!err.retryable());
}

#[tokio::test]
async fn create_posts_camel_case_body() {
    let (addr, reg) = spawn_server(Vec::new()).await;
    let api = http_registry(addr, Some(TOKEN));
    let body = NewSymbol {
        name: "Hero".into(),
        fragment_data: Fragment::new(json!({ "id": "team-hero", "tagName": "section" })),
        scope: Scope::Team,
        prototype_id: None,
    };

    let created = api.create(TEAM, &body).await.unwrap();

    assert_eq!(created.name, "Hero");
    assert_eq!(created.fragment_id(), Some("team-hero"));
    let sent = &reg.requests()[0].body;
    assert_eq!(sent["fragmentData"]["id"], "team-hero");
    assert_eq!(sent["scope"], "team");
    assert!(sent.get("prototypeId").is_none());
}

#[tokio::test]
async fn rename_sends_only_the_name() {
    let card = seeded("Card", Scope::Team, "team-card");
    let (addr, reg) = spawn_server(vec![card.clone()]).await;
    let api = http_registry(addr, Some(TOKEN));

    let updated = api
        .update(TEAM, card.id, &SymbolPatch::rename("Hero Card"))
        .await
        .unwrap();

    assert_eq!(updated.name, "Hero Card");
    assert_eq!(updated.fragment_data, card.fragment_data);
    let sent = &reg.requests()[0];
    assert_eq!(sent.method, "PATCH");
    assert_eq!(sent.body, json!({ "name": "Hero Card" }));
}

#[tokio::test]
async fn delete_of_missing_symbol_is_not_found() {
    let (addr, _reg) = spawn_server(Vec::new()).await;
    let api = http_registry(addr, Some(TOKEN));

    let err = api.delete(TEAM, Uuid::new_v4()).await.unwrap_err();

    assert!(matches!(err, RegistryError::Response { status: 404, ref message } if message == "Symbol not found"));
}

#[tokio::test]
async fn promote_sends_target_scope() {
    let card = seeded("Card", Scope::Team, "team-card");
    let (addr, reg) = spawn_server(vec![card.clone()]).await;
    let api = http_registry(addr, Some(TOKEN));

    let copy = api.promote(TEAM, card.id, Scope::Organization).await.unwrap();

    assert_ne!(copy.id, card.id);
    assert_eq!(copy.scope, Scope::Organization);
    let sent = &reg.requests()[0];
    assert_eq!(sent.path, format!("/teams/{TEAM}/symbols/{}/promote", card.id));
    assert_eq!(sent.body, json!({ "targetScope": "organization" }));
}

#[tokio::test]
async fn unreachable_server_is_retryable_network_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let api = http_registry(addr, Some(TOKEN));

    let err = api.list(TEAM).await.unwrap_err();

    assert!(matches!(err, RegistryError::NetworkFailure(_)), "{err:?}");
    assert!(err.retryable());
}

#[tokio::test]
async fn client_create_then_delete_over_http() {
    let (addr, reg) = spawn_server(Vec::new()).await;
    let client = RegistryClient::new(Arc::new(http_registry(addr, Some(TOKEN))), Some(TEAM));

    client.list().await;
    let created = client
        .create("Hero", Fragment::new(json!({ "id": "hero", "tagName": "section" })), Scope::Team, None)
        .await
        .unwrap();
    assert_eq!(created.fragment_id(), Some("team-hero"));
    assert_eq!(client.symbols().len(), 1);

    assert!(client.remove(created.id).await);
    assert!(client.symbols().is_empty());
    assert!(client.last_error().is_none());
    assert!(reg.symbols.lock().unwrap().is_empty());
}
