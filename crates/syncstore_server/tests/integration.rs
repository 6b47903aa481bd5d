//! End-to-end tests: signed requests through the storage server.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use syncstore_hawk::{sign_request, Authenticator, ClientRequest, Credentials, ManualClock};
use syncstore_server::{
    Request, Response, ServerConfig, StorageServer, TokenSigner, HEADER_NEXT_OFFSET,
    HEADER_RECORDS, HEADER_TIMESTAMP,
};
use tempfile::TempDir;

const NOW: i64 = 1_700_000_000;
const UID: u64 = 42;

struct Harness {
    server: StorageServer,
    clock: Arc<ManualClock>,
    credentials: Credentials,
    nonces: AtomicU64,
    _dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(|config| config)
    }

    fn with_config(adjust: impl FnOnce(ServerConfig) -> ServerConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let config = adjust(ServerConfig::new(dir.path()).with_shared_secret("test-secret"));

        let signer = TokenSigner::new(config.shared_secret.as_bytes(), config.token_ttl());
        let clock = Arc::new(ManualClock::new(NOW));
        let authenticator = Authenticator::with_clock(
            config.auth.to_auth_config(),
            Arc::new(signer.clone()),
            clock.clone(),
        );
        let server = StorageServer::with_authenticator(config, authenticator);

        let issued = signer.issue(UID);
        let credentials = Credentials::new(issued.token.clone(), issued.key.to_vec(), UID);

        Self {
            server,
            clock,
            credentials,
            nonces: AtomicU64::new(0),
            _dir: dir,
        }
    }

    fn next_nonce(&self) -> String {
        format!("n{}", self.nonces.fetch_add(1, Ordering::Relaxed))
    }

    fn signed(&self, method: &str, target: &str, body: Option<&str>) -> Request {
        self.signed_with_nonce(method, target, body, &self.next_nonce())
    }

    fn signed_with_nonce(
        &self,
        method: &str,
        target: &str,
        body: Option<&str>,
        nonce: &str,
    ) -> Request {
        let client = ClientRequest {
            method,
            path: target,
            payload: body.map(|b| ("application/json", b.as_bytes())),
            ext: "",
        };
        let header = sign_request(&self.credentials, &client, NOW, nonce).to_header("Hawk");
        let mut request = Request::new(method, target).with_header("Authorization", header);
        if let Some(body) = body {
            request = request
                .with_header("Content-Type", "application/json")
                .with_body(body.as_bytes().to_vec());
        }
        request
    }

    fn send(&self, method: &str, target: &str, body: Option<&str>) -> Response {
        self.server.handle(self.signed(method, target, body))
    }
}

fn json_body(response: &Response) -> Value {
    response.json_body().unwrap()
}

#[test]
fn version_needs_no_credentials() {
    let h = Harness::new();
    let response = h.server.handle(Request::new("GET", "/version"));
    assert_eq!(response.status, 200);
    assert_eq!(json_body(&response), json!({ "version": "1.0" }));
}

#[test]
fn unsigned_request_is_unauthorized() {
    let h = Harness::new();
    let response = h
        .server
        .handle(Request::new("GET", "/1.5/42/info/collections"));
    assert_eq!(response.status, 401);
    assert_eq!(response.header("WWW-Authenticate"), Some("Hawk"));
}

#[test]
fn foreign_user_is_forbidden() {
    let h = Harness::new();
    let response = h.send("GET", "/1.5/43/info/collections", None);
    assert_eq!(response.status, 403);
}

#[test]
fn unknown_route_and_wrong_method() {
    let h = Harness::new();
    assert_eq!(h.send("GET", "/1.5/42/nowhere", None).status, 404);

    let response = h.send("POST", "/1.5/42/storage/tabs/abc", Some("{}"));
    assert_eq!(response.status, 405);
    assert_eq!(response.header("Allow"), Some("GET, PUT, DELETE"));
}

#[test]
fn put_then_get_object() {
    let h = Harness::new();
    let response = h.send(
        "PUT",
        "/1.5/42/storage/tabs/abc",
        Some(r#"{"payload":"hello","sortindex":5}"#),
    );
    assert_eq!(response.status, 200);
    let stamp = response.header(HEADER_TIMESTAMP).unwrap().to_string();
    assert_eq!(String::from_utf8(response.body.clone()).unwrap(), stamp);

    let response = h.send("GET", "/1.5/42/storage/tabs/abc", None);
    assert_eq!(response.status, 200);
    let bso = json_body(&response);
    assert_eq!(bso["id"], "abc");
    assert_eq!(bso["payload"], "hello");
    assert_eq!(bso["sortindex"], 5);

    let info = json_body(&h.send("GET", "/1.5/42/info/collections", None));
    assert!(info["tabs"].is_number());
}

#[test]
fn missing_object_is_not_found() {
    let h = Harness::new();
    assert_eq!(h.send("GET", "/1.5/42/storage/tabs/none", None).status, 404);
}

#[test]
fn batch_reports_failures() {
    let h = Harness::new();
    let body = json!([
        { "id": "a", "payload": "1" },
        { "id": "b", "payload": "2" },
        { "id": "", "payload": "3" }
    ])
    .to_string();
    let response = h.send("POST", "/1.5/42/storage/bookmarks", Some(&body));
    assert_eq!(response.status, 200);
    assert!(response.header(HEADER_TIMESTAMP).is_some());

    let outcome = json_body(&response);
    assert_eq!(outcome["success"], json!(["a", "b"]));
    assert!(outcome["failed"][""].is_string());

    let counts = json_body(&h.send("GET", "/1.5/42/info/collection_counts", None));
    assert_eq!(counts, json!({ "bookmarks": 2 }));
}

#[test]
fn oversized_batch_is_rejected() {
    let h = Harness::with_config(|config| config.with_max_batch(2));
    let body = json!([{ "id": "a" }, { "id": "b" }, { "id": "c" }]).to_string();
    let response = h.send("POST", "/1.5/42/storage/tabs", Some(&body));
    assert_eq!(response.status, 400);
}

#[test]
fn malformed_json_is_bad_request() {
    let h = Harness::new();
    let response = h.send("POST", "/1.5/42/storage/tabs", Some("not json"));
    assert_eq!(response.status, 400);
}

#[test]
fn listing_pages_through_collection() {
    let h = Harness::new();
    let objects: Vec<Value> = (0..10)
        .map(|i| json!({ "id": format!("id{i:02}"), "payload": "x" }))
        .collect();
    let body = Value::Array(objects).to_string();
    assert_eq!(h.send("POST", "/1.5/42/storage/history", Some(&body)).status, 200);

    let first = h.send("GET", "/1.5/42/storage/history?limit=4", None);
    assert_eq!(first.status, 200);
    assert_eq!(first.header(HEADER_RECORDS), Some("4"));
    assert_eq!(first.header(HEADER_NEXT_OFFSET), Some("4"));
    assert_eq!(
        json_body(&first),
        json!(["id00", "id01", "id02", "id03"])
    );

    let last = h.send("GET", "/1.5/42/storage/history?limit=4&offset=8", None);
    assert_eq!(last.header(HEADER_RECORDS), Some("2"));
    assert_eq!(last.header(HEADER_NEXT_OFFSET), None);

    let full = h.send("GET", "/1.5/42/storage/history?full=1&ids=id03,id07", None);
    let entries = json_body(&full);
    assert_eq!(entries.as_array().unwrap().len(), 2);
    assert_eq!(entries[0]["payload"], "x");
}

#[test]
fn bad_query_is_bad_request() {
    let h = Harness::new();
    let response = h.send("GET", "/1.5/42/storage/history?newer=yesterday", None);
    assert_eq!(response.status, 400);
}

#[test]
fn delete_selected_ids_and_collection() {
    let h = Harness::new();
    let body = json!([{ "id": "a" }, { "id": "b" }, { "id": "c" }]).to_string();
    h.send("POST", "/1.5/42/storage/forms", Some(&body));

    let response = h.send("DELETE", "/1.5/42/storage/forms?ids=a,b", None);
    assert_eq!(response.status, 200);
    assert!(json_body(&response)["modified"].is_number());
    let remaining = json_body(&h.send("GET", "/1.5/42/storage/forms", None));
    assert_eq!(remaining, json!(["c"]));

    assert_eq!(h.send("DELETE", "/1.5/42/storage/forms", None).status, 200);
    let info = json_body(&h.send("GET", "/1.5/42/info/collections", None));
    assert_eq!(info, json!({}));
}

#[test]
fn delete_object_then_storage() {
    let h = Harness::new();
    h.send("PUT", "/1.5/42/storage/tabs/one", Some(r#"{"payload":"1"}"#));
    h.send("PUT", "/1.5/42/storage/prefs/two", Some(r#"{"payload":"2"}"#));

    assert_eq!(h.send("DELETE", "/1.5/42/storage/tabs/one", None).status, 200);
    assert_eq!(h.send("DELETE", "/1.5/42/storage/tabs/one", None).status, 404);

    let response = h.send("DELETE", "/1.5/42/storage", None);
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"{}");
    let info = json_body(&h.send("GET", "/1.5/42/info/collections", None));
    assert_eq!(info, json!({}));
}

#[test]
fn replayed_nonce_is_rejected() {
    let h = Harness::new();
    let first = h.signed_with_nonce("GET", "/1.5/42/info/collections", None, "fixed");
    let second = h.signed_with_nonce("GET", "/1.5/42/info/collections", None, "fixed");
    assert_eq!(h.server.handle(first).status, 200);
    assert_eq!(h.server.handle(second).status, 401);
}

#[test]
fn tampered_body_is_rejected() {
    let h = Harness::new();
    let request = h.signed("PUT", "/1.5/42/storage/tabs/x", Some(r#"{"payload":"a"}"#));
    let request = request.with_body(br#"{"payload":"b"}"#.to_vec());
    assert_eq!(h.server.handle(request).status, 401);
}

#[test]
fn stale_request_is_rejected() {
    let h = Harness::new();
    h.clock.advance(3600);
    assert_eq!(h.send("GET", "/1.5/42/info/collections", None).status, 401);
}
