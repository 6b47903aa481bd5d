//! End-to-end tests for request authentication.

use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use syncstore_hawk::{
    sign_request, AuthConfig, AuthError, AuthParameters, Authenticator, ClientRequest,
    Credentials, HawkRequest, ManualClock, RequestBody, ResolverError, SigningInput,
};

const NOW: i64 = 1_700_000_000;
const KEY: &[u8] = b"werxhqb98rpaxn39848xrunpaw3489ruxnpa98w4rxn";

fn credentials() -> Credentials {
    Credentials::new("dh37fgj492je", KEY.to_vec(), 42)
}

fn resolve(_: &HawkRequest<'_>, id: &str) -> Result<Option<Credentials>, ResolverError> {
    match id {
        "dh37fgj492je" => Ok(Some(credentials())),
        "broken" => Err(ResolverError("token service unreachable".into())),
        "sha1" => {
            let mut creds = Credentials::new("sha1", KEY.to_vec(), 1);
            creds.algorithm = "sha1".into();
            Ok(Some(creds))
        }
        _ => Ok(None),
    }
}

fn setup() -> (Authenticator, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(NOW));
    let auth = Authenticator::with_clock(AuthConfig::default(), Arc::new(resolve), clock.clone());
    (auth, clock)
}

fn signed_header(client: &ClientRequest<'_>, ts: i64, nonce: &str) -> String {
    sign_request(&credentials(), client, ts, nonce).to_header("Hawk")
}

fn get<'a>(path: &'a str, authorization: Option<&'a str>) -> HawkRequest<'a> {
    HawkRequest {
        method: "GET",
        path,
        content_type: None,
        authorization,
    }
}

fn client(method: &'static str, path: &'static str) -> ClientRequest<'static> {
    ClientRequest {
        method,
        path,
        ..ClientRequest::default()
    }
}

#[test]
fn admits_signed_request() {
    let (auth, _) = setup();
    let header = signed_header(&client("GET", "/1.5/42/info/collections?x=1"), NOW, "n1");
    let creds = auth
        .authenticate(
            &get("/1.5/42/info/collections?x=1", Some(&header)),
            &mut RequestBody::empty(),
        )
        .unwrap();
    assert_eq!(creds.user_id, 42);
    assert_eq!(creds.key_id, "dh37fgj492je");
}

#[test]
fn missing_and_foreign_headers() {
    let (auth, _) = setup();
    let mut body = RequestBody::empty();
    assert_eq!(
        auth.authenticate(&get("/", None), &mut body).unwrap_err(),
        AuthError::MissingHeader
    );
    assert_eq!(
        auth.authenticate(&get("/", Some("Bearer abc")), &mut body)
            .unwrap_err(),
        AuthError::MalformedHeader
    );
    assert!(matches!(
        auth.authenticate(&get("/", Some("Hawk id=\"x\"")), &mut body),
        Err(AuthError::MalformedParameters(_))
    ));
}

#[test]
fn resolver_outcomes_are_distinct() {
    let (auth, _) = setup();
    let mut params = sign_request(&credentials(), &client("GET", "/"), NOW, "n");

    params.id = "nobody".into();
    let header = params.to_header("Hawk");
    assert_eq!(
        auth.authenticate(&get("/", Some(&header)), &mut RequestBody::empty())
            .unwrap_err(),
        AuthError::CredentialsNotFound
    );

    params.id = "broken".into();
    let header = params.to_header("Hawk");
    let err = auth
        .authenticate(&get("/", Some(&header)), &mut RequestBody::empty())
        .unwrap_err();
    assert!(matches!(err, AuthError::ResolverFault(_)));
    assert!(err.is_server_error());

    params.id = "sha1".into();
    let header = params.to_header("Hawk");
    assert_eq!(
        auth.authenticate(&get("/", Some(&header)), &mut RequestBody::empty())
            .unwrap_err(),
        AuthError::MalformedCredentials
    );
}

#[test]
fn wrong_path_is_signature_mismatch() {
    let (auth, _) = setup();
    let header = signed_header(&client("GET", "/a"), NOW, "n");
    assert_eq!(
        auth.authenticate(&get("/b", Some(&header)), &mut RequestBody::empty())
            .unwrap_err(),
        AuthError::SignatureMismatch
    );
}

#[test]
fn replay_within_window_is_rejected() {
    let (auth, clock) = setup();
    let header = signed_header(&client("GET", "/"), NOW, "n1");
    auth.authenticate(&get("/", Some(&header)), &mut RequestBody::empty())
        .unwrap();
    assert_eq!(
        auth.authenticate(&get("/", Some(&header)), &mut RequestBody::empty())
            .unwrap_err(),
        AuthError::ReplayDetected
    );

    clock.advance(120);
    assert_eq!(
        auth.authenticate(&get("/", Some(&header)), &mut RequestBody::empty())
            .unwrap_err(),
        AuthError::StaleTimestamp
    );

    let fresh = signed_header(&client("GET", "/"), NOW + 120, "n2");
    assert!(auth
        .authenticate(&get("/", Some(&fresh)), &mut RequestBody::empty())
        .is_ok());
}

#[test]
fn future_timestamps_are_stale() {
    let (auth, _) = setup();
    let header = signed_header(&client("GET", "/"), NOW + 61, "n");
    assert_eq!(
        auth.authenticate(&get("/", Some(&header)), &mut RequestBody::empty())
            .unwrap_err(),
        AuthError::StaleTimestamp
    );
}

#[test]
fn extreme_timestamps_are_stale() {
    let (auth, clock) = setup();
    for (i, ts) in [i64::MIN, i64::MAX, -1, 0].into_iter().enumerate() {
        let header = signed_header(&client("GET", "/x"), ts, &format!("n{i}"));
        assert_eq!(
            auth.authenticate(&get("/x", Some(&header)), &mut RequestBody::empty())
                .unwrap_err(),
            AuthError::StaleTimestamp,
            "ts={ts}"
        );
    }

    clock.set(i64::MIN);
    let header = signed_header(&client("GET", "/x"), i64::MAX, "late");
    assert_eq!(
        auth.authenticate(&get("/x", Some(&header)), &mut RequestBody::empty())
            .unwrap_err(),
        AuthError::StaleTimestamp
    );
}

#[test]
fn payload_hash_covers_body_and_body_remains_available() {
    let (auth, _) = setup();
    let body = br#"[{"id":"a","payload":"x"}]"#;
    let signed = ClientRequest {
        method: "POST",
        path: "/1.5/42/storage/tabs",
        payload: Some(("application/json", body)),
        ext: "",
    };
    let header = signed_header(&signed, NOW, "n1");
    let request = HawkRequest {
        method: "POST",
        path: "/1.5/42/storage/tabs",
        content_type: Some("application/json; charset=utf-8"),
        authorization: Some(&header),
    };

    let mut stream = RequestBody::from_reader(std::io::Cursor::new(body.to_vec()));
    auth.authenticate(&request, &mut stream).unwrap();
    assert_eq!(stream.take().unwrap(), body.to_vec());

    let header = signed_header(&signed, NOW, "n2");
    let request = HawkRequest {
        authorization: Some(&header),
        ..request
    };
    let mut tampered = RequestBody::from_bytes(b"[]".to_vec());
    assert_eq!(
        auth.authenticate(&request, &mut tampered).unwrap_err(),
        AuthError::SignatureMismatch
    );
}

#[test]
fn body_is_not_read_without_hash() {
    let (auth, _) = setup();
    let header = signed_header(&client("POST", "/x"), NOW, "n");
    let request = HawkRequest {
        method: "POST",
        path: "/x",
        content_type: Some("application/json"),
        authorization: Some(&header),
    };
    let mut body = RequestBody::from_bytes(b"anything".to_vec());
    auth.authenticate(&request, &mut body).unwrap();
    assert_eq!(body.take().unwrap(), b"anything".to_vec());
}

#[test]
fn custom_replay_cache_is_consulted() {
    struct CountingCache(AtomicUsize);
    impl syncstore_hawk::ReplayCache for CountingCache {
        fn seen(&self, _: &str, _: &str, _: i64) -> bool {
            false
        }
        fn record(&self, _: &str, _: &str, _: i64) {}
        fn check_and_record(&self, _: &str, _: &str, _: i64) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    let cache = Arc::new(CountingCache(AtomicUsize::new(0)));
    let (auth, _) = setup();
    let auth = auth.with_replay_cache(cache.clone());
    let header = signed_header(&client("GET", "/"), NOW, "n");
    for _ in 0..2 {
        auth.authenticate(&get("/", Some(&header)), &mut RequestBody::empty())
            .unwrap();
    }
    assert_eq!(cache.0.load(Ordering::SeqCst), 2);
}

fn quoted_text() -> impl Strategy<Value = String> {
    "[ -~]{0,24}"
}

proptest! {
    #[test]
    fn header_round_trips(
        id in "[a-zA-Z0-9_-]{1,16}",
        timestamp in any::<i64>(),
        nonce in quoted_text(),
        ext in quoted_text(),
        hash in proptest::option::of(proptest::collection::vec(any::<u8>(), 32)),
        mac in proptest::collection::vec(any::<u8>(), 1..48),
    ) {
        let params = AuthParameters { id, timestamp, nonce, ext, hash, mac };
        let parsed = AuthParameters::from_header(&params.to_header("Hawk"), "Hawk").unwrap();
        prop_assert_eq!(parsed, params);
    }

    #[test]
    fn any_changed_field_changes_the_mac(field in 0usize..6, byte in any::<u8>()) {
        let base = SigningInput {
            timestamp: NOW,
            nonce: "j4h3g2",
            method: "POST",
            path: "/resource/1?b=1&a=2",
            payload_hash: "Yi9LfIIFRtBEPt74PVmbTF/xVAwPn7ub15ePICfgnuY=",
            ext: "some-app-ext-data",
        };
        let alt = char::from(b'a' + byte % 26).to_string();
        let nonce = format!("{}{alt}", base.nonce);
        let method = format!("{}{alt}", base.method);
        let path = format!("{}{alt}", base.path);
        let hash = format!("{}{alt}", base.payload_hash);
        let ext = format!("{}{alt}", base.ext);
        let changed = match field {
            0 => SigningInput { timestamp: NOW + 1 + i64::from(byte), ..base.clone() },
            1 => SigningInput { nonce: &nonce, ..base.clone() },
            2 => SigningInput { method: &method, ..base.clone() },
            3 => SigningInput { path: &path, ..base.clone() },
            4 => SigningInput { payload_hash: &hash, ..base.clone() },
            _ => SigningInput { ext: &ext, ..base.clone() },
        };
        prop_assert_ne!(base.mac(KEY), changed.mac(KEY));
        prop_assert_eq!(base.mac(KEY), base.clone().mac(KEY));
    }
}
