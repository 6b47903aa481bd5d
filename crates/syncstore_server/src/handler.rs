//! Request handlers for storage endpoints.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::http::{Request, Response, HEADER_NEXT_OFFSET, HEADER_RECORDS, HEADER_TIMESTAMP};
use crate::routes::Route;
use serde::Serialize;
use std::collections::BTreeMap;
use syncstore_core::{BsoInput, ListOptions, ObjectStore, OpenMode, Timestamp};
use syncstore_hawk::{Authenticator, Credentials, HawkRequest};

/// Context shared by all handlers.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Request authenticator.
    pub authenticator: Authenticator,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, authenticator: Authenticator) -> Self {
        Self {
            config,
            authenticator,
        }
    }

    /// Opens the store of `uid` for one operation.
    fn open_store(&self, uid: u64, mode: OpenMode) -> ServerResult<ObjectStore> {
        Ok(ObjectStore::open(
            &self.config.data_root,
            uid,
            mode,
            self.config.store.clone(),
        )?)
    }
}

#[derive(Serialize)]
struct ModifiedBody {
    modified: Timestamp,
}

/// Handler for storage requests.
pub struct RequestHandler {
    context: std::sync::Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: std::sync::Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles one request. Errors become error responses.
    pub fn handle(&self, mut request: Request) -> Response {
        let route = Route::parse(request.path());
        let route_name = route.as_ref().map_or("unmatched", Route::name);

        let response = match route.and_then(|route| self.dispatch(&route, &mut request)) {
            Ok(response) => response,
            Err(err) => {
                if err.is_server_error() {
                    tracing::error!(route = route_name, error = %err, "request failed");
                }
                error_response(&err)
            }
        };

        tracing::info!(
            method = request.method(),
            path = request.path(),
            route = route_name,
            status = response.status,
            "request handled"
        );
        response
    }

    fn dispatch(&self, route: &Route, request: &mut Request) -> ServerResult<Response> {
        let allowed = route.allowed_methods();
        if !allowed.contains(&request.method()) {
            return Err(ServerError::MethodNotAllowed {
                method: request.method().to_string(),
                allowed,
            });
        }

        if *route == Route::Version {
            return Ok(Response::json(200, &serde_json::json!({ "version": "1.0" })));
        }

        let credentials = self.authenticate(request)?;
        if route.uid() != Some(credentials.user_id) {
            return Err(ServerError::Forbidden(format!(
                "credentials for user {} cannot access user {}",
                credentials.user_id,
                route.uid().unwrap_or_default()
            )));
        }
        let uid = credentials.user_id;

        match (route, request.method()) {
            (Route::InfoCollections { .. }, _) => self.info_collections(uid),
            (Route::InfoCollectionCounts { .. }, _) => self.info_collection_counts(uid),
            (Route::Collection { collection, .. }, "GET") => {
                self.get_objects(uid, collection, request)
            }
            (Route::Collection { collection, .. }, "POST") => {
                self.post_objects(uid, collection, request)
            }
            (Route::Collection { collection, .. }, _) => {
                self.delete_collection(uid, collection, request)
            }
            (Route::Object { collection, id, .. }, "GET") => self.get_object(uid, collection, id),
            (Route::Object { collection, id, .. }, "PUT") => {
                self.put_object(uid, collection, id, request)
            }
            (Route::Object { collection, id, .. }, _) => self.delete_object(uid, collection, id),
            (Route::Storage { .. }, _) => self.delete_storage(uid),
            (Route::Version, _) => Err(ServerError::Internal("unreachable route".into())),
        }
    }

    fn authenticate(&self, request: &mut Request) -> ServerResult<Credentials> {
        let authorization = request.header("authorization").map(str::to_owned);
        let content_type = request.header("content-type").map(str::to_owned);
        let method = request.method().to_owned();
        let target = request.target().to_owned();

        let hawk_request = HawkRequest {
            method: &method,
            path: &target,
            content_type: content_type.as_deref(),
            authorization: authorization.as_deref(),
        };
        Ok(self
            .context
            .authenticator
            .authenticate(&hawk_request, request.body_mut())?)
    }

    // === Handlers ===

    fn info_collections(&self, uid: u64) -> ServerResult<Response> {
        let store = self.context.open_store(uid, OpenMode::ReadOnly)?;
        Ok(Response::json(200, &store.collections_info()?))
    }

    fn info_collection_counts(&self, uid: u64) -> ServerResult<Response> {
        let store = self.context.open_store(uid, OpenMode::ReadOnly)?;
        Ok(Response::json(200, &store.collection_counts()?))
    }

    fn get_objects(&self, uid: u64, collection: &str, request: &Request) -> ServerResult<Response> {
        let options = parse_list_options(&request.query())?;
        let store = self.context.open_store(uid, OpenMode::ReadOnly)?;
        let result = store.list_objects(collection, &options)?;

        let mut response = Response::json(200, &result.entries)
            .with_header(HEADER_RECORDS, result.entries.len().to_string());
        if let Some(next) = result.next_offset {
            response = response.with_header(HEADER_NEXT_OFFSET, next.to_string());
        }
        Ok(response)
    }

    fn post_objects(
        &self,
        uid: u64,
        collection: &str,
        request: &mut Request,
    ) -> ServerResult<Response> {
        let inputs: Vec<BsoInput> = read_json(request)?;
        if inputs.len() > self.context.config.max_batch {
            return Err(ServerError::InvalidRequest(format!(
                "too many objects: {} > {}",
                inputs.len(),
                self.context.config.max_batch
            )));
        }

        let store = self.context.open_store(uid, OpenMode::ReadWrite)?;
        let outcome = store.put_objects(collection, inputs)?;
        Ok(Response::json(200, &outcome)
            .with_header(HEADER_TIMESTAMP, outcome.modified.to_string()))
    }

    fn delete_collection(
        &self,
        uid: u64,
        collection: &str,
        request: &Request,
    ) -> ServerResult<Response> {
        let store = self.context.open_store(uid, OpenMode::ReadWrite)?;
        let modified = match request.query().get("ids") {
            Some(ids) => store.delete_objects(collection, &split_ids(ids))?,
            None => store.delete_collection(collection)?,
        };
        Ok(modified_response(modified))
    }

    fn get_object(&self, uid: u64, collection: &str, id: &str) -> ServerResult<Response> {
        let store = self.context.open_store(uid, OpenMode::ReadOnly)?;
        Ok(Response::json(200, &store.get_object(collection, id)?))
    }

    fn put_object(
        &self,
        uid: u64,
        collection: &str,
        id: &str,
        request: &mut Request,
    ) -> ServerResult<Response> {
        let mut input: BsoInput = read_json(request)?;
        input.id = id.to_string();

        let store = self.context.open_store(uid, OpenMode::ReadWrite)?;
        let saved = store.put_object(collection, input)?;
        let timestamp = saved.modified.to_string();
        Ok(Response::raw_json(200, timestamp.clone()).with_header(HEADER_TIMESTAMP, timestamp))
    }

    fn delete_object(&self, uid: u64, collection: &str, id: &str) -> ServerResult<Response> {
        let store = self.context.open_store(uid, OpenMode::ReadWrite)?;
        Ok(modified_response(store.delete_object(collection, id)?))
    }

    fn delete_storage(&self, uid: u64) -> ServerResult<Response> {
        let store = self.context.open_store(uid, OpenMode::ReadWrite)?;
        store.delete_storage()?;
        Ok(Response::raw_json(200, "{}"))
    }
}

fn modified_response(modified: Timestamp) -> Response {
    Response::json(200, &ModifiedBody { modified })
        .with_header(HEADER_TIMESTAMP, modified.to_string())
}

fn error_response(err: &ServerError) -> Response {
    let response = Response::error(err.status(), &err.to_string());
    match err {
        ServerError::MethodNotAllowed { allowed, .. } => {
            response.with_header("Allow", allowed.join(", "))
        }
        ServerError::Unauthorized(_) | ServerError::InvalidToken(_) if err.status() == 401 => {
            response.with_header("WWW-Authenticate", "Hawk")
        }
        _ => response,
    }
}

fn read_json<T: serde::de::DeserializeOwned>(request: &mut Request) -> ServerResult<T> {
    let body = request
        .body_mut()
        .take()
        .map_err(|e| ServerError::Internal(format!("failed to read body: {e}")))?;
    serde_json::from_slice(&body).map_err(|e| ServerError::InvalidRequest(e.to_string()))
}

fn split_ids(ids: &str) -> Vec<String> {
    ids.split(',')
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Parses `full`, `limit`, `offset`, `newer` and `ids`.
fn parse_list_options(query: &BTreeMap<String, String>) -> ServerResult<ListOptions> {
    let invalid = |name: &str, value: &str| {
        ServerError::InvalidRequest(format!("invalid {name}: {value:?}"))
    };

    let mut options = ListOptions {
        full: query.contains_key("full"),
        ..ListOptions::default()
    };
    if let Some(limit) = query.get("limit") {
        options.limit = Some(limit.parse().map_err(|_| invalid("limit", limit))?);
    }
    if let Some(offset) = query.get("offset") {
        options.offset = offset.parse().map_err(|_| invalid("offset", offset))?;
    }
    if let Some(newer) = query.get("newer") {
        options.newer = newer
            .parse::<f64>()
            .ok()
            .and_then(Timestamp::from_seconds)
            .ok_or_else(|| invalid("newer", newer))?;
    }
    if let Some(ids) = query.get("ids") {
        options.ids = Some(split_ids(ids));
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn list_options_from_query() {
        let options = parse_list_options(&query(&[
            ("full", ""),
            ("limit", "4"),
            ("offset", "8"),
            ("newer", "1700000000.25"),
            ("ids", "a,b,,c"),
        ]))
        .unwrap();
        assert!(options.full);
        assert_eq!(options.limit, Some(4));
        assert_eq!(options.offset, 8);
        assert_eq!(options.newer, Timestamp::from_centis(170_000_000_025));
        assert_eq!(
            options.ids,
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn defaults_when_absent() {
        let options = parse_list_options(&BTreeMap::new()).unwrap();
        assert_eq!(options, ListOptions::default());
    }

    #[test]
    fn bad_values_are_invalid_requests() {
        for (name, value) in [("limit", "-1"), ("offset", "x"), ("newer", "-5"), ("newer", "soon")] {
            let err = parse_list_options(&query(&[(name, value)])).unwrap_err();
            assert_eq!(err.status(), 400, "{name}={value}");
        }
    }

    #[test]
    fn error_responses_carry_hints() {
        let response = error_response(&ServerError::MethodNotAllowed {
            method: "PATCH".into(),
            allowed: &["GET", "PUT"],
        });
        assert_eq!(response.status, 405);
        assert_eq!(response.header("Allow"), Some("GET, PUT"));

        let response = error_response(&ServerError::from(
            syncstore_hawk::AuthError::MissingHeader,
        ));
        assert_eq!(response.status, 401);
        assert_eq!(response.header("WWW-Authenticate"), Some("Hawk"));
    }
}
