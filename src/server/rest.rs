//! REST API module.
//!
//! Exposes the graph over HTTP under `[web].rest_api_path`. Representations
//! carry absolute links built from the request's `Host` header so they stay
//! valid when the server was bound to an ephemeral port.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::graph::{GraphDatabase, GraphError, Node, NodeId, Properties, Relationship};
use crate::server::container::ContainerError;
use crate::server::modules::{ModuleContext, ServerModule};

/// The graph REST API.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestApiModule;

impl ServerModule for RestApiModule {
    fn name(&self) -> &str {
        "rest-api"
    }

    fn router(&self, ctx: &ModuleContext) -> Result<Router, ContainerError> {
        let prefix = ctx.properties.web.rest_api_prefix().to_string();
        let state = RestState {
            db: ctx.database.clone(),
            prefix: prefix.clone(),
        };

        Ok(Router::new()
            .route(&prefix, get(service_root))
            .route(&format!("{prefix}/"), get(service_root))
            .route(&format!("{prefix}/node"), post(create_node))
            .route(&format!("{prefix}/node/{{id}}"), get(get_node).delete(delete_node))
            .route(&format!("{prefix}/node/{{id}}/properties"), put(set_node_properties))
            .route(&format!("{prefix}/node/{{id}}/relationships"), post(create_relationship))
            .route(&format!("{prefix}/node/{{id}}/relationships/all"), get(list_relationships))
            .route(
                &format!("{prefix}/relationship/{{id}}"),
                get(get_relationship).delete(delete_relationship),
            )
            .route(&format!("{prefix}/index/node"), get(list_node_indexes))
            .route(&format!("{prefix}/index/node/{{name}}"), post(add_to_node_index))
            .route(
                &format!("{prefix}/index/node/{{name}}/{{key}}/{{value}}"),
                get(query_node_index),
            )
            .with_state(state))
    }
}

#[derive(Clone)]
struct RestState {
    db: Arc<GraphDatabase>,
    prefix: String,
}

impl RestState {
    fn base(&self, headers: &HeaderMap) -> String {
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");
        format!("http://{}{}", host, self.prefix)
    }
}

/// Error body returned by every failing endpoint.
#[derive(Debug)]
enum ApiError {
    Graph(GraphError),
    BadRequest(String),
}

impl From<GraphError> for ApiError {
    fn from(e: GraphError) -> Self {
        ApiError::Graph(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::Graph(e) => {
                let (status, kind) = match e {
                    GraphError::NodeNotFound(_) => (StatusCode::NOT_FOUND, "NodeNotFound"),
                    GraphError::RelationshipNotFound(_) => (StatusCode::NOT_FOUND, "RelationshipNotFound"),
                    GraphError::NodeHasRelationships { .. } => (StatusCode::CONFLICT, "NodeHasRelationships"),
                    GraphError::Io { .. } | GraphError::Snapshot(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "StorageError")
                    }
                };
                (status, kind, e.to_string())
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "BadRequest", message),
        };
        (status, Json(json!({ "exception": kind, "message": message }))).into_response()
    }
}

fn node_repr(base: &str, node: &Node) -> Value {
    let this = format!("{}/node/{}", base, node.id);
    json!({
        "self": this,
        "id": node.id,
        "data": node.properties,
        "properties": format!("{this}/properties"),
        "create_relationship": format!("{this}/relationships"),
        "all_relationships": format!("{this}/relationships/all"),
    })
}

fn relationship_repr(base: &str, rel: &Relationship) -> Value {
    json!({
        "self": format!("{}/relationship/{}", base, rel.id),
        "id": rel.id,
        "type": rel.rel_type,
        "start": format!("{}/node/{}", base, rel.start),
        "end": format!("{}/node/{}", base, rel.end),
        "data": rel.properties,
    })
}

/// Accepts `42`, `"42"` or `"http://host/db/data/node/42"`.
fn parse_node_ref(value: &Value) -> Option<NodeId> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim_end_matches('/').rsplit('/').next()?.parse().ok(),
        _ => None,
    }
}

fn index_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_properties(body: &Bytes) -> Result<Properties, ApiError> {
    if body.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::BadRequest("properties must be a JSON object".to_string())),
        Err(e) => Err(ApiError::BadRequest(format!("invalid JSON: {e}"))),
    }
}

async fn service_root(State(state): State<RestState>, headers: HeaderMap) -> Json<Value> {
    let base = state.base(&headers);
    Json(json!({
        "node": format!("{base}/node"),
        "node_index": format!("{base}/index/node"),
        "relationship": format!("{base}/relationship"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn create_node(
    State(state): State<RestState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let properties = parse_properties(&body)?;
    let node = state.db.create_node(properties);
    let repr = node_repr(&state.base(&headers), &node);
    let location = repr["self"].as_str().unwrap_or_default().to_string();
    tracing::debug!(node = node.id, "Node created");
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(repr)).into_response())
}

async fn get_node(
    State(state): State<RestState>,
    headers: HeaderMap,
    Path(id): Path<NodeId>,
) -> Result<Json<Value>, ApiError> {
    let node = state.db.node(id).ok_or(GraphError::NodeNotFound(id))?;
    Ok(Json(node_repr(&state.base(&headers), &node)))
}

async fn set_node_properties(
    State(state): State<RestState>,
    Path(id): Path<NodeId>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let properties = parse_properties(&body)?;
    state.db.set_node_properties(id, properties)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_node(State(state): State<RestState>, Path(id): Path<NodeId>) -> Result<StatusCode, ApiError> {
    state.db.delete_node(id)?;
    tracing::debug!(node = id, "Node deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct CreateRelationship {
    to: Value,
    #[serde(rename = "type")]
    rel_type: String,
    #[serde(default)]
    data: Properties,
}

async fn create_relationship(
    State(state): State<RestState>,
    headers: HeaderMap,
    Path(id): Path<NodeId>,
    Json(body): Json<CreateRelationship>,
) -> Result<Response, ApiError> {
    let to = parse_node_ref(&body.to)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid 'to' reference: {}", body.to)))?;
    let rel = state.db.create_relationship(id, to, body.rel_type, body.data)?;
    let repr = relationship_repr(&state.base(&headers), &rel);
    let location = repr["self"].as_str().unwrap_or_default().to_string();
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(repr)).into_response())
}

async fn list_relationships(
    State(state): State<RestState>,
    headers: HeaderMap,
    Path(id): Path<NodeId>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let base = state.base(&headers);
    let rels = state.db.relationships_of(id)?;
    Ok(Json(rels.iter().map(|r| relationship_repr(&base, r)).collect()))
}

async fn get_relationship(
    State(state): State<RestState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    let rel = state.db.relationship(id).ok_or(GraphError::RelationshipNotFound(id))?;
    Ok(Json(relationship_repr(&state.base(&headers), &rel)))
}

async fn delete_relationship(State(state): State<RestState>, Path(id): Path<u64>) -> Result<StatusCode, ApiError> {
    state.db.delete_relationship(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_node_indexes(State(state): State<RestState>, headers: HeaderMap) -> Json<Value> {
    let base = state.base(&headers);
    let indexes: Map<String, Value> = state
        .db
        .index_names()
        .into_iter()
        .map(|name| {
            let template = format!("{base}/index/node/{name}/{{key}}/{{value}}");
            (name, json!({ "template": template }))
        })
        .collect();
    Json(Value::Object(indexes))
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    key: String,
    value: Value,
    uri: Value,
}

async fn add_to_node_index(
    State(state): State<RestState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(entry): Json<IndexEntry>,
) -> Result<Response, ApiError> {
    let id = parse_node_ref(&entry.uri)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid node reference: {}", entry.uri)))?;
    let value = index_value(&entry.value);
    state.db.add_to_index(&name, entry.key.as_str(), value.as_str(), id)?;

    let node = state.db.node(id).ok_or(GraphError::NodeNotFound(id))?;
    let base = state.base(&headers);
    let location = format!("{}/index/node/{}/{}/{}/{}", base, name, entry.key, value, id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(node_repr(&base, &node))).into_response())
}

async fn query_node_index(
    State(state): State<RestState>,
    headers: HeaderMap,
    Path((name, key, value)): Path<(String, String, String)>,
) -> Json<Vec<Value>> {
    let base = state.base(&headers);
    let hits = state.db.query_index(&name, &key, &value);
    Json(hits.iter().map(|n| node_repr(&base, n)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ServerProperties;
    use axum::body::Body;
    use axum::http::Request;
    use std::collections::BTreeMap;
    use tower::ServiceExt;

    fn setup() -> (Arc<GraphDatabase>, Router) {
        let db = Arc::new(GraphDatabase::impermanent(BTreeMap::new()));
        let ctx = ModuleContext {
            database: db.clone(),
            properties: ServerProperties::default(),
        };
        let router = RestApiModule.router(&ctx).unwrap();
        (db, router)
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, "example:7473")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, "example:7473")
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_parse_node_ref() {
        assert_eq!(parse_node_ref(&json!(3)), Some(3));
        assert_eq!(parse_node_ref(&json!("http://h/db/data/node/17")), Some(17));
        assert_eq!(parse_node_ref(&json!("http://h/db/data/node/17/")), Some(17));
        assert_eq!(parse_node_ref(&json!("not-a-node")), None);
        assert_eq!(parse_node_ref(&json!(null)), None);
    }

    #[tokio::test]
    async fn test_service_root_links() {
        let (_, router) = setup();
        let (status, body) = send(&router, empty_request("GET", "/db/data/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["node"], "http://example:7473/db/data/node");
    }

    #[tokio::test]
    async fn test_create_and_fetch_node() {
        let (db, router) = setup();
        let (status, body) = send(&router, json_request("POST", "/db/data/node", json!({"name": "alice"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["name"], "alice");
        assert_eq!(db.node_count(), 1);

        let id = body["id"].as_u64().unwrap();
        let (status, body) = send(&router, empty_request("GET", &format!("/db/data/node/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["self"], format!("http://example:7473/db/data/node/{id}"));
    }

    #[tokio::test]
    async fn test_create_node_without_body() {
        let (db, router) = setup();
        let (status, _) = send(&router, empty_request("POST", "/db/data/node")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(db.node_count(), 1);
    }

    #[tokio::test]
    async fn test_non_object_properties_rejected() {
        let (_, router) = setup();
        let (status, body) = send(&router, json_request("POST", "/db/data/node", json!([1, 2]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["exception"], "BadRequest");
    }

    #[tokio::test]
    async fn test_missing_node_is_404() {
        let (_, router) = setup();
        let (status, body) = send(&router, empty_request("GET", "/db/data/node/99")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["exception"], "NodeNotFound");
    }

    #[tokio::test]
    async fn test_relationship_lifecycle_and_conflict() {
        let (db, router) = setup();
        let a = db.create_node(Properties::new());
        let b = db.create_node(Properties::new());

        let (status, rel) = send(
            &router,
            json_request(
                "POST",
                &format!("/db/data/node/{}/relationships", a.id),
                json!({"to": format!("http://example:7473/db/data/node/{}", b.id), "type": "KNOWS"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(rel["type"], "KNOWS");

        let (status, _) = send(&router, empty_request("DELETE", &format!("/db/data/node/{}", a.id))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, all) = send(
            &router,
            empty_request("GET", &format!("/db/data/node/{}/relationships/all", b.id)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all.as_array().unwrap().len(), 1);

        let rel_id = rel["id"].as_u64().unwrap();
        let (status, _) = send(&router, empty_request("DELETE", &format!("/db/data/relationship/{rel_id}"))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&router, empty_request("DELETE", &format!("/db/data/node/{}", a.id))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_replace_properties() {
        let (db, router) = setup();
        let a = db.create_node(serde_json::from_value(json!({"old": true})).unwrap());
        let (status, _) = send(
            &router,
            json_request("PUT", &format!("/db/data/node/{}/properties", a.id), json!({"new": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let node = db.node(a.id).unwrap();
        assert!(node.properties.get("old").is_none());
        assert_eq!(node.properties["new"], 1);
    }

    #[tokio::test]
    async fn test_node_index_round_trip() {
        let (db, router) = setup();
        let a = db.create_node(Properties::new());

        let (status, _) = send(
            &router,
            json_request(
                "POST",
                "/db/data/index/node/people",
                json!({"key": "age", "value": 42, "uri": a.id}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, hits) = send(&router, empty_request("GET", "/db/data/index/node/people/age/42")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(hits[0]["id"], a.id);

        let (_, indexes) = send(&router, empty_request("GET", "/db/data/index/node")).await;
        assert!(indexes.get("people").is_some());
    }
}
