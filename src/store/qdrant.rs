use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{CollectionInfo, NearestQuery, ScrollPage, StoreError, StoreResult, VectorParams, VectorStore};
use crate::model::{Point, ScoredPoint};
use crate::schema::{CollectionSchema, IndexKind, PayloadIndex};
use crate::vector::Metric;

/// Qdrant REST client.
#[derive(Debug, Clone)]
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct CollectionList {
    collections: Vec<CollectionName>,
}

#[derive(Deserialize)]
struct CollectionName {
    name: String,
}

#[derive(Deserialize)]
struct CountResult {
    count: u64,
}

#[derive(Deserialize)]
struct ScrollResult {
    points: Vec<Point>,
    next_page_offset: Option<Value>,
}

impl QdrantStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client: reqwest::Client::new(), base_url, api_key }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> StoreResult<T> {
        let resp = check(builder.send().await?).await?;
        let envelope = resp.json::<Envelope<T>>().await?;
        Ok(envelope.result)
    }

    async fn create_payload_indexes(&self, name: &str, schema: &CollectionSchema) -> StoreResult<()> {
        for (field, kind) in schema.payload_indexes() {
            let body = json!({ "field_name": field, "field_schema": kind.as_str() });
            let builder = self
                .request(Method::PUT, &format!("collections/{}/index?wait=true", name))
                .json(&body);
            self.send::<Value>(builder).await?;
            debug!(collection = name, field = %field, kind = kind.as_str(), "created payload index");
        }
        Ok(())
    }
}

async fn check(resp: Response) -> StoreResult<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Status { status, body })
}

fn distance_name(metric: Metric) -> &'static str {
    match metric {
        Metric::Cosine => "Cosine",
        Metric::Euclidean => "Euclid",
    }
}

fn parse_distance(name: &str) -> Option<Metric> {
    match name {
        "Cosine" => Some(Metric::Cosine),
        "Euclid" => Some(Metric::Euclidean),
        _ => None,
    }
}

pub(crate) fn create_collection_body(schema: &CollectionSchema) -> Value {
    let IndexKind::Hnsw { m, ef_construct } = schema.vector.index;
    json!({
        "vectors": {
            schema.vector.name: {
                "size": schema.vector.dimension,
                "distance": distance_name(schema.vector.distance),
                "hnsw_config": { "m": m, "ef_construct": ef_construct }
            }
        }
    })
}

pub(crate) fn search_body(query: &NearestQuery) -> Value {
    let mut body = json!({
        "vector": { "name": query.vector_field, "vector": query.vector },
        "limit": query.limit,
        "with_payload": true,
        "with_vector": query.with_vectors,
    });
    if let Some(threshold) = query.score_threshold {
        body["score_threshold"] = json!(threshold);
    }
    body
}

/// Reads `result.config.params.vectors` and `result.payload_schema` from a
/// collection info response. A collection created with a single unnamed
/// vector reports no named vectors.
pub(crate) fn parse_collection_info(result: &Value) -> StoreResult<CollectionInfo> {
    let points = result.get("points_count").and_then(Value::as_u64).unwrap_or(0);
    let raw = result
        .pointer("/config/params/vectors")
        .ok_or_else(|| StoreError::Decode("collection info has no vector params".into()))?;

    let mut payload = BTreeMap::new();
    if let Some(map) = result.get("payload_schema").and_then(Value::as_object) {
        for (name, field) in map {
            let data_type = field.get("data_type").and_then(Value::as_str).unwrap_or_default();
            let kind = PayloadIndex::parse(data_type).ok_or_else(|| {
                StoreError::Decode(format!("unsupported payload index '{}' on '{}'", data_type, name))
            })?;
            payload.insert(name.clone(), kind);
        }
    }

    let mut vectors = BTreeMap::new();
    if let Some(map) = raw.as_object() {
        if map.contains_key("size") {
            return Ok(CollectionInfo { points, vectors, payload });
        }
        for (name, params) in map {
            let dimension = params.get("size").and_then(Value::as_u64);
            let distance = params.get("distance").and_then(Value::as_str).and_then(parse_distance);
            if let (Some(dimension), Some(distance)) = (dimension, distance) {
                vectors.insert(name.clone(), VectorParams { dimension: dimension as usize, distance });
            }
        }
    }
    Ok(CollectionInfo { points, vectors, payload })
}

fn offset_to_string(offset: Value) -> Option<String> {
    match offset {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn offset_to_json(offset: &str) -> Value {
    match offset.parse::<u64>() {
        Ok(n) => json!(n),
        Err(_) => json!(offset),
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn list_collections(&self) -> StoreResult<Vec<String>> {
        let list: CollectionList = self.send(self.request(Method::GET, "collections")).await?;
        Ok(list.collections.into_iter().map(|c| c.name).collect())
    }

    async fn create_collection(&self, name: &str, schema: &CollectionSchema) -> StoreResult<()> {
        let builder = self
            .request(Method::PUT, &format!("collections/{}", name))
            .json(&create_collection_body(schema));
        self.send::<Value>(builder).await?;
        self.create_payload_indexes(name, schema).await?;
        info!(collection = name, "created collection in qdrant");
        Ok(())
    }

    async fn collection_info(&self, name: &str) -> StoreResult<Option<CollectionInfo>> {
        let resp = self.request(Method::GET, &format!("collections/{}", name)).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let envelope = check(resp).await?.json::<Envelope<Value>>().await?;
        parse_collection_info(&envelope.result).map(Some)
    }

    async fn delete_collection(&self, name: &str) -> StoreResult<()> {
        let resp = self.request(Method::DELETE, &format!("collections/{}", name)).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(resp).await?;
        Ok(())
    }

    async fn upsert(&self, name: &str, points: Vec<Point>) -> StoreResult<()> {
        if points.is_empty() {
            return Ok(());
        }
        let builder = self
            .request(Method::PUT, &format!("collections/{}/points?wait=true", name))
            .json(&json!({ "points": points }));
        self.send::<Value>(builder).await?;
        Ok(())
    }

    async fn count(&self, name: &str) -> StoreResult<u64> {
        let resp = self
            .request(Method::POST, &format!("collections/{}/points/count", name))
            .json(&json!({ "exact": true }))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        let envelope = check(resp).await?.json::<Envelope<CountResult>>().await?;
        Ok(envelope.result.count)
    }

    async fn query(&self, name: &str, query: &NearestQuery) -> StoreResult<Vec<ScoredPoint>> {
        let builder = self
            .request(Method::POST, &format!("collections/{}/points/search", name))
            .json(&search_body(query));
        let resp = builder.send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::CollectionMissing(name.to_string()));
        }
        let envelope = check(resp).await?.json::<Envelope<Vec<ScoredPoint>>>().await?;
        Ok(envelope.result)
    }

    async fn scroll(&self, name: &str, offset: Option<String>, limit: usize) -> StoreResult<ScrollPage> {
        let body = json!({
            "limit": limit.max(1),
            "offset": offset.as_deref().map(offset_to_json),
            "with_payload": true,
            "with_vector": true,
        });
        let builder = self
            .request(Method::POST, &format!("collections/{}/points/scroll", name))
            .json(&body);
        let result: ScrollResult = self.send(builder).await?;
        Ok(ScrollPage {
            points: result.points,
            next_offset: result.next_page_offset.and_then(offset_to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DESCRIPTION_VECTOR;
    use crate::schema::{DataField, VectorField};

    const SCHEMA: CollectionSchema = CollectionSchema {
        data_fields: &[
            DataField::keyword("provider_name").searchable(),
            DataField::integer_list("event_ids"),
            DataField::text("description"),
        ],
        vector: VectorField {
            name: DESCRIPTION_VECTOR,
            dimension: 384,
            index: IndexKind::Hnsw { m: 16, ef_construct: 100 },
            distance: Metric::Cosine,
        },
    };

    #[test]
    fn create_body_declares_named_hnsw_vector() {
        let body = create_collection_body(&SCHEMA);
        let vector = &body["vectors"][DESCRIPTION_VECTOR];
        assert_eq!(vector["size"], 384);
        assert_eq!(vector["distance"], "Cosine");
        assert_eq!(vector["hnsw_config"]["m"], 16);
    }

    #[test]
    fn search_body_names_the_vector_and_limit() {
        let body = search_body(&NearestQuery {
            vector_field: DESCRIPTION_VECTOR.into(),
            vector: vec![0.25; 3],
            limit: 1,
            score_threshold: Some(0.5),
            with_vectors: true,
        });
        assert_eq!(body["vector"]["name"], DESCRIPTION_VECTOR);
        assert_eq!(body["limit"], 1);
        assert_eq!(body["score_threshold"], 0.5);
        assert_eq!(body["with_vector"], true);
    }

    #[test]
    fn collection_info_reads_named_vectors() {
        let result = json!({
            "status": "green",
            "points_count": 12,
            "config": { "params": { "vectors": {
                DESCRIPTION_VECTOR: { "size": 384, "distance": "Cosine" }
            }}}
        });
        let info = parse_collection_info(&result).unwrap();
        assert_eq!(info.points, 12);
        assert_eq!(
            info.vectors[DESCRIPTION_VECTOR],
            VectorParams { dimension: 384, distance: Metric::Cosine }
        );
    }

    #[test]
    fn unnamed_vector_collection_reports_no_named_vectors() {
        let result = json!({ "config": { "params": { "vectors": { "size": 384, "distance": "Dot" } } } });
        assert!(parse_collection_info(&result).unwrap().vectors.is_empty());
    }

    #[test]
    fn scroll_offsets_round_trip_uuid_and_numeric_ids() {
        assert_eq!(offset_to_string(json!(42)), Some("42".to_string()));
        assert_eq!(offset_to_json("42"), json!(42));
        let uuid = "0b6f1a9e-0000-4000-8000-000000000001";
        assert_eq!(offset_to_json(uuid), json!(uuid));
        assert_eq!(offset_to_string(Value::Null), None);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let store = QdrantStore::new("http://localhost:6333/", None);
        assert_eq!(store.base_url, "http://localhost:6333");
    }

    #[test]
    fn collection_info_reads_payload_indexes() {
        let result = json!({
            "config": { "params": { "vectors": { DESCRIPTION_VECTOR: { "size": 384, "distance": "Cosine" } } } },
            "payload_schema": {
                "description": { "data_type": "text", "points": 3 },
                "event_ids": { "data_type": "integer", "points": 3 }
            }
        });
        let info = parse_collection_info(&result).unwrap();
        assert_eq!(info.payload["description"], PayloadIndex::Text);
        assert_eq!(info.payload["event_ids"], PayloadIndex::Integer);

        let odd = json!({
            "config": { "params": { "vectors": {} } },
            "payload_schema": { "x": { "data_type": "geo" } }
        });
        assert!(matches!(parse_collection_info(&odd), Err(StoreError::Decode(_))));
    }

    // A local stand-in for the Qdrant REST API.

    #[derive(Default)]
    struct Recorded {
        upserts: std::sync::Mutex<Vec<Value>>,
        api_keys: std::sync::Mutex<Vec<Option<String>>>,
    }

    fn ok(result: Value) -> (Value, warp::http::StatusCode) {
        (json!({ "result": result, "status": "ok", "time": 0.0 }), warp::http::StatusCode::OK)
    }

    fn stored(key: &str) -> Value {
        json!({ "id": key, "payload": { "description": key }, "vector": { DESCRIPTION_VECTOR: [0.5, 0.5] } })
    }

    fn respond(recorded: &Recorded, method: &str, path: &str, body: Value) -> (Value, warp::http::StatusCode) {
        match (method, path) {
            ("GET", "/collections") => ok(json!({ "collections": [{ "name": "m" }, { "name": "e" }] })),
            ("GET", "/collections/m") => ok(json!({
                "status": "green",
                "points_count": 3,
                "config": { "params": { "vectors": { DESCRIPTION_VECTOR: { "size": 384, "distance": "Cosine" } } } },
                "payload_schema": { "description": { "data_type": "text", "points": 3 } }
            })),
            ("PUT", "/collections/m/points") => {
                recorded.upserts.lock().unwrap().push(body);
                ok(json!({ "operation_id": 1, "status": "completed" }))
            }
            ("POST", "/collections/m/points/count") => ok(json!({ "count": 3 })),
            ("POST", "/collections/m/points/scroll") if body["offset"].is_null() => {
                ok(json!({ "points": [stored("a"), stored("b")], "next_page_offset": "c" }))
            }
            ("POST", "/collections/m/points/scroll") => ok(json!({ "points": [stored("c")], "next_page_offset": null })),
            ("POST", "/collections/m/points/search") => ok(json!([
                { "id": "a", "version": 1, "score": 0.75, "payload": { "description": "a" }, "vector": null }
            ])),
            (_, path) if path.starts_with("/collections/missing") => (
                json!({ "status": { "error": "Not found: Collection `missing` doesn't exist!" }, "time": 0.0 }),
                warp::http::StatusCode::NOT_FOUND,
            ),
            _ => (json!({ "status": { "error": "boom" } }), warp::http::StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    fn stub_server(recorded: std::sync::Arc<Recorded>) -> QdrantStore {
        use warp::Filter;

        let routes = warp::any()
            .and(warp::method())
            .and(warp::path::full())
            .and(warp::header::optional::<String>("api-key"))
            .and(warp::body::bytes())
            .map(
                move |method: warp::http::Method,
                      path: warp::path::FullPath,
                      key: Option<String>,
                      body: warp::hyper::body::Bytes| {
                    recorded.api_keys.lock().unwrap().push(key);
                    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
                    let (reply, status) = respond(&recorded, method.as_str(), path.as_str(), body);
                    warp::reply::with_status(warp::reply::json(&reply), status)
                },
            );
        let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        QdrantStore::new(format!("http://{}/", addr), Some("secret".into()))
    }

    fn stub() -> (QdrantStore, std::sync::Arc<Recorded>) {
        let recorded = std::sync::Arc::new(Recorded::default());
        (stub_server(recorded.clone()), recorded)
    }

    #[tokio::test]
    async fn missing_collection_is_empty_absent_and_deletable() {
        let (store, _) = stub();
        assert_eq!(store.count("missing").await.unwrap(), 0);
        store.delete_collection("missing").await.unwrap();
        assert!(store.collection_info("missing").await.unwrap().is_none());

        let query = NearestQuery {
            vector_field: DESCRIPTION_VECTOR.into(),
            vector: vec![0.5; 2],
            limit: 1,
            score_threshold: None,
            with_vectors: true,
        };
        assert!(matches!(store.query("missing", &query).await, Err(StoreError::CollectionMissing(_))));
    }

    #[tokio::test]
    async fn lists_and_describes_collections() {
        let (store, recorded) = stub();
        assert_eq!(store.list_collections().await.unwrap(), vec!["m", "e"]);

        let info = store.collection_info("m").await.unwrap().unwrap();
        assert_eq!(info.points, 3);
        assert_eq!(info.vectors[DESCRIPTION_VECTOR].dimension, 384);
        assert_eq!(info.payload["description"], PayloadIndex::Text);
        assert!(recorded.api_keys.lock().unwrap().iter().all(|k| k.as_deref() == Some("secret")));
    }

    #[tokio::test]
    async fn upsert_wraps_points_in_an_envelope() {
        let (store, recorded) = stub();
        let mut point = Point::new("0b6f1a9e-0000-4000-8000-000000000001");
        point.vectors.insert(DESCRIPTION_VECTOR.into(), vec![0.25, 0.75]);
        store.upsert("m", vec![point]).await.unwrap();
        store.upsert("m", Vec::new()).await.unwrap();

        let upserts = recorded.upserts.lock().unwrap();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0]["points"][0]["id"], "0b6f1a9e-0000-4000-8000-000000000001");
        assert_eq!(upserts[0]["points"][0]["vector"][DESCRIPTION_VECTOR][1], 0.75);
    }

    #[tokio::test]
    async fn count_and_scroll_follow_pages() {
        let (store, _) = stub();
        assert_eq!(store.count("m").await.unwrap(), 3);

        let first = store.scroll("m", None, 2).await.unwrap();
        assert_eq!(first.next_offset.as_deref(), Some("c"));
        let second = store.scroll("m", first.next_offset, 2).await.unwrap();
        assert!(second.next_offset.is_none());

        let keys: Vec<String> = first.points.into_iter().chain(second.points).map(|p| p.key).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn search_hits_tolerate_null_vectors() {
        let (store, _) = stub();
        let query = NearestQuery {
            vector_field: DESCRIPTION_VECTOR.into(),
            vector: vec![0.5; 2],
            limit: 1,
            score_threshold: None,
            with_vectors: false,
        };
        let hits = store.query("m", &query).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 0.75);
        assert!(hits[0].point.vectors.is_empty());
    }

    #[tokio::test]
    async fn server_errors_surface_status_and_body() {
        let (store, _) = stub();
        match store.count("broken").await {
            Err(StoreError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.contains("boom"));
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }
}
