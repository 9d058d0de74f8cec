use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::error::Error;
use crate::plugin::SearchPlugin;

#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
struct InvokeResponse {
    result: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// `GET /plugins/etw` and `POST /plugins/etw/{function}`.
pub fn routes(plugin: Arc<SearchPlugin>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    // GET /plugins/etw
    let list = warp::get()
        .and(warp::path!("plugins" / "etw"))
        .and(with_plugin(plugin.clone()))
        .map(|plugin: Arc<SearchPlugin>| warp::reply::json(&plugin.functions()));

    // POST /plugins/etw/{function}
    let invoke = warp::post()
        .and(warp::path!("plugins" / "etw" / String))
        .and(warp::body::json())
        .and(with_plugin(plugin))
        .and_then(|function: String, req: InvokeRequest, plugin: Arc<SearchPlugin>| async move {
            Ok::<_, Infallible>(invoke_reply(&plugin, &function, &req.query).await)
        });

    list.or(invoke)
}

async fn invoke_reply(plugin: &SearchPlugin, function: &str, query: &str) -> warp::reply::WithStatus<warp::reply::Json> {
    match plugin.invoke(function, query).await {
        Ok(result) => warp::reply::with_status(warp::reply::json(&InvokeResponse { result }), StatusCode::OK),
        Err(e @ Error::UnknownFunction(_)) => {
            warp::reply::with_status(warp::reply::json(&ErrorResponse { error: e.to_string() }), StatusCode::NOT_FOUND)
        }
        Err(e) => {
            warn!(function, error = %e, "plugin call failed");
            warp::reply::with_status(
                warp::reply::json(&ErrorResponse { error: e.to_string() }),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
    }
}

pub async fn serve(plugin: Arc<SearchPlugin>, addr: SocketAddr, shutdown: impl std::future::Future<Output = ()> + Send + 'static) {
    let (bound, server) = warp::serve(routes(plugin)).bind_with_graceful_shutdown(addr, shutdown);
    info!(%bound, "plugin API listening");
    server.await;
}

fn with_plugin(plugin: Arc<SearchPlugin>) -> impl Filter<Extract = (Arc<SearchPlugin>,), Error = Infallible> + Clone {
    warp::any().map(move || plugin.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::CancellationToken;
    use crate::config::Settings;
    use crate::domain::ParsedEtwEvent;
    use crate::embedding::HashingEmbedder;
    use crate::store::MemoryStore;
    use crate::{LogProgress, TopicRecords, VectorDatabase};
    use serde_json::{json, Value};

    async fn seeded_plugin() -> Arc<SearchPlugin> {
        let db = VectorDatabase::new(
            Arc::new(MemoryStore::new()),
            Arc::new(HashingEmbedder::default()),
            Settings::default(),
        );
        db.initialize(&LogProgress).await.unwrap();
        let event = ParsedEtwEvent {
            provider_name: Some("Microsoft-Windows-Kernel-Process".into()),
            event_id: 1,
            task: Some("ProcessStart".into()),
            ..Default::default()
        };
        db.import_data(&TopicRecords::EventData(vec![event]), &CancellationToken::new())
            .await
            .unwrap();
        Arc::new(SearchPlugin::new(Arc::new(db)))
    }

    #[tokio::test]
    async fn lists_function_descriptors() {
        let api = routes(seeded_plugin().await);
        let res = warp::test::request().method("GET").path("/plugins/etw").reply(&api).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body[0]["name"], "search_manifests");
        assert_eq!(body[1]["name"], "search_events");
    }

    #[tokio::test]
    async fn search_events_returns_the_description() {
        let api = routes(seeded_plugin().await);
        let res = warp::test::request()
            .method("POST")
            .path("/plugins/etw/search_events")
            .json(&json!({ "query": "kernel process start" }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        let result = body["result"].as_str().unwrap();
        assert!(result.contains("Microsoft-Windows-Kernel-Process"), "{}", result);
    }

    #[tokio::test]
    async fn empty_topic_yields_empty_result() {
        let api = routes(seeded_plugin().await);
        let res = warp::test::request()
            .method("POST")
            .path("/plugins/etw/search_manifests")
            .json(&json!({ "query": "anything" }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["result"], "");
    }

    #[tokio::test]
    async fn unknown_function_is_not_found() {
        let api = routes(seeded_plugin().await);
        let res = warp::test::request()
            .method("POST")
            .path("/plugins/etw/drop_everything")
            .json(&json!({ "query": "x" }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert!(body["error"].as_str().unwrap().contains("drop_everything"));
    }

    #[tokio::test]
    async fn uninitialized_database_is_a_server_error() {
        let db = VectorDatabase::new(
            Arc::new(MemoryStore::new()),
            Arc::new(HashingEmbedder::default()),
            Settings::default(),
        );
        let api = routes(Arc::new(SearchPlugin::new(Arc::new(db))));
        let res = warp::test::request()
            .method("POST")
            .path("/plugins/etw/search_events")
            .json(&json!({ "query": "x" }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
