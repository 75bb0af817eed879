use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{future::ready, sync::Arc};

use common_metrics::track_metrics;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::api::endpoints::{create_link, health, index, list_links};
use crate::api::errors::{handle_panic, json_error_responses, not_found};
use crate::store::LinkStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LinkStore>,
}

pub fn router(
    store: Arc<dyn LinkStore>,
    max_body_size: usize,
    metrics: Option<PrometheusHandle>,
) -> Router {
    let state = AppState { store };

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .allow_origin(AllowOrigin::mirror_request());

    let status_router = Router::new()
        .route("/", get(index))
        .route("/health", get(health));

    let links_router = Router::new().route("/links", get(list_links).post(create_link));

    let mut router = Router::new().merge(status_router).merge(links_router);
    let track_requests = metrics.is_some();
    if let Some(recorder_handle) = metrics {
        router = router.route("/metrics", get(move || ready(recorder_handle.render())));
    }

    // The last layer added is the outermost one.
    let router = router
        .fallback(not_found)
        .layer(axum::middleware::map_response(json_error_responses))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    if track_requests {
        router.layer(axum::middleware::from_fn(track_metrics))
    } else {
        router
    }
}
