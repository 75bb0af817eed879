use axum::{extract::State, http::StatusCode, Json};
use bytes::Bytes;
use tracing::instrument;

use crate::{
    api::{
        errors::ApiError,
        types::{parse_new_link, HealthResponse, IndexResponse},
    },
    router::AppState,
    store::Link,
};

pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        message: "Welcome to the Bookmarks API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn health(state: State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state.store.check_connection().await?;

    Ok(Json(HealthResponse {
        status: "connected",
        database: "PostgresSQL",
    }))
}

// The body is taken as raw bytes so that a missing body or a missing content type
// is a validation error of our own rather than an extractor rejection.
#[instrument(skip_all)]
pub async fn create_link(
    state: State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Link>), ApiError> {
    let new_link = parse_new_link(&body)?;

    let link = state.store.create(new_link).await?;

    tracing::info!(id = link.id, "Stored link");
    Ok((StatusCode::CREATED, Json(link)))
}

#[instrument(skip_all)]
pub async fn list_links(state: State<AppState>) -> Result<Json<Vec<Link>>, ApiError> {
    let links = state.store.list_all().await?;
    Ok(Json(links))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_json_diff::assert_json_include;
    use axum::{
        body::Body,
        http::{self, header, Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt; // for `collect`
    use serde_json::{json, Value};
    use tower::ServiceExt; // for `oneshot`

    use crate::router::router;
    use crate::store::LinkStore;
    use crate::utils::test_utils::{FaultyLinkStore, InMemoryLinkStore};

    const MAX_BODY_SIZE: usize = 1_000_000;

    fn app(store: Arc<dyn LinkStore>) -> Router {
        router(store, MAX_BODY_SIZE, None)
    }

    fn in_memory_app() -> Router {
        app(Arc::new(InMemoryLinkStore::new()))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, value)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method(http::Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    #[tokio::test]
    async fn index() {
        let (status, body) = send(&in_memory_app(), get("/")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"message": "Welcome to the Bookmarks API", "version": env!("CARGO_PKG_VERSION")})
        );
    }

    #[tokio::test]
    async fn health_reports_connected() {
        let (status, body) = send(&in_memory_app(), get("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "connected", "database": "PostgresSQL"}));
    }

    #[tokio::test]
    async fn health_when_store_is_unreachable() {
        let app = app(Arc::new(FaultyLinkStore::unreachable()));

        let (status, body) = send(&app, get("/health")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Database Error");
    }

    #[tokio::test]
    async fn create_link_success() {
        let app = in_memory_app();

        let (status, body) = send(
            &app,
            post_json("/links", r#"{"url": "https://a.example", "title": "A"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert!(body["id"].is_i64());
        assert_json_include!(
            actual: &body,
            expected: json!({"url": "https://a.example", "title": "A", "description": null})
        );
        let created_at = body["created_at"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(created_at).is_ok());
        assert!(created_at.ends_with("+00:00"));
    }

    #[tokio::test]
    async fn create_link_echoes_all_fields() {
        let app = in_memory_app();
        let payload = json!({
            "url": "https://b.example/path?q=1",
            "title": "B",
            "description": "a longer description",
        });

        let (status, body) = send(&app, post_json("/links", payload.to_string())).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_json_include!(actual: body, expected: payload);
    }

    #[tokio::test]
    async fn create_link_without_content_type() {
        let app = in_memory_app();
        let request = Request::builder()
            .method(http::Method::POST)
            .uri("/links")
            .body(Body::from(r#"{"url": "https://a.example"}"#))
            .unwrap();

        let (status, _) = send(&app, request).await;

        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn create_link_missing_url() {
        let app = in_memory_app();
        let expected = json!({"error": "Bad Request", "message": "URL is required"});

        let requests = vec![
            post_json("/links", "{}"),
            post_json("/links", Body::empty()),
            post_json("/links", "not json"),
            post_json("/links", r#"{"title": "no url"}"#),
            post_json("/links", r#"{"url": ""}"#),
        ];

        for request in requests {
            let (status, body) = send(&app, request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, expected);
        }

        // nothing was stored along the way
        let (_, listed) = send(&app, get("/links")).await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn create_link_wrong_type() {
        let (status, body) = send(
            &in_memory_app(),
            post_json("/links", r#"{"url": "https://a.example", "title": 5}"#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"error": "Bad Request", "message": "title must be a string"})
        );
    }

    #[tokio::test]
    async fn create_link_body_too_large() {
        let app = in_memory_app();
        let payload = json!({"url": "https://a.example", "description": "a".repeat(MAX_BODY_SIZE)});

        let (status, body) = send(&app, post_json("/links", payload.to_string())).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"], "Payload Too Large");
    }

    #[tokio::test]
    async fn list_links_empty() {
        let (status, body) = send(&in_memory_app(), get("/links")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn list_links_newest_first() {
        let app = in_memory_app();

        for i in 0..3 {
            let (status, _) = send(
                &app,
                post_json("/links", json!({"url": format!("https://{i}.example")}).to_string()),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send(&app, get("/links")).await;

        assert_eq!(status, StatusCode::OK);
        let urls: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|link| link["url"].as_str().unwrap())
            .collect();
        assert_eq!(
            urls,
            vec!["https://2.example", "https://1.example", "https://0.example"]
        );
    }

    #[tokio::test]
    async fn failed_create_then_list_still_works() {
        let store = Arc::new(FaultyLinkStore::new());
        let app = app(store.clone());

        let (status, _) = send(&app, post_json("/links", r#"{"url": "https://keep.example"}"#)).await;
        assert_eq!(status, StatusCode::CREATED);

        store.set_fail_creates(true);
        let (status, body) =
            send(&app, post_json("/links", r#"{"url": "https://lost.example"}"#)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({"error": "Database Error", "message": "A database operation failed."})
        );

        let (status, body) = send(&app, get("/links")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["url"], "https://keep.example");
    }

    #[tokio::test]
    async fn list_links_storage_failure() {
        let app = app(Arc::new(FaultyLinkStore::unreachable()));

        let (status, body) = send(&app, get("/links")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Database Error");
    }

    #[tokio::test]
    async fn panics_become_internal_errors() {
        let app = app(Arc::new(FaultyLinkStore::panicking_lists()));

        let (status, body) = send(&app, get("/links")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({"error": "Internal Server Error", "message": "An unexpected error occurred."})
        );
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let (status, body) = send(&in_memory_app(), get("/nope")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not Found");
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn disallowed_methods_are_json_405() {
        let app = in_memory_app();

        for (method, uri) in [
            (http::Method::PUT, "/links"),
            (http::Method::DELETE, "/links"),
            (http::Method::POST, "/health"),
            (http::Method::POST, "/"),
        ] {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap();

            let (status, body) = send(&app, request).await;

            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(body["error"], "Method Not Allowed");
        }
    }
}
