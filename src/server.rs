//! HTTP surface.
//!
//! - `GET /` landing page,
//! - `GET /universe` the catalog as a Berkshelf universe document,
//! - `GET /cookbooks/{name}/{version}[/download]` a cookbook tarball, built on
//!   the spot.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use bodega_assemble::fetch::Result as FetchResult;
use bodega_assemble::{Assembler, FetchOptions, FetcherHandle, HttpFetcher};
use bodega_catalog::Catalog;
use bodega_upstream::UpstreamHandle;
use std::fmt::Display;
use std::sync::Arc;

const LANDING_PAGE: &str = include_str!("landing.html");

/// Produces a fresh fetcher for every download request.
pub type FetcherFactory = Arc<dyn Fn() -> FetchResult<FetcherHandle> + Send + Sync>;

/// Real HTTP fetchers with the given options.
pub fn http_fetchers(options: FetchOptions) -> FetcherFactory {
    Arc::new(move || {
        let fetcher: FetcherHandle = Arc::new(HttpFetcher::new(options)?);
        Ok(fetcher)
    })
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub upstream: UpstreamHandle,
    pub fetchers: FetcherFactory,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/universe", get(universe))
        .route("/cookbooks/{name}/{version}", get(download))
        .route("/cookbooks/{name}/{version}/download", get(download))
        .with_state(state)
}

async fn landing() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

async fn universe(State(state): State<AppState>) -> Response {
    let snapshot = state.catalog.snapshot().await;
    match serde_json::to_vec(&*snapshot) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(err) => internal_error(err),
    }
}

async fn download(State(state): State<AppState>, Path((name, version)): Path<(String, String)>) -> Response {
    tracing::info!(cookbook = %name, %version, "Download requested");
    let fetcher = match (state.fetchers)() {
        Ok(fetcher) => fetcher,
        Err(err) => return internal_error(&*err),
    };
    let assembler = Assembler::new(state.catalog.snapshot().await, Arc::clone(&state.upstream), fetcher);
    match assembler.assemble(&name, &version).await {
        Ok(artifact) => {
            let disposition = format!("attachment; filename=\"{}\"", artifact.file_name());
            let headers = [
                (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ];
            (headers, artifact.into_bytes()).into_response()
        },
        Err(err) => {
            tracing::error!(cookbook = %name, %version, error = ?err, "Download failed");
            internal_error(&*err)
        },
    }
}

fn internal_error(err: impl Display) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use bodega_archive::read_entries;
    use bodega_assemble::fetch::MockFetcher;
    use bodega_upstream::MockUpstream;
    use bodega_upstream::models::{Category, VersionDetail};

    struct Harness {
        state: AppState,
        upstream: Arc<MockUpstream>,
        fetcher: Arc<MockFetcher>,
    }

    async fn harness() -> Harness {
        let upstream = Arc::new(MockUpstream::with_versions([
            VersionDetail::new("apache2", "3.2.0")
                .with_file(Category::Files, "metadata.rb", "mock://apache2/metadata")
                .with_file(Category::Recipes, "recipes/default.rb", "mock://apache2/default")
                .with_dependency("iptables", ">= 0.0.0"),
            VersionDetail::new("nginx", "1.0.0")
                .with_file(Category::Recipes, "recipes/a.rb", "mock://nginx/a")
                .with_file(Category::Recipes, "recipes/b.rb", "mock://nginx/b")
                .with_file(Category::Recipes, "recipes/c.rb", "mock://nginx/c"),
        ]));
        let fetcher = Arc::new(
            MockFetcher::with_files([
                ("mock://apache2/metadata", "name 'apache2'"),
                ("mock://apache2/default", "package 'httpd'"),
                ("mock://nginx/a", "a"),
                ("mock://nginx/c", "c"),
            ])
            .with_status("mock://nginx/b", 404),
        );
        let catalog = Arc::new(Catalog::new(upstream.clone(), "http://localhost:8080"));
        catalog.refresh().await.unwrap();

        let shared = Arc::clone(&fetcher);
        let fetchers: FetcherFactory = Arc::new(move || {
            let fetcher: FetcherHandle = shared.clone();
            Ok(fetcher)
        });
        let state = AppState { catalog, upstream: upstream.clone(), fetchers };
        Harness { state, upstream, fetcher }
    }

    async fn body(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    fn path(name: &str, version: &str) -> Path<(String, String)> {
        Path((name.to_string(), version.to_string()))
    }

    #[tokio::test]
    async fn test_universe() {
        let harness = harness().await;
        let response = universe(State(harness.state)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let json: serde_json::Value = serde_json::from_slice(&body(response).await).unwrap();
        assert_eq!(
            json["apache2"]["3.2.0"],
            serde_json::json!({
                "location_path": "http://localhost:8080/cookbooks/apache2/3.2.0/download",
                "location_type": "uri",
                "dependencies": {"iptables": ">= 0.0.0"},
            })
        );
        assert_eq!(json["nginx"]["1.0.0"]["dependencies"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_download() {
        let harness = harness().await;
        let response = download(State(harness.state), path("apache2", "3.2.0")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/octet-stream");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"apache2-3.2.0.tar.gz\""
        );

        let entries = read_entries(&body(response).await).unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["apache2/metadata.rb", "apache2/recipes/default.rb"]);
    }

    #[tokio::test]
    async fn test_unknown_version_is_500_without_upstream_calls() {
        let harness = harness().await;
        let detail_calls = harness.upstream.detail_calls();
        let response = download(State(harness.state), path("foo", "9.9.9")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let text = String::from_utf8(body(response).await).unwrap();
        assert!(text.contains("foo/9.9.9"), "{text}");
        assert!(text.contains("not found"), "{text}");
        assert_eq!(harness.upstream.detail_calls(), detail_calls);
        assert_eq!(harness.fetcher.request_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_file_is_500_naming_the_file() {
        let harness = harness().await;
        let response = download(State(harness.state), path("nginx", "1.0.0")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = String::from_utf8(body(response).await).unwrap();
        assert!(text.contains("recipes/b.rb"), "{text}");
        assert_eq!(harness.fetcher.requests().await, ["mock://nginx/a", "mock://nginx/b"]);
    }

    #[tokio::test]
    async fn test_landing_page() {
        let Html(page) = landing().await;
        assert!(page.contains("/universe"));
    }

    #[tokio::test]
    async fn test_routes_over_http() {
        let harness = harness().await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router(harness.state)).await });

        let get = |path: &str| reqwest::get(format!("http://{addr}{path}"));
        let landing = get("/").await.unwrap();
        assert_eq!(landing.status().as_u16(), 200);
        assert!(landing.text().await.unwrap().contains("Bodega"));

        let universe = get("/universe").await.unwrap().text().await.unwrap();
        assert!(universe.contains("\"apache2\""));

        for route in ["/cookbooks/apache2/3.2.0", "/cookbooks/apache2/3.2.0/download"] {
            let response = get(route).await.unwrap();
            assert_eq!(response.status().as_u16(), 200, "{route}");
            let bytes = response.bytes().await.unwrap();
            assert_eq!(read_entries(&bytes).unwrap().len(), 2, "{route}");
        }

        let missing = get("/cookbooks/foo/9.9.9/download").await.unwrap();
        assert_eq!(missing.status().as_u16(), 500);
        assert_eq!(get("/nope").await.unwrap().status().as_u16(), 404);
    }
}
