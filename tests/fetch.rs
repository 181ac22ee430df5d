//! Bounded-fetch behavior against an in-process mock upstream, plus
//! full-pipeline runs using the loopback override. The `/endless` route
//! streams an unbounded body: if the mid-stream size check ever regresses to
//! a post-download check, these tests hang instead of passing.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, StatusCode};
use axum::routing::get;
use axum::Router;
use url::Url;

use mdgate::config::{Config, LimitsConfig, SecurityConfig};
use mdgate::convert::MarkdownConverter;
use mdgate::error::IngestError;
use mdgate::events::{EventKind, MemoryTelemetry};
use mdgate::fetch;
use mdgate::ingest::{IngestRequest, Ingestor};

static CHUNK: [u8; 8192] = [0u8; 8192];

fn upstream() -> Router {
    Router::new()
        .route(
            "/doc.pdf",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/pdf")],
                    &b"%PDF-1.4 not really"[..],
                )
            }),
        )
        .route(
            "/notes.txt",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                    "# already markdown",
                )
            }),
        )
        .route(
            "/blob",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/octet-stream")],
                    "refused",
                )
            }),
        )
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route(
            "/endless",
            get(|| async {
                let stream = futures_util::stream::repeat_with(|| {
                    Ok::<_, std::io::Error>(Bytes::from_static(&CHUNK))
                });
                (
                    [(header::CONTENT_TYPE, "application/pdf")],
                    Body::from_stream(stream),
                )
            }),
        )
}

async fn spawn_upstream() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, upstream()).await.unwrap();
    });
    format!("http://{}", addr)
}

fn limits(max_file_size: u64) -> LimitsConfig {
    LimitsConfig {
        max_file_size_bytes: max_file_size,
        ..LimitsConfig::default()
    }
}

#[tokio::test]
async fn downloads_whitelisted_document() {
    let base = spawn_upstream().await;
    let url = Url::parse(&format!("{base}/doc.pdf")).unwrap();
    let out = fetch::fetch(&url, &limits(1024 * 1024)).await.unwrap();
    assert_eq!(out.bytes, b"%PDF-1.4 not really");
    assert_eq!(out.extension, "pdf");
    assert_eq!(out.content_type.as_deref(), Some("application/pdf"));
}

#[tokio::test]
async fn content_type_parameters_are_ignored() {
    let base = spawn_upstream().await;
    let url = Url::parse(&format!("{base}/notes.txt")).unwrap();
    let out = fetch::fetch(&url, &limits(1024 * 1024)).await.unwrap();
    assert_eq!(out.extension, "txt");
    assert_eq!(out.content_type.as_deref(), Some("text/plain"));
}

#[tokio::test]
async fn unlisted_content_type_is_blocked() {
    let base = spawn_upstream().await;
    let url = Url::parse(&format!("{base}/blob")).unwrap();
    let err = fetch::fetch(&url, &limits(1024 * 1024)).await.unwrap_err();
    match err {
        IngestError::BlockedContentType { content_type } => {
            assert_eq!(content_type, "application/octet-stream");
        }
        other => panic!("expected BlockedContentType, got {other:?}"),
    }
}

#[tokio::test]
async fn non_success_status_is_surfaced_without_body() {
    let base = spawn_upstream().await;
    let url = Url::parse(&format!("{base}/missing")).unwrap();
    let err = fetch::fetch(&url, &limits(1024 * 1024)).await.unwrap_err();
    assert!(matches!(err, IngestError::HttpStatus { status: 404 }));
}

#[tokio::test]
async fn unbounded_stream_aborts_at_the_ceiling() {
    let base = spawn_upstream().await;
    let url = Url::parse(&format!("{base}/endless")).unwrap();
    let max = 64 * 1024;
    let err = fetch::fetch(&url, &limits(max)).await.unwrap_err();
    match err {
        IngestError::SizeLimit { attempted, max: m } => {
            assert_eq!(m, max);
            assert!(attempted > max);
            // Aborted shortly after crossing the line, not megabytes later.
            assert!(attempted < max + 1024 * 1024);
        }
        other => panic!("expected SizeLimit, got {other:?}"),
    }
}

fn pipeline_config(max_file_size: u64) -> Config {
    Config {
        limits: limits(max_file_size),
        security: SecurityConfig {
            allow_loopback: true,
        },
        ..Config::default()
    }
}

fn pipeline(config: Config) -> (Ingestor, Arc<MemoryTelemetry>) {
    let telemetry = Arc::new(MemoryTelemetry::new());
    let ingestor = Ingestor::new(
        Arc::new(config),
        Arc::new(MarkdownConverter),
        telemetry.clone(),
    );
    (ingestor, telemetry)
}

fn url_request(url: String) -> IngestRequest {
    IngestRequest {
        file_url: Some(url),
        file_base64: None,
    }
}

#[tokio::test]
async fn full_pipeline_converts_fetched_text() {
    let base = spawn_upstream().await;
    let (ingestor, telemetry) = pipeline(pipeline_config(1024 * 1024));

    let markdown = ingestor
        .ingest(&url_request(format!("{base}/notes.txt")))
        .await
        .unwrap();
    assert_eq!(markdown, "# already markdown");

    let events = telemetry.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, EventKind::Success);
    assert_eq!(events[0].file_size, Some("# already markdown".len() as u64));
    assert_eq!(events[0].file_type.as_deref(), Some("txt"));
    assert_eq!(telemetry.charges(), vec!["document-conversion".to_string()]);
}

#[tokio::test]
async fn full_pipeline_records_blocked_content_type() {
    let base = spawn_upstream().await;
    let (ingestor, telemetry) = pipeline(pipeline_config(1024 * 1024));

    let err = ingestor
        .ingest(&url_request(format!("{base}/blob")))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::BlockedContentType { .. }));

    let events = telemetry.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, EventKind::SecurityBlockedContentType);
    assert_eq!(
        events[0].content_type.as_deref(),
        Some("application/octet-stream")
    );
    assert!(telemetry.charges().is_empty());
}

#[tokio::test]
async fn full_pipeline_records_blocked_size() {
    let base = spawn_upstream().await;
    let (ingestor, telemetry) = pipeline(pipeline_config(32 * 1024));

    let err = ingestor
        .ingest(&url_request(format!("{base}/endless")))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::SizeLimit { .. }));

    let events = telemetry.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, EventKind::SecurityBlockedSize);
    assert_eq!(events[0].max_bytes, Some(32 * 1024));
}

#[tokio::test]
async fn override_does_not_admit_metadata_range() {
    // allow_loopback exempts loopback only; the metadata endpoint stays dead.
    let (ingestor, telemetry) = pipeline(pipeline_config(1024 * 1024));

    let err = ingestor
        .ingest(&url_request(
            "http://169.254.169.254/latest/meta-data/".to_string(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::ForbiddenAddress));
    assert_eq!(
        telemetry.events()[0].event,
        EventKind::SecurityBlockedAddress
    );
}
