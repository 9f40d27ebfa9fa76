//! End-to-end pipeline runs against a loopback HTTP responder and the mock
//! PDF engine.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use pdftext_core::mock::MockEngine;
use pdftext_core::{Config, ExtractError, FetchError, TextService};

const REPORT: &str = "%PDF-mock\n%%CreationDate: D:20190514093000Z\n%%ModDate: D:20190601\n%%Title: Jahresbericht\nDer Aus-\nschuss tagte am\nMontag.\x0cDie Sitzung wurde ver-\n\nschoben.";

const REPORT_TEXT: &str = "Der Ausschuss tagte am Montag. Die Sitzung wurde verschoben.";

/// Minimal HTTP/1.1 responder: one response per connection.
async fn serve() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&request);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                let response = match path.as_str() {
                    "/report.pdf" => ok(REPORT.as_bytes()),
                    "/page.html" => ok(b"<html><body>no pdf here</body></html>"),
                    "/truncated.pdf" => {
                        let body = b"%PDF-mock\npartial";
                        let mut head = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                            body.len() + 1000
                        )
                        .into_bytes();
                        head.extend_from_slice(body);
                        head
                    }
                    _ => b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                        .to_vec(),
                };
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

fn ok(body: &[u8]) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    response
}

fn service(engine: &MockEngine, config: Config) -> TextService {
    TextService::new(config, Arc::new(engine.clone())).unwrap()
}

#[tokio::test]
async fn remote_text_is_dehyphenated() {
    let addr = serve().await;
    let engine = MockEngine::new();
    let text = service(&engine, Config::default())
        .remote_pdf_to_text(&format!("http://{addr}/report.pdf"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(text, REPORT_TEXT);
    assert_eq!(engine.opened(), 1);
    assert_eq!(engine.released(), 1);
}

#[tokio::test]
async fn spilled_download_gives_same_text() {
    let addr = serve().await;
    let engine = MockEngine::new();
    let config = Config {
        memory_threshold_mebibytes: 0,
        ..Config::default()
    };
    let text = service(&engine, config)
        .remote_pdf_to_text(&format!("http://{addr}/report.pdf"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(text, REPORT_TEXT);
    assert_eq!(engine.released(), 1);
}

#[tokio::test]
async fn json_content_matches_plain_text() {
    let addr = serve().await;
    let engine = MockEngine::new();
    let svc = service(&engine, Config::default());
    let url = format!("http://{addr}/report.pdf");
    let cancel = CancellationToken::new();

    let map = svc.remote_pdf_to_json(&url, None, &cancel).await.unwrap();
    let text = svc.remote_pdf_to_text(&url, &cancel).await.unwrap();

    assert_eq!(map["content"], text);
    assert_eq!(map["created"], "2019-05-14T09:30:00+00:00");
    assert_eq!(map["modified"], "2019-06-01T00:00:00+00:00");
    assert_eq!(map["Title"], "Jahresbericht");
    assert_eq!(engine.opened(), engine.released());
}

#[tokio::test]
async fn json_with_caller_content_key() {
    let addr = serve().await;
    let engine = MockEngine::new();
    let map = service(&engine, Config::default())
        .remote_pdf_to_json(
            &format!("http://{addr}/report.pdf"),
            Some("fulltext"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(map["fulltext"], REPORT_TEXT);
    assert!(!map.contains_key("content"));
}

#[tokio::test]
async fn disabled_dehyphenation_keeps_hyphens() {
    let addr = serve().await;
    let engine = MockEngine::new();
    let config = Config {
        dehyphenate: false,
        ..Config::default()
    };
    let text = service(&engine, config)
        .remote_pdf_to_text(&format!("http://{addr}/report.pdf"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        text,
        "Der Aus- schuss tagte am Montag. Die Sitzung wurde ver- schoben."
    );
}

#[tokio::test]
async fn raw_lines_are_not_dehyphenated() {
    let addr = serve().await;
    let engine = MockEngine::new();
    let stream = service(&engine, Config::default())
        .remote_pdf_raw_lines(&format!("http://{addr}/report.pdf"), &CancellationToken::new())
        .await
        .unwrap();
    let lines: Vec<String> = stream.map(|line| line.unwrap()).collect().await;

    assert_eq!(
        lines,
        vec![
            "Der Aus-",
            "schuss tagte am",
            "Montag.",
            "Die Sitzung wurde ver-",
            "",
            "schoben.",
        ]
    );
    assert_eq!(engine.released(), 1);
}

#[tokio::test]
async fn not_found_is_transfer_error() {
    let addr = serve().await;
    let engine = MockEngine::new();
    let err = service(&engine, Config::default())
        .remote_pdf_to_text(&format!("http://{addr}/gone.pdf"), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        ExtractError::Transfer(FetchError::Status { status, .. }) => {
            assert_eq!(status.as_u16(), 404)
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(engine.opened(), 0);
}

#[tokio::test]
async fn truncated_body_is_transfer_error() {
    let addr = serve().await;
    let engine = MockEngine::new();
    let err = service(&engine, Config::default())
        .remote_pdf_to_text(&format!("http://{addr}/truncated.pdf"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractError::Transfer(_)), "got {err}");
    assert_eq!(engine.opened(), 0);
}

#[tokio::test]
async fn html_page_is_parse_error() {
    let addr = serve().await;
    let engine = MockEngine::new();
    let err = service(&engine, Config::default())
        .remote_pdf_to_json(&format!("http://{addr}/page.html"), None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "parse_error");
}

#[tokio::test]
async fn refused_connection_is_transfer_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let engine = MockEngine::new();
    let err = service(&engine, Config::default())
        .remote_pdf_to_text(&format!("http://{addr}/report.pdf"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractError::Transfer(FetchError::Request(_))));
}

#[cfg(unix)]
#[tokio::test]
async fn external_path_streams_body_through_the_tool() {
    let addr = serve().await;
    let engine = MockEngine::new();
    let config = Config {
        external_program: "cat".to_string(),
        external_args: Vec::new(),
        ..Config::default()
    };
    let text = service(&engine, config)
        .remote_pdf_to_text_external(&format!("http://{addr}/report.pdf"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(text.starts_with("%PDF-mock\n"));
    assert!(text.contains("Die Sitzung wurde ver-\nschoben."));
    assert_eq!(engine.opened(), 0);
}
