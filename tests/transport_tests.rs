//! Integration tests: wiremock servers for well-behaved peers, raw TCP
//! listeners for peers that stall, drip bodies, or refuse connections.

use holdfast::{Error, Request, Stats, StatsHook, Transport};
use http::Method;
use std::io::{Read, Write};
use std::net::TcpListener as StdTcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const THE_ANSWER: &str = "42";

#[derive(Debug, Clone)]
struct AttemptRecord {
    count: u32,
    pending: bool,
    failed: bool,
    got_response: bool,
}

fn recording_hook() -> (StatsHook, Arc<Mutex<Vec<AttemptRecord>>>) {
    let records = Arc::new(Mutex::new(Vec::new()));
    let sink = records.clone();
    let hook: StatsHook = Arc::new(move |stats: &Stats<'_>| {
        sink.lock().unwrap().push(AttemptRecord {
            count: stats.retry.count,
            pending: stats.retry.pending,
            failed: stats.error.is_some(),
            got_response: stats.response.is_some(),
        });
    });
    (hook, records)
}

/// A URL nothing listens on: bind an ephemeral port, then release it.
fn refused_url() -> String {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/")
}

/// Accepts connections, reads the request, and never responds.
async fn stalled_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buffer = [0u8; 1024];
                let _ = socket.read(&mut buffer).await;
                // Hold the socket open well past any deadline under test.
                tokio::time::sleep(Duration::from_secs(5)).await;
                drop(socket);
            });
        }
    });
    format!("http://{addr}/")
}

/// Sends headers and half the declared body, then stalls.
async fn drip_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buffer = [0u8; 1024];
                let _ = socket.read(&mut buffer).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 8\r\n\r\n1234")
                    .await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_secs(5)).await;
                drop(socket);
            });
        }
    });
    format!("http://{addr}/")
}

/// Sends headers immediately and the body only after a pause.
async fn slow_body_server(pause: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buffer = [0u8; 1024];
                let _ = socket.read(&mut buffer).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\n")
                    .await;
                let _ = socket.flush().await;
                tokio::time::sleep(pause).await;
                let _ = socket.write_all(THE_ANSWER.as_bytes()).await;
                let _ = socket.flush().await;
            });
        }
    });
    format!("http://{addr}/")
}

#[tokio::test]
async fn ok_with_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/answer"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(1))
                .set_body_string(THE_ANSWER),
        )
        .mount(&server)
        .await;

    let (hook, records) = recording_hook();
    let transport = Transport::builder().stats(hook).build().unwrap();

    let response = transport
        .get(format!("{}/answer", server.uri()))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), THE_ANSWER);

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].count, 0);
    assert!(!records[0].pending);
    assert!(!records[0].failed);
    assert!(records[0].got_response);
}

#[tokio::test]
async fn http_5xx_is_a_successful_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/answer"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_delay(Duration::from_millis(1))
                .set_body_string(THE_ANSWER),
        )
        .mount(&server)
        .await;

    let (hook, records) = recording_hook();
    // Even with retries available, a 5xx must not trigger one.
    let transport = Transport::builder().max_tries(3).stats(hook).build().unwrap();

    let response = transport
        .get(format!("{}/answer", server.uri()))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);
    assert_eq!(response.text().await.unwrap(), THE_ANSWER);

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].failed);
    assert!(!records[0].pending);
}

#[tokio::test]
async fn dial_refused_surfaces_dial_error() {
    let url = refused_url();
    let (hook, records) = recording_hook();
    let transport = Transport::builder().stats(hook).build().unwrap();

    let err = transport.get(&url).await.unwrap_err();
    assert!(err.to_string().contains("dial"), "unexpected error: {err}");
    assert!(err.is_connect());

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].failed);
    assert!(!records[0].got_response);
    assert!(!records[0].pending);
}

#[tokio::test]
async fn response_header_timeout_closes_the_connection() {
    let url = stalled_server().await;
    let (hook, records) = recording_hook();
    let transport = Transport::builder()
        .response_header_timeout(Duration::from_millis(50))
        .stats(hook)
        .build()
        .unwrap();

    let err = transport.get(&url).await.unwrap_err();
    assert!(
        err.to_string().contains("connection closed"),
        "unexpected error: {err}"
    );
    assert!(err.is_timeout());

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].failed);
}

#[tokio::test]
async fn request_timeout_closes_the_connection() {
    let url = stalled_server().await;
    let (hook, records) = recording_hook();
    let transport = Transport::builder()
        .request_timeout(Duration::from_millis(50))
        .stats(hook)
        .build()
        .unwrap();

    let err = transport.get(&url).await.unwrap_err();
    assert!(
        err.to_string().contains("connection closed"),
        "unexpected error: {err}"
    );
    assert!(err.is_timeout());
    assert_eq!(records.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn request_timeout_fires_during_body_read() {
    let url = drip_server().await;
    let (hook, records) = recording_hook();
    let transport = Transport::builder()
        .request_timeout(Duration::from_millis(100))
        .max_tries(3)
        .stats(hook)
        .build()
        .unwrap();

    // Headers arrive in time, so the attempt itself succeeds.
    let response = transport.get(&url).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);

    // The stalled body trips the still-armed request deadline.
    let err = response.bytes().await.unwrap_err();
    assert!(
        err.to_string().contains("connection closed"),
        "unexpected error: {err}"
    );

    // A body-phase expiry is terminal: one attempt, no retry.
    let records = records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].failed);
    assert!(!records[0].pending);
}

#[tokio::test]
async fn header_timeout_disarmed_once_headers_arrive() {
    let url = slow_body_server(Duration::from_millis(150)).await;
    let transport = Transport::builder()
        .response_header_timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    // The body takes three times the header timeout; only the header
    // phase is bounded, so the call still succeeds.
    let response = transport.get(&url).await.unwrap();
    assert_eq!(response.text().await.unwrap(), THE_ANSWER);
}

#[tokio::test]
async fn header_timeout_is_retried_for_idempotent_requests() {
    let url = stalled_server().await;
    let (hook, records) = recording_hook();
    let transport = Transport::builder()
        .response_header_timeout(Duration::from_millis(50))
        .max_tries(2)
        .stats(hook)
        .build()
        .unwrap();

    let err = transport.get(&url).await.unwrap_err();
    assert!(err.is_timeout());

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records[0].pending);
    assert!(!records[1].pending);
    assert!(records.iter().all(|record| record.failed));
}

#[tokio::test]
async fn safe_retry_after_connect_refused() {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();
    let hook: StatsHook = Arc::new(move |stats: &Stats<'_>| {
        match seen.fetch_add(1, Ordering::SeqCst) {
            0 => {
                assert!(stats.error.is_some(), "first attempt should fail");
                assert!(stats.retry.pending, "first attempt should schedule a retry");
                assert_eq!(stats.retry.count, 0);
                // The hook runs synchronously before the retry begins, so
                // bringing the server up here makes the next attempt land.
                let listener = StdTcpListener::bind(addr).unwrap();
                std::thread::spawn(move || {
                    if let Ok((mut socket, _)) = listener.accept() {
                        let mut buffer = [0u8; 1024];
                        let _ = socket.read(&mut buffer);
                        let _ = socket.write_all(
                            b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\n42",
                        );
                    }
                });
            }
            1 => {
                assert!(stats.error.is_none(), "retry should succeed");
                assert!(!stats.retry.pending);
                assert_eq!(stats.retry.count, 1);
            }
            extra => panic!("unexpected attempt index {extra}"),
        }
    });

    let transport = Transport::builder().max_tries(2).stats(hook).build().unwrap();
    let response = transport.get(format!("http://{addr}/")).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), THE_ANSWER);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn post_is_not_retried() {
    let url = refused_url();
    let (hook, records) = recording_hook();
    let transport = Transport::builder().max_tries(3).stats(hook).build().unwrap();

    let request = Request::parse(Method::POST, &url)
        .unwrap()
        .with_body("{\"answer\":42}");
    let err = transport.execute(request).await.unwrap_err();
    assert!(err.to_string().contains("dial"), "unexpected error: {err}");

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].pending);
}

#[tokio::test]
async fn retries_exhausted_report_each_attempt() {
    let url = refused_url();
    let (hook, records) = recording_hook();
    let transport = Transport::builder().max_tries(3).stats(hook).build().unwrap();

    let err = transport.get(&url).await.unwrap_err();
    assert!(err.to_string().contains("dial"), "unexpected error: {err}");

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 3);
    for (index, record) in records.iter().enumerate() {
        assert_eq!(record.count, index as u32);
        assert!(record.failed);
        assert_eq!(record.pending, index < 2);
    }
}

#[tokio::test]
async fn request_headers_and_query_params_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", "1"))
        .and(header("x-trace", "abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(THE_ANSWER))
        .mount(&server)
        .await;

    let transport = Transport::builder().build().unwrap();
    let request = Request::parse(Method::GET, format!("{}/search", server.uri()))
        .unwrap()
        .with_query_param("page", "1")
        .with_header("x-trace", "abc123")
        .unwrap();

    let response = transport.execute(request).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.header("content-length"), Some("2"));
}

#[tokio::test]
async fn close_is_idempotent_and_rejects_new_round_trips() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/answer"))
        .respond_with(ResponseTemplate::new(200).set_body_string(THE_ANSWER))
        .mount(&server)
        .await;

    let transport = Transport::builder().build().unwrap();
    let response = transport
        .get(format!("{}/answer", server.uri()))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    transport.close();
    transport.close();

    let err = transport
        .get(format!("{}/answer", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Closed));
}
