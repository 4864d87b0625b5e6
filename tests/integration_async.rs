use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::{HeaderMap, StatusCode};
use mocha::{
    Client, ClientBuilder, Error, ErrorCode, Job, Response, ThreadWorker, Transport, TransportError,
    TransportErrorKind, TransportRequest, TransportResponse, Worker,
};

fn public_dns(_host: &str, _port: u16) -> io::Result<Vec<IpAddr>> {
    Ok(vec![IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34))])
}

fn client_builder() -> ClientBuilder {
    Client::builder().resolver(Arc::new(public_dns))
}

struct EchoTransport {
    calls: AtomicUsize,
}

impl EchoTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

impl Transport for EchoTransport {
    fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.url.contains("/down") {
            return Err(TransportError::new(
                TransportErrorKind::Other,
                "upstream unavailable",
            ));
        }
        let body = format!(r#"{{"method": "{}", "url": "{}"}}"#, request.method, request.url);
        Ok(TransportResponse::new(StatusCode::OK, HeaderMap::new(), body))
    }
}

/// Counts jobs and runs them on fresh threads.
struct CountingWorker {
    spawned: AtomicUsize,
    inner: ThreadWorker,
}

impl Worker for CountingWorker {
    fn spawn(&self, job: Job) {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        self.inner.spawn(job);
    }
}

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn execute_async_resolves_inside_a_runtime() {
    let transport = EchoTransport::new();
    let client = client_builder().transport(transport.clone()).build();

    let response = client
        .get("https://api.example.com/async")
        .query("n", "1")
        .execute_async()
        .await
        .expect("async execution should succeed");

    let json = response.json_map().expect("object body");
    assert_eq!(json.get("method").as_str(), Some("GET"));
    assert_eq!(
        json.get("url").as_str(),
        Some("https://api.example.com/async?n=1")
    );
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_async_executions_all_complete() {
    let transport = EchoTransport::new();
    let client = client_builder().transport(transport.clone()).build();

    let futures: Vec<_> = (0..16)
        .map(|index| {
            client
                .get(format!("https://api.example.com/items/{index}"))
                .execute_async()
        })
        .collect();

    for (index, future) in futures.into_iter().enumerate() {
        let response = future.await.expect("execution should succeed");
        assert_eq!(
            response.json_map().expect("object").get("url").to_string(),
            format!("https://api.example.com/items/{index}")
        );
    }
    assert_eq!(transport.calls.load(Ordering::SeqCst), 16);
}

#[tokio::test]
async fn builder_errors_resolve_without_reaching_the_worker() {
    let transport = EchoTransport::new();
    let client = client_builder().transport(transport.clone()).build();

    let error = client
        .get("https://api.example.com/")
        .header("bad\nname", "value")
        .execute_async()
        .await
        .expect_err("invalid header should fail");
    assert_eq!(error.code(), ErrorCode::InvalidHeaderName);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn wait_blocks_outside_a_runtime() {
    let worker = Arc::new(CountingWorker {
        spawned: AtomicUsize::new(0),
        inner: ThreadWorker::new("suite-worker"),
    });
    let client = client_builder()
        .transport(EchoTransport::new())
        .worker(worker.clone())
        .build();

    let response = client
        .delete("https://api.example.com/items/4")
        .execute_async()
        .wait()
        .expect("execution should succeed");
    assert!(response.is_success());
    assert_eq!(worker.spawned.load(Ordering::SeqCst), 1);
}

#[test]
fn success_callback_receives_the_response() {
    let client = client_builder().transport(EchoTransport::new()).build();
    let (sender, receiver) = mpsc::channel();

    client.patch("https://api.example.com/items/2").execute_with(move |response: Response| {
        let _ = sender.send(response.status());
    });

    let status = receiver.recv_timeout(WAIT).expect("callback should run");
    assert_eq!(status, StatusCode::OK);
}

#[test]
fn failures_go_to_the_error_handler() {
    let client = client_builder().transport(EchoTransport::new()).build();
    let (sender, receiver) = mpsc::channel();
    let error_sender = sender.clone();

    client.get("https://api.example.com/down").execute_with_handlers(
        move |_response: Response| {
            let _ = sender.send(Err::<ErrorCode, _>("unexpected success".to_owned()));
        },
        move |error: Error| {
            let _ = error_sender.send(Ok(error.code()));
        },
    );

    let outcome = receiver.recv_timeout(WAIT).expect("a handler should run");
    assert_eq!(outcome, Ok(ErrorCode::Transport));
}

#[test]
fn panicking_success_callback_is_reported_to_the_error_handler() {
    let client = client_builder().transport(EchoTransport::new()).build();
    let (sender, receiver) = mpsc::channel();

    client.get("https://api.example.com/ok").execute_with_handlers(
        |_response: Response| panic!("callback exploded"),
        move |error: Error| {
            let _ = sender.send(error.to_string());
        },
    );

    let message = receiver.recv_timeout(WAIT).expect("error handler should run");
    assert_eq!(message, "response callback panicked: callback exploded");
}

#[test]
fn panicking_error_handler_does_not_poison_the_client() {
    let client = client_builder().transport(EchoTransport::new()).build();
    let done = Arc::new(Mutex::new(false));

    client.get("https://api.example.com/down").execute_with_handlers(
        |_response: Response| {},
        |_error: Error| panic!("error handler exploded"),
    );

    let (sender, receiver) = mpsc::channel();
    let flag = Arc::clone(&done);
    client.get("https://api.example.com/after").execute_with(move |_response: Response| {
        *flag.lock().expect("lock flag") = true;
        let _ = sender.send(());
    });

    receiver.recv_timeout(WAIT).expect("later callback should run");
    assert!(*done.lock().expect("lock flag"));
}

#[test]
fn security_violations_reach_the_error_handler() {
    let transport = EchoTransport::new();
    let client = client_builder().transport(transport.clone()).build();
    let (sender, receiver) = mpsc::channel();

    client.get("http://127.0.0.1/").execute_with_handlers(
        |_response: Response| {},
        move |error: Error| {
            let _ = sender.send(error.is_security_violation());
        },
    );

    assert!(receiver.recv_timeout(WAIT).expect("error handler should run"));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
}
