use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use keeper_bootable::Bootable;
use keeper_rpc::{Error, RpcClient, RpcHandler, RpcServer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
enum Request {
    Add(u32, u32),
    Sleep(u64),
}

#[derive(Debug, Deserialize, PartialEq, Serialize)]
enum Response {
    Sum(u32),
    Slept,
}

struct Calculator {
    handled: Arc<AtomicUsize>,
}

#[async_trait]
impl RpcHandler for Calculator {
    type Request = Request;
    type Response = Response;

    async fn handle(&self, request: Request) -> Response {
        self.handled.fetch_add(1, Ordering::SeqCst);
        match request {
            Request::Add(a, b) => Response::Sum(a + b),
            Request::Sleep(ms) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Response::Slept
            }
        }
    }
}

fn any_port() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

#[tokio::test]
async fn test_request_response() {
    let handled = Arc::new(AtomicUsize::new(0));
    let server = RpcServer::new(
        "calculator",
        any_port(),
        Calculator {
            handled: handled.clone(),
        },
    );
    let addr = server.serve().await.unwrap();

    let client = RpcClient::<Request, Response>::new(addr);
    assert_eq!(client.send(&Request::Add(2, 3)).await.unwrap(), Response::Sum(5));
    assert_eq!(client.send(&Request::Add(10, 1)).await.unwrap(), Response::Sum(11));
    assert_eq!(handled.load(Ordering::SeqCst), 2);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_start_twice_fails() {
    let server = RpcServer::new(
        "calculator",
        any_port(),
        Calculator {
            handled: Arc::new(AtomicUsize::new(0)),
        },
    );

    server.start().await.unwrap();
    assert!(server.local_addr().is_some());
    assert_matches!(server.serve().await, Err(Error::AlreadyStarted));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_client_timeout() {
    let server = RpcServer::new(
        "calculator",
        any_port(),
        Calculator {
            handled: Arc::new(AtomicUsize::new(0)),
        },
    );
    let addr = server.serve().await.unwrap();

    let client =
        RpcClient::<Request, Response>::new(addr).with_timeout(Duration::from_millis(50));
    assert_matches!(client.send(&Request::Sleep(1_000)).await, Err(Error::Timeout(_)));

    server.shutdown().await.unwrap();
}
