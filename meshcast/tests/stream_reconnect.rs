//! Stream client reconnection against an initially dead endpoint
//! (spec.md §8, scenario 3).

use meshcast::service::Runnable;
use meshcast::{handler, stream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn client_connects_once_server_appears() {
    // Bind something briefly to learn a free port, then drop it so the
    // client's first attempts find nobody listening.
    let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);

    let client = stream::client::create(stream::client::Options {
        host: "127.0.0.1".to_owned(),
        port,
        buffer: 8192,
    });
    let connects = Arc::new(AtomicU32::new(0));
    let c = connects.clone();
    handler::on_connect(client.as_observable(), move |_id| {
        c.fetch_add(1, Ordering::SeqCst);
    });

    let client_run = client.clone();
    tokio::spawn(async move {
        client_run.start().await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 0);

    let server = stream::server::create(stream::server::Options {
        host: "127.0.0.1".to_owned(),
        port,
        buffer: 8192,
    });
    let server_run = server.clone();
    tokio::spawn(async move {
        server_run.start().await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 1);

    client.as_runnable().stop();
    server.as_runnable().stop();
}
