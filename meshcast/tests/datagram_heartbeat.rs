//! Datagram liveness scenario (spec.md §8, scenario 4): connect, observe
//! server-side connect, stop pinging, observe exactly one disconnect.

use meshcast::service::Runnable;
use meshcast::{datagram, handler};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn server_observes_connect_then_disconnect_on_silence() {
    let server = datagram::server::create(datagram::server::Options {
        host: "127.0.0.1".to_owned(),
        port: 0,
        buffer: 1024,
        timeout: Duration::from_millis(200),
    });

    let server_port = Arc::new(std::sync::Mutex::new(0u16));
    let p = server_port.clone();
    handler::on_ready(server.as_observable(), move |id| {
        *p.lock().unwrap() = id.as_str().rsplit(':').next().unwrap().parse().unwrap();
    });

    let connects = Arc::new(AtomicU32::new(0));
    let disconnects = Arc::new(AtomicU32::new(0));
    let c = connects.clone();
    handler::on_connect(server.as_observable(), move |_id| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    let d = disconnects.clone();
    handler::on_disconnect(server.as_observable(), move |_id| {
        d.fetch_add(1, Ordering::SeqCst);
    });

    let server_run = server.clone();
    tokio::spawn(async move {
        server_run.start().await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    let port = *server_port.lock().unwrap();
    assert_ne!(port, 0);

    let client = datagram::client::create(datagram::client::Options {
        host: "127.0.0.1".to_owned(),
        port,
        buffer: 1024,
        timeout: Duration::from_millis(200),
    });
    let client_run = client.clone();
    tokio::spawn(async move {
        client_run.start().await.unwrap();
    });

    // Within timeout/2 the server should see a connect.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 1);

    // Stop the client so keepalives stop; within `timeout` the server
    // should fire exactly one disconnect.
    client.as_runnable().stop();
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);

    server.as_runnable().stop();
}
