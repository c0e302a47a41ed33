//! End-to-end stream-server/stream-client echo (spec.md §8, scenario 2).

use meshcast::service::Runnable;
use meshcast::{handler, stream};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[tokio::test]
async fn client_sends_ping_server_replies_pong() {
    let server = stream::server::create(stream::server::Options {
        host: "127.0.0.1".to_owned(),
        port: 0,
        buffer: 8192,
    });

    let bound_port = Arc::new(AtomicU16::new(0));
    let bound = bound_port.clone();
    handler::on_ready(server.as_observable(), move |id| {
        let port: u16 = id.as_str().rsplit(':').next().unwrap().parse().unwrap();
        bound.store(port, Ordering::SeqCst);
    });

    let server_for_reply = server.clone();
    handler::on_message(server.as_observable(), move |id, bytes| {
        assert_eq!(bytes, b"ping");
        server_for_reply.as_messaging().send(id, b"pong".to_vec().into());
    });

    let server_run = server.clone();
    tokio::spawn(async move {
        server_run.start().await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let port = bound_port.load(Ordering::SeqCst);
    assert_ne!(port, 0);

    let client = stream::client::create(stream::client::Options {
        host: "127.0.0.1".to_owned(),
        port,
        buffer: 8192,
    });
    let replies = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
    let r = replies.clone();
    handler::on_message(client.as_observable(), move |_id, bytes| {
        r.lock().unwrap().push(bytes.to_vec());
    });

    let client_run = client.clone();
    tokio::spawn(async move {
        client_run.start().await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    client.as_messaging().publish(b"ping".to_vec().into());
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(*replies.lock().unwrap(), vec![b"pong".to_vec()]);

    client.as_runnable().stop();
    server.as_runnable().stop();
}
