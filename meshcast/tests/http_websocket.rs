//! HTTP + websocket multiplexing (spec.md §8, scenario 6).

use meshcast::service::{Runnable, WebService};
use meshcast::{handler, http};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[tokio::test]
async fn get_and_websocket_routes_are_independent() {
    let server = http::create(http::Options {
        host: "127.0.0.1".to_owned(),
        port: 0,
        buffer: 8192,
    });

    server.on_get(Box::new(|transaction| {
        transaction.set_content_type("text/html");
        if transaction.get_route() == "/" {
            meshcast::service::send(transaction, b"<h1>hi</h1>".to_vec());
        }
    }));

    let ws_sub = server.use_ws("/ws");
    let ws_observable: &dyn meshcast::service::Observable = ws_sub.as_ref();
    let ws_messages = Arc::new(std::sync::Mutex::new(Vec::<Vec<u8>>::new()));
    let m = ws_messages.clone();
    handler::on_message(ws_observable, move |_id, bytes| {
        m.lock().unwrap().push(bytes.to_vec());
    });

    let port_holder = Arc::new(AtomicU16::new(0));
    let p = port_holder.clone();
    // `use_ws`'s sub-service also fires ready once the parent binds.
    handler::on_ready(ws_observable, move |id| {
        let port: u16 = id.as_str().split(':').nth(1).unwrap().split('/').next().unwrap().parse().unwrap();
        p.store(port, Ordering::SeqCst);
    });

    let server_run = server.clone();
    tokio::spawn(async move {
        server_run.start().await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    let port = port_holder.load(Ordering::SeqCst);
    assert_ne!(port, 0);

    // GET / returns 200 with the HTML body.
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await.unwrap();
    let mut resp = String::new();
    stream.read_to_string(&mut resp).await.unwrap();
    assert!(resp.starts_with("HTTP/1.1 200"));
    assert!(resp.contains("<h1>hi</h1>"));

    // GET /missing returns 400.
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream.write_all(b"GET /missing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await.unwrap();
    let mut resp = String::new();
    stream.read_to_string(&mut resp).await.unwrap();
    assert!(resp.starts_with("HTTP/1.1 400"));

    // A websocket client on /ws reaches the sub-service.
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}/ws"))
        .await
        .unwrap();
    use futures_util::SinkExt;
    ws.send(tokio_tungstenite::tungstenite::Message::Binary(b"hello".to_vec().into()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*ws_messages.lock().unwrap(), vec![b"hello".to_vec()]);

    server.stop();
}
