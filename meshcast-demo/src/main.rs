//! Drives one meshcast transport from the command line, logging every
//! lifecycle and message event it observes.

use clap::{Arg, Command};
use meshcast::{datagram, handler, loopback, service::Runnable, stream, Id};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let matches = Command::new("meshcast-demo")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Drives one meshcast transport and logs its events")
        .arg(
            Arg::new("transport")
                .help("Transport to run")
                .short('t')
                .long("transport")
                .value_parser(["loopback", "stream-server", "stream-client", "datagram-server", "datagram-client"])
                .default_value("loopback"),
        )
        .arg(
            Arg::new("host")
                .short('h')
                .long("host")
                .default_value("127.0.0.1"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_parser(clap::value_parser!(u16))
                .default_value("0"),
        )
        .get_matches();

    let transport = matches.get_one::<String>("transport").unwrap().as_str();
    let host = matches.get_one::<String>("host").unwrap().to_owned();
    let port = *matches.get_one::<u16>("port").unwrap();

    info!(transport, %host, port, "meshcast-demo starting");

    match transport {
        "loopback" => run_loopback().await,
        "stream-server" => run_stream_server(host, port).await,
        "stream-client" => run_stream_client(host, port).await,
        "datagram-server" => run_datagram_server(host, port).await,
        "datagram-client" => run_datagram_client(host, port).await,
        other => {
            eprintln!("unknown transport: {other}");
            std::process::exit(1);
        }
    }
}

async fn run_loopback() {
    let svc = loopback::create();
    wire_common(svc.as_observable());
    svc.as_runnable().start().await.expect("loopback engine failed");
}

async fn run_stream_server(host: String, port: u16) {
    let svc = stream::server::create(stream::server::Options { host, port, buffer: 8192 });
    wire_common(svc.as_observable());
    handler::on_message(svc.as_observable(), {
        let svc = svc.clone();
        move |id, bytes| {
            info!(%id, len = bytes.len(), "echoing payload back");
            svc.as_messaging().send(id, bytes.to_vec().into());
        }
    });
    svc.as_runnable().start().await.expect("stream server failed");
}

async fn run_stream_client(host: String, port: u16) {
    let svc = stream::client::create(stream::client::Options { host, port, buffer: 8192 });
    wire_common(svc.as_observable());
    svc.as_runnable().start().await.expect("stream client failed");
}

async fn run_datagram_server(host: String, port: u16) {
    let svc = datagram::server::create(datagram::server::Options {
        host,
        port,
        buffer: 1024,
        timeout: Duration::from_secs(2),
    });
    wire_common(svc.as_observable());
    svc.as_runnable().start().await.expect("datagram server failed");
}

async fn run_datagram_client(host: String, port: u16) {
    let svc = datagram::client::create(datagram::client::Options {
        host,
        port,
        buffer: 1024,
        timeout: Duration::from_secs(2),
    });
    wire_common(svc.as_observable());
    svc.as_runnable().start().await.expect("datagram client failed");
}

fn wire_common(obs: &dyn meshcast::service::Observable) {
    handler::on_ready(obs, |id: &Id| info!(%id, "ready"));
    handler::on_connect(obs, |id: &Id| info!(%id, "connected"));
    handler::on_disconnect(obs, |id: &Id| info!(%id, "disconnected"));
}
