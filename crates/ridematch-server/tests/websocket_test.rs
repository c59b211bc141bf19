//! End-to-end tests against a bound server.
//!
//! Real sockets, real JSON: clients connect with tokio-tungstenite and speak
//! the same envelope the browser client does.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use ridematch_server::{DriverConfig, Server, ServerError, ServerRuntimeConfig};
use serde_json::{Value, json};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start(config: ServerRuntimeConfig) -> std::net::SocketAddr {
    let server = Server::bind(ServerRuntimeConfig {
        bind_address: "127.0.0.1:0".to_string(),
        ..config
    })
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

async fn connect(addr: std::net::SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

async fn emit(ws: &mut Client, event: &str, data: Value) {
    let frame = json!({ "event": event, "data": data }).to_string();
    ws.send(Message::text(frame)).await.unwrap();
}

/// Read frames until one carries `event`, returning its data.
async fn next_event(ws: &mut Client, event: &str) -> Value {
    timeout(WAIT, async {
        loop {
            let frame = ws.next().await.expect("stream ended").expect("websocket error");
            if let Message::Text(text) = frame {
                let value: Value = serde_json::from_str(text.as_str()).unwrap();
                if value["event"] == event {
                    return value["data"].clone();
                }
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {event}"))
}

/// Read snapshots until `accept` approves one.
async fn snapshot_where(ws: &mut Client, accept: impl Fn(&Value) -> bool) -> Value {
    loop {
        let data = next_event(ws, "updateDrivers").await;
        if accept(&data) {
            return data;
        }
    }
}

async fn http_get(addr: std::net::SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    timeout(WAIT, stream.read_to_string(&mut response)).await.unwrap().unwrap();
    response
}

#[tokio::test]
async fn booking_round_trip_over_websockets() {
    let addr = start(ServerRuntimeConfig::default()).await;

    let mut driver = connect(addr).await;
    emit(&mut driver, "driverLocation", json!({"lat": 1.0, "lng": 1.0, "car": "sedan"})).await;

    let snapshot = next_event(&mut driver, "updateDrivers").await;
    let drivers = snapshot.as_object().unwrap();
    assert_eq!(drivers.len(), 1);
    let (driver_id, record) = drivers.iter().next().unwrap();
    assert_eq!(driver_id.len(), 32);
    assert_eq!(record["bookedBy"], Value::Null);
    assert_eq!(record["car"], "sedan");

    let mut rider = connect(addr).await;
    emit(&mut rider, "riderLocation", json!({"lat": 2.0, "lng": 2.0})).await;
    emit(&mut rider, "bookDriver", json!(driver_id)).await;

    let success = next_event(&mut rider, "bookingSuccess").await;
    assert_eq!(success, json!({"driverId": driver_id}));

    let confirmed = next_event(&mut driver, "bookingConfirmed").await;
    assert_eq!(confirmed["lat"], 2.0);
    assert_eq!(confirmed["lng"], 2.0);
    let rider_id = confirmed["riderId"].as_str().unwrap().to_string();

    let snapshot =
        snapshot_where(&mut rider, |s| !s[driver_id.as_str()]["bookedBy"].is_null()).await;
    assert_eq!(snapshot[driver_id.as_str()]["bookedBy"], json!(rider_id));

    emit(&mut rider, "riderLocation", json!({"lat": 3.0, "lng": 3.0})).await;
    let update = next_event(&mut driver, "riderPositionUpdate").await;
    assert_eq!(update, json!({"riderId": rider_id, "lat": 3.0, "lng": 3.0}));

    driver.close(None).await.unwrap();
    snapshot_where(&mut rider, |s| s.as_object().is_some_and(serde_json::Map::is_empty)).await;
}

#[tokio::test]
async fn malformed_frame_gets_protocol_error() {
    let addr = start(ServerRuntimeConfig::default()).await;
    let mut client = connect(addr).await;

    client.send(Message::text("definitely not json")).await.unwrap();
    let error = next_event(&mut client, "protocolError").await;
    assert!(error["message"].as_str().unwrap().starts_with("malformed message"));

    emit(&mut client, "driverLocation", json!({"lng": 1.0})).await;
    next_event(&mut client, "protocolError").await;

    // The connection survives and keeps working
    emit(&mut client, "driverLocation", json!({"lat": 1.0, "lng": 1.0})).await;
    let snapshot = next_event(&mut client, "updateDrivers").await;
    assert_eq!(snapshot.as_object().unwrap().len(), 1);
}

#[tokio::test]
async fn snapshot_on_connect_greets_new_clients() {
    let config = ServerRuntimeConfig {
        driver: DriverConfig { snapshot_on_connect: true, ..Default::default() },
        ..Default::default()
    };
    let addr = start(config).await;

    let mut client = connect(addr).await;
    let snapshot = next_event(&mut client, "updateDrivers").await;
    assert_eq!(snapshot, json!({}));
}

#[tokio::test]
async fn connections_over_limit_are_closed() {
    let config = ServerRuntimeConfig {
        driver: DriverConfig { max_connections: 1, ..Default::default() },
        ..Default::default()
    };
    let addr = start(config).await;

    let mut first = connect(addr).await;
    emit(&mut first, "driverLocation", json!({"lat": 0.0, "lng": 0.0})).await;
    next_event(&mut first, "updateDrivers").await;

    let mut second = connect(addr).await;
    let frame = timeout(WAIT, second.next()).await.unwrap();
    assert!(matches!(frame, None | Some(Ok(Message::Close(_))) | Some(Err(_))));
}

#[tokio::test]
async fn health_endpoint_answers_ok() {
    let addr = start(ServerRuntimeConfig::default()).await;

    let response = http_get(addr, "/health").await;

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("ok"));
}

#[tokio::test]
async fn static_directory_is_served() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>ridematch</h1>").unwrap();

    let addr = start(ServerRuntimeConfig {
        static_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    })
    .await;

    let response = http_get(addr, "/").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("<h1>ridematch</h1>"));

    let response = http_get(addr, "/missing.js").await;
    assert!(response.starts_with("HTTP/1.1 404"));
}

#[tokio::test]
async fn missing_static_directory_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerRuntimeConfig {
        bind_address: "127.0.0.1:0".to_string(),
        static_dir: Some(dir.path().join("nope")),
        ..Default::default()
    };

    let result = Server::bind(config).await;
    assert!(matches!(result, Err(ServerError::Config(_))));
}
