#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use battle_api::config::Config;
use battle_api::AppState;

pub type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build a fresh AppState with default config.
pub fn test_state() -> AppState {
    AppState::new(Config::default())
}

/// Build the full application router wired to a fresh test state.
pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    let app = battle_api::routes::router().with_state(state.clone());
    (app, state)
}

/// Start an actual TCP server for WebSocket testing. The server runs in the background.
pub async fn start_ws_server() -> (SocketAddr, AppState) {
    let (app, state) = test_app();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Connect to the gateway and consume the `connected` greeting.
/// Returns the stream and the server-assigned connection id.
pub async fn connect(addr: SocketAddr) -> (Ws, String) {
    let url = format!("ws://{addr}/gateway");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");

    let hello = next_event(&mut ws).await;
    assert_eq!(hello["t"], "connected");
    let connection_id = hello["d"]["connectionId"]
        .as_str()
        .expect("connectionId present")
        .to_string();
    assert!(connection_id.starts_with("conn_"));

    (ws, connection_id)
}

pub async fn send_event(ws: &mut Ws, t: &str, d: serde_json::Value) {
    let frame = serde_json::json!({ "t": t, "d": d });
    ws.send(tungstenite::Message::Text(frame.to_string().into()))
        .await
        .expect("send event");
}

pub async fn send_raw(ws: &mut Ws, text: &str) {
    ws.send(tungstenite::Message::Text(text.to_string().into()))
        .await
        .expect("send raw");
}

/// Read the next text frame as JSON, skipping pings.
pub async fn next_event(ws: &mut Ws) -> serde_json::Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for event")
            .expect("stream ended")
            .expect("ws read error");

        match msg {
            tungstenite::Message::Text(text) => {
                return serde_json::from_str(&text).expect("parse event");
            }
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => panic!("Expected text frame, got: {other:?}"),
        }
    }
}

/// Read frames until a close frame arrives and return its code.
pub async fn expect_close(ws: &mut Ws) -> u16 {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for close")
            .expect("stream ended")
            .expect("ws read error");

        match msg {
            tungstenite::Message::Close(Some(frame)) => return frame.code.into(),
            tungstenite::Message::Close(None) => panic!("close frame without code"),
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => panic!("Expected Close frame, got: {other:?}"),
        }
    }
}

pub fn join_battle_payload(battle_id: &str, address: &str, name: &str) -> serde_json::Value {
    serde_json::json!({
        "battleId": battle_id,
        "playerAddress": address,
        "name": name,
        "pokemonId": 25,
        "hp": 35,
        "moves": [
            { "attackName": "Thunder Shock", "attackPower": 40, "agility": 8 },
            { "attackName": "Quick Attack", "attackPower": 40, "agility": 10 },
        ],
    })
}

/// Poll until `check` holds or a second passes.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..50 {
        if check() {
            return true;
        }
        time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
