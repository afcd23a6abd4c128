//! End-to-end bridge tests against a mock proxy
//!
//! The bridge API is synchronous, so these tests run the mock proxy on its
//! own thread-local runtime and poll the bridge the way a game script would.

use std::net::SocketAddr;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use axum::{Json, Router, routing::post};
use serde_json::{Value, json};

use llm_bridge::bridge::{MSG_NO_REQUEST, MSG_PROCESSING, MSG_STARTED};
use llm_bridge::{Bridge, Config};

fn spawn_mock_proxy(reply: Value) -> SocketAddr {
    let (addr_tx, addr_rx) = mpsc::channel();
    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let app = Router::new().route(
                "/chat",
                post(move |Json(_body): Json<Value>| {
                    let reply = reply.clone();
                    async move { Json(reply) }
                }),
            );
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            addr_tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    addr_rx.recv().unwrap()
}

fn bridge_against(addr: SocketAddr) -> Bridge {
    let mut config = Config::default();
    config.bridge.proxy_url = format!("http://{addr}");
    Bridge::new(&config).unwrap()
}

fn poll_until_done(bridge: &Bridge, id: &str) -> String {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let reply = bridge.prompt("", "", "", id);
        if reply != MSG_PROCESSING {
            return reply;
        }
        assert!(Instant::now() < deadline, "request {id} never completed");
        thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn start_poll_and_consume_once() {
    let addr = spawn_mock_proxy(json!({
        "response": "**Objective**\nHold the line... at the `bridge`",
        "provider": "ollama",
    }));
    let bridge = bridge_against(addr);

    let started = bridge.prompt("You are a commander", "Give orders", "ollama", "op-1");
    assert_eq!(started, MSG_STARTED);

    let reply = poll_until_done(&bridge, "op-1");
    assert_eq!(reply, "Hold the line. at the");

    // One-shot consumption: the payload is gone after the first read.
    assert_eq!(bridge.prompt("", "", "", "op-1"), MSG_NO_REQUEST);
}

#[test]
fn chat_with_ai_roundtrip() {
    let addr = spawn_mock_proxy(json!({
        "response": "Copy that.",
        "provider": "ollama",
    }));
    let bridge = bridge_against(addr);

    let started = bridge.chat_with_ai("Report status", 0.3, "ollama", "op-2");
    assert_eq!(started, MSG_STARTED);

    assert_eq!(poll_until_done(&bridge, "op-2"), "Copy that.");
}

#[test]
fn duplicate_start_does_not_clobber_result() {
    let addr = spawn_mock_proxy(json!({
        "response": "First answer",
        "provider": "ollama",
    }));
    let bridge = bridge_against(addr);

    assert_eq!(
        bridge.chat_with_ai("question", 0.7, "ollama", "op-3"),
        MSG_STARTED
    );
    // Second start for the same id is rejected whatever the record's state.
    let second = bridge.chat_with_ai("question again", 0.7, "ollama", "op-3");
    assert_eq!(second, MSG_PROCESSING);

    assert_eq!(poll_until_done(&bridge, "op-3"), "First answer");
}

#[test]
fn network_failure_surfaces_as_error_payload() {
    // Nothing listens on the proxy address; the task records the failure
    // and the next poll delivers it.
    let mut config = Config::default();
    config.bridge.proxy_url = "http://127.0.0.1:9".to_string();
    let bridge = Bridge::new(&config).unwrap();

    assert_eq!(
        bridge.chat_with_ai("hello", 0.7, "ollama", "op-4"),
        MSG_STARTED
    );

    let reply = poll_until_done(&bridge, "op-4");
    assert!(
        reply.starts_with("request error"),
        "expected error payload, got {reply:?}"
    );

    // Error records are consumed like Success records.
    assert_eq!(bridge.prompt("", "", "", "op-4"), MSG_NO_REQUEST);
}
