//! End-to-end flow: HTTP count endpoint plus a live WebSocket realtime server.

use futures_util::{SinkExt, StreamExt};
use inbox_realtime::{RealtimeClient, RealtimeConfig};
use inbox_storage::{CredentialStore, MemoryStorage};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use unread_count::{
    session_channel, try_use_unread_count, ApiClient, Principal, Session, UnreadCountHandle,
    UnreadCountProvider,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Realtime server that acknowledges authentication, then forwards whatever
/// frames the test pushes through the returned channel.
async fn realtime_server() -> (String, mpsc::Sender<String>, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (push_tx, mut push_rx) = mpsc::channel::<String>(8);
    let (auth_tx, auth_rx) = mpsc::channel::<String>(8);

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

        if let Some(Ok(Message::Text(text))) = ws.next().await {
            let _ = auth_tx.send(text.as_str().to_string()).await;
        }
        ws.send(Message::Text(r#"{"event":"authenticated"}"#.into()))
            .await
            .unwrap();

        loop {
            tokio::select! {
                frame = push_rx.recv() => match frame {
                    Some(frame) => {
                        if ws.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                msg = ws.next() => match msg {
                    Some(Ok(msg)) if !msg.is_close() => {}
                    _ => break,
                },
            }
        }
    });

    (url, push_tx, auth_rx)
}

async fn wait_for_count(handle: &UnreadCountHandle, expected: u32) {
    let mut rx = handle.watch();
    timeout(Duration::from_secs(5), rx.wait_for(|c| *c == expected))
        .await
        .expect("timed out waiting for unread count")
        .expect("count channel closed");
}

async fn requests(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

#[tokio::test]
async fn test_login_notify_logout() {
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/messages/unread-count"))
        .and(header("authorization", "Bearer tok-e2e"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "count": 2 })))
        .up_to_n_times(1)
        .mount(&api)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/messages/unread-count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "count": 5 })))
        .mount(&api)
        .await;

    let (ws_url, push, mut auth_frames) = realtime_server().await;

    let credentials = Arc::new(CredentialStore::new(Box::new(MemoryStorage::new())));
    credentials.set_session("u1", "tok-e2e", None).unwrap();

    let fetcher = ApiClient::new(
        &format!("{}/api", api.uri()),
        credentials.clone(),
        Duration::from_secs(5),
    )
    .unwrap();
    let transport = RealtimeClient::new(RealtimeConfig {
        url: ws_url,
        heartbeat_interval_secs: 60,
        event_capacity: 16,
    });

    let (session_tx, session_rx) = session_channel();
    let provider = UnreadCountProvider::new(
        session_rx,
        Arc::new(fetcher),
        Arc::new(transport),
        credentials,
    );
    let handle = provider.handle();
    assert_eq!(handle.count(), 0);

    session_tx.send_replace(Session::authenticated(Principal::new("u1")));
    wait_for_count(&handle, 2).await;

    let auth = timeout(Duration::from_secs(5), auth_frames.recv())
        .await
        .unwrap()
        .unwrap();
    let auth: serde_json::Value = serde_json::from_str(&auth).unwrap();
    assert_eq!(auth["event"], "authenticate");
    assert_eq!(auth["data"]["token"], "tok-e2e");

    push.send(r#"{"event":"message_notification","data":{"messageId":"m1"}}"#.to_string())
        .await
        .unwrap();
    wait_for_count(&handle, 5).await;
    assert_eq!(requests(&api).await, 2);

    push.send(
        r#"{"event":"new_message","data":{"id":"m2","senderId":"u1","receiverId":"u9"}}"#
            .to_string(),
    )
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(requests(&api).await, 2);

    session_tx.send_replace(Session::anonymous());
    wait_for_count(&handle, 0).await;

    provider.shutdown().await;
}

#[tokio::test]
async fn test_api_failure_reads_as_zero() {
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("down"))
        .mount(&api)
        .await;

    // No token stored: the fetch fails locally and realtime is never attempted.
    let credentials = Arc::new(CredentialStore::new(Box::new(MemoryStorage::new())));
    let fetcher = ApiClient::new(&api.uri(), credentials.clone(), Duration::from_secs(5)).unwrap();
    let transport = RealtimeClient::new(RealtimeConfig {
        url: "ws://127.0.0.1:9".to_string(),
        heartbeat_interval_secs: 60,
        event_capacity: 16,
    });

    let (session_tx, session_rx) = session_channel();
    let provider = UnreadCountProvider::new(
        session_rx,
        Arc::new(fetcher),
        Arc::new(transport),
        credentials.clone(),
    );

    session_tx.send_replace(Session::authenticated(Principal::new("u1")));
    provider.reload().await;
    assert_eq!(provider.count(), 0);
    assert_eq!(requests(&api).await, 0);

    credentials.set_session("u1", "tok", None).unwrap();
    provider.reload().await;
    assert_eq!(provider.count(), 0);
    assert!(requests(&api).await >= 1);

    let seen = provider
        .scope(async { try_use_unread_count().map(|h| h.count()) })
        .await
        .unwrap();
    assert_eq!(seen, 0);

    provider.shutdown().await;
}
