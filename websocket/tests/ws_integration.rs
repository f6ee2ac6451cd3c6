use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use ballot_ledger::VoteLedger;
use ballot_nullables::{NullClock, NullStore};
use ballot_types::{CandidateId, CategoryId, VoterId};
use ballot_websocket::{router, ServerMessage, WsState};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve() -> (Arc<VoteLedger>, String) {
    let ledger = Arc::new(VoteLedger::new(Arc::new(NullStore::new())));
    let app = router(Arc::new(WsState::new(Arc::clone(&ledger))));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (ledger, format!("ws://{addr}/ws"))
}

fn open_category(ledger: &VoteLedger) -> (CategoryId, CandidateId) {
    let clock = NullClock::new(0);
    let c = ledger
        .catalog()
        .create_category("Best Talk", None, None, clock.now())
        .unwrap();
    let a = ledger.catalog().add_candidate(c.id, "A", None).unwrap();
    ledger.catalog().set_voting(c.id, true).unwrap();
    (c.id, a.id)
}

async fn send(client: &mut Client, json: &str) {
    client.send(Message::Text(json.to_string())).await.unwrap();
}

async fn recv(client: &mut Client) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for frame")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn subscriber_receives_current_then_live_tallies() {
    let (ledger, url) = serve().await;
    let (category, a) = open_category(&ledger);
    let (mut client, _) = connect_async(url.as_str()).await.unwrap();

    send(&mut client, &format!(r#"{{"type":"subscribe","category_id":{category}}}"#)).await;
    assert!(matches!(recv(&mut client).await, ServerMessage::Ack { .. }));
    match recv(&mut client).await {
        ServerMessage::Tally { snapshot } => assert_eq!(snapshot.votes_for(a), Some(0)),
        other => panic!("unexpected {other:?}"),
    }

    let l = Arc::clone(&ledger);
    tokio::task::spawn_blocking(move || {
        l.attempt_vote(&VoterId::parse("u1").unwrap(), category, a)
            .unwrap()
    })
    .await
    .unwrap();

    match recv(&mut client).await {
        ServerMessage::Tally { snapshot } => {
            assert_eq!(snapshot.votes_for(a), Some(1));
            assert_eq!(snapshot.sequence, 1);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn deleting_category_sends_closed() {
    let (ledger, url) = serve().await;
    let (category, _) = open_category(&ledger);
    let (mut client, _) = connect_async(url.as_str()).await.unwrap();

    send(&mut client, &format!(r#"{{"type":"subscribe","category_id":{category}}}"#)).await;
    recv(&mut client).await; // ack
    recv(&mut client).await; // initial tally

    ledger.catalog().set_voting(category, false).unwrap();
    ledger.catalog().delete_category(category).unwrap();
    assert_eq!(
        recv(&mut client).await,
        ServerMessage::Closed {
            category_id: category
        }
    );
}

#[tokio::test]
async fn errors_and_ping() {
    let (_ledger, url) = serve().await;
    let (mut client, _) = connect_async(url.as_str()).await.unwrap();

    send(&mut client, "not json").await;
    assert!(matches!(recv(&mut client).await, ServerMessage::Error { .. }));

    send(&mut client, r#"{"type":"subscribe","category_id":404}"#).await;
    match recv(&mut client).await {
        ServerMessage::Error { message } => assert!(message.contains("not found")),
        other => panic!("unexpected {other:?}"),
    }

    send(&mut client, r#"{"type":"unsubscribe","category_id":1}"#).await;
    assert!(matches!(recv(&mut client).await, ServerMessage::Error { .. }));

    send(&mut client, r#"{"type":"ping"}"#).await;
    assert_eq!(recv(&mut client).await, ServerMessage::Pong);
}

#[tokio::test]
async fn one_client_leaving_does_not_affect_another() {
    let (ledger, url) = serve().await;
    let (category, a) = open_category(&ledger);
    let subscribe = format!(r#"{{"type":"subscribe","category_id":{category}}}"#);

    let (mut stays, _) = connect_async(url.as_str()).await.unwrap();
    let (mut leaves, _) = connect_async(url.as_str()).await.unwrap();
    for client in [&mut stays, &mut leaves] {
        send(client, &subscribe).await;
        recv(client).await;
        recv(client).await;
    }
    leaves.close(None).await.unwrap();
    drop(leaves);

    let l = Arc::clone(&ledger);
    tokio::task::spawn_blocking(move || {
        l.attempt_vote(&VoterId::parse("u1").unwrap(), category, a)
            .unwrap()
    })
    .await
    .unwrap();

    match recv(&mut stays).await {
        ServerMessage::Tally { snapshot } => assert_eq!(snapshot.votes_for(a), Some(1)),
        other => panic!("unexpected {other:?}"),
    }
}
