//! End-to-end tests of the session driver on a paused tokio clock

use std::time::Duration;

use boardsync_core::{
    AppEvent, Channel, ClientConfig, CountdownKind, Effect, GameRequest, MemoryVariantCache,
    Player, TransportSignal,
};
use boardsync_runtime::{DriverInput, LocalCommand, RuntimeBuilder, RuntimeHandle, ServerMessage};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_test::assert_ok;

fn join_message(color: &str, moves: &[&str]) -> ServerMessage {
    let moves: Vec<Value> = moves.iter().map(|m| json!({ "compact": m })).collect();
    ServerMessage::game(
        "joingame",
        json!({
            "id": 7,
            "publicity": "public",
            "rated": false,
            "youAreColor": color,
            "metadata": { "Variant": "Classical" },
            "moves": moves,
            "gameConclusion": false,
        }),
    )
}

fn start() -> (RuntimeHandle, mpsc::Receiver<Effect>, mpsc::Receiver<AppEvent>) {
    let mut handle = RuntimeBuilder::new()
        .with_config(ClientConfig::testing())
        .with_cache(Box::new(MemoryVariantCache::new()))
        .build_and_start()
        .unwrap();
    let effects = handle.take_effect_receiver().unwrap();
    let events = handle.take_app_event_receiver().unwrap();
    (handle, effects, events)
}

async fn next_matching<T, F>(receiver: &mut mpsc::Receiver<T>, mut predicate: F) -> T
where
    F: FnMut(&T) -> bool,
{
    let search = async {
        loop {
            let item = receiver.recv().await.expect("channel closed");
            if predicate(&item) {
                return item;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(600), search)
        .await
        .expect("no matching item")
}

#[tokio::test(start_paused = true)]
async fn test_join_subscribes_and_loads() {
    let (mut handle, mut effects, mut events) = start();
    assert_ok!(handle.deliver_message(join_message("black", &["5,2>5,4"])).await);

    let effect = next_matching(&mut effects, |e| matches!(e, Effect::Subscribe { .. })).await;
    assert_eq!(
        effect,
        Effect::Subscribe {
            channel: Channel::Game
        }
    );
    let event = next_matching(&mut events, |e| matches!(e, AppEvent::GameLoaded { .. })).await;
    assert!(matches!(
        event,
        AppEvent::GameLoaded {
            our_color: Some(Player::Black),
            ..
        }
    ));

    let client = assert_ok!(handle.shutdown().await);
    assert!(client.session().is_in_game());
    assert!(client.is_our_turn().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_afk_countdown_expires_on_timer() {
    let (mut handle, _effects, mut events) = start();
    assert_ok!(handle.deliver_message(join_message("white", &[])).await);
    assert_ok!(
        handle
            .deliver_message(ServerMessage::game(
                "opponentafk",
                json!({ "millisUntilAutoAFKResign": 20_000 }),
            ))
            .await
    );

    let event = next_matching(&mut events, |e| {
        matches!(e, AppEvent::CountdownExpired { .. })
    })
    .await;
    assert_eq!(
        event,
        AppEvent::CountdownExpired {
            kind: CountdownKind::OpponentAfk
        }
    );
    assert_ok!(handle.shutdown().await);
}

#[tokio::test(start_paused = true)]
async fn test_move_held_while_out_of_sync() {
    let (mut handle, mut effects, mut events) = start();
    assert_ok!(handle.deliver_message(join_message("white", &[])).await);
    assert_ok!(handle.transport_signal(TransportSignal::ConnectionLost).await);
    assert_ok!(
        handle
            .send_command(LocalCommand::SubmitMove {
                compact: "5,2>5,4".to_string()
            })
            .await
    );

    let event = next_matching(&mut events, |e| matches!(e, AppEvent::MoveHeld { .. })).await;
    assert!(matches!(event, AppEvent::MoveHeld { compact, .. } if compact == "5,2>5,4"));

    assert_ok!(
        handle
            .deliver_message(ServerMessage::game(
                "gameupdate",
                json!({ "moves": [], "gameConclusion": false }),
            ))
            .await
    );
    let effect = next_matching(&mut effects, |e| {
        matches!(e.request(), Some(GameRequest::SubmitMove(_)))
    })
    .await;
    assert_eq!(effect.request().map(|r| r.action()), Some("submitmove"));

    let client = assert_ok!(handle.shutdown().await);
    assert!(client.session().is_in_sync());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_command_becomes_notice() {
    let (mut handle, _effects, mut events) = start();
    assert_ok!(handle.send_command(LocalCommand::OfferDraw).await);

    let event = next_matching(&mut events, |e| matches!(e, AppEvent::Notice { .. })).await;
    assert!(matches!(event, AppEvent::Notice { is_error: true, .. }));
    assert!(handle.is_running());
    assert_ok!(handle.shutdown().await);
}

#[tokio::test(start_paused = true)]
async fn test_driver_stops_when_inputs_close() {
    let (driver, handle) = RuntimeBuilder::new()
        .with_config(ClientConfig::testing())
        .with_cache(Box::new(MemoryVariantCache::new()))
        .build()
        .unwrap();
    let sender = handle.input_sender();
    assert_ok!(sender.send(DriverInput::RoundTrip { millis: 300 }).await);
    drop(sender);
    drop(handle);

    let client = assert_ok!(driver.run().await);
    assert_eq!(client.latency().half_ping(), 150);
    assert!(client.game().is_none());
}
