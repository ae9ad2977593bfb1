use std::sync::{Arc, Mutex};
use std::time::Duration;
use verdant_playback::{PlaybackCoordinator, PlaybackOutcome, PlaybackStatus, PlaybackSubscriber};
use verdant_speech::SynthesisError;
use verdant_test_utils::{GatedSynthesisClient, RecordingNotifier, RecordingOutput};

fn setup() -> (PlaybackCoordinator, Arc<GatedSynthesisClient>, Arc<RecordingOutput>) {
    let synth = Arc::new(GatedSynthesisClient::new());
    let output = Arc::new(RecordingOutput::new());
    let coordinator = PlaybackCoordinator::builder(synth.clone(), output.clone())
        .notifier(Arc::new(RecordingNotifier::new()))
        .build();
    (coordinator, synth, output)
}

/// Every subscriber must match the status derived from the global active key.
fn assert_consistent(coordinator: &PlaybackCoordinator, subscribers: &[PlaybackSubscriber]) {
    let snapshot = coordinator.snapshot();
    let mut active = 0;
    for subscriber in subscribers {
        assert_eq!(
            subscriber.status(),
            snapshot.status_of(subscriber.key()),
            "subscriber '{}' out of sync",
            subscriber.key()
        );
        if subscriber.status().is_active() {
            active += 1;
        }
    }
    assert!(active <= 1);
}

#[tokio::test]
async fn test_subscribers_track_global_state() {
    let (coordinator, synth, output) = setup();
    let cards: Vec<PlaybackSubscriber> = ["tulsi", "neem", "brahmi"]
        .into_iter()
        .map(|key| coordinator.attach(key))
        .collect();
    assert_consistent(&coordinator, &cards);

    let tulsi = cards[0].play("desc");
    assert!(cards[0].is_loading());
    assert_consistent(&coordinator, &cards);

    let neem = cards[1].play("desc");
    assert!(!cards[0].is_loading());
    assert!(cards[1].is_loading());
    assert_consistent(&coordinator, &cards);

    synth.wait_for_calls(2).await;
    synth.succeed("tulsi");
    synth.succeed("neem");
    tulsi.await.unwrap().unwrap();
    neem.await.unwrap().unwrap();
    assert!(cards[1].is_playing());
    assert_consistent(&coordinator, &cards);

    assert!(!cards[2].stop());
    assert!(cards[1].stop());
    assert_consistent(&coordinator, &cards);

    let brahmi = cards[2].play("desc");
    synth.wait_for_calls(3).await;
    synth.reject("brahmi", SynthesisError::Timeout(30));
    assert!(brahmi.await.unwrap().is_err());
    assert_consistent(&coordinator, &cards);
    assert!(!output.is_playing());
}

#[tokio::test]
async fn test_wait_for_playing() {
    let (coordinator, synth, _) = setup();
    let mut card = coordinator.attach("tulsi");
    let _handle = card.play("desc");

    synth.wait_for_calls(1).await;
    synth.succeed("tulsi");

    let status = tokio::time::timeout(Duration::from_secs(2), card.wait_for(|s| s.is_playing()))
        .await
        .unwrap();
    assert_eq!(status, Some(PlaybackStatus::Playing));
}

#[tokio::test]
async fn test_changed_reports_transitions() {
    let (coordinator, synth, _) = setup();
    let mut card = coordinator.attach("neem");
    let handle = card.play("desc");
    assert_eq!(card.changed().await, Some(PlaybackStatus::Loading));

    synth.wait_for_calls(1).await;
    synth.succeed("neem");
    handle.await.unwrap().unwrap();
    assert_eq!(card.changed().await, Some(PlaybackStatus::Playing));

    card.stop();
    assert_eq!(card.changed().await, Some(PlaybackStatus::Idle));
}

#[tokio::test]
async fn test_toggle_from_card() {
    let (coordinator, synth, _) = setup();
    let card = coordinator.attach("tulsi");

    let handle = card.toggle("desc").unwrap();
    synth.wait_for_calls(1).await;
    synth.succeed("tulsi");
    handle.await.unwrap().unwrap();
    assert!(card.is_playing());

    assert!(card.toggle("desc").is_none());
    assert_eq!(card.status(), PlaybackStatus::Idle);
}

#[tokio::test]
async fn test_dropping_active_card_stops_it() {
    let (coordinator, synth, _) = setup();
    let card = coordinator.attach("tulsi");
    let handle = card.play("desc");
    assert_eq!(coordinator.subscriber_count(), 1);

    drop(card);
    assert_eq!(coordinator.subscriber_count(), 0);
    assert_eq!(coordinator.active_key(), None);

    synth.wait_for_calls(1).await;
    synth.succeed("tulsi");
    assert!(handle.await.unwrap().is_ok());
    assert_eq!(coordinator.active_key(), None);
}

#[tokio::test]
async fn test_dropping_inactive_card_leaves_other_key_alone() {
    let (coordinator, _, _) = setup();
    let idle = coordinator.attach("neem");
    let active = coordinator.attach("tulsi");
    let _handle = active.play("desc");

    drop(idle);
    assert_eq!(coordinator.status("tulsi"), PlaybackStatus::Loading);
}

#[tokio::test]
async fn test_raw_callbacks_receive_every_change() {
    let (coordinator, synth, _) = setup();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = coordinator.subscribe("tulsi", move |status| {
        sink.lock().unwrap().push(status);
    });

    let handle = coordinator.request("tulsi", "desc");
    synth.wait_for_calls(1).await;
    synth.succeed("tulsi");
    handle.await.unwrap().unwrap();
    coordinator.stop("tulsi");

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            PlaybackStatus::Idle,
            PlaybackStatus::Loading,
            PlaybackStatus::Playing,
            PlaybackStatus::Idle,
        ]
    );

    subscription.unsubscribe();
    coordinator.request("tulsi", "again");
    assert_eq!(seen.lock().unwrap().len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_callback_cannot_leave_card_stale() {
    let (coordinator, synth, _) = setup();
    let entered = Arc::new(tokio::sync::Notify::new());
    let signal = entered.clone();
    let slow = coordinator.subscribe("tulsi", move |status| {
        if status == PlaybackStatus::Playing {
            signal.notify_one();
            std::thread::sleep(Duration::from_millis(300));
        }
    });
    let card = coordinator.attach("tulsi");

    let handle = card.play("desc");
    synth.wait_for_calls(1).await;
    synth.succeed("tulsi");

    // The continuation is now stuck in the slow callback with a Playing snapshot.
    tokio::time::timeout(Duration::from_secs(2), entered.notified())
        .await
        .unwrap();
    assert!(coordinator.stop("tulsi"));
    assert_eq!(card.status(), PlaybackStatus::Idle);

    assert_eq!(handle.await.unwrap().unwrap(), PlaybackOutcome::Started);
    assert_eq!(coordinator.status("tulsi"), PlaybackStatus::Idle);
    assert_eq!(card.status(), coordinator.status("tulsi"));
    drop(slow);
}
