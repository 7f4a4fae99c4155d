use scrapecore::{LogEntry, LogHub, LogLevel};
use uuid::Uuid;

#[tokio::test]
async fn publish_without_subscribers_is_a_noop() {
    let hub = LogHub::new(8);
    let phase = Uuid::new_v4();

    hub.publish(phase, LogEntry::new(LogLevel::Info, "nobody listening"))
        .await;
    assert_eq!(hub.subscriber_count(phase).await, 0);
}

#[tokio::test]
async fn subscriber_receives_entries_in_order() {
    let hub = LogHub::new(8);
    let phase = Uuid::new_v4();
    let mut rx = hub.subscribe(phase).await;

    hub.publish(phase, LogEntry::new(LogLevel::Info, "first"))
        .await;
    hub.publish(phase, LogEntry::new(LogLevel::Success, "second"))
        .await;

    assert_eq!(rx.recv().await.unwrap().message, "first");
    let second = rx.recv().await.unwrap();
    assert_eq!(second.message, "second");
    assert_eq!(second.level, LogLevel::Success);
}

#[tokio::test]
async fn phases_are_isolated() {
    let hub = LogHub::new(8);
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let mut rx_a = hub.subscribe(a).await;
    let mut rx_b = hub.subscribe(b).await;

    hub.publish(a, LogEntry::new(LogLevel::Info, "for a")).await;

    assert_eq!(rx_a.recv().await.unwrap().message, "for a");
    assert!(rx_b.try_recv().is_err());
}

#[tokio::test]
async fn late_subscriber_misses_earlier_entries() {
    let hub = LogHub::new(8);
    let phase = Uuid::new_v4();

    // Keep the channel alive with one subscriber while publishing.
    let _early = hub.subscribe(phase).await;
    hub.publish(phase, LogEntry::new(LogLevel::Info, "before"))
        .await;

    let mut late = hub.subscribe(phase).await;
    hub.publish(phase, LogEntry::new(LogLevel::Info, "after"))
        .await;

    assert_eq!(late.recv().await.unwrap().message, "after");
    assert!(late.try_recv().is_err());
}

#[tokio::test]
async fn prune_drops_an_idle_channel_without_a_publish() {
    let hub = LogHub::new(8);
    let phase = Uuid::new_v4();

    // Subscriber leaves after the phase has finished; no publish will
    // follow to clean up behind it.
    let rx = hub.subscribe(phase).await;
    drop(rx);
    assert_eq!(hub.tracked_phases().await, 1);

    hub.prune(phase).await;
    assert_eq!(hub.tracked_phases().await, 0);
}

#[tokio::test]
async fn prune_keeps_channels_with_live_subscribers() {
    let hub = LogHub::new(8);
    let phase = Uuid::new_v4();

    let mut rx = hub.subscribe(phase).await;
    hub.prune(phase).await;
    assert_eq!(hub.tracked_phases().await, 1);

    hub.publish(phase, LogEntry::new(LogLevel::Info, "still here"))
        .await;
    assert_eq!(rx.recv().await.unwrap().message, "still here");
}

#[tokio::test]
async fn channel_is_pruned_after_last_subscriber_leaves() {
    let hub = LogHub::new(8);
    let phase = Uuid::new_v4();

    let rx = hub.subscribe(phase).await;
    assert_eq!(hub.subscriber_count(phase).await, 1);
    drop(rx);

    // Publishing to a phase with no remaining receivers drops the channel.
    hub.publish(phase, LogEntry::new(LogLevel::Info, "gone"))
        .await;
    assert_eq!(hub.subscriber_count(phase).await, 0);
}
