use super::{Broker, BrokerState, Message, SubscriberRegistry};
use crate::client::{Subscriber, Subscription};
use crate::config::BrokerSettings;
use crate::transport::message::{ChatEvent, EventType};
use crate::utils::error::BrokerError;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(5);

fn start_broker() -> Broker {
    let (broker, _handle) = Broker::start(&BrokerSettings::default());
    broker
}

async fn next(sub: &mut Subscription) -> Message {
    timeout(WAIT, sub.recv())
        .await
        .expect("timed out waiting for delivery")
        .expect("delivery channel closed")
}

async fn next_n(sub: &mut Subscription, n: usize) -> Vec<Message> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(next(sub).await);
    }
    out
}

#[test]
fn test_registry_register_and_deregister() {
    let registry = SubscriberRegistry::new();
    let (tx, _rx) = mpsc::channel::<Message>(1);
    let subscriber = Subscriber::new(tx);
    let id = subscriber.id;

    registry.register(subscriber);
    assert!(registry.contains(&id));
    assert_eq!(registry.len(), 1);

    assert!(registry.deregister(&id));
    assert!(!registry.contains(&id));
    assert!(registry.is_empty());
}

#[test]
fn test_registry_deregister_is_idempotent() {
    let registry = SubscriberRegistry::new();
    let (tx, _rx) = mpsc::channel::<Message>(1);
    let subscriber = Subscriber::new(tx);
    let id = subscriber.id;
    registry.register(subscriber);

    assert!(registry.deregister(&id));
    assert!(!registry.deregister(&id));
}

#[tokio::test]
async fn test_registry_deregister_cancels_snapshot_copies() {
    let registry = SubscriberRegistry::new();
    let (tx, _rx) = mpsc::channel::<Message>(1);
    let subscriber = Subscriber::new(tx);
    let id = subscriber.id;
    registry.register(subscriber);

    let snapshot = registry.snapshot();
    assert!(!snapshot[0].is_cancelled());

    assert!(registry.deregister(&id));
    assert!(snapshot[0].is_cancelled());
    timeout(WAIT, snapshot[0].cancelled())
        .await
        .expect("cancellation not observed");
}

#[test]
fn test_registry_snapshot_survives_removal() {
    let registry = SubscriberRegistry::new();
    let (tx, mut rx) = mpsc::channel::<Message>(1);
    let subscriber = Subscriber::new(tx);
    let id = subscriber.id;
    registry.register(subscriber);

    let snapshot = registry.snapshot();
    registry.deregister(&id);

    assert_eq!(snapshot.len(), 1);
    assert!(registry.snapshot().is_empty());
    // the copy still reaches the live receiver
    snapshot[0].sender.try_send(Message::from("late")).unwrap();
    assert_eq!(rx.try_recv().unwrap(), Message::from("late"));
}

#[tokio::test]
async fn test_open_subscription_registers_and_drop_deregisters() {
    let broker = start_broker();
    assert_eq!(broker.subscriber_count(), 0);

    let a = broker.open_subscription();
    let b = broker.open_subscription();
    assert_ne!(a.id(), b.id());
    assert_eq!(broker.subscriber_count(), 2);

    drop(a);
    assert_eq!(broker.subscriber_count(), 1);

    b.close();
    assert_eq!(broker.subscriber_count(), 0);
}

#[tokio::test]
async fn test_close_subscription_is_idempotent() {
    let broker = start_broker();
    let sub = broker.open_subscription();

    assert!(broker.close_subscription(&sub.id()));
    assert!(!broker.close_subscription(&sub.id()));
    // Drop after an explicit close must not panic
    drop(sub);
    assert_eq!(broker.subscriber_count(), 0);
}

#[tokio::test]
async fn test_publish_without_subscribers() {
    let broker = start_broker();
    let result = timeout(WAIT, broker.publish(Message::from("nobody listening"))).await;
    assert_eq!(result.expect("publish blocked"), Ok(()));
}

#[tokio::test]
async fn test_subscriber_receives_chat_event() {
    let broker = start_broker();
    let mut a = broker.open_subscription();

    let message = ChatEvent::new_chat_message("alice", "hello")
        .encode()
        .unwrap();
    broker.publish(message.clone()).await.unwrap();

    let received = next(&mut a).await;
    assert_eq!(received, message);

    let event: ChatEvent = serde_json::from_slice(received.as_bytes()).unwrap();
    assert_eq!(event.username, "alice");
    assert_eq!(event.message, "hello");
    assert_eq!(event.event_type, EventType::NewChatMessage);

    // exactly one delivery
    assert!(a.try_recv().is_err());
}

#[tokio::test]
async fn test_deregistered_subscriber_misses_later_messages() {
    let broker = start_broker();
    let mut a = broker.open_subscription();
    let mut b = broker.open_subscription();

    broker.publish(Message::from("first")).await.unwrap();
    assert_eq!(next(&mut a).await, Message::from("first"));
    assert_eq!(next(&mut b).await, Message::from("first"));

    assert!(broker.close_subscription(&a.id()));

    broker.publish(Message::from("second")).await.unwrap();
    assert_eq!(next(&mut b).await, Message::from("second"));
    assert!(a.try_recv().is_err());
}

#[tokio::test]
async fn test_messages_arrive_in_publish_order() {
    let broker = start_broker();
    let mut a = broker.open_subscription();
    let mut b = broker.open_subscription();

    let readers = tokio::spawn(async move {
        // both must keep reading or the round stalls on whichever lags
        tokio::join!(next_n(&mut a, 50), next_n(&mut b, 50))
    });

    let expected: Vec<Message> = (0..50).map(|i| Message::from(i.to_string())).collect();
    let publisher = {
        let broker = broker.clone();
        let expected = expected.clone();
        tokio::spawn(async move {
            for message in expected {
                broker.publish(message).await.unwrap();
            }
        })
    };

    let (from_a, from_b) = timeout(WAIT, readers).await.unwrap().unwrap();
    timeout(WAIT, publisher).await.unwrap().unwrap();
    assert_eq!(from_a, expected);
    assert_eq!(from_b, expected);
}

#[tokio::test]
async fn test_late_subscriber_misses_in_flight_message() {
    let broker = start_broker();
    let mut a = broker.open_subscription();

    // publish returns once the round's snapshot is fixed
    broker.publish(Message::from("before")).await.unwrap();
    let mut late = broker.open_subscription();

    assert_eq!(next(&mut a).await, Message::from("before"));

    broker.publish(Message::from("after")).await.unwrap();
    assert_eq!(next(&mut a).await, Message::from("after"));
    // "before" would have been first in line had it been delivered
    assert_eq!(next(&mut late).await, Message::from("after"));
}

#[tokio::test]
async fn test_deregister_then_publish_never_blocks() {
    let broker = start_broker();
    let mut idle = broker.open_subscription();
    assert!(broker.close_subscription(&idle.id()));

    // with a buffer of one, a stalled registered subscriber would block the second round
    for i in 0..3 {
        timeout(WAIT, broker.publish(Message::from(format!("m{i}"))))
            .await
            .expect("publish blocked on a deregistered subscriber")
            .unwrap();
    }
    assert!(idle.try_recv().is_err());
}

#[tokio::test]
async fn test_close_subscription_unblocks_stalled_round() {
    let broker = start_broker();
    let mut stalled = broker.open_subscription();
    let mut live = broker.open_subscription();

    // m1 fills the stalled buffer, so the round for m2 waits on it
    broker.publish(Message::from("m1")).await.unwrap();
    assert_eq!(next(&mut live).await, Message::from("m1"));
    broker.publish(Message::from("m2")).await.unwrap();

    // handle still held: the receiver stays open
    assert!(broker.close_subscription(&stalled.id()));

    assert_eq!(next(&mut live).await, Message::from("m2"));
    timeout(WAIT, broker.publish(Message::from("m3")))
        .await
        .expect("round stayed blocked on a deregistered subscriber")
        .unwrap();
    assert_eq!(next(&mut live).await, Message::from("m3"));

    assert_eq!(stalled.try_recv().unwrap(), Message::from("m1"));
    assert!(stalled.try_recv().is_err());
}

#[tokio::test]
async fn test_slow_subscriber_blocks_later_publishes() {
    let broker = start_broker();
    let mut slow = broker.open_subscription();
    let mut fast = broker.open_subscription();

    // m1 fills both buffers; the round for m2 then stalls
    broker.publish(Message::from("m1")).await.unwrap();
    broker.publish(Message::from("m2")).await.unwrap();

    let pending = {
        let broker = broker.clone();
        tokio::spawn(async move { broker.publish(Message::from("m3")).await })
    };

    sleep(Duration::from_millis(200)).await;
    assert!(!pending.is_finished());

    let (from_slow, from_fast) = tokio::join!(next_n(&mut slow, 3), next_n(&mut fast, 3));
    let expected = vec![
        Message::from("m1"),
        Message::from("m2"),
        Message::from("m3"),
    ];
    assert_eq!(from_slow, expected);
    assert_eq!(from_fast, expected);

    assert_eq!(timeout(WAIT, pending).await.unwrap().unwrap(), Ok(()));
}

#[tokio::test]
async fn test_publish_after_shutdown_is_unavailable() {
    let (broker, handle) = Broker::start(&BrokerSettings::default());
    assert_eq!(broker.state(), BrokerState::Running);

    broker.shutdown();
    assert_eq!(broker.state(), BrokerState::Stopped);
    assert!(!broker.is_running());

    timeout(WAIT, handle).await.unwrap().unwrap();
    assert_eq!(
        broker.publish(Message::from("too late")).await,
        Err(BrokerError::Unavailable)
    );
}

#[tokio::test]
async fn test_shutdown_interrupts_blocked_round() {
    let (broker, handle) = Broker::start(&BrokerSettings::default());
    let _stalled = broker.open_subscription();

    broker.publish(Message::from("m1")).await.unwrap();
    broker.publish(Message::from("m2")).await.unwrap();

    let pending = {
        let broker = broker.clone();
        tokio::spawn(async move { broker.publish(Message::from("m3")).await })
    };
    sleep(Duration::from_millis(100)).await;
    assert!(!pending.is_finished());

    broker.shutdown();

    timeout(WAIT, handle).await.unwrap().unwrap();
    assert_eq!(
        timeout(WAIT, pending).await.unwrap().unwrap(),
        Err(BrokerError::Unavailable)
    );
}

#[tokio::test]
async fn test_dropping_every_handle_stops_broadcaster() {
    let (broker, handle) = Broker::start(&BrokerSettings::default());
    drop(broker);
    timeout(WAIT, handle)
        .await
        .expect("broadcaster kept running")
        .unwrap();
}

#[tokio::test]
async fn test_delivery_buffer_absorbs_bursts() {
    let settings = BrokerSettings {
        delivery_buffer: 4,
        ..BrokerSettings::default()
    };
    let (broker, _handle) = Broker::start(&settings);
    let mut sub = broker.open_subscription();

    for i in 0..4 {
        timeout(WAIT, broker.publish(Message::from(format!("m{i}"))))
            .await
            .expect("publish blocked with room in the buffer")
            .unwrap();
    }

    let received = next_n(&mut sub, 4).await;
    assert_eq!(received[3], Message::from("m3"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_publishers_are_totally_ordered() {
    let broker = start_broker();
    let mut a = broker.open_subscription();
    let mut b = broker.open_subscription();

    let mut publishers = Vec::new();
    for p in 0..4 {
        let broker = broker.clone();
        publishers.push(tokio::spawn(async move {
            for i in 0..25 {
                broker
                    .publish(Message::from(format!("{p}:{i}")))
                    .await
                    .unwrap();
            }
        }));
    }

    let (from_a, from_b) = timeout(Duration::from_secs(20), async {
        tokio::join!(next_n(&mut a, 100), next_n(&mut b, 100))
    })
    .await
    .unwrap();

    for publisher in publishers {
        publisher.await.unwrap();
    }

    // every subscriber observes the same total order
    assert_eq!(from_a, from_b);

    // and each publisher's own messages stay in the order it sent them
    for p in 0..4 {
        let seq: Vec<usize> = from_a
            .iter()
            .map(|m| m.to_text().into_owned())
            .filter_map(|text| {
                let (publisher, i) = text.split_once(':')?;
                (publisher == p.to_string()).then(|| i.parse().unwrap())
            })
            .collect();
        assert_eq!(seq, (0..25).collect::<Vec<usize>>());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_churn_during_publishes_has_no_deadlock_or_duplicates() {
    let broker = start_broker();
    let total = 100usize;

    let mut readers = Vec::new();
    for r in 0..20usize {
        let broker = broker.clone();
        // the first readers are registered before anything is published
        let early = (r < 5).then(|| broker.open_subscription());
        readers.push(tokio::spawn(async move {
            let mut sub = match early {
                Some(sub) => sub,
                None => {
                    sleep(Duration::from_millis((r * 3) as u64)).await;
                    broker.open_subscription()
                }
            };
            let wanted = (r * 7) % 40 + 1;
            let mut seen = Vec::new();
            while seen.len() < wanted {
                match timeout(Duration::from_millis(300), sub.recv()).await {
                    Ok(Some(message)) => {
                        seen.push(message.to_text().parse::<usize>().unwrap());
                    }
                    _ => break,
                }
            }
            (r, wanted, seen)
        }));
    }

    let mut churners = Vec::new();
    for _ in 0..10 {
        let broker = broker.clone();
        churners.push(tokio::spawn(async move {
            for _ in 0..50 {
                let sub = broker.open_subscription();
                tokio::task::yield_now().await;
                broker.close_subscription(&sub.id());
            }
        }));
    }

    let publisher = {
        let broker = broker.clone();
        tokio::spawn(async move {
            for i in 0..total {
                broker.publish(Message::from(i.to_string())).await.unwrap();
            }
        })
    };

    timeout(Duration::from_secs(20), async {
        publisher.await.unwrap();
        for churner in churners {
            churner.await.unwrap();
        }
        for reader in readers {
            let (r, wanted, seen) = reader.await.unwrap();
            // contiguous run from the point of registration: no gaps, no repeats
            for pair in seen.windows(2) {
                assert_eq!(pair[1], pair[0] + 1);
            }
            if r < 5 {
                assert_eq!(seen.first(), Some(&0), "reader {r} missed the first message");
                assert_eq!(seen.len(), wanted, "reader {r} fell short");
            }
        }
    })
    .await
    .expect("deadlock under churn");

    assert_eq!(broker.subscriber_count(), 0);
}
