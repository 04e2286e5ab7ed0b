//! Tunnel lifecycle through the remote group module.

use bytes::Bytes;
use messaging_actors::test_utils::TestMiddleman;
use messaging_actors::{
    ActorRef, FailureStage, GroupError, GroupMessage, Mailbox, Middleman, RemoteGroupModule,
};
use network::NodeId;
use proptest::prelude::*;
use routing_config::GroupSettings;
use std::sync::{Arc, Barrier};

fn node(name: &str) -> NodeId {
    NodeId::from_uri(&format!("tcp://{name}:7000")).unwrap()
}

fn drain_payloads(mailbox: &mut Mailbox) -> Vec<Bytes> {
    let mut out = Vec::new();
    while let Ok(message) = mailbox.try_recv() {
        if let GroupMessage::Publish { payload, .. } = message {
            out.push(payload);
        }
    }
    out
}

#[test]
fn concurrent_get_impl_shares_one_tunnel() {
    let middleman = Arc::new(TestMiddleman::new());
    let module = RemoteGroupModule::new(&middleman);
    let origin = node("alpha");
    let barrier = Barrier::new(8);

    let tunnels: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    module.get_impl(&origin, "chat").unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for tunnel in &tunnels[1..] {
        assert!(Arc::ptr_eq(&tunnels[0], tunnel));
    }
    assert_eq!(middleman.attempts(), 1);
    assert_eq!(module.tunnel_count(), 1);
}

#[test]
fn get_impl_racing_stop_never_leaves_live_tunnel() {
    for _ in 0..50 {
        let middleman = Arc::new(TestMiddleman::new());
        let module = RemoteGroupModule::new(&middleman);
        let barrier = Barrier::new(9);

        let results: Vec<_> = std::thread::scope(|scope| {
            let callers: Vec<_> = (0..8)
                .map(|i| {
                    let module = &module;
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        module.get_impl(&node(&format!("n{}", i % 3)), "chat")
                    })
                })
                .collect();
            let stopper = scope.spawn(|| {
                barrier.wait();
                module.stop();
            });
            stopper.join().unwrap();
            callers.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(module.tunnel_count(), 0);
        for result in results {
            match result {
                Ok(tunnel) => assert!(tunnel.is_stopped()),
                Err(err) => assert!(matches!(err, GroupError::ModuleStopped { .. })),
            }
        }

        // Late completions must not revive anything
        for attempt in middleman.take_pending() {
            let _mailbox = attempt.succeed();
        }
        assert_eq!(module.tunnel_count(), 0);
    }
}

#[test]
fn queued_publishes_reach_intermediary_in_order() {
    let middleman = Arc::new(TestMiddleman::new());
    let module = RemoteGroupModule::new(&middleman);

    let group = module.get("chat@tcp://alpha:7000").unwrap();
    for payload in ["A", "B", "C"] {
        group.publish(payload, None).unwrap();
    }
    assert!(!group.tunnel().is_connected());

    let mut pending = middleman.take_pending();
    assert_eq!(pending.len(), 1);
    let mut intermediary = pending.remove(0).succeed();

    assert!(group.tunnel().is_connected());
    assert_eq!(
        drain_payloads(&mut intermediary),
        vec![Bytes::from("A"), Bytes::from("B"), Bytes::from("C")]
    );

    group.publish("D", None).unwrap();
    assert_eq!(drain_payloads(&mut intermediary), vec![Bytes::from("D")]);
}

#[test]
fn stop_drains_registry_and_rejects_later_gets() {
    let middleman = Arc::new(TestMiddleman::new());
    let module = RemoteGroupModule::new(&middleman);
    let chat = module.get_impl(&node("alpha"), "chat").unwrap();
    let news = module.get_impl(&node("beta"), "news").unwrap();

    module.stop();

    assert!(module.lookup(&node("alpha"), "chat").is_none());
    assert!(module.lookup(&node("beta"), "news").is_none());
    assert!(chat.is_stopped() && news.is_stopped());

    let err = module.get_impl(&node("alpha"), "chat").unwrap_err();
    assert!(matches!(err, GroupError::ModuleStopped { .. }));
    assert_eq!(err.stage(), FailureStage::Lifecycle);
    assert!(matches!(
        module.get("chat@tcp://alpha:7000"),
        Err(GroupError::ModuleStopped { .. })
    ));
    let (intermediary, _mailbox) = ActorRef::with_mailbox(node("alpha"));
    assert!(module.get_impl_connected(&intermediary, "chat").is_err());
}

#[test]
fn stop_discards_queued_messages_of_unconnected_tunnels() {
    let middleman = Arc::new(TestMiddleman::new());
    let module = RemoteGroupModule::new(&middleman);
    let group = module.get("chat@tcp://alpha:7000").unwrap();
    group.publish("lost", None).unwrap();

    module.stop();

    assert_eq!(group.tunnel().pending_len(), 0);
    assert_eq!(group.tunnel().discarded(), 1);
    assert!(matches!(
        group.publish("late", None),
        Err(GroupError::TunnelStopped { .. })
    ));
}

#[test]
fn completion_after_stop_leaves_detached_tunnel_stopped() {
    let middleman = Arc::new(TestMiddleman::new());
    let module = RemoteGroupModule::new(&middleman);
    let tunnel = module.get_impl(&node("alpha"), "chat").unwrap();
    let attempt = middleman.take_pending().remove(0);

    module.stop();
    let _mailbox = attempt.succeed();

    assert!(tunnel.is_stopped());
    assert!(tunnel.intermediary().is_none());
    assert_eq!(module.tunnel_count(), 0);
}

#[test]
fn completion_after_module_dropped_stops_tunnel() {
    let middleman = Arc::new(TestMiddleman::new());
    let module = RemoteGroupModule::new(&middleman);
    let tunnel = module.get_impl(&node("alpha"), "chat").unwrap();
    let attempt = middleman.take_pending().remove(0);

    drop(module);
    let _mailbox = attempt.succeed();
    assert!(tunnel.is_stopped());
}

#[test]
fn failed_connection_drops_tunnel_and_allows_retry() {
    let middleman = Arc::new(TestMiddleman::new());
    let module = RemoteGroupModule::new(&middleman);
    let first = module.get_impl(&node("alpha"), "chat").unwrap();
    first.publish(Bytes::from("queued"), None).unwrap();

    middleman.take_pending().remove(0).fail("connection refused");

    assert!(first.is_stopped());
    assert!(module.lookup(&node("alpha"), "chat").is_none());

    let second = module.get_impl(&node("alpha"), "chat").unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(middleman.attempts(), 2);
}

#[test]
fn stale_drop_does_not_remove_newer_tunnel() {
    let middleman = Arc::new(TestMiddleman::new());
    let module = RemoteGroupModule::new(&middleman);

    let old = module.get_impl(&node("alpha"), "chat").unwrap();
    let old_attempt = middleman.take_pending().remove(0);
    module.drop_tunnel(&old);

    let newer = module.get_impl(&node("alpha"), "chat").unwrap();
    old_attempt.fail("timed out");

    let current = module.lookup(&node("alpha"), "chat").unwrap();
    assert!(Arc::ptr_eq(&current, &newer));
    assert!(!newer.is_stopped());
}

#[test]
fn immediate_middleman_connects_inside_get() {
    let middleman = Arc::new(TestMiddleman::immediate());
    let module = RemoteGroupModule::new(&middleman);

    let group = module.get("chat@tcp://alpha:7000").unwrap();
    assert!(group.tunnel().is_connected());
    assert_eq!(middleman.pending_count(), 0);

    group.publish("now", None).unwrap();
    let (origin, name, mut mailbox) = middleman.take_mailboxes().remove(0);
    assert_eq!(origin, node("alpha"));
    assert_eq!(name, "chat");
    assert_eq!(drain_payloads(&mut mailbox), vec![Bytes::from("now")]);
}

#[test]
fn resolution_failure_is_reported_as_resolution_stage() {
    let middleman = Arc::new(TestMiddleman::new());
    let module = RemoteGroupModule::new(&middleman);

    let err = module.get("no-node-here").unwrap_err();
    assert_eq!(err.stage(), FailureStage::Resolution);
    assert_eq!(middleman.attempts(), 0);
    assert_eq!(module.tunnel_count(), 0);
}

#[test]
fn middleman_dropped_before_stop_is_reported() {
    let middleman = Arc::new(TestMiddleman::new());
    let module = RemoteGroupModule::new(&middleman);
    let existing = module.get_impl(&node("alpha"), "chat").unwrap();

    drop(middleman);

    assert!(matches!(
        module.get("news@tcp://alpha:7000"),
        Err(GroupError::MiddlemanUnavailable)
    ));
    assert!(matches!(
        module.get_impl(&node("alpha"), "news"),
        Err(GroupError::MiddlemanUnavailable)
    ));
    let again = module.get_impl(&node("alpha"), "chat").unwrap();
    assert!(Arc::ptr_eq(&existing, &again));

    module.stop();
    assert!(existing.is_stopped());
}

#[test]
fn stop_before_dropping_middleman() {
    let middleman = Arc::new(TestMiddleman::new());
    let module = RemoteGroupModule::new(&middleman);
    module.get_impl(&node("alpha"), "chat").unwrap();

    module.stop();
    drop(middleman);

    assert!(matches!(
        module.get("chat@tcp://alpha:7000"),
        Err(GroupError::ModuleStopped { .. })
    ));
}

#[test]
fn middleman_trait_object_is_accepted() {
    let middleman: Arc<dyn Middleman> = Arc::new(TestMiddleman::new());
    let module = RemoteGroupModule::from_weak(Arc::downgrade(&middleman), &GroupSettings::default());
    assert_eq!(module.name(), "remote");
    assert!(module.get("chat@tcp://alpha:7000").is_ok());
}

#[tokio::test]
async fn subscribers_receive_delivered_messages() {
    let middleman = Arc::new(TestMiddleman::immediate());
    let module = RemoteGroupModule::new(&middleman);
    let group = module.get("chat@tcp://alpha:7000").unwrap();
    let (_, _, mut upstream) = middleman.take_mailboxes().remove(0);

    let (subscriber, mut inbox) = ActorRef::with_mailbox(NodeId::random());
    assert!(group.subscribe(subscriber.clone()).unwrap());
    assert_eq!(
        upstream.recv().await,
        Some(GroupMessage::Join { group: "chat".into() })
    );

    let inbound = GroupMessage::publish("chat", None, Bytes::from("from-remote"));
    let tunnel = Arc::clone(group.tunnel());
    let delivered = tokio::spawn(async move { tunnel.deliver(&inbound) })
        .await
        .unwrap();
    assert_eq!(delivered, 1);
    assert_eq!(
        inbox.recv().await.and_then(|m| m.payload().cloned()),
        Some(Bytes::from("from-remote"))
    );

    assert!(group.unsubscribe(subscriber.id()));
    assert_eq!(
        upstream.recv().await,
        Some(GroupMessage::Leave { group: "chat".into() })
    );
}

proptest! {
    #[test]
    fn flush_preserves_arrival_order(payloads in proptest::collection::vec(any::<u32>(), 0..64)) {
        let middleman = Arc::new(TestMiddleman::new());
        let module = RemoteGroupModule::new(&middleman);
        let tunnel = module.get_impl(&node("alpha"), "chat").unwrap();

        for value in &payloads {
            tunnel.publish(Bytes::copy_from_slice(&value.to_be_bytes()), None).unwrap();
        }
        let mut mailbox = middleman.take_pending().remove(0).succeed();

        let expected: Vec<Bytes> = payloads
            .iter()
            .map(|v| Bytes::copy_from_slice(&v.to_be_bytes()))
            .collect();
        prop_assert_eq!(drain_payloads(&mut mailbox), expected);
    }
}
