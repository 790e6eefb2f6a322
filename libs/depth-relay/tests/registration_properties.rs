//! Gate and fan-out properties, driven through in-memory readers/writers

mod common;

use common::{symbols_seen, update};
use depth_relay::{
    memory_feed, DepthGate, FanoutConfig, Frame, MemoryWriter, Orchestrator, RelayError,
    StopReason, SubscriberRegistry,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(3);

fn pipeline() -> (Arc<DepthGate>, SubscriberRegistry) {
    pipeline_with(FanoutConfig::default())
}

fn pipeline_with(config: FanoutConfig) -> (Arc<DepthGate>, SubscriberRegistry) {
    let gate = Arc::new(DepthGate::new());
    let registry = SubscriberRegistry::new(Arc::clone(&gate), config);
    (gate, registry)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_snapshot_contains_every_symbol_at_latest_value() {
    let (gate, registry) = pipeline();
    for i in 0..20 {
        gate.apply(&update(&format!("SYM{:02}", i), i as f64, i as f64 + 0.5));
    }
    gate.apply(&update("SYM07", 70.0, 70.5));

    let (writer, probe) = MemoryWriter::new();
    registry.register(writer).unwrap();

    let frames = probe.wait_for_frames(1, WAIT).await;
    let Frame::Snapshot(entries) = &frames[0] else {
        panic!("first frame must be the snapshot");
    };
    assert_eq!(entries.len(), 20);
    assert_eq!(entries.iter().find(|e| e.symbol == "SYM07"), Some(&update("SYM07", 70.0, 70.5)));
    assert_eq!(entries.iter().find(|e| e.symbol == "SYM19"), Some(&update("SYM19", 19.0, 19.5)));
}

#[tokio::test]
async fn test_last_write_wins_through_ingest() {
    let (gate, registry) = pipeline();
    let (feed, reader) = memory_feed();
    let orchestrator = Orchestrator::spawn(reader, Arc::clone(&gate), registry);

    feed.push(update("BTCUSDT", 100.0, 101.0));
    feed.push(update("BTCUSDT", 90.0, 91.0));
    feed.push(update("ETHUSDT", 1.0, 2.0));
    wait_until(|| gate.sequence() == 3).await;

    let snapshot = gate.snapshot();
    assert_eq!(snapshot.get("BTCUSDT"), Some(&update("BTCUSDT", 90.0, 91.0)));
    assert_eq!(snapshot.len(), 2);

    orchestrator.shutdown(Duration::from_secs(2)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_update_delivered_exactly_once_during_registration() {
    const UPDATES: usize = 2000;
    const SUBSCRIBERS: usize = 16;

    // Large enough that no writer can fall behind far enough to be dropped
    let (gate, registry) = pipeline_with(FanoutConfig {
        queue_capacity: UPDATES * 2,
        write_timeout: Duration::from_secs(2),
    });
    let (feed, reader) = memory_feed();
    let orchestrator = Orchestrator::spawn(reader, Arc::clone(&gate), registry.clone());

    let producer = tokio::spawn(async move {
        for i in 0..UPDATES {
            feed.push(update(&format!("S{}", i), i as f64, i as f64));
            if i % 50 == 0 {
                tokio::task::yield_now().await;
            }
        }
        feed
    });

    let mut probes = Vec::new();
    for _ in 0..SUBSCRIBERS {
        let (writer, probe) = MemoryWriter::new();
        registry.register(writer).unwrap();
        probes.push(probe);
        tokio::task::yield_now().await;
    }

    let _feed = producer.await.unwrap();
    wait_until(|| gate.len() == UPDATES).await;

    for (n, probe) in probes.iter().enumerate() {
        wait_until(|| symbols_seen(&probe.frames()).len() >= UPDATES).await;
        // Let any duplicate show up before checking
        tokio::time::sleep(Duration::from_millis(20)).await;

        let frames = probe.frames();
        assert!(frames[0].is_snapshot(), "subscriber {} did not start with a snapshot", n);
        assert_eq!(frames.iter().filter(|f| f.is_snapshot()).count(), 1);

        let seen = symbols_seen(&frames);
        let unique: HashSet<_> = seen.iter().collect();
        assert_eq!(seen.len(), UPDATES, "subscriber {} saw duplicates", n);
        assert_eq!(unique.len(), UPDATES, "subscriber {} missed updates", n);
    }

    orchestrator.shutdown(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn test_updates_arrive_in_apply_order() {
    let (gate, registry) = pipeline();
    let (writer, probe) = MemoryWriter::new();
    registry.register(writer).unwrap();

    for i in 0..100 {
        let u = update("BTCUSDT", i as f64, i as f64 + 1.0);
        let sequence = gate.apply(&u).unwrap();
        registry.broadcast(sequence, &u);
    }

    let frames = probe.wait_for_frames(101, WAIT).await;
    let bids: Vec<f64> = frames
        .iter()
        .filter_map(|f| match f {
            Frame::Update(u) => Some(u.bid),
            Frame::Snapshot(_) => None,
        })
        .collect();
    let expected: Vec<f64> = (0..100).map(|i| i as f64).collect();
    assert_eq!(bids, expected);
}

#[tokio::test]
async fn test_failing_subscriber_does_not_affect_others() {
    let (gate, registry) = pipeline();
    let (w1, p1) = MemoryWriter::new();
    let (w2, p2) = MemoryWriter::new();
    let (w3, p3) = MemoryWriter::new();
    let id1 = registry.register(w1).unwrap();
    let id2 = registry.register(w2).unwrap();
    let id3 = registry.register(w3).unwrap();

    p1.wait_for_frames(1, WAIT).await;
    p2.wait_for_frames(1, WAIT).await;
    p3.wait_for_frames(1, WAIT).await;
    p2.fail_writes();

    for i in 0..5 {
        let u = update(&format!("S{}", i), 1.0, 2.0);
        let sequence = gate.apply(&u).unwrap();
        registry.broadcast(sequence, &u);
    }

    assert_eq!(p1.wait_for_frames(6, WAIT).await.len(), 6);
    assert_eq!(p3.wait_for_frames(6, WAIT).await.len(), 6);

    wait_until(|| !registry.ids().contains(&id2)).await;
    assert_eq!(registry.ids(), vec![id1, id3]);
    assert!(p2.wait_closed(WAIT).await);
    assert_eq!(p2.frames().len(), 1);
}

#[tokio::test]
async fn test_malformed_price_relayed_as_zero() {
    let (gate, registry) = pipeline();
    let (writer, probe) = MemoryWriter::new();
    registry.register(writer).unwrap();

    let (feed, reader) = memory_feed();
    let orchestrator = Orchestrator::spawn(reader, Arc::clone(&gate), registry);
    feed.push_raw(r#"{"stream":"btcusdt@depth","data":{"s":"BTCUSDT","b":[["abc","1"]],"a":[["50010.0","0.8"]]}}"#);

    let frames = probe.wait_for_frames(2, WAIT).await;
    assert_eq!(frames[1], Frame::Update(update("BTCUSDT", 0.0, 50010.0)));
    assert_eq!(gate.snapshot().get("BTCUSDT").map(|e| e.bid), Some(0.0));

    orchestrator.shutdown(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn test_shutdown_is_deterministic() {
    let (gate, registry) = pipeline();
    let (feed, reader) = memory_feed();
    let orchestrator = Orchestrator::spawn(reader, Arc::clone(&gate), registry.clone());

    let mut probes = Vec::new();
    for _ in 0..3 {
        let (writer, probe) = MemoryWriter::new();
        registry.register(writer).unwrap();
        probes.push(probe);
    }
    feed.push(update("BTCUSDT", 1.0, 2.0));
    wait_until(|| probes.iter().all(|p| p.frames().len() == 2)).await;

    let report = orchestrator.shutdown(Duration::from_secs(2)).await;
    assert!(report.loop_stopped_cleanly);
    assert_eq!(report.stop_reason, StopReason::Shutdown);
    assert_eq!(report.subscribers_closed, 3);
    assert_eq!(report.symbols_tracked, 1);

    // Everything is closed and nothing moves afterwards
    assert!(probes.iter().all(|p| p.is_closed()));
    assert!(registry.is_empty());
    assert!(!feed.is_connected());

    feed.push(update("ETHUSDT", 1.0, 2.0));
    let sequence = gate.sequence();
    assert_eq!(registry.broadcast(sequence + 1, &update("ETHUSDT", 1.0, 2.0)), 0);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(gate.len(), 1);
    assert!(probes.iter().all(|p| p.frames().len() == 2));

    let (late, late_probe) = MemoryWriter::new();
    assert!(matches!(registry.register(late), Err(RelayError::ShuttingDown)));
    assert!(late_probe.wait_closed(WAIT).await);
    assert!(late_probe.frames().is_empty());
}

#[tokio::test]
async fn test_shutdown_cancels_pending_read() {
    struct StuckReader;

    #[async_trait::async_trait]
    impl depth_relay::DepthReader for StuckReader {
        async fn read_next(&mut self) -> depth_relay::domain::Result<Option<depth_relay::DepthUpdate>> {
            std::future::pending().await
        }

        async fn disconnect(&mut self) -> depth_relay::domain::Result<()> {
            Ok(())
        }
    }

    let (gate, registry) = pipeline();
    let orchestrator = Orchestrator::spawn(StuckReader, gate, registry);
    let report = orchestrator.shutdown(Duration::from_millis(200)).await;

    assert!(report.loop_stopped_cleanly);
    assert_eq!(report.stop_reason, StopReason::Shutdown);
}

#[tokio::test]
async fn test_scenario_two_symbols_snapshot() {
    let (gate, registry) = pipeline();
    let (feed, reader) = memory_feed();
    let orchestrator = Orchestrator::spawn(reader, Arc::clone(&gate), registry.clone());

    feed.push_raw(r#"{"stream":"btcusdt@depth","data":{"s":"BTCUSDT","b":[["50000.5","1.2"]],"a":[["50010.0","0.8"]]}}"#);
    feed.push_raw(r#"{"stream":"ethusdt@depth","data":{"s":"ETHUSDT","b":[],"a":[["3000.0","5"]]}}"#);
    wait_until(|| gate.len() == 2).await;

    let snapshot = gate.snapshot();
    assert_eq!(snapshot.entries, vec![update("BTCUSDT", 50000.5, 50010.0), update("ETHUSDT", 0.0, 3000.0)]);

    let (writer, probe) = MemoryWriter::new();
    registry.register(writer).unwrap();
    let frames = probe.wait_for_frames(1, WAIT).await;
    assert_eq!(frames[0], Frame::Snapshot(snapshot.entries));

    orchestrator.shutdown(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn test_scenario_late_subscriber() {
    let (gate, registry) = pipeline();
    let (feed, reader) = memory_feed();
    let orchestrator = Orchestrator::spawn(reader, Arc::clone(&gate), registry.clone());

    let (w1, s1) = MemoryWriter::new();
    registry.register(w1).unwrap();

    let btc = update("BTCUSDT", 50000.5, 50010.0);
    feed.push(btc.clone());
    s1.wait_for_frames(2, WAIT).await;

    let (w2, s2) = MemoryWriter::new();
    registry.register(w2).unwrap();

    let eth = update("ETHUSDT", 0.0, 3000.0);
    feed.push(eth.clone());

    let s1_frames = s1.wait_for_frames(3, WAIT).await;
    let s2_frames = s2.wait_for_frames(2, WAIT).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(
        s1_frames,
        vec![Frame::Snapshot(Vec::new()), Frame::Update(btc.clone()), Frame::Update(eth.clone())]
    );
    assert_eq!(s2_frames, vec![Frame::Snapshot(vec![btc]), Frame::Update(eth)]);
    assert_eq!(s1.frames().len(), 3);
    assert_eq!(s2.frames().len(), 2);

    orchestrator.shutdown(Duration::from_secs(2)).await;
}
