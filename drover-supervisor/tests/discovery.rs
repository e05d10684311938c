//! Discovery lifecycle: exclusive lease discipline and preservation of
//! the user's discovery preference across run-level drops.

mod common;

use common::{wait_until, EngineCall, Harness};

use drover_core::types::RunLevel;

#[tokio::test]
async fn double_start_acquires_the_lease_exactly_once() {
    let h = Harness::spawn();
    h.supervisor.start_discovery().await.expect("start");
    h.supervisor.start_discovery().await.expect("start again");

    assert_eq!(h.lock.acquires(), 1);
    assert_eq!(h.engine.count(|c| *c == EngineCall::StartDiscovery), 1);
}

#[tokio::test]
async fn stop_when_inactive_never_releases() {
    let h = Harness::spawn();
    h.supervisor.stop_discovery().await.expect("stop");
    assert_eq!(h.lock.releases(), 0);
    assert_eq!(h.engine.count(|c| *c == EngineCall::StopDiscovery), 0);

    h.supervisor.start_discovery().await.expect("start");
    h.supervisor.stop_discovery().await.expect("stop");
    h.supervisor.stop_discovery().await.expect("stop again");
    assert_eq!(h.lock.releases(), 1, "never double-released");
}

#[tokio::test]
async fn discovery_preference_survives_a_restart_cycle() {
    let h = Harness::spawn();
    h.bring_online().await;
    h.supervisor.start_discovery().await.expect("start discovery");
    h.engine.clear_calls();

    // A restart down to Core passes back up through Network; the engine
    // reports the level and discovery must resume without re-acquiring
    // the held lease.
    h.engine.signals.level_reached(RunLevel::Network);
    wait_until("discovery resumed", || {
        h.engine.count(|c| *c == EngineCall::StartDiscovery) == 1
    })
    .await;
    assert_eq!(h.lock.acquires(), 1, "lease already held; no second acquisition");
}

#[tokio::test]
async fn network_level_keeps_discovery_stopped_when_not_desired() {
    let h = Harness::spawn();
    h.bring_online().await;
    h.engine.clear_calls();

    h.engine.signals.level_reached(RunLevel::Network);
    wait_until("stop instruction issued", || {
        h.engine.count(|c| *c == EngineCall::StopDiscovery) == 1
    })
    .await;
    assert_eq!(h.lock.acquires(), 0);
    assert_eq!(h.lock.releases(), 0, "nothing held, nothing released");
    assert_eq!(h.engine.count(|c| *c == EngineCall::StartDiscovery), 0);
}

#[tokio::test]
async fn explicit_stop_then_network_level_stays_stopped() {
    let h = Harness::spawn();
    h.bring_online().await;
    h.supervisor.start_discovery().await.expect("start");
    h.supervisor.stop_discovery().await.expect("stop");
    h.engine.clear_calls();

    h.engine.signals.level_reached(RunLevel::Network);
    wait_until("stop re-asserted", || {
        h.engine.count(|c| *c == EngineCall::StopDiscovery) == 1
    })
    .await;
    assert_eq!(h.engine.count(|c| *c == EngineCall::StartDiscovery), 0);
    assert_eq!(h.lock.acquires(), 1);
    assert_eq!(h.lock.releases(), 1);
}
