//! Submission pipeline integration tests.
//!
//! Drive the gateway and the tick worker against the simulated transport:
//! torso split, duration floor, rate limiting, connectivity guard, point
//! ownership and disconnect cleanup.

mod common;

use common::{Harness, ms};
use haptic_common::config::HapticConfig;
use haptic_common::host::PointOwner;
use haptic_common::position::{LogicalPosition, PhysicalPosition, Side};
use haptic_common::transport::ConnectivityEvent;
use haptic_core::gateway::SubmitOutcome;
use haptic_core::remote::RemoteSample;
use std::time::Instant;

const HEAD: PhysicalPosition = PhysicalPosition::Head;

// ─── Gateway ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_torso_split_routes_to_vest_halves() {
    let h = Harness::new(&[PhysicalPosition::VestFront, PhysicalPosition::VestBack], &[]);

    let outcome = h.gateway.submit_at(
        "haptic_torso",
        LogicalPosition::Torso,
        &[(5, 60), (25, 80)],
        100,
        Instant::now(),
    );
    assert_eq!(outcome, SubmitOutcome::Split { dispatched: 2 });

    let front = h.transport.plays_for(PhysicalPosition::VestFront);
    assert_eq!(front.len(), 1);
    assert_eq!(front[0].key, "haptic_torso#front");
    assert_eq!(front[0].motors.len(), 20);
    assert_eq!(front[0].motors[5], 60);
    assert_eq!(front[0].motors.iter().filter(|&&m| m != 0).count(), 1);

    let back = h.transport.plays_for(PhysicalPosition::VestBack);
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].key, "haptic_torso#back");
    assert_eq!(back[0].motors[5], 80);
    assert_eq!(back[0].motors.iter().filter(|&&m| m != 0).count(), 1);

    assert!(h.transport.plays_for(PhysicalPosition::Vest).is_empty());
}

#[tokio::test]
async fn test_unified_vest_is_not_split() {
    let h = Harness::new(
        &[
            PhysicalPosition::Vest,
            PhysicalPosition::VestFront,
            PhysicalPosition::VestBack,
        ],
        &[],
    );

    let outcome = h.gateway.submit_at(
        "haptic_torso",
        LogicalPosition::Torso,
        &[(5, 60), (25, 80)],
        100,
        Instant::now(),
    );
    assert_eq!(outcome, SubmitOutcome::Dispatched);

    let vest = h.transport.plays_for(PhysicalPosition::Vest);
    assert_eq!(vest.len(), 1);
    assert_eq!(vest[0].motors.len(), 40);
    assert_eq!(vest[0].motors[25], 80);
    assert!(h.transport.plays_for(PhysicalPosition::VestFront).is_empty());
}

#[tokio::test]
async fn test_duration_floor() {
    let h = Harness::new(&[HEAD], &[]);

    let outcome = h
        .gateway
        .submit_at("k", LogicalPosition::Head, &[(0, 10)], 10, Instant::now());
    assert_eq!(outcome, SubmitOutcome::Dispatched);

    let plays = h.transport.plays();
    assert_eq!(plays.len(), 1);
    assert!(plays[0].duration_ms >= 40);

    // Longer requests are kept as they are.
    h.gateway
        .submit_at("k2", LogicalPosition::Head, &[(0, 10)], 250, Instant::now());
    assert_eq!(h.transport.plays()[1].duration_ms, 250);
}

#[tokio::test]
async fn test_rate_limiter_drops_close_submissions() {
    let h = Harness::new(&[HEAD], &[]);
    let t0 = Instant::now();

    assert_eq!(
        h.gateway.submit_at("k", LogicalPosition::Head, &[(1, 50)], 100, t0),
        SubmitOutcome::Dispatched
    );
    assert_eq!(
        h.gateway.submit_at("k", LogicalPosition::Head, &[(1, 60)], 100, t0 + ms(5)),
        SubmitOutcome::RateLimited
    );
    assert_eq!(h.transport.plays().len(), 1);
    assert_eq!(h.gateway.snapshot().rate_limited, 1);
}

#[tokio::test]
async fn test_rate_limiter_passes_spaced_submissions() {
    let h = Harness::new(&[HEAD], &[]);
    let t0 = Instant::now();

    h.gateway.submit_at("k", LogicalPosition::Head, &[(1, 50)], 100, t0);
    h.gateway.submit_at("k", LogicalPosition::Head, &[(1, 60)], 100, t0 + ms(10));
    assert_eq!(h.transport.plays().len(), 2);
}

#[tokio::test]
async fn test_disconnected_device_is_skipped() {
    let h = Harness::new(&[], &[]);

    let outcome = h
        .gateway
        .submit_at("k", LogicalPosition::Head, &[(1, 50)], 100, Instant::now());
    assert_eq!(outcome, SubmitOutcome::NotConnected);
    assert!(h.transport.plays().is_empty());
    assert_eq!(h.gateway.snapshot().not_connected, 1);
}

#[tokio::test]
async fn test_transport_failure_is_dropped() {
    let h = Harness::new(&[HEAD], &[]);
    let t0 = Instant::now();

    h.transport.set_failing(true);
    assert_eq!(
        h.gateway.submit_at("k", LogicalPosition::Head, &[(1, 50)], 100, t0),
        SubmitOutcome::TransportFailed
    );
    assert_eq!(h.gateway.snapshot().transport_failures, 1);

    h.transport.set_failing(false);
    assert_eq!(
        h.gateway.submit_at("k", LogicalPosition::Head, &[(1, 50)], 100, t0 + ms(10)),
        SubmitOutcome::Dispatched
    );
}

// ─── Tick worker ────────────────────────────────────────────────────

#[tokio::test]
async fn test_worker_submits_one_frame_per_group() {
    let h = Harness::new(
        &[HEAD, PhysicalPosition::Foot(Side::Left)],
        &[LogicalPosition::Head, LogicalPosition::Foot(Side::Left)],
    );
    let mut worker = h.worker(&HapticConfig::default());
    let t0 = Instant::now();

    h.source.update(3, |p| p.force = 0.5);
    let report = worker.tick(t0, 0.01);
    assert_eq!(report.groups, 2);
    // The silent foot group is not submitted.
    assert_eq!(report.submitted, 1);

    let plays = h.transport.plays_for(HEAD);
    assert_eq!(plays.len(), 1);
    assert_eq!(plays[0].key, "haptic_head");
    assert_eq!(plays[0].motors.len(), 20);
    assert_eq!(plays[0].motors[3], 50);
    assert_eq!(plays[0].duration_ms, 100);
}

#[tokio::test]
async fn test_worker_sends_one_silent_frame_when_group_goes_quiet() {
    let h = Harness::new(&[HEAD], &[LogicalPosition::Head]);
    let mut worker = h.worker(&HapticConfig::default());
    let t0 = Instant::now();

    h.source.update(0, |p| p.force = 1.0);
    worker.tick(t0, 0.01);
    h.source.silence();
    worker.tick(t0 + ms(20), 0.01);
    worker.tick(t0 + ms(40), 0.01);

    let plays = h.transport.plays_for(HEAD);
    assert_eq!(plays.len(), 2);
    assert_eq!(plays[0].motors[0], 100);
    assert!(plays[1].motors.iter().all(|&m| m == 0));
}

#[tokio::test]
async fn test_self_feedback_off_silences_local_points() {
    let h = Harness::new(&[HEAD], &[LogicalPosition::Head]);
    let mut config = HapticConfig::default();
    config.features.enable_self_feedback = false;
    let mut worker = h.worker(&config);

    h.source.update(0, |p| p.force = 1.0);
    let report = worker.tick(Instant::now(), 0.01);
    assert_eq!(report.submitted, 0);
    assert!(h.transport.plays().is_empty());
}

#[tokio::test]
async fn test_remote_owned_points_use_fresh_samples() {
    let h = Harness::new(&[HEAD], &[LogicalPosition::Head]);
    let mut worker = h.worker(&HapticConfig::default());
    let t0 = Instant::now();

    h.source.set_owner(LogicalPosition::Head, PointOwner::Remote);
    // Host values of remote points are ignored.
    h.source.update(0, |p| p.force = 1.0);
    h.remote.update(2, RemoteSample::at(0.7, 0.0, 0.0, 0.0, t0));

    worker.tick(t0 + ms(100), 0.01);
    let plays = h.transport.plays_for(HEAD);
    assert_eq!(plays.len(), 1);
    assert_eq!(plays[0].motors[0], 0);
    assert_eq!(plays[0].motors[2], 70);

    // Past the staleness window the sample reads as absent.
    worker.tick(t0 + ms(700), 0.01);
    let plays = h.transport.plays_for(HEAD);
    assert_eq!(plays.len(), 2);
    assert!(plays[1].motors.iter().all(|&m| m == 0));
}

#[tokio::test]
async fn test_worker_splits_torso_group() {
    let h = Harness::new(
        &[PhysicalPosition::VestFront, PhysicalPosition::VestBack],
        &[LogicalPosition::Torso],
    );
    let mut worker = h.worker(&HapticConfig::default());

    h.source.update(5, |p| p.force = 0.6);
    h.source.update(25, |p| p.force = 0.8);
    worker.tick(Instant::now(), 0.01);

    let front = h.transport.plays_for(PhysicalPosition::VestFront);
    let back = h.transport.plays_for(PhysicalPosition::VestBack);
    assert_eq!(front.len(), 1);
    assert_eq!(back.len(), 1);
    assert_eq!(front[0].motors[5], 60);
    assert_eq!(back[0].motors[5], 80);
}

#[tokio::test]
async fn test_split_torso_and_front_group_share_the_front_device() {
    let h = Harness::new(
        &[PhysicalPosition::VestFront, PhysicalPosition::VestBack],
        &[LogicalPosition::Torso, LogicalPosition::TorsoFront],
    );
    let mut worker = h.worker(&HapticConfig::default());
    let torso = h.source.ids_of(LogicalPosition::Torso);
    let front = h.source.ids_of(LogicalPosition::TorsoFront);
    h.source.update(torso[1], |p| p.force = 0.3);
    h.source.update(front[7], |p| p.force = 0.9);

    let t0 = Instant::now();
    for i in 0..10 {
        worker.tick(t0 + ms(10 * i), 0.01);
    }

    let plays = h.transport.plays_for(PhysicalPosition::VestFront);
    let split: Vec<_> = plays.iter().filter(|p| p.key == "haptic_torso#front").collect();
    let explicit: Vec<_> = plays.iter().filter(|p| p.key == "haptic_torso_front").collect();
    assert_eq!(split.len(), 10);
    assert_eq!(explicit.len(), 10);
    assert!(split.iter().all(|p| p.motors[1] == 30));
    assert!(explicit.iter().all(|p| p.motors[7] == 90));
    assert_eq!(h.gateway.snapshot().rate_limited, 0);
}

// ─── Housekeeping ───────────────────────────────────────────────────

#[tokio::test]
async fn test_every_thousandth_submission_sweeps_stale_records() {
    let h = Harness::new(&[HEAD], &[]);
    let hand = PhysicalPosition::Hand(Side::Left);
    let t0 = Instant::now();
    let later = t0 + ms(6000);

    h.gateway
        .submit_at("stale", LogicalPosition::Hand(Side::Left), &[(0, 10)], 100, t0);
    for i in 2..1000 {
        h.gateway
            .submit_at(&format!("k{i}"), LogicalPosition::Head, &[(0, 10)], 100, later);
    }
    assert_eq!(h.gateway.snapshot().submitted, 999);
    assert_eq!(h.ledger.records_for(hand), 1);

    h.gateway
        .submit_at("k1000", LogicalPosition::Head, &[(0, 10)], 100, later);
    assert_eq!(h.ledger.records_for(hand), 0);
    assert_eq!(h.ledger.records_for(HEAD), 999);
}

// ─── Disconnect cleanup ─────────────────────────────────────────────

#[tokio::test]
async fn test_disconnect_purges_records_and_samples() {
    let h = Harness::new(
        &[HEAD, PhysicalPosition::Hand(Side::Left)],
        &[LogicalPosition::Head, LogicalPosition::Hand(Side::Left)],
    );
    let t0 = Instant::now();
    let head_ids = h.source.ids_of(LogicalPosition::Head);
    let hand_ids = h.source.ids_of(LogicalPosition::Hand(Side::Left));

    h.gateway
        .submit_at("haptic_head", LogicalPosition::Head, &[(0, 40)], 100, t0);
    h.gateway.submit_at(
        "haptic_left_hand",
        LogicalPosition::Hand(Side::Left),
        &[(0, 40)],
        100,
        t0,
    );
    h.remote.update(head_ids[1], RemoteSample::new(0.5, 0.0, 0.0, 0.0));
    h.remote.update(hand_ids[0], RemoteSample::new(0.5, 0.0, 0.0, 0.0));
    assert_eq!(h.ledger.records_for(HEAD), 1);

    h.transport.disconnect(HEAD);
    h.registry.dispatch(ConnectivityEvent {
        position: HEAD,
        connected: false,
    });

    assert_eq!(h.ledger.records_for(HEAD), 0);
    assert_eq!(h.ledger.records_for(PhysicalPosition::Hand(Side::Left)), 1);
    assert!(h.remote.fresh(head_ids[1], Instant::now()).is_none());
    assert!(h.remote.fresh(hand_ids[0], Instant::now()).is_some());
    assert!(h.transport.stops().contains(&"haptic_head".to_string()));

    let plays_before = h.transport.plays_for(HEAD).len();
    let outcome = h
        .gateway
        .submit_at("haptic_head", LogicalPosition::Head, &[(0, 40)], 100, t0 + ms(20));
    assert_eq!(outcome, SubmitOutcome::NotConnected);
    assert_eq!(h.transport.plays_for(HEAD).len(), plays_before);
}
