// tests/scheduler_lifecycle.rs
//
// start/stop semantics against a recording alarm service.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{harness, raw_articles, ScriptedAi, Setup};
use silent_feed::article::PoolStatus;
use silent_feed::scheduler::SchedulerError;
use silent_feed::store::ArticleStore;

const ALARM: &str = "pool-analysis";

#[tokio::test]
async fn start_runs_a_cycle_and_arms_the_alarm() {
    let ai = ScriptedAi::topics(&[("AI", 0.8)]);
    let h = harness(
        Setup {
            articles: raw_articles(3),
            ..Default::default()
        },
        ai.clone(),
    );

    h.scheduler.start().await.expect("start");

    assert!(h.scheduler.is_running());
    assert_eq!(ai.calls(), 1);
    assert_eq!(h.alarms.subscribed.load(Ordering::SeqCst), 1);
    // 2 raw left after the first cycle.
    assert_eq!(
        h.alarms.created(),
        vec![(ALARM.to_string(), Duration::from_secs(10 * 60))]
    );
    let st = h.scheduler.status();
    assert!(st.next_run_at.is_some());
    assert_eq!(st.current_interval_secs, 600);
}

#[tokio::test]
async fn second_start_is_a_no_op() {
    let ai = ScriptedAi::topics(&[("AI", 0.8)]);
    let h = harness(
        Setup {
            articles: raw_articles(3),
            ..Default::default()
        },
        ai.clone(),
    );

    h.scheduler.start().await.unwrap();
    h.scheduler.start().await.unwrap();

    assert_eq!(h.alarms.subscribed.load(Ordering::SeqCst), 1);
    assert_eq!(h.alarms.created().len(), 1);
    assert_eq!(ai.calls(), 1);
}

#[tokio::test]
async fn start_fails_when_listener_cannot_register() {
    let ai = ScriptedAi::topics(&[("AI", 0.8)]);
    let h = harness(
        Setup {
            articles: raw_articles(1),
            ..Default::default()
        },
        ai.clone(),
    );
    h.alarms.fail_subscribe.store(true, Ordering::SeqCst);

    let err = h.scheduler.start().await.unwrap_err();
    assert!(matches!(err, SchedulerError::Alarm(_)));
    assert!(!h.scheduler.is_running());
    assert_eq!(ai.calls(), 0);
    assert!(h.alarms.created().is_empty());

    // Registration recovers: a later start succeeds.
    h.alarms.fail_subscribe.store(false, Ordering::SeqCst);
    h.scheduler.start().await.unwrap();
    assert!(h.scheduler.is_running());
}

#[tokio::test]
async fn start_fails_when_alarm_cannot_be_armed() {
    let ai = ScriptedAi::topics(&[("AI", 0.8)]);
    let h = harness(Setup::default(), ai);
    h.alarms.fail_create.store(true, Ordering::SeqCst);

    assert!(h.scheduler.start().await.is_err());
    assert!(!h.scheduler.is_running());
    assert!(h.scheduler.status().next_run_at.is_none());
}

#[tokio::test]
async fn stop_is_idempotent_and_swallows_clear_errors() {
    let ai = ScriptedAi::topics(&[("AI", 0.8)]);
    let h = harness(Setup::default(), ai);

    // Not running: nothing to clear.
    h.scheduler.stop().await;
    assert_eq!(h.alarms.cleared.load(Ordering::SeqCst), 0);

    h.scheduler.start().await.unwrap();
    h.alarms.fail_clear.store(true, Ordering::SeqCst);
    h.scheduler.stop().await;
    assert!(!h.scheduler.is_running());
    assert_eq!(h.alarms.cleared.load(Ordering::SeqCst), 1);
    assert!(h.scheduler.status().next_run_at.is_none());

    h.scheduler.stop().await;
    assert_eq!(h.alarms.cleared.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn alarm_fire_runs_a_cycle_and_rearms() {
    let ai = ScriptedAi::topics(&[("AI", 0.8)]);
    let h = harness(
        Setup {
            articles: raw_articles(2),
            ..Default::default()
        },
        ai.clone(),
    );
    h.scheduler.start().await.unwrap();
    assert_eq!(ai.calls(), 1);

    h.alarms.fire("some-other-alarm");
    h.alarms.fire(ALARM);

    let mut waited = 0;
    while h.alarms.created().len() < 2 && waited < 100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += 1;
    }
    assert_eq!(ai.calls(), 2);
    assert_eq!(h.alarms.created().len(), 2);
    // Backlog empty after both cycles.
    assert_eq!(h.alarms.created()[1].1, Duration::from_secs(20 * 60));
    let a1 = h.stores.articles.get("a1").await.unwrap().unwrap();
    assert_eq!(a1.pool_status, PoolStatus::Candidate);
}

#[tokio::test]
async fn alarm_after_stop_does_nothing() {
    let ai = ScriptedAi::topics(&[("AI", 0.8)]);
    let h = harness(
        Setup {
            articles: raw_articles(2),
            ..Default::default()
        },
        ai.clone(),
    );
    h.scheduler.start().await.unwrap();
    h.scheduler.stop().await;

    h.alarms.fire(ALARM);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(ai.calls(), 1);
    assert_eq!(h.alarms.created().len(), 1);
}

#[tokio::test]
async fn manual_trigger_while_running_rearms() {
    let ai = ScriptedAi::topics(&[("AI", 0.8)]);
    let h = harness(
        Setup {
            articles: raw_articles(2),
            ..Default::default()
        },
        ai,
    );
    h.scheduler.start().await.unwrap();
    h.scheduler.trigger_manual().await;
    assert_eq!(h.alarms.created().len(), 2);
}
