mod common;

use std::{sync::Arc, time::Duration};

use common::*;
use nag_core::{
    EmitOutcome, NagEvent, Notifier, NotifierConfig, NotifyError, NotifyRequest, RemoveReason,
    TaskQueue,
};
use nag_model::{NagKind, Period, QueueStatus, Until};

fn notifier(log: &Log) -> Notifier {
    let factory = Arc::new(RecorderFactory {
        log: log.clone(),
        work: SECOND,
    });
    Notifier::with_config(
        TaskQueue::new(),
        factory,
        NotifierConfig {
            sweep_interval: SECOND,
            clock: Arc::new(TokioClock::new()),
        },
    )
}

fn removals(events: &mut tokio::sync::broadcast::Receiver<NagEvent>) -> Vec<(String, RemoveReason)> {
    let mut out = Vec::new();
    while let Ok(ev) = events.try_recv() {
        if let NagEvent::Removed { uniqid, reason } = ev {
            out.push((uniqid, reason));
        }
    }
    out
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn emit_once_respects_rate_limit_window() {
    let log = new_log();
    let n = notifier(&log);
    let req = NotifyRequest::new("door open").once_per(Period::minutes(10));

    let first = n.emit_once(req.clone()).await.unwrap();
    assert!(first.is_emitted());

    tokio::time::sleep(mins(5)).await;
    let second = n.emit_once(req.clone()).await.unwrap();
    assert!(matches!(second, EmitOutcome::RateLimited { .. }));
    assert_eq!(second.uniqid(), first.uniqid());

    tokio::time::sleep(mins(5)).await;
    assert!(n.emit_once(req).await.unwrap().is_emitted());

    tokio::time::sleep(mins(1)).await;
    assert_eq!(count(&log, "done:door open"), 2);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn identical_content_derives_identical_uniqid() {
    let log = new_log();
    let n = notifier(&log);
    let a = n
        .emit_once(NotifyRequest::new("hi").with_tags(["x"]))
        .await
        .unwrap();
    let b = n
        .emit_once(NotifyRequest::new("hi").with_tags(["x"]))
        .await
        .unwrap();
    let c = n
        .emit_once(NotifyRequest::new("hi").with_tags(["y"]))
        .await
        .unwrap();
    assert_eq!(a.uniqid(), b.uniqid());
    assert_ne!(a.uniqid(), c.uniqid());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn counted_nag_fires_exactly_n_times() {
    let log = new_log();
    let n = notifier(&log);
    let mut events = n.subscribe();

    let uniqid = n
        .notify_times(3, Period::minutes(1), NotifyRequest::new("take pills").with_uniqid("pills"))
        .await
        .unwrap();
    assert_eq!(uniqid, "pills");

    tokio::time::sleep(mins(10)).await;
    assert_eq!(count(&log, "done:take pills"), 3);
    assert!(!n.is_registered("pills"));
    assert_eq!(removals(&mut events), vec![("pills".to_string(), RemoveReason::Depleted)]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn dated_nag_fires_until_its_date_then_expires() {
    let log = new_log();
    let n = notifier(&log);
    let mut events = n.subscribe();

    n.notify_for(
        Period::minutes(3),
        Period::minutes(1),
        NotifyRequest::new("laundry").with_uniqid("laundry"),
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_secs(150)).await;
    assert!(n.is_registered("laundry"));

    tokio::time::sleep(mins(10)).await;
    assert!(!n.is_registered("laundry"));
    // immediate fire plus ticks at 1 and 2 minutes
    assert_eq!(count(&log, "done:laundry"), 3);
    assert_eq!(removals(&mut events), vec![("laundry".to_string(), RemoveReason::Expired)]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn past_until_date_fires_once_and_is_swept() {
    let log = new_log();
    let n = notifier(&log);
    let past = Until::from_epoch_millis(0).unwrap();

    n.notify_until(past, Period::minutes(1), NotifyRequest::new("late").with_uniqid("late"))
        .await
        .unwrap();
    assert!(n.is_registered("late"));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!n.is_registered("late"));

    tokio::time::sleep(mins(5)).await;
    assert_eq!(count(&log, "done:late"), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn reregistering_replaces_previous_nag() {
    let log = new_log();
    let n = notifier(&log);
    let mut events = n.subscribe();

    n.notify_times(5, Period::minutes(1), NotifyRequest::new("old").with_uniqid("x"))
        .await
        .unwrap();
    n.notify_times(2, Period::minutes(1), NotifyRequest::new("new").with_uniqid("x"))
        .await
        .unwrap();

    tokio::time::sleep(mins(10)).await;
    // old timer is gone; new one fires now and once more
    assert_eq!(count(&log, "done:old"), 1);
    assert_eq!(count(&log, "done:new"), 2);
    assert_eq!(n.nag_count(), 0);
    assert_eq!(
        removals(&mut events),
        vec![
            ("x".to_string(), RemoveReason::Replaced),
            ("x".to_string(), RemoveReason::Depleted)
        ]
    );
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn mute_skips_recurring_fires_but_not_one_shots() {
    let log = new_log();
    let n = notifier(&log);
    n.mute();

    n.notify_times(2, Period::minutes(1), NotifyRequest::new("nag").with_uniqid("nag"))
        .await
        .unwrap();
    n.emit_once(NotifyRequest::new("once")).await.unwrap();

    tokio::time::sleep(Duration::from_secs(150)).await;
    assert_eq!(count(&log, "done:nag"), 0);
    assert_eq!(count(&log, "done:once"), 1);
    assert_eq!(n.snapshot().nags[0].remain_count, Some(2));

    n.unmute();
    tokio::time::sleep(mins(5)).await;
    assert_eq!(count(&log, "done:nag"), 2);
    assert!(!n.is_registered("nag"));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn remove_cancels_nag_and_reports_unknown() {
    let log = new_log();
    let n = notifier(&log);
    let mut events = n.subscribe();
    n.notify_times(10, Period::minutes(1), NotifyRequest::new("stove").with_uniqid("stove"))
        .await
        .unwrap();

    assert!(n.remove("stove"));
    assert!(!n.remove("stove"));

    tokio::time::sleep(mins(10)).await;
    assert_eq!(count(&log, "done:stove"), 1);
    assert_eq!(removals(&mut events), vec![("stove".to_string(), RemoveReason::Acknowledged)]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn invalid_recurrence_is_rejected_before_anything_is_created() {
    let log = new_log();
    let n = notifier(&log);

    let zero_period = n
        .notify_times(3, Period::minutes(0), NotifyRequest::new("x"))
        .await;
    assert!(matches!(zero_period, Err(NotifyError::InvalidRecurrence(_))));

    let zero_times = n
        .notify_times(0, Period::minutes(1), NotifyRequest::new("x"))
        .await;
    assert!(matches!(zero_times, Err(NotifyError::InvalidRecurrence(_))));

    tokio::time::sleep(mins(1)).await;
    assert_eq!(n.nag_count(), 0);
    assert!(entries(&log).is_empty());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn out_of_range_spans_are_rejected_not_panicking() {
    let log = new_log();
    let n = notifier(&log);
    let huge = Period::minutes(1_000_000_000_000);

    let lasting = n
        .notify_for(huge, Period::minutes(1), NotifyRequest::new("x").with_uniqid("for"))
        .await;
    assert!(matches!(lasting, Err(NotifyError::InvalidRecurrence(_))));

    let every = n
        .notify_times(2, huge, NotifyRequest::new("x").with_uniqid("every"))
        .await;
    assert!(matches!(every, Err(NotifyError::InvalidRecurrence(_))));

    let limited = n
        .notify_times(2, Period::minutes(1), NotifyRequest::new("x").once_per(huge))
        .await;
    assert!(matches!(limited, Err(NotifyError::InvalidRecurrence(_))));

    let once = n.emit_once(NotifyRequest::new("x").once_per(huge)).await;
    assert!(matches!(once, Err(NotifyError::InvalidRecurrence(_))));

    tokio::time::sleep(mins(1)).await;
    assert_eq!(n.nag_count(), 0);
    assert!(entries(&log).is_empty());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn snapshot_reports_queue_nags_and_windows() {
    let log = new_log();
    let n = notifier(&log);
    n.suspend(false).await.unwrap();

    n.notify_times(
        4,
        Period::minutes(30),
        NotifyRequest::new("water plants")
            .with_uniqid("plants")
            .with_tags(["garden"])
            .once_per(Period::minutes(60)),
    )
    .await
    .unwrap();
    n.emit_once(NotifyRequest::new("hello").with_uniqid("hello")).await.unwrap();

    let snap = n.snapshot();
    assert_eq!(snap.queue_status, QueueStatus::Suspended);
    assert!(!snap.muted);
    assert!(snap.running.is_none());
    let pending: Vec<_> = snap.pending.iter().map(|i| i.uniqid.as_str()).collect();
    assert_eq!(pending, vec!["plants", "hello"]);

    assert_eq!(snap.nags.len(), 1);
    let nag = &snap.nags[0];
    assert_eq!(nag.nag_type, NagKind::RemainCount);
    assert_eq!(nag.remain_count, Some(3));
    assert_eq!(nag.frequency_mins, 30);
    assert_eq!(nag.once_per_n_mins, Some(60));
    assert_eq!(nag.tags, vec!["garden".to_string()]);
    assert!(nag.rate_limit.is_some());

    assert_eq!(snap.rate_limits.len(), 1);
    assert_eq!(snap.rate_limits[0].uniqid, "plants");
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn dequeue_drops_pending_deliveries_of_uniqid() {
    let log = new_log();
    let n = notifier(&log);
    n.suspend(false).await.unwrap();
    n.emit_once(NotifyRequest::new("a").with_uniqid("a")).await.unwrap();
    n.emit_once(NotifyRequest::new("b").with_uniqid("b")).await.unwrap();

    assert_eq!(n.dequeue("a"), 1);
    n.resume();
    tokio::time::sleep(mins(1)).await;
    assert_eq!(entries(&log), vec!["start:b", "done:b"]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn shutdown_stops_all_timers() {
    let log = new_log();
    let n = notifier(&log);
    n.notify_times(5, Period::minutes(1), NotifyRequest::new("t").with_uniqid("t"))
        .await
        .unwrap();

    n.shutdown();
    tokio::time::sleep(mins(10)).await;
    assert_eq!(count(&log, "done:t"), 1);
}
