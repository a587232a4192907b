use std::time::Duration;

use autofill_inspector::error::InspectError;
use autofill_inspector::field::store::FieldDetailStore;
use autofill_inspector::inspect::orchestrator::{INSPECTION_FAILED, InspectState, Orchestrator};
use autofill_inspector::messaging::protocol::PanelRequest;
use autofill_inspector::trace::logger::TraceLogger;
use tokio::time::Instant;

use crate::common::{RecordingMessenger, TAB, sample_fields};

mod common;

fn setup() -> (Orchestrator, FieldDetailStore, RecordingMessenger) {
    (Orchestrator::new(TAB), FieldDetailStore::new(), RecordingMessenger::default())
}

/// Run the current cycle to completion with `sample_fields`.
fn complete(orch: &mut Orchestrator, store: &mut FieldDetailStore, messenger: &RecordingMessenger) {
    let cycle = orch.current_cycle().expect("a cycle should be outstanding");
    assert!(orch.on_tag_complete(cycle, store, messenger).unwrap());
    assert!(orch.on_inspect_complete(cycle, &sample_fields(), store));
    orch.finish_render(store, messenger).unwrap();
}

#[test]
fn manual_trigger_tags_before_inspecting() {
    let (mut orch, mut store, messenger) = setup();

    let cycle = orch.trigger_inspect(true, &mut store, &messenger).unwrap();
    assert_eq!(orch.state(), InspectState::Tagging);
    assert_eq!(
        messenger.sent(),
        vec![PanelRequest::TagElements { tab_id: TAB, cycle }]
    );

    assert!(orch.on_tag_complete(cycle, &store, &messenger).unwrap());
    assert_eq!(orch.state(), InspectState::WaitingResult);
    assert_eq!(messenger.count("inspect"), 1);

    assert!(orch.on_inspect_complete(cycle, &sample_fields(), &mut store));
    assert_eq!(orch.state(), InspectState::Rendered);
    assert!(orch.is_fresh());
    assert_eq!(store.fields().len(), 6);

    orch.finish_render(&mut store, &messenger).unwrap();
    assert_eq!(orch.state(), InspectState::Idle);
    assert!(!orch.is_pending());
}

#[test]
fn inspect_request_carries_current_overrides() {
    let (mut orch, mut store, messenger) = setup();
    orch.trigger_inspect(true, &mut store, &messenger).unwrap();
    complete(&mut orch, &mut store, &messenger);
    messenger.clear();

    store.record_override("a1", "name");
    let cycle = orch.trigger_inspect(false, &mut store, &messenger).unwrap();
    orch.on_tag_complete(cycle, &store, &messenger).unwrap();

    match &messenger.sent()[1] {
        PanelRequest::Inspect { changes, cycle: sent, .. } => {
            assert_eq!(*sent, cycle);
            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].inspect_id, "a1");
            assert_eq!(changes[0].field_name, "name");
        }
        other => panic!("expected inspect request, got {:?}", other),
    }
}

#[test]
fn manual_trigger_discards_overrides() {
    let (mut orch, mut store, messenger) = setup();
    orch.trigger_inspect(true, &mut store, &messenger).unwrap();
    complete(&mut orch, &mut store, &messenger);

    store.record_override("a1", "name");
    orch.trigger_inspect(true, &mut store, &messenger).unwrap();
    assert!(store.overrides().is_empty());
}

#[test]
fn concurrent_waits_share_one_request() {
    let (mut orch, mut store, messenger) = setup();

    let mut first = orch.await_result_or_trigger(&mut store, &messenger).unwrap();
    let mut second = orch.await_result_or_trigger(&mut store, &messenger).unwrap();
    assert_eq!(messenger.count("tag-elements"), 1);
    assert!(first.try_result().is_none());

    complete(&mut orch, &mut store, &messenger);
    assert_eq!(first.try_result(), Some(Ok(())));
    assert_eq!(second.try_result(), Some(Ok(())));
    assert_eq!(messenger.count("inspect"), 1);
}

#[test]
fn fresh_result_resolves_immediately() {
    let (mut orch, mut store, messenger) = setup();
    orch.trigger_inspect(true, &mut store, &messenger).unwrap();
    complete(&mut orch, &mut store, &messenger);
    messenger.clear();

    let wait = orch.await_result_or_trigger(&mut store, &messenger).unwrap();
    assert!(wait.is_ready());
    assert!(messenger.sent().is_empty());
}

#[test]
fn stale_answers_are_ignored() {
    let (mut orch, mut store, messenger) = setup();
    let old = orch.trigger_inspect(true, &mut store, &messenger).unwrap();
    let new = orch.trigger_inspect(true, &mut store, &messenger).unwrap();
    assert_ne!(old, new);

    assert!(!orch.on_tag_complete(old, &store, &messenger).unwrap());
    assert!(!orch.on_inspect_complete(old, &sample_fields(), &mut store));
    assert!(!orch.on_inspect_failed(old, "late"));
    assert!(store.fields().is_empty());
    assert_eq!(orch.current_cycle(), Some(new));
    assert_eq!(orch.status(), None);
}

#[test]
fn duplicate_tag_ack_sends_one_inspect() {
    let (mut orch, mut store, messenger) = setup();
    let cycle = orch.trigger_inspect(true, &mut store, &messenger).unwrap();
    assert!(orch.on_tag_complete(cycle, &store, &messenger).unwrap());
    assert!(!orch.on_tag_complete(cycle, &store, &messenger).unwrap());
    assert_eq!(messenger.count("inspect"), 1);
}

#[test]
fn manual_trigger_moves_waiters_to_new_cycle() {
    let (mut orch, mut store, messenger) = setup();
    let mut wait = orch.await_result_or_trigger(&mut store, &messenger).unwrap();
    let first = orch.current_cycle().unwrap();

    let second = orch.trigger_inspect(true, &mut store, &messenger).unwrap();
    assert!(second > first);
    assert!(wait.try_result().is_none(), "waiter must not be released by the supersede");

    complete(&mut orch, &mut store, &messenger);
    assert_eq!(wait.try_result(), Some(Ok(())));
}

#[test]
fn edit_triggers_during_a_cycle_fold_into_one_follow_up() {
    let (mut orch, mut store, messenger) = setup();
    let first = orch.trigger_inspect(true, &mut store, &messenger).unwrap();

    assert_eq!(orch.trigger_inspect(false, &mut store, &messenger).unwrap(), first);
    assert_eq!(orch.trigger_inspect(false, &mut store, &messenger).unwrap(), first);
    assert_eq!(messenger.count("tag-elements"), 1);

    complete(&mut orch, &mut store, &messenger);
    assert_eq!(messenger.count("tag-elements"), 2, "exactly one follow-up cycle");
    assert_eq!(orch.current_cycle(), Some(first + 1));

    complete(&mut orch, &mut store, &messenger);
    assert_eq!(messenger.count("tag-elements"), 2);
    assert!(!orch.is_pending());
}

#[test]
fn failure_releases_waiters_and_sets_status() {
    let (mut orch, mut store, messenger) = setup();
    let mut wait = orch.await_result_or_trigger(&mut store, &messenger).unwrap();
    let cycle = orch.current_cycle().unwrap();

    assert!(orch.on_inspect_failed(cycle, "classifier crashed"));
    assert_eq!(
        wait.try_result(),
        Some(Err(InspectError::Failed("classifier crashed".into())))
    );
    assert_eq!(orch.status(), Some(INSPECTION_FAILED));
    assert_eq!(orch.state(), InspectState::Idle);
    assert!(!orch.is_fresh());

    // The next trigger clears the status
    orch.trigger_inspect(true, &mut store, &messenger).unwrap();
    assert_eq!(orch.status(), None);
}

#[test]
fn overdue_cycle_times_out() {
    let (orch, mut store, messenger) = setup();
    let mut orch = orch.with_timeout(Duration::from_millis(50));
    let mut wait = orch.await_result_or_trigger(&mut store, &messenger).unwrap();
    let cycle = orch.current_cycle().unwrap();

    assert!(!orch.expire_overdue(Instant::now()));
    assert!(orch.expire_overdue(Instant::now() + Duration::from_secs(1)));

    assert_eq!(
        wait.try_result(),
        Some(Err(InspectError::TimedOut(Duration::from_millis(50))))
    );
    assert_eq!(orch.status(), Some(INSPECTION_FAILED));

    // A late answer after the timeout changes nothing
    assert!(!orch.on_inspect_complete(cycle, &sample_fields(), &mut store));
    assert!(store.fields().is_empty());
}

#[test]
fn timeout_drops_queued_follow_up() {
    let (mut orch, mut store, messenger) = setup();
    orch.trigger_inspect(true, &mut store, &messenger).unwrap();
    orch.trigger_inspect(false, &mut store, &messenger).unwrap();

    assert!(orch.expire_overdue(Instant::now() + Duration::from_secs(60)));
    orch.finish_render(&mut store, &messenger).unwrap();
    assert_eq!(messenger.count("tag-elements"), 1);
}

#[tokio::test(start_paused = true)]
async fn wait_is_bounded_by_timeout() {
    let (orch, mut store, messenger) = setup();
    let mut orch = orch.with_timeout(Duration::from_secs(2));
    let wait = orch.await_result_or_trigger(&mut store, &messenger).unwrap();

    let result = wait.wait().await;
    assert_eq!(result, Err(InspectError::TimedOut(Duration::from_secs(2))));
    assert!(orch.is_pending(), "caller-side timeout leaves the cycle to the orchestrator");
}

#[tokio::test]
async fn wait_resolves_on_completion() {
    let (mut orch, mut store, messenger) = setup();
    let wait = orch.await_result_or_trigger(&mut store, &messenger).unwrap();
    complete(&mut orch, &mut store, &messenger);
    assert_eq!(wait.wait().await, Ok(()));
}

#[test]
fn dropped_orchestrator_abandons_waiters() {
    let (mut orch, mut store, messenger) = setup();
    let mut wait = orch.await_result_or_trigger(&mut store, &messenger).unwrap();
    drop(orch);
    assert_eq!(wait.try_result(), Some(Err(InspectError::Abandoned)));
}

#[test]
fn transitions_are_traced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");
    let tracer = TraceLogger::new(path.to_str().unwrap());

    let mut orch = Orchestrator::new(TAB).with_tracer(tracer);
    let mut store = FieldDetailStore::new();
    let messenger = RecordingMessenger::default();
    orch.trigger_inspect(true, &mut store, &messenger).unwrap();
    complete(&mut orch, &mut store, &messenger);

    let content = std::fs::read_to_string(&path).unwrap();
    let events: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0]["state"], "Tagging");
    assert_eq!(events[0]["manual"], true);
    assert_eq!(events[1]["state"], "WaitingResult");
    assert_eq!(events[2]["state"], "Rendered");
    assert_eq!(events[2]["field_count"], 6);
    assert_eq!(events[2]["outcome"], "complete");
}
