mod support;

use serde_json::Value;
use std::sync::Arc;
use support::{ts, AfterCount};
use watermark_triggers::{
    AfterWatermark, CustomOnceTrigger, FiringOutcome, InMemoryTriggerStore, LogLevel, Never,
    OnElementContext, OnMergeContext, OnceTrigger, Position, QueryContext, RunnerConfig,
    RunnerError, Timestamp, Trigger, TriggerError, TriggerRunner, TriggerStoreSnapshot, Window,
};

#[test]
fn element_in_several_windows_updates_each() {
    let trigger = AfterWatermark::past_end_of_window().with_early_firings(AfterCount::once(2));
    let mut runner = TriggerRunner::new(trigger, &RunnerConfig::default());
    let windows = [Window::from_millis(0, 100), Window::from_millis(50, 150)];

    runner.process_element(&windows, ts(60)).unwrap();
    runner.process_element(&windows[1..], ts(120)).unwrap();

    let early = Position::from_path(vec![0]);
    assert_eq!(runner.window_state(&windows[0]).unwrap().counter(&early), 1);
    assert_eq!(runner.window_state(&windows[1]).unwrap().counter(&early), 2);
    assert!(!runner.should_fire(&windows[0]).unwrap());
    assert!(runner.should_fire(&windows[1]).unwrap());
    assert_eq!(runner.timers().len(), 2);
}

#[test]
fn garbage_collects_closed_windows_past_lateness() {
    let config = RunnerConfig::default().with_allowed_lateness_ms(10);
    let mut runner = TriggerRunner::new(AfterWatermark::past_end_of_window(), &config);
    let first = Window::from_millis(0, 100);
    let second = Window::from_millis(100, 200);
    runner.process_element(&[first.clone()], ts(5)).unwrap();
    runner.process_element(&[second.clone()], ts(105)).unwrap();

    runner.advance_watermark(ts(150));
    // Past lateness but the end-of-window pane is still owed.
    assert!(runner.garbage_collect().unwrap().is_empty());
    assert_eq!(
        runner.fire_if_ready(&first).unwrap(),
        FiringOutcome::Fired { closed: true }
    );

    assert_eq!(runner.garbage_collect().unwrap(), vec![first.clone()]);
    assert!(runner.window_state(&first).unwrap().is_empty());
    assert_eq!(runner.active_windows().collect::<Vec<_>>(), vec![&second]);
    assert_eq!(runner.telemetry().windows_collected, 1);
    // The end-of-window leaf keeps no state until it fires.
    assert!(runner.store().is_empty());
}

#[test]
fn never_firing_window_is_not_collected() {
    let mut runner = TriggerRunner::new(Never::ever(), &RunnerConfig::default());
    let window = Window::from_millis(0, 10);
    runner.process_element(&[window.clone()], ts(1)).unwrap();
    runner.advance_watermark(ts(i64::MAX));
    assert!(runner.garbage_collect().unwrap().is_empty());
    assert_eq!(
        runner.watermark_that_guarantees_firing(&window),
        Timestamp::MAX
    );
    assert!(!runner.should_fire(&window).unwrap());
}

#[test]
fn store_snapshot_restores_runner_state() {
    let trigger = AfterWatermark::past_end_of_window()
        .with_early_firings(AfterCount::once(3))
        .with_late_firings(AfterCount::once(1));
    let config = RunnerConfig::default().with_allowed_lateness_ms(1_000);
    let window = Window::from_millis(0, 100);
    let mut runner = TriggerRunner::new(trigger.clone(), &config);
    runner.process_element(&[window.clone()], ts(10)).unwrap();
    runner.process_element(&[window.clone()], ts(11)).unwrap();
    runner.advance_watermark(ts(101));
    runner.fire_if_ready(&window).unwrap();

    let snapshot = runner.store().snapshot();
    let encoded = serde_json::to_string(&snapshot).unwrap();
    let decoded: TriggerStoreSnapshot = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, snapshot);

    let parsed: Value = serde_json::from_str(&encoded).unwrap();
    let nodes = parsed["windows"][0]["nodes"].as_array().unwrap();
    assert_eq!(nodes[0]["position"], serde_json::json!([0]));
    assert_eq!(nodes[0]["finished"], true);

    let store = InMemoryTriggerStore::from_snapshot(&decoded);
    let mut restored = TriggerRunner::with_store(trigger, &config, store);
    restored.advance_watermark(ts(101));
    assert!(!restored.should_fire(&window).unwrap());
    restored.process_element(&[window.clone()], ts(12)).unwrap();
    assert_eq!(
        restored.fire_if_ready(&window).unwrap(),
        FiringOutcome::Fired { closed: false }
    );
}

#[test]
fn runner_logs_firings_with_event_time() {
    let config = RunnerConfig::default().with_log_level(LogLevel::Debug);
    let mut runner = TriggerRunner::new(AfterWatermark::past_end_of_window(), &config);
    let window = Window::from_millis(0, 100);
    runner.process_element(&[window.clone()], ts(1)).unwrap();
    runner.advance_watermark(ts(120));
    runner.fire_if_ready(&window).unwrap();

    let records: Vec<Value> = runner
        .logger()
        .files()
        .flat_map(|file| file.lines())
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    // Element arrivals log at trace and are filtered out.
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["message"], "pane fired");
    assert_eq!(records[0]["event_time_ms"], 120);
    assert_eq!(records[1]["message"], "window closed");
    assert!(records.iter().all(|record| record["window"] == "[0, 100)"));
}

#[derive(Debug)]
struct Unreachable;

impl CustomOnceTrigger for Unreachable {
    fn describe(&self) -> String {
        "Unreachable".to_string()
    }

    fn on_element(&self, ctx: &mut OnElementContext<'_>) -> Result<(), TriggerError> {
        Err(TriggerError::External {
            trigger: self.describe(),
            reason: format!("backend down for {}", ctx.window()),
        })
    }

    fn on_merge(&self, _ctx: &mut OnMergeContext<'_>) -> Result<(), TriggerError> {
        Ok(())
    }

    fn should_fire(&self, _ctx: &QueryContext<'_>) -> Result<bool, TriggerError> {
        Ok(false)
    }

    fn watermark_that_guarantees_firing(&self, _window: &Window) -> Timestamp {
        Timestamp::MAX
    }

    fn continuation(&self) -> Arc<dyn CustomOnceTrigger> {
        Arc::new(Unreachable)
    }
}

#[test]
fn custom_trigger_failures_propagate_unmodified() {
    let trigger =
        AfterWatermark::past_end_of_window().with_early_firings(OnceTrigger::custom(Unreachable));
    let mut runner = TriggerRunner::new(trigger, &RunnerConfig::default());
    let window = Window::from_millis(0, 100);
    match runner.process_element(&[window.clone()], ts(1)) {
        Err(RunnerError::Trigger(TriggerError::External { trigger, reason })) => {
            assert_eq!(trigger, "Unreachable");
            assert_eq!(reason, "backend down for [0, 100)");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(runner.telemetry().elements_processed, 0);
    assert!(runner.active_windows().next().is_none());
}

#[test]
fn custom_trigger_runs_as_leaf_root() {
    let trigger = Trigger::from(AfterCount::once(2));
    assert!(trigger.sub_triggers().is_empty());
    assert!(trigger.as_once().is_some());

    let mut runner = TriggerRunner::new(trigger, &RunnerConfig::default());
    let window = Window::from_millis(0, 100);
    assert!(runner.root().sub_triggers().is_empty());
    runner.process_element(&[window.clone()], ts(1)).unwrap();
    assert_eq!(runner.fire_if_ready(&window).unwrap(), FiringOutcome::NotReady);
    runner.process_element(&[window.clone()], ts(2)).unwrap();
    assert_eq!(
        runner.fire_if_ready(&window).unwrap(),
        FiringOutcome::Fired { closed: true }
    );
    runner.process_element(&[window.clone()], ts(3)).unwrap();
    assert_eq!(
        runner.telemetry().dropped_elements().get("WINDOW_CLOSED"),
        Some(&1)
    );
}
