mod support;

use support::ts;
use watermark_triggers::{
    AfterWatermark, ExecutableTrigger, FiringOutcome, QueryContext, RunnerConfig, TimeDomain,
    TriggerRunner, Window, WindowTriggerState,
};

fn should_fire_at(window: &Window, event_time: Option<i64>) -> bool {
    let root = ExecutableTrigger::create(AfterWatermark::past_end_of_window());
    let state = WindowTriggerState::new();
    let ctx = QueryContext::new(&root, window, event_time.map(ts), false, &state);
    root.invoke_should_fire(&ctx).unwrap()
}

fn end_of_window_runner() -> TriggerRunner {
    TriggerRunner::new(AfterWatermark::past_end_of_window(), &RunnerConfig::default())
}

#[test]
fn fires_only_once_watermark_passes_window_end() {
    let window = Window::from_millis(0, 100);
    assert!(!should_fire_at(&window, None));
    assert!(!should_fire_at(&window, Some(0)));
    assert!(!should_fire_at(&window, Some(99)));
    assert!(should_fire_at(&window, Some(100)));
    assert!(should_fire_at(&window, Some(101)));
    assert!(should_fire_at(&window, Some(i64::MAX)));
}

#[test]
fn guarantee_is_the_window_max_timestamp() {
    let trigger = AfterWatermark::past_end_of_window();
    let window = Window::from_millis(10, 20);
    assert_eq!(trigger.watermark_that_guarantees_firing(&window), ts(19));
    assert_eq!(trigger.to_string(), "AfterWatermark.pastEndOfWindow()");
}

#[test]
fn element_registers_end_of_window_timer_once() {
    let window = Window::from_millis(0, 100);
    let mut runner = end_of_window_runner();
    runner.process_element(&[window.clone()], ts(5)).unwrap();
    runner.process_element(&[window.clone()], ts(7)).unwrap();
    assert_eq!(runner.timers().len(), 1);
    assert!(runner.timers().contains(&window, ts(99), TimeDomain::EventTime));
    assert_eq!(runner.telemetry().elements_processed, 2);
}

#[test]
fn single_pane_after_end_of_window() {
    let window = Window::from_millis(0, 100);
    let mut runner = end_of_window_runner();
    runner.process_element(&[window.clone()], ts(40)).unwrap();

    assert!(runner.advance_watermark(ts(99)).is_empty());
    assert_eq!(runner.fire_if_ready(&window).unwrap(), FiringOutcome::NotReady);

    assert_eq!(runner.advance_watermark(ts(101)), vec![window.clone()]);
    assert_eq!(
        runner.fire_if_ready(&window).unwrap(),
        FiringOutcome::Fired { closed: true }
    );
    assert!(runner.is_closed(&window).unwrap());

    runner.advance_watermark(ts(500));
    assert_eq!(runner.fire_if_ready(&window).unwrap(), FiringOutcome::NotReady);
    assert_eq!(runner.telemetry().firings, 1);
    assert_eq!(runner.telemetry().windows_closed, 1);
}

#[test]
fn watermark_regressions_are_ignored() {
    let window = Window::from_millis(0, 100);
    let mut runner = end_of_window_runner();
    runner.process_element(&[window.clone()], ts(1)).unwrap();
    runner.advance_watermark(ts(150));
    assert!(runner.advance_watermark(ts(20)).is_empty());
    assert_eq!(runner.current_watermark(), Some(ts(150)));
    assert!(runner.should_fire(&window).unwrap());
}

#[test]
fn continuation_is_itself() {
    let trigger = AfterWatermark::past_end_of_window();
    let root = ExecutableTrigger::create(trigger);
    assert_eq!(root.trigger().continuation_trigger(), *root.trigger());
    assert!(root.sub_triggers().is_empty());
}
