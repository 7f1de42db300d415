use watermark_triggers::{Timestamp, Window};

#[test]
fn max_timestamp_is_last_instant_inside_window() {
    let window = Window::from_millis(0, 100);
    assert_eq!(window.max_timestamp(), Timestamp::from_millis(99));
    assert!(window.contains(window.max_timestamp()));
    assert!(!window.contains(window.end()));
    assert!(window.contains(window.start()));
}

#[test]
fn max_timestamp_saturates_at_minimum() {
    let window = Window::new(Timestamp::MIN, Timestamp::MIN);
    assert_eq!(window.max_timestamp(), Timestamp::MIN);
}

#[test]
fn adjacent_windows_do_not_intersect() {
    let first = Window::from_millis(0, 100);
    let second = Window::from_millis(100, 200);
    assert!(!first.intersects(&second));
    assert_eq!(first.span(&second), Window::from_millis(0, 200));
    assert_eq!(second.to_string(), "[100, 200)");
    assert_eq!(Timestamp::from_millis(5).to_string(), "5ms");
}

#[test]
fn timestamps_order_and_saturate() {
    let t = Timestamp::from_millis(10);
    assert!(t.is_after(Timestamp::from_millis(9)));
    assert!(!t.is_after(t));
    assert_eq!(Timestamp::MAX.saturating_add_millis(1), Timestamp::MAX);
    assert_eq!(t.saturating_sub_millis(3).millis(), 7);
}
