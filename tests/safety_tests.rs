use novactl::config::SafetyConfig;
use novactl::kernel::intent::{Intent, IntentKind, ScrollDirection};
use novactl::safety::{ClickContext, Decision, DisarmReason, RejectReason, SafetyGuard};

fn guard() -> SafetyGuard {
    SafetyGuard::new(SafetyConfig::default())
}

fn armed_guard(now: f64) -> SafetyGuard {
    let mut g = guard();
    assert!(g.arm(now, true));
    g
}

fn move_intent(ts: f64) -> Intent {
    Intent::new(ts, IntentKind::Move { x: 0.5, y: 0.5 }, 0.9)
}

fn scroll_intent(ts: f64) -> Intent {
    Intent::new(
        ts,
        IntentKind::Scroll {
            direction: ScrollDirection::Down,
            magnitude: 0.3,
        },
        0.9,
    )
}

/// Voice "click" stamped right on the pinch: both signals present.
fn confirmed_ctx(pinch_started: f64) -> ClickContext {
    ClickContext {
        pinch_started: Some(pinch_started),
        pinch_duration: Some(0.05),
        pinch_released: false,
        voice_click_ts: Some(pinch_started + 0.1),
    }
}

#[test]
fn starts_disarmed_and_blocks_everything_but_cancel() {
    let mut g = guard();
    assert!(!g.armed());

    match g.approve(move_intent(1.0), 1.0, &ClickContext::default()) {
        Decision::Blocked { reason, .. } => assert_eq!(reason, RejectReason::NotArmed),
        other => panic!("expected NotArmed, got {other:?}"),
    }

    let cancel = Intent::new(1.0, IntentKind::Cancel, 0.0);
    assert!(matches!(
        g.approve(cancel, 1.0, &ClickContext::default()),
        Decision::Approved(_)
    ));
}

#[test]
fn arm_refused_without_tracking() {
    let mut g = guard();
    assert!(!g.arm(1.0, false));
    assert!(!g.armed());
    assert!(g.arm(1.0, true));
    assert!(g.armed());
}

#[test]
fn low_confidence_is_blocked() {
    let mut g = armed_guard(1.0);
    let weak = Intent::new(1.0, IntentKind::Move { x: 0.1, y: 0.1 }, 0.2);
    match g.approve(weak, 1.0, &ClickContext::default()) {
        Decision::Blocked { reason, .. } => assert_eq!(reason, RejectReason::LowConfidence),
        other => panic!("expected LowConfidence, got {other:?}"),
    }
}

#[test]
fn click_cooldown_approves_exactly_one() {
    let mut g = armed_guard(10.0);

    let first = Intent::new(10.0, IntentKind::Click, 0.9);
    assert!(matches!(
        g.approve(first, 10.0, &confirmed_ctx(10.0)),
        Decision::Approved(_)
    ));

    // Second eligible candidate inside the cooldown window.
    let second = Intent::new(10.1, IntentKind::Click, 0.9);
    match g.approve(second, 10.1, &confirmed_ctx(10.1)) {
        Decision::Blocked { reason, .. } => assert_eq!(reason, RejectReason::RateLimited),
        other => panic!("expected RateLimited, got {other:?}"),
    }

    // Past the cooldown it fires again.
    let third = Intent::new(10.4, IntentKind::Click, 0.9);
    assert!(matches!(
        g.approve(third, 10.4, &confirmed_ctx(10.4)),
        Decision::Approved(_)
    ));
}

#[test]
fn click_family_shares_the_cooldown() {
    let mut g = armed_guard(10.0);
    assert!(matches!(
        g.approve(Intent::new(10.0, IntentKind::RightClick, 0.9), 10.0, &ClickContext::default()),
        Decision::Approved(_)
    ));
    match g.approve(
        Intent::new(10.1, IntentKind::DoubleClick, 0.9),
        10.1,
        &ClickContext::default(),
    ) {
        Decision::Blocked { reason, .. } => assert_eq!(reason, RejectReason::RateLimited),
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[test]
fn scroll_burst_window_limits_count() {
    let mut g = armed_guard(10.0);
    for i in 0..5 {
        let ts = 10.0 + i as f64 * 0.1;
        assert!(
            matches!(
                g.approve(scroll_intent(ts), ts, &ClickContext::default()),
                Decision::Approved(_)
            ),
            "scroll {i} should pass"
        );
    }
    match g.approve(scroll_intent(10.45), 10.45, &ClickContext::default()) {
        Decision::Blocked { reason, .. } => assert_eq!(reason, RejectReason::RateLimited),
        other => panic!("expected RateLimited, got {other:?}"),
    }
    // Window slides; a scroll well after the burst passes again.
    assert!(matches!(
        g.approve(scroll_intent(11.6), 11.6, &ClickContext::default()),
        Decision::Approved(_)
    ));
}

#[test]
fn unconfirmed_click_is_held_then_dropped() {
    let mut g = armed_guard(10.0);
    let ctx = ClickContext {
        pinch_started: Some(10.0),
        pinch_duration: Some(0.05),
        pinch_released: false,
        voice_click_ts: None,
    };

    assert!(matches!(
        g.approve(Intent::new(10.0, IntentKind::Click, 0.9), 10.0, &ctx),
        Decision::Held
    ));
    assert!(g.snapshot().pending_click);

    // Inside the correlation window: still pending.
    assert!(g.resolve_pending(10.5, &ctx).is_none());

    // Window spent: dropped with UNCONFIRMED.
    match g.resolve_pending(11.0, &ctx) {
        Some(Decision::Blocked { reason, .. }) => {
            assert_eq!(reason, RejectReason::Unconfirmed)
        }
        other => panic!("expected Unconfirmed, got {other:?}"),
    }
    assert!(!g.snapshot().pending_click);
}

#[test]
fn late_voice_confirms_a_pending_click() {
    let mut g = armed_guard(10.0);
    let held_ctx = ClickContext {
        pinch_started: Some(10.0),
        pinch_duration: Some(0.05),
        pinch_released: false,
        voice_click_ts: None,
    };
    assert!(matches!(
        g.approve(Intent::new(10.0, IntentKind::Click, 0.9), 10.0, &held_ctx),
        Decision::Held
    ));

    let voiced = ClickContext {
        voice_click_ts: Some(10.4),
        ..held_ctx
    };
    assert!(matches!(
        g.resolve_pending(10.4, &voiced),
        Some(Decision::Approved(_))
    ));
    // Resolved once; nothing left pending.
    assert!(g.resolve_pending(10.5, &voiced).is_none());
}

#[test]
fn hold_band_release_self_confirms() {
    let mut g = armed_guard(10.0);
    let ctx = ClickContext {
        pinch_started: Some(10.0),
        pinch_duration: Some(0.3),
        pinch_released: true,
        voice_click_ts: None,
    };
    assert!(matches!(
        g.approve(Intent::new(10.3, IntentKind::Click, 0.9), 10.3, &ctx),
        Decision::Approved(_)
    ));
}

#[test]
fn hold_band_does_not_confirm_mid_pinch() {
    let mut g = armed_guard(10.0);
    // Same duration, but the pinch is still in progress: could become a drag.
    let ctx = ClickContext {
        pinch_started: Some(10.0),
        pinch_duration: Some(0.3),
        pinch_released: false,
        voice_click_ts: None,
    };
    assert!(matches!(
        g.approve(Intent::new(10.3, IntentKind::Click, 0.9), 10.3, &ctx),
        Decision::Held
    ));
}

#[test]
fn quick_release_without_voice_never_clicks() {
    let mut g = armed_guard(10.0);
    let ctx = ClickContext {
        pinch_started: Some(10.0),
        pinch_duration: Some(0.08),
        pinch_released: true,
        voice_click_ts: None,
    };
    assert!(matches!(
        g.approve(Intent::new(10.1, IntentKind::Click, 0.9), 10.1, &ctx),
        Decision::Held
    ));
    match g.resolve_pending(11.1, &ctx) {
        Some(Decision::Blocked { reason, .. }) => {
            assert_eq!(reason, RejectReason::Unconfirmed)
        }
        other => panic!("expected Unconfirmed, got {other:?}"),
    }
}

#[test]
fn disarm_resets_rate_limiter_state() {
    let mut g = armed_guard(10.0);
    assert!(matches!(
        g.approve(Intent::new(10.0, IntentKind::Click, 0.9), 10.0, &confirmed_ctx(10.0)),
        Decision::Approved(_)
    ));

    g.disarm(DisarmReason::Explicit);
    assert!(g.arm(10.05, true));

    // Inside what would have been the cooldown, but the disarm cleared it.
    assert!(matches!(
        g.approve(Intent::new(10.1, IntentKind::Click, 0.9), 10.1, &confirmed_ctx(10.1)),
        Decision::Approved(_)
    ));
}

#[test]
fn tracking_loss_forces_disarm() {
    let mut g = armed_guard(10.0);
    assert!(!g.check_tracking(10.5, None, None));
    assert!(g.armed());
    assert!(g.check_tracking(11.0, None, None));
    assert!(!g.armed());
}

#[test]
fn fresh_signals_keep_the_watchdog_quiet() {
    let mut g = armed_guard(10.0);
    assert!(!g.check_tracking(12.0, Some(11.8), None));
    assert!(!g.check_tracking(12.5, None, Some(12.4)));
    assert!(g.armed());
}
