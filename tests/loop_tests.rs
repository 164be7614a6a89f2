use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use novactl::bus::{ControlSignal, Event, EventBus, GestureSignal};
use novactl::config::AppConfig;
use novactl::error::CoreError;
use novactl::kernel::intent::Intent;
use novactl::kernel::mode::Mode;
use novactl::runtime::{ActionDispatcher, ControlLoop};
use novactl::time::epoch_secs;

#[derive(Clone, Default)]
struct CollectingDispatcher {
    sent: Arc<Mutex<Vec<Intent>>>,
}

impl CollectingDispatcher {
    fn kinds(&self) -> Vec<&'static str> {
        self.sent.lock().iter().map(|i| i.kind.name()).collect()
    }
}

impl ActionDispatcher for CollectingDispatcher {
    fn dispatch(&mut self, intent: &Intent) -> Result<(), CoreError> {
        self.sent.lock().push(intent.clone());
        Ok(())
    }
}

#[test]
fn dispatcher_sees_only_approved_intents() {
    let cfg = AppConfig {
        stability_frames: 1,
        ..AppConfig::default()
    };
    let bus = EventBus::new(&cfg);
    let dispatcher = CollectingDispatcher::default();
    let handle = dispatcher.clone();
    let mut ctl = ControlLoop::new(cfg, bus.clone(), dispatcher, CancellationToken::new());

    bus.publish(Event::control(100.0, ControlSignal::Arm));
    bus.publish(Event::gesture(100.0, 0.9, GestureSignal::Point { x: 0.5, y: 0.5 }));
    ctl.step(100.0);

    assert_eq!(handle.kinds(), vec!["MOVE"]);
    let snap = ctl.snapshot();
    assert!(snap.armed);
    assert_eq!(snap.mode, Mode::CursorMove);
    assert_eq!(snap.approved_total, 1);

    // A low-confidence frame is recorded as blocked and never dispatched.
    bus.publish(Event::gesture(100.05, 0.2, GestureSignal::Point { x: 0.6, y: 0.5 }));
    ctl.step(100.1);

    assert_eq!(handle.kinds(), vec!["MOVE"]);
    assert_eq!(ctl.snapshot().blocked_low_confidence, 1);
}

#[test]
fn tracking_loss_shows_up_in_the_snapshot() {
    let cfg = AppConfig {
        stability_frames: 1,
        ..AppConfig::default()
    };
    let bus = EventBus::new(&cfg);
    let mut ctl = ControlLoop::new(
        cfg,
        bus.clone(),
        CollectingDispatcher::default(),
        CancellationToken::new(),
    );

    bus.publish(Event::gesture(100.0, 0.9, GestureSignal::Point { x: 0.5, y: 0.5 }));
    bus.publish(Event::control(100.0, ControlSignal::Arm));
    ctl.step(100.0);
    assert!(ctl.snapshot().armed);

    // Nothing published for a full second: the watchdog disarms.
    ctl.step(101.0);
    let snap = ctl.snapshot();
    assert!(!snap.armed);
    assert_eq!(snap.mode, Mode::Safe);
    assert_eq!(snap.disarms, 1);
}

#[tokio::test(start_paused = true)]
async fn emergency_stop_cancels_through_the_fast_path() {
    let cfg = AppConfig::default();
    let bus = EventBus::new(&cfg);
    let dispatcher = CollectingDispatcher::default();
    let handle = dispatcher.clone();
    let token = CancellationToken::new();
    let ctl = ControlLoop::new(cfg, bus.clone(), dispatcher, token.clone());

    let task = tokio::spawn(ctl.run());
    tokio::time::sleep(Duration::from_millis(5)).await;

    bus.publish(Event::control(epoch_secs(), ControlSignal::EmergencyStop));
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Exactly one forced CANCEL, dispatched without waiting for a cadence
    // slot, and never re-applied by later ticks that see the cached event.
    assert_eq!(handle.kinds(), vec!["CANCEL"]);

    token.cancel();
    task.await.unwrap();
}
