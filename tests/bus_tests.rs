use novactl::bus::{
    Channel, ControlSignal, Event, EventBus, GazeDirection, GestureSignal, Signal, VoiceCommand,
};
use novactl::config::AppConfig;

#[test]
fn stale_channel_reads_as_absent() {
    let cfg = AppConfig::default();
    let bus = EventBus::new(&cfg);
    let cache = bus.cache();

    bus.publish(Event::gesture(10.0, 0.9, GestureSignal::Pinch));

    // Inside the 300ms gesture window.
    assert!(cache.fresh(Channel::Gesture, 10.2).is_some());
    // Past it: absent for fusion, but the raw slot still holds the event.
    assert!(cache.fresh(Channel::Gesture, 10.4).is_none());
    assert!(cache.latest(Channel::Gesture).is_some());
    assert_eq!(cache.last_seen(Channel::Gesture), Some(10.0));
}

#[test]
fn channels_do_not_overwrite_each_other() {
    let cfg = AppConfig::default();
    let bus = EventBus::new(&cfg);
    let cache = bus.cache();

    bus.publish(Event::gesture(10.0, 0.9, GestureSignal::OpenPalm));
    bus.publish(Event::gaze(10.1, 0.8, GazeDirection::Left));
    bus.publish(Event::voice(10.2, 0.7, VoiceCommand::Click));

    assert_eq!(cache.last_seen(Channel::Gesture), Some(10.0));
    assert_eq!(cache.last_seen(Channel::Gaze), Some(10.1));
    assert_eq!(cache.last_seen(Channel::Voice), Some(10.2));
    assert_eq!(cache.last_seen(Channel::Control), None);
}

#[tokio::test]
async fn filtered_subscription_only_sees_its_channel() {
    let cfg = AppConfig::default();
    let bus = EventBus::new(&cfg);
    let mut sub = bus.subscribe(Some(Channel::Voice));

    bus.publish(Event::gesture(1.0, 0.9, GestureSignal::Pinch));
    bus.publish(Event::voice(1.1, 0.9, VoiceCommand::Stop));

    let event = sub.recv().await.unwrap();
    assert_eq!(event.channel(), Channel::Voice);
    assert_eq!(event.signal, Signal::Voice(VoiceCommand::Stop));
}

#[tokio::test]
async fn lagging_subscriber_loses_oldest_events() {
    let cfg = AppConfig {
        bus_queue_depth: 4,
        ..AppConfig::default()
    };
    let bus = EventBus::new(&cfg);
    let mut sub = bus.subscribe(None);

    // Eight publishes against a depth of four, before any read.
    for i in 0..8 {
        bus.publish(Event::gaze(i as f64, 0.9, GazeDirection::Center));
    }

    // The four newest survive; the lag is skipped, not surfaced.
    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(sub.recv().await.unwrap().ts);
    }
    assert_eq!(seen, vec![4.0, 5.0, 6.0, 7.0]);
}

#[tokio::test]
async fn subscriber_outliving_the_bus_sees_end_of_stream() {
    let cfg = AppConfig::default();
    let bus = EventBus::new(&cfg);
    let mut sub = bus.subscribe(None);

    bus.publish(Event::gaze(1.0, 0.9, GazeDirection::Center));
    drop(bus);

    assert!(sub.recv().await.is_some());
    assert!(sub.recv().await.is_none());
}

#[test]
fn emergency_stop_flips_the_priority_watch() {
    let cfg = AppConfig::default();
    let bus = EventBus::new(&cfg);
    let mut priority = bus.priority();

    // ARM is an ordinary control signal; it rides the normal stream only.
    bus.publish(Event::control(5.0, ControlSignal::Arm));
    assert!(!priority.has_changed().unwrap());

    bus.publish(Event::control(5.1, ControlSignal::EmergencyStop));
    assert!(priority.has_changed().unwrap());

    let observed = priority.borrow_and_update().clone().unwrap();
    assert_eq!(observed.ts, 5.1);
    assert_eq!(observed.signal, Signal::Control(ControlSignal::EmergencyStop));
}

#[test]
fn disarm_also_rides_the_priority_watch() {
    let cfg = AppConfig::default();
    let bus = EventBus::new(&cfg);
    let mut priority = bus.priority();

    bus.publish(Event::control(6.0, ControlSignal::Disarm));
    assert!(priority.has_changed().unwrap());
}
