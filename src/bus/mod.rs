//! Typed pub/sub substrate with a latest-value cache per channel.
//!
//! Producers never block: fan-out rides a broadcast ring where a lagging
//! subscriber loses its oldest unread events (recency beats completeness for
//! control signals), and the cache write is a short per-slot lock.

pub mod event;

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::config::{AppConfig, StalenessConfig};
use crate::time::ms_to_secs;

pub use event::{
    Channel, ControlSignal, Event, GazeDirection, GestureSignal, Handedness, Signal, VoiceCommand,
    WireEvent,
};

/// Most recent event per channel plus the staleness windows that decide when
/// a slot reads as absent. Concurrent writers (producers) and readers
/// (engine, guard, overlay) are both fine; readers never block writers for
/// more than the slot copy.
pub struct LatestCache {
    slots: [RwLock<Option<Event>>; 4],
    staleness_secs: [f64; 4],
}

impl LatestCache {
    pub fn new(cfg: &StalenessConfig) -> Self {
        Self {
            slots: std::array::from_fn(|_| RwLock::new(None)),
            staleness_secs: [
                ms_to_secs(cfg.gesture_ms),
                ms_to_secs(cfg.gaze_ms),
                ms_to_secs(cfg.voice_ms),
                ms_to_secs(cfg.control_ms),
            ],
        }
    }

    pub fn update(&self, event: Event) {
        let index = event.channel().index();
        *self.slots[index].write() = Some(event);
    }

    /// Most recent event on the channel regardless of age.
    pub fn latest(&self, channel: Channel) -> Option<Event> {
        self.slots[channel.index()].read().clone()
    }

    /// Latest event, or absent when nothing has been published within the
    /// channel's staleness window. A stale channel is no-signal, never its
    /// last known value. This is the read fusion uses.
    pub fn fresh(&self, channel: Channel, now: f64) -> Option<Event> {
        let window = self.staleness_secs[channel.index()];
        self.latest(channel)
            .filter(|event| event.age(now) <= window)
    }

    /// Raw timestamp of the last publish on a channel, for the tracking-loss
    /// timer (which has its own, longer window).
    pub fn last_seen(&self, channel: Channel) -> Option<f64> {
        self.slots[channel.index()].read().as_ref().map(|e| e.ts)
    }
}

/// Handle to the bus; cheap to clone, one per producer/consumer.
#[derive(Clone)]
pub struct EventBus {
    cache: Arc<LatestCache>,
    fanout: broadcast::Sender<Event>,
    priority_tx: Arc<watch::Sender<Option<Event>>>,
}

impl EventBus {
    pub fn new(cfg: &AppConfig) -> Self {
        let (fanout, _) = broadcast::channel(cfg.bus_queue_depth.max(1));
        let (priority_tx, _) = watch::channel(None);
        Self {
            cache: Arc::new(LatestCache::new(&cfg.staleness)),
            fanout,
            priority_tx: Arc::new(priority_tx),
        }
    }

    /// Publish an event: the cache is updated unconditionally, preemptive
    /// control signals flip the priority watch, then subscribers are fanned
    /// out to. Never blocks the producer.
    pub fn publish(&self, event: Event) {
        self.cache.update(event.clone());

        if let Signal::Control(sig) = &event.signal {
            if sig.is_preemptive() {
                self.priority_tx.send_replace(Some(event.clone()));
            }
        }

        // No subscribers is fine; the cache still advanced.
        let _ = self.fanout.send(event);
    }

    pub fn subscribe(&self, filter: Option<Channel>) -> Subscription {
        Subscription {
            rx: self.fanout.subscribe(),
            filter,
        }
    }

    pub fn latest(&self, channel: Channel) -> Option<Event> {
        self.cache.latest(channel)
    }

    pub fn cache(&self) -> Arc<LatestCache> {
        Arc::clone(&self.cache)
    }

    /// Watch that carries the most recent EMERGENCY_STOP/DISARM, observable
    /// without waiting for normal queue position.
    pub fn priority(&self) -> watch::Receiver<Option<Event>> {
        self.priority_tx.subscribe()
    }
}

/// One subscriber's view of the stream. Dropping it frees the queue.
pub struct Subscription {
    rx: broadcast::Receiver<Event>,
    filter: Option<Channel>,
}

impl Subscription {
    /// Next matching event, or `None` once the bus is gone. Lag means the
    /// oldest unread events were dropped for this subscriber; we just keep
    /// reading from the newest survivor.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if self.filter.map_or(true, |ch| event.channel() == ch) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(dropped = n, "subscriber lagged, oldest events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
