//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Telemetry hub: tick scheduling and snapshot fan-out."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use f_ems_common::config::SimulationConfig;
use f_ems_common::time::duration_to_millis;
use f_ems_model::ContainerAsset;

use crate::engine::PerturbationEngine;
use crate::rules::evaluate_conditions;

const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(5000);

type Listener = Arc<dyn Fn(&[ContainerAsset]) + Send + Sync>;

struct Registered {
    id: u64,
    listener: Listener,
}

/// Hub owning the simulated fleet, the tick timer, and the subscriber list.
///
/// An explicit context object rather than a process-wide singleton: create as
/// many independent hubs as needed (one per test, say) without cross-talk.
/// Dropping the hub and all of its subscriptions cancels the timer task.
pub struct TelemetryHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    fleet: Mutex<Vec<ContainerAsset>>,
    engine: Mutex<PerturbationEngine>,
    subscribers: Mutex<Vec<Registered>>,
    next_subscriber_id: AtomicU64,
    timer: Mutex<Option<JoinHandle<()>>>,
    default_period: Duration,
}

impl TelemetryHub {
    /// Create a hub around the given fleet. The fleet is created once here
    /// and mutated in place on every tick; assets are never destroyed during
    /// the hub's lifetime.
    pub fn new(fleet: Vec<ContainerAsset>, config: &SimulationConfig) -> Self {
        let default_period = if config.tick_interval.is_zero() {
            DEFAULT_TICK_INTERVAL
        } else {
            config.tick_interval
        };
        Self {
            inner: Arc::new(HubInner {
                fleet: Mutex::new(fleet),
                engine: Mutex::new(PerturbationEngine::new(config)),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber_id: AtomicU64::new(1),
                timer: Mutex::new(None),
                default_period,
            }),
        }
    }

    /// Register a listener for fleet snapshots.
    ///
    /// The listener is invoked immediately with the current snapshot, then on
    /// every subsequent tick, in registration order. Dropping the returned
    /// [`Subscription`] unregisters the listener before the next tick.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[ContainerAsset]) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let listener: Listener = Arc::new(listener);
        self.inner.subscribers.lock().push(Registered {
            id,
            listener: listener.clone(),
        });
        debug!(subscriber = id, "listener registered");
        let snapshot = self.inner.fleet.lock().clone();
        HubInner::invoke(id, &listener, &snapshot);
        Subscription {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Begin (or restart) periodic ticking.
    ///
    /// A running timer is replaced, never duplicated: at most one timer task
    /// exists at any instant. A zero period falls back to the configured
    /// default rather than erroring, since the cadence is a best-effort
    /// affordance. Must be called from within a tokio runtime.
    pub fn start(&self, period: Duration) {
        let period = if period.is_zero() {
            self.inner.default_period
        } else {
            period
        };
        let mut slot = self.inner.timer.lock();
        if let Some(handle) = slot.take() {
            handle.abort();
        }
        let weak = Arc::downgrade(&self.inner);
        debug!(period_ms = duration_to_millis(period), "timer started");
        *slot = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // A tick fully completes (mutate + notify) before the next one
            // is scheduled; backlogged ticks are delayed, not burst.
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first interval tick fires immediately; the subscription
            // path already delivered the current snapshot, so skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                inner.tick();
            }
        }));
    }

    /// Cancel the timer if any; a no-op when not running. No scheduled tick
    /// fires after this returns.
    pub fn stop(&self) {
        if let Some(handle) = self.inner.timer.lock().take() {
            handle.abort();
            debug!("timer stopped");
        }
    }

    /// True while a timer task is installed and alive.
    pub fn is_running(&self) -> bool {
        self.inner
            .timer
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Perform a single synchronous tick and notification, independent of the
    /// timer. A running timer is left untouched.
    pub fn trigger_update(&self) {
        self.inner.tick();
    }

    /// Return the current snapshot synchronously, without waiting for a tick.
    pub fn current_assets(&self) -> Vec<ContainerAsset> {
        self.inner.fleet.lock().clone()
    }
}

impl Drop for TelemetryHub {
    fn drop(&mut self) {
        self.stop();
    }
}

impl HubInner {
    /// One full tick: mutate every asset, recompute conditions, then notify.
    /// Mutation happens under the fleet lock, so a concurrent
    /// [`TelemetryHub::current_assets`] never observes a partially updated
    /// fleet; listeners receive a clone taken after the mutation settles.
    fn tick(&self) {
        let snapshot = {
            let mut fleet = self.fleet.lock();
            let mut engine = self.engine.lock();
            for asset in fleet.iter_mut() {
                engine.advance(asset);
                asset.conditions = evaluate_conditions(asset);
            }
            fleet.clone()
        };
        self.notify(&snapshot);
    }

    fn notify(&self, snapshot: &[ContainerAsset]) {
        // Listeners run outside the registry lock so a callback may
        // subscribe or unsubscribe without deadlocking; membership is
        // re-checked per listener so an unsubscribed listener is skipped.
        let roster: Vec<u64> = self.subscribers.lock().iter().map(|r| r.id).collect();
        for id in roster {
            let listener = {
                let subscribers = self.subscribers.lock();
                match subscribers.iter().find(|r| r.id == id) {
                    Some(registered) => registered.listener.clone(),
                    None => continue,
                }
            };
            Self::invoke(id, &listener, snapshot);
        }
    }

    fn invoke(id: u64, listener: &Listener, snapshot: &[ContainerAsset]) {
        let outcome = catch_unwind(AssertUnwindSafe(|| listener(snapshot)));
        if outcome.is_err() {
            warn!(subscriber = id, "listener panicked; continuing with remaining listeners");
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().retain(|r| r.id != id);
        debug!(subscriber = id, "listener unregistered");
    }
}

impl Drop for HubInner {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.abort();
        }
    }
}

/// RAII registration guard returned by [`TelemetryHub::subscribe`].
///
/// Dropping the guard unregisters the listener; it takes effect before the
/// next tick's notification round reaches the listener. The guard does not
/// keep the hub alive.
pub struct Subscription {
    inner: Weak<HubInner>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.unsubscribe(self.id);
        }
    }
}
