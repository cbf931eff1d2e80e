//! Fixed-interval polling of one gateway with a shared, atomically replaced
//! device snapshot.
//!
//! All gateway traffic (polls and commands) goes through one async mutex
//! that owns the [`GatewayClient`], so the gateway never sees two requests at
//! once. Readers get the snapshot through a `watch` channel and always see a
//! whole device list, either the previous one or the new one.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::client::GatewayClient;
use crate::diff::diff_snapshots;
use crate::error::ErrorKind;
use crate::protocol::DEFAULT_SCAN_INTERVAL;
use crate::types::{DeviceRecord, Event};
use crate::Result;

type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;
type SnapshotCallback = Box<dyn Fn(&[DeviceRecord]) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Uninitialized,
    Refreshing,
    Ready,
    Failed,
}

/// The failure recorded by the most recent cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastError {
    pub kind: ErrorKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CoordinatorState {
    pub phase: Phase,
    /// Last successful device list; kept across failed cycles.
    pub devices: Option<Arc<Vec<DeviceRecord>>>,
    pub last_error: Option<LastError>,
    pub last_success: Option<DateTime<Utc>>,
    pub next_refresh: Option<DateTime<Utc>>,
}

impl CoordinatorState {
    pub fn last_update_success(&self) -> bool {
        self.devices.is_some() && self.last_error.is_none()
    }
}

pub struct CoordinatorBuilder {
    client: GatewayClient,
    interval: Duration,
    event_callbacks: Vec<EventCallback>,
    snapshot_callbacks: Vec<SnapshotCallback>,
}

impl CoordinatorBuilder {
    pub fn new(client: GatewayClient) -> Self {
        Self {
            client,
            interval: DEFAULT_SCAN_INTERVAL,
            event_callbacks: Vec::new(),
            snapshot_callbacks: Vec::new(),
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(f));
        self
    }

    pub fn on_snapshot(mut self, f: impl Fn(&[DeviceRecord]) + Send + Sync + 'static) -> Self {
        self.snapshot_callbacks.push(Box::new(f));
        self
    }

    pub fn build(self) -> Arc<Coordinator> {
        let (state, _) = watch::channel(CoordinatorState::default());
        Arc::new(Coordinator {
            host: self.client.host().to_string(),
            client: Mutex::new(self.client),
            state,
            interval: self.interval,
            cycles_started: AtomicU64::new(0),
            event_callbacks: self.event_callbacks,
            snapshot_callbacks: self.snapshot_callbacks,
        })
    }
}

pub struct Coordinator {
    host: String,
    client: Mutex<GatewayClient>,
    state: watch::Sender<CoordinatorState>,
    interval: Duration,
    cycles_started: AtomicU64,
    event_callbacks: Vec<EventCallback>,
    snapshot_callbacks: Vec<SnapshotCallback>,
}

impl Coordinator {
    pub fn builder(client: GatewayClient) -> CoordinatorBuilder {
        CoordinatorBuilder::new(client)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> CoordinatorState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    pub fn devices(&self) -> Option<Arc<Vec<DeviceRecord>>> {
        self.state.borrow().devices.clone()
    }

    pub fn device(&self, uid: &str) -> Option<DeviceRecord> {
        self.state
            .borrow()
            .devices
            .as_ref()
            .and_then(|devices| devices.iter().find(|d| d.uid == uid).cloned())
    }

    pub fn last_update_success(&self) -> bool {
        self.state.borrow().last_update_success()
    }

    /// First cycle at setup. Its error is returned as-is, nothing is retried.
    pub async fn first_refresh(&self) -> Result<Arc<Vec<DeviceRecord>>> {
        let mut client = self.client.lock().await;
        self.cycle(&mut client).await
    }

    /// One poll cycle, waiting for any in-flight gateway request first.
    pub async fn refresh(&self) -> Result<()> {
        let mut client = self.client.lock().await;
        self.cycle(&mut client).await.map(|_| ())
    }

    /// Out-of-band refresh, used after commands. Coalesces into any cycle
    /// that started after the request was made; otherwise runs once the
    /// in-flight one is done. Failures are recorded in the state.
    pub async fn request_refresh(&self) {
        let seen = self.cycles_started.load(Ordering::SeqCst);
        let mut client = self.client.lock().await;
        if self.cycles_started.load(Ordering::SeqCst) > seen {
            debug!(host = %self.host, "refresh request coalesced");
            return;
        }
        if let Err(e) = self.cycle(&mut client).await {
            warn!(host = %self.host, error = %e, "requested refresh failed");
        }
    }

    pub async fn set_temperature(&self, device_uid: &str, value: f64) -> Result<()> {
        self.client
            .lock()
            .await
            .set_temperature(device_uid, value)
            .await?;
        self.request_refresh().await;
        Ok(())
    }

    pub async fn power_on(&self, device_uid: &str) -> Result<()> {
        self.client.lock().await.power_on(device_uid).await?;
        self.request_refresh().await;
        Ok(())
    }

    pub async fn power_off(&self, device_uid: &str) -> Result<()> {
        self.client.lock().await.power_off(device_uid).await?;
        self.request_refresh().await;
        Ok(())
    }

    pub async fn set_function(&self, device_uid: &str, code: u8) -> Result<()> {
        self.client
            .lock()
            .await
            .set_function(device_uid, code)
            .await?;
        self.request_refresh().await;
        Ok(())
    }

    /// Timed refresh loop. Returns when `shutdown` resolves; an in-flight
    /// request is dropped rather than awaited.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        info!(host = %self.host, interval = ?self.interval, "coordinator starting");
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.schedule_next();

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            self.schedule_next();
            tokio::select! {
                _ = &mut shutdown => break,
                result = self.refresh() => {
                    if let Err(e) = result {
                        warn!(host = %self.host, error = %e, "scheduled refresh failed");
                    }
                }
            }
        }

        info!(host = %self.host, "coordinator shutting down");
    }

    fn schedule_next(&self) {
        let next = chrono::Duration::from_std(self.interval)
            .ok()
            .map(|d| Utc::now() + d);
        self.state.send_modify(|s| s.next_refresh = next);
    }

    async fn cycle(&self, client: &mut GatewayClient) -> Result<Arc<Vec<DeviceRecord>>> {
        self.cycles_started.fetch_add(1, Ordering::SeqCst);
        let mut guard = PhaseGuard::enter(&self.state);

        let fetched = client.fetch_devices().await;
        guard.disarm();
        let normalized = match fetched {
            Ok(normalized) => normalized,
            Err(e) => {
                warn!(host = %self.host, error = %e, "refresh failed, keeping previous snapshot");
                let last_error = LastError {
                    kind: e.kind(),
                    message: e.to_string(),
                    at: Utc::now(),
                };
                self.state.send_modify(|s| {
                    s.phase = Phase::Failed;
                    s.last_error = Some(last_error);
                });
                return Err(e);
            }
        };

        let devices = Arc::new(normalized.devices);
        let previous = self.state.borrow().devices.clone();
        let events = diff_snapshots(
            previous.as_deref().map(Vec::as_slice).unwrap_or(&[]),
            devices.as_slice(),
        );

        self.state.send_modify(|s| {
            s.phase = Phase::Ready;
            s.devices = Some(devices.clone());
            s.last_error = None;
            s.last_success = Some(Utc::now());
        });
        debug!(
            host = %self.host,
            devices = devices.len(),
            events = events.len(),
            "refresh complete"
        );

        for event in &events {
            for cb in &self.event_callbacks {
                cb(event);
            }
        }
        for cb in &self.snapshot_callbacks {
            cb(devices.as_slice());
        }
        Ok(devices)
    }
}

/// Marks the state `Refreshing` for the duration of a cycle and puts the
/// previous phase back if the cycle is dropped before it finishes.
struct PhaseGuard<'a> {
    state: &'a watch::Sender<CoordinatorState>,
    previous: Phase,
    armed: bool,
}

impl<'a> PhaseGuard<'a> {
    fn enter(state: &'a watch::Sender<CoordinatorState>) -> Self {
        let previous = state.borrow().phase;
        state.send_modify(|s| s.phase = Phase::Refreshing);
        Self {
            state,
            previous,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let previous = self.previous;
            self.state.send_modify(|s| s.phase = previous);
        }
    }
}
