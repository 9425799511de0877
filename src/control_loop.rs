//! The periodic control loop.
//!
//! One tick reads a single sensor snapshot, hands it to every enabled group
//! in fixed order, then waits for the next tick boundary. Ticks never
//! overlap. A failed sensor read is retried within the tick; a tick that
//! still has no snapshot is skipped, and too many skipped ticks in a row
//! stop the loop. A failing group never blocks the groups after it.

use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::time::{MissedTickBehavior, interval, sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    error::{FanControlError, Result},
    fan_controller::FanClient,
    group::GroupController,
    sensors::{SensorClient, SensorReading},
};

/// Loop lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Timing and retry policy of the loop.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Fixed period between tick starts.
    pub interval: Duration,
    /// Sensor read attempts per tick.
    pub sensor_retries: u32,
    /// Pause between sensor read attempts.
    pub retry_backoff: Duration,
    /// Consecutive skipped ticks tolerated before stopping.
    pub max_failed_ticks: u32,
    /// Bound on every sensor read and fan command.
    pub op_timeout: Duration,
}

impl From<&Config> for LoopSettings {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.tick_interval(),
            sensor_retries: config.sensor_retries,
            retry_backoff: config.retry_backoff(),
            max_failed_ticks: config.max_failed_ticks,
            op_timeout: config.command_timeout(),
        }
    }
}

enum Snapshot {
    Ready(Vec<SensorReading>),
    Failed(FanControlError),
    Cancelled,
}

/// Drives all fan groups from one shared sensor client and fan client.
///
/// The clients are borrowed: they are opened once at startup and outlive
/// the loop.
pub struct ControlLoop<'a, S: ?Sized, F: ?Sized> {
    settings: LoopSettings,
    groups: Vec<GroupController>,
    sensors: &'a S,
    fans: &'a F,
    state: LoopState,
    failed_ticks: u32,
}

impl<'a, S, F> ControlLoop<'a, S, F>
where
    S: SensorClient + ?Sized,
    F: FanClient + ?Sized,
{
    pub fn new(
        settings: LoopSettings,
        groups: Vec<GroupController>,
        sensors: &'a S,
        fans: &'a F,
    ) -> Self {
        Self {
            settings,
            groups,
            sensors,
            fans,
            state: LoopState::Running,
            failed_ticks: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Runs ticks until `cancel` fires or a fatal error occurs.
    ///
    /// Returns `Ok(())` on shutdown and the triggering error when the loop
    /// stops on its own. Either way the loop ends in [`LoopState::Stopped`].
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<()> {
        let enabled = self.groups.iter().filter(|g| g.is_enabled()).count();
        info!(
            "Control loop started: {enabled} of {} groups enabled, interval {:?}",
            self.groups.len(),
            self.settings.interval
        );

        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("Shutdown requested, stopping control loop");
                    break Ok(());
                }
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.tick(cancel).await {
                error!("Control loop stopping after {}: {e}", e.kind());
                break Err(e);
            }
        };

        self.state = LoopState::Stopped;
        result
    }

    /// Runs one tick: snapshot, then every enabled group in order.
    ///
    /// Errors only when the sensor failure budget is exhausted.
    pub async fn tick(&mut self, cancel: &CancellationToken) -> Result<()> {
        if self.state == LoopState::Stopped {
            return Ok(());
        }

        match self.read_snapshot(cancel).await {
            Snapshot::Ready(snapshot) => {
                self.failed_ticks = 0;
                self.apply(&snapshot).await;
                Ok(())
            }
            Snapshot::Failed(e) => {
                self.failed_ticks += 1;
                if self.failed_ticks > self.settings.max_failed_ticks {
                    self.state = LoopState::Stopped;
                    return Err(e);
                }
                warn!(
                    "Skipping tick, no sensor snapshot ({} of {} tolerated): {e}",
                    self.failed_ticks, self.settings.max_failed_ticks
                );
                Ok(())
            }
            Snapshot::Cancelled => Ok(()),
        }
    }

    async fn read_snapshot(&self, cancel: &CancellationToken) -> Snapshot {
        let attempts = self.settings.sensor_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Snapshot::Cancelled,
                    () = sleep(self.settings.retry_backoff) => {}
                }
            }

            let result = timeout(self.settings.op_timeout, self.sensors.read_sensors())
                .await
                .unwrap_or_else(|_| {
                    Err(FanControlError::Transport(format!(
                        "sensor read timed out after {:?}",
                        self.settings.op_timeout
                    )))
                });

            match result {
                Ok(snapshot) => {
                    debug!("Sensor snapshot: {} readings", snapshot.len());
                    for reading in &snapshot {
                        debug!("  {} = {:.1}", reading.name, reading.value);
                    }
                    return Snapshot::Ready(snapshot);
                }
                Err(e) => {
                    warn!("Sensor read attempt {attempt}/{attempts} failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        Snapshot::Failed(
            last_error.unwrap_or_else(|| FanControlError::Transport("no sensor read attempted".into())),
        )
    }

    async fn apply(&self, snapshot: &[SensorReading]) {
        for group in self.groups.iter().filter(|g| g.is_enabled()) {
            let result = timeout(self.settings.op_timeout, group.tick(snapshot, self.fans))
                .await
                .unwrap_or_else(|_| {
                    Err(FanControlError::Transport(format!(
                        "fan command timed out after {:?}",
                        self.settings.op_timeout
                    )))
                });

            if let Err(e) = result {
                error!("{} group skipped this tick ({}): {e}", group.name(), e.kind());
            }
        }
    }
}
