//! Management controller access through the `ipmitool` CLI.
//!
//! [`IpmiSession`] is opened once at startup, checked for reachability, and
//! then lent to the control loop as both its sensor client and its fan
//! client.

pub mod protocol;
pub mod transport;

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::{
    config::Config,
    error::{FanControlError, Result},
    fan_controller::FanClient,
    sensors::{SensorClient, SensorReading},
};
use protocol::{Command, parse_sdr_csv, zone_for_group};
pub use transport::{IpmiTool, IpmiTransport};

/// Fan command options applied by the session.
#[derive(Debug, Clone, Copy)]
pub struct FanCommandOptions {
    /// Duties below this are raised to it.
    pub min_duty: u8,
    /// Log commands instead of sending them.
    pub dry_run: bool,
}

impl From<&Config> for FanCommandOptions {
    fn from(config: &Config) -> Self {
        Self {
            min_duty: config.min_duty,
            dry_run: config.dry_run,
        }
    }
}

#[derive(Debug)]
pub struct IpmiSession<T: IpmiTransport = IpmiTool> {
    transport: T,
    options: FanCommandOptions,
}

impl<T: IpmiTransport> IpmiSession<T> {
    /// Opens a session and verifies the controller answers.
    ///
    /// Logs the sensors visible at startup.
    pub async fn connect(transport: T, options: FanCommandOptions) -> Result<Self> {
        let info = transport.execute(&Command::McInfo).await?;
        let firmware = info
            .lines()
            .find(|line| line.contains("Firmware Revision"))
            .and_then(|line| line.split(':').nth(1))
            .map(str::trim)
            .unwrap_or("unknown");
        info!("Connected to management controller (firmware {firmware})");

        let session = Self { transport, options };
        let sensors = session.read_sensors().await?;
        info!("Found {} temperature sensors", sensors.len());
        for sensor in &sensors {
            debug!("Sensor {}: {:.1}", sensor.name, sensor.value);
        }

        if options.dry_run {
            warn!("Dry run: fan commands will be logged, not sent");
        }

        Ok(session)
    }
}

#[async_trait]
impl<T: IpmiTransport> SensorClient for IpmiSession<T> {
    async fn read_sensors(&self) -> Result<Vec<SensorReading>> {
        let csv = self.transport.execute(&Command::SdrList).await?;
        Ok(parse_sdr_csv(&csv))
    }
}

#[async_trait]
impl<T: IpmiTransport> FanClient for IpmiSession<T> {
    async fn set_fan_duty(&self, group: &str, percent: u8) -> Result<()> {
        let zone = zone_for_group(group).ok_or_else(|| {
            FanControlError::RejectedCommand(format!("no fan zone for group '{group}'"))
        })?;
        if percent > 100 {
            return Err(FanControlError::RejectedCommand(format!(
                "duty {percent}% is outside 0-100"
            )));
        }

        let duty = percent.max(self.options.min_duty);
        if duty > percent {
            warn!("{group} duty {percent}% below floor, raised to {duty}%");
        }

        let command = Command::SetZoneDuty { zone, duty };
        if self.options.dry_run {
            info!("[DRY RUN] Would execute: ipmitool {}", command.to_args().join(" "));
            return Ok(());
        }

        self.transport.execute(&command).await.map(|_| ())
    }
}
