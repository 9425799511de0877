//! Sensor readings and the client that produces them.

use async_trait::async_trait;

use crate::error::Result;

/// One named temperature reading captured during a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub name: String,
    pub value: f64,
}

impl SensorReading {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Source of sensor snapshots from the management controller.
#[async_trait]
pub trait SensorClient: Send + Sync {
    /// Reads every temperature sensor once.
    ///
    /// Fails with `Transport` or `Auth`.
    async fn read_sensors(&self) -> Result<Vec<SensorReading>>;
}
