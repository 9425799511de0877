//! # ipmi_fand
//!
//! A closed-loop fan speed daemon for servers with an IPMI management
//! controller.
//!
//! ## Features
//!
//! - **Tiered Control**: Each fan group maps sensor temperatures to a tier
//!   through ascending thresholds, and each tier to a fixed duty percentage
//! - **Sensor Matching**: Sensors are selected by case-insensitive name
//!   prefix or regular expression
//! - **Stateless Ticks**: Every tick reads all sensors once and re-sends the
//!   target duty of every enabled group
//! - **Retry Budget**: Failed sensor reads are retried, and the loop stops
//!   once the configured number of consecutive failed ticks is exceeded
//! - **Dry Run**: Fan commands can be logged instead of sent
//!
//! ## Architecture
//!
//! - [`ControlLoop`](control_loop::ControlLoop) - Periodic read/evaluate/apply cycle
//! - [`GroupController`](group::GroupController) - Per-group tier and duty logic
//! - [`IpmiSession`](drivers::ipmitool::IpmiSession) - Sensor and fan access through `ipmitool`
//! - [`SensorClient`](sensors::SensorClient) and [`FanClient`](fan_controller::FanClient) -
//!   Seams between the loop and the hardware
//!
//! ## Example
//!
//! ```no_run
//! use ipmi_fand::{application::Application, config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = config::load(None)?;
//!     Application::builder()
//!         .with_config(config)
//!         .build()?
//!         .run()
//!         .await
//! }
//! ```

pub mod application;
pub mod cli;
pub mod config;
pub mod control_loop;
pub mod drivers;
pub mod duty;
pub mod error;
pub mod fan_controller;
pub mod group;
pub mod sensors;
pub mod tier;
