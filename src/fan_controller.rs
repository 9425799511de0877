//! Fan command abstraction.

use async_trait::async_trait;

use crate::error::Result;

/// Accepts duty-cycle commands for a whole fan group.
///
/// The group is addressed by name (`cpu`, `board`); the implementation
/// decides how that maps onto the hardware and may reject unknown groups.
///
/// # Example
///
/// ```no_run
/// use ipmi_fand::fan_controller::FanClient;
/// use ipmi_fand::error::Result;
///
/// struct LogOnly;
///
/// #[async_trait::async_trait]
/// impl FanClient for LogOnly {
///     async fn set_fan_duty(&self, group: &str, percent: u8) -> Result<()> {
///         println!("{group} -> {percent}%");
///         Ok(())
///     }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FanClient: Send + Sync {
    /// Sets the duty cycle (0-100) of every fan in `group`.
    ///
    /// Fails with `Transport` or `RejectedCommand`.
    async fn set_fan_duty(&self, group: &str, percent: u8) -> Result<()>;
}
