//! Application entry point and builder pattern implementation.

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::{task::JoinHandle, time::timeout};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    control_loop::{ControlLoop, LoopSettings},
    drivers::ipmitool::{FanCommandOptions, IpmiSession, IpmiTool},
    error::FanControlError,
};

/// Wires configuration, the management controller session and the control
/// loop together, and stops the loop on Ctrl+C or SIGTERM.
///
/// # Example
///
/// ```no_run
/// use ipmi_fand::{application::Application, config};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = config::load(None)?;
/// Application::builder()
///     .with_config(config)
///     .build()?
///     .run()
///     .await
/// # }
/// ```
pub struct Application {
    config: Config,
}

impl Application {
    /// Creates a new ApplicationBuilder for constructing Application instances.
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    /// Connects to the controller and runs the control loop until shutdown.
    ///
    /// Returns an error if the session cannot be opened or the loop stops
    /// on a fatal error.
    pub async fn run(&self) -> Result<()> {
        let groups = self
            .config
            .fan_groups()
            .context("Invalid fan group configuration")?;
        for group in &groups {
            if group.is_enabled() {
                info!("{} group controls fans {:?}", group.name(), group.fans());
            } else {
                info!("{} group disabled, left to the controller", group.name());
            }
        }

        info!(
            "Connecting to management controller {}:{} over {}",
            self.config.address,
            self.config.port,
            self.config.interface_type.as_str()
        );
        let connect_timeout = self.config.command_timeout() * 2;
        let session = timeout(
            connect_timeout,
            IpmiSession::connect(
                IpmiTool::from_config(&self.config),
                FanCommandOptions::from(&self.config),
            ),
        )
        .await
        .unwrap_or_else(|_| {
            Err(FanControlError::Transport(format!(
                "no answer within {connect_timeout:?}"
            )))
        })
        .context("Failed to connect to management controller")?;

        let cancel = CancellationToken::new();
        let listener = spawn_shutdown_listener(cancel.clone());

        let mut control = ControlLoop::new(
            LoopSettings::from(&self.config),
            groups,
            &session,
            &session,
        );
        let result = control.run(&cancel).await;
        listener.abort();

        result.context("Control loop stopped")?;
        info!("Shutdown complete");
        Ok(())
    }
}

/// Cancels `cancel` on Ctrl+C or SIGTERM.
fn spawn_shutdown_listener(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!("Failed to listen for SIGTERM: {e}");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown..."),
                Err(e) => {
                    error!("Failed to listen for shutdown signal: {e}");
                    return;
                }
            },
            () = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
        }

        cancel.cancel();
    })
}

/// Builder pattern for creating Application instances.
pub struct ApplicationBuilder {
    config: Option<Config>,
    dry_run: bool,
}

impl ApplicationBuilder {
    fn new() -> Self {
        Self {
            config: None,
            dry_run: false,
        }
    }

    /// Sets the configuration for the application.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Forces dry-run mode regardless of the configuration file.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Builds the Application, validating the configuration first.
    pub fn build(self) -> Result<Application> {
        let mut config = self
            .config
            .ok_or_else(|| anyhow::anyhow!("Configuration is required"))?;
        config.dry_run |= self.dry_run;
        config.validate().context("Configuration validation failed")?;

        Ok(Application { config })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_yaml(interval: u64) -> Config {
        serde_yaml::from_str(&format!(
            "address: 10.0.0.2\n\
             trigger_interval: {interval}\n\
             cpu_fan_cfg: {{enable: true, temp_watch_list: [{{sensor_regex: CPU, temp_threshold: [50]}}], rpm_ratio: [30, 80]}}\n\
             board_fan_cfg: {{enable: false, rpm_ratio: [30]}}\n"
        ))
        .unwrap()
    }

    #[test]
    fn build_requires_config() {
        assert!(Application::builder().build().is_err());
    }

    #[test]
    fn build_rejects_invalid_config() {
        let err = Application::builder()
            .with_config(config_yaml(0))
            .build()
            .err()
            .unwrap();
        let root = err.downcast_ref::<FanControlError>().unwrap();
        assert_eq!(root.kind(), "ConfigurationError");
    }

    #[test]
    fn dry_run_flag_overrides_config() {
        let app = Application::builder()
            .with_config(config_yaml(5))
            .dry_run(true)
            .build()
            .unwrap();
        assert!(app.config.dry_run);
    }
}
