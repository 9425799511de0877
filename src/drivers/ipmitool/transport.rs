//! Process transport running one `ipmitool` invocation per command.

use async_trait::async_trait;
use log::trace;

use super::protocol::{Command, classify_failure};
use crate::{
    config::{Config, InterfaceType},
    error::{FanControlError, Result},
};

/// Executes one ipmitool command and returns its stdout.
#[async_trait]
pub trait IpmiTransport: Send + Sync + 'static {
    async fn execute(&self, command: &Command) -> Result<String>;
}

/// Spawns the `ipmitool` binary for every command.
///
/// The password is handed over through `IPMI_PASSWORD` (`-E`) so it never
/// shows up in the process list.
#[derive(Clone)]
pub struct IpmiTool {
    program: String,
    interface: InterfaceType,
    address: String,
    port: u16,
    username: String,
    password: String,
    target_address: Option<u8>,
}

impl std::fmt::Debug for IpmiTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpmiTool")
            .field("interface", &self.interface)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl IpmiTool {
    pub fn from_config(config: &Config) -> Self {
        Self {
            program: "ipmitool".to_string(),
            interface: config.interface_type,
            address: config.address.clone(),
            port: config.port,
            username: config.username.clone(),
            password: config.password.clone(),
            target_address: config.target_address,
        }
    }

    /// Overrides the binary name, e.g. for a wrapper script.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Connection options preceding every command.
    pub fn connection_args(&self) -> Vec<String> {
        let mut args = vec!["-I".to_string(), self.interface.as_str().to_string()];

        if self.interface.is_remote() {
            args.extend([
                "-H".to_string(),
                self.address.clone(),
                "-p".to_string(),
                self.port.to_string(),
                "-U".to_string(),
                self.username.clone(),
                "-E".to_string(),
            ]);
        }
        if let Some(target) = self.target_address {
            args.extend(["-t".to_string(), format!("0x{target:02x}")]);
        }

        args
    }
}

#[async_trait]
impl IpmiTransport for IpmiTool {
    async fn execute(&self, command: &Command) -> Result<String> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(self.connection_args())
            .args(command.to_args())
            .env("IPMI_PASSWORD", &self.password)
            .kill_on_drop(true);

        trace!("Executing: {} {:?}", self.program, command.to_args());

        let output = cmd.output().await.map_err(|e| {
            FanControlError::Transport(format!("failed to execute {}: {e}", self.program))
        })?;

        if !output.status.success() {
            return Err(classify_failure(
                command,
                &String::from_utf8_lossy(&output.stderr),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
