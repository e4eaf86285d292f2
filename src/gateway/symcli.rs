//! SYMCLI Gateway
//!
//! Runs array commands as child processes. SYMCLI binaries are invoked
//! through the configured elevation prefix and binary directory; anything
//! else (remote shell helpers) runs as given.

use super::finish;
use crate::config::ArrayConfig;
use crate::domain::ports::{ArrayCommand, ArrayGateway, CommandOutput, OutputMode};
use crate::error::{Error, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

/// Option asking SYMCLI for its extended XML rendering
pub const XML_OUTPUT_ARGS: [&str; 2] = ["-output", "xml_e"];

/// Gateway backed by the locally installed SYMCLI
pub struct SymcliGateway {
    config: ArrayConfig,
}

impl SymcliGateway {
    pub fn new(config: ArrayConfig) -> Self {
        Self { config }
    }

    /// Full argv for a command, including elevation and output options
    pub fn expand(&self, command: &ArrayCommand, mode: OutputMode) -> Vec<String> {
        let mut argv = Vec::new();

        if command.is_array_tool() {
            argv.extend(self.config.elevation.iter().cloned());
            argv.push(
                self.config
                    .bin_dir
                    .join(command.program())
                    .to_string_lossy()
                    .into_owned(),
            );
        } else {
            argv.push(command.program().to_string());
        }

        argv.extend(command.arguments().iter().cloned());

        if mode == OutputMode::Structured {
            argv.extend(XML_OUTPUT_ARGS.iter().map(|s| s.to_string()));
        }

        argv
    }
}

#[async_trait]
impl ArrayGateway for SymcliGateway {
    async fn run(
        &self,
        command: &ArrayCommand,
        mode: OutputMode,
        must_succeed: bool,
    ) -> Result<CommandOutput> {
        let argv = self.expand(command, mode);
        let line = argv.join(" ");

        debug!("symcli command: {}", line);

        if self.config.dry_run && (command.is_mutating() || command.is_waiting()) {
            info!("dry run, not executing: {}", line);
            return Ok(CommandOutput::default());
        }

        let (program, args) = argv.split_first().ok_or_else(|| Error::CommandSpawn {
            command: command.to_string(),
            reason: "empty command line".into(),
        })?;

        let output = Command::new(program)
            .args(args)
            .envs(&self.config.env)
            .output()
            .await
            .map_err(|e| Error::CommandSpawn {
                command: line.clone(),
                reason: e.to_string(),
            })?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        finish(&line, mode, must_succeed, exit_code, stdout, stderr)
    }
}
