//! Convergence Polling
//!
//! Waiting is delegated to the array tool: a policy renders its
//! `-i <secs> [-c <count>]` options and a single blocking `verify` call
//! either converges or fails.

use crate::domain::ports::{ArrayCommand, ArrayGateway, OutputMode};
use crate::error::{Error, Result};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// How long the array tool keeps re-checking a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPolicy {
    /// Check every `interval`, at most `count` times
    Bounded { interval: Duration, count: u32 },
    /// Check every `interval` until converged or the tool errors
    Unbounded { interval: Duration },
}

impl PollPolicy {
    pub fn interval(&self) -> Duration {
        match self {
            PollPolicy::Bounded { interval, .. } | PollPolicy::Unbounded { interval } => *interval,
        }
    }

    /// Number of checks before giving up, `None` if unbounded
    pub fn max_attempts(&self) -> Option<u32> {
        match self {
            PollPolicy::Bounded { count, .. } => Some(*count),
            PollPolicy::Unbounded { .. } => None,
        }
    }

    /// Wait options understood by `symsnapvx verify` and `symrdf verify`
    pub fn tool_args(&self) -> Vec<String> {
        let mut args = vec!["-i".to_string(), self.interval().as_secs().to_string()];
        if let PollPolicy::Bounded { count, .. } = self {
            args.push("-c".to_string());
            args.push(count.to_string());
        }
        args
    }
}

impl fmt::Display for PollPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tool_args().join(" "))
    }
}

/// Run a verify command until the array reports convergence.
///
/// A failing bounded wait is turned into the caller's timeout error; a
/// failing unbounded wait means the tool itself gave up and is reported
/// as [`Error::ExternalCommand`].
pub async fn converge<F>(
    gateway: &dyn ArrayGateway,
    command: &ArrayCommand,
    policy: PollPolicy,
    on_timeout: F,
) -> Result<()>
where
    F: FnOnce(u32) -> Error,
{
    let output = gateway
        .run(&command.clone().waiting(), OutputMode::Text, false)
        .await?;
    debug!("verify output: {}", output.text.trim());

    if output.success() {
        return Ok(());
    }

    match policy.max_attempts() {
        Some(attempts) => Err(on_timeout(attempts)),
        None => Err(Error::ExternalCommand {
            command: command.to_string(),
            exit_code: output.exit_code,
            output: output.text,
        }),
    }
}
