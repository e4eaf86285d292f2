//! Array Command Gateway
//!
//! Executes commands against the storage-array control plane and returns
//! their exit status together with raw text and, for structured calls, a
//! parsed [`XmlDocument`].

pub mod document;
pub mod mock;
pub mod symcli;

pub use document::*;
pub use mock::*;
pub use symcli::*;

use crate::domain::ports::{CommandOutput, OutputMode};
use crate::error::{Error, Result};
use tracing::{debug, error};

/// Turn a finished process into a [`CommandOutput`], applying the
/// `must_succeed` contract shared by every gateway.
pub(crate) fn finish(
    command_line: &str,
    mode: OutputMode,
    must_succeed: bool,
    exit_code: i32,
    stdout: String,
    stderr: String,
) -> Result<CommandOutput> {
    debug!("returncode: {}", exit_code);

    if must_succeed && exit_code != 0 {
        let output = stdout + &stderr;
        error!("output: {}", output.trim());
        return Err(Error::ExternalCommand {
            command: command_line.to_string(),
            exit_code,
            output,
        });
    }

    // stderr never carries XML
    let document = match mode {
        OutputMode::Text => XmlDocument::empty(),
        OutputMode::Structured => match XmlDocument::parse(&stdout) {
            Ok(doc) => doc,
            Err(_) if exit_code != 0 => XmlDocument::empty(),
            Err(reason) => {
                return Err(Error::MalformedOutput {
                    command: command_line.to_string(),
                    reason,
                })
            }
        },
    };

    let text = stdout + &stderr;

    Ok(CommandOutput {
        exit_code,
        text,
        document,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_finish_structured_success() {
        let out = finish(
            "symsg -sid 756 list",
            OutputMode::Structured,
            true,
            0,
            "<SymCLI_ML><SG><SG_Info><name>X_DATA</name></SG_Info></SG></SymCLI_ML>".into(),
            "warning: cache stale\n".into(),
        )
        .unwrap();
        assert!(out.success());
        assert_eq!(out.document.find_all("SG/SG_Info").len(), 1);
        assert!(out.text.ends_with("warning: cache stale\n"));
    }

    #[test]
    fn test_finish_failed_lookup_returns_empty_document() {
        let out = finish(
            "symsnapvx -sid 756 list -lnsg X -linked -by_tgt",
            OutputMode::Structured,
            false,
            2,
            "No snapshot links found".into(),
            String::new(),
        )
        .unwrap();
        assert_eq!(out.exit_code, 2);
        assert!(out.document.is_empty());
    }

    #[test]
    fn test_finish_errors() {
        assert_matches!(
            finish("symcfg list", OutputMode::Text, true, 1, "boom".into(), String::new()),
            Err(Error::ExternalCommand { exit_code: 1, .. })
        );
        assert_matches!(
            finish("symcfg list", OutputMode::Structured, true, 0, "not xml".into(), String::new()),
            Err(Error::MalformedOutput { .. })
        );
    }
}
