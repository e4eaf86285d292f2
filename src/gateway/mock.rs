//! Scripted gateway for testing and demos.

use super::finish;
use crate::domain::ports::{ArrayCommand, ArrayGateway, CommandOutput, OutputMode};
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::debug;

/// Canned result of one command
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub exit_code: i32,
    pub stdout: String,
}

impl ScriptedResponse {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
        }
    }

    pub fn failed(exit_code: i32, stdout: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
        }
    }
}

struct Rule {
    tokens: Vec<String>,
    responses: VecDeque<ScriptedResponse>,
}

impl Rule {
    fn matches(&self, command: &ArrayCommand) -> bool {
        let tokens: Vec<&str> = self.tokens.iter().map(String::as_str).collect();
        command.contains_all(&tokens)
    }

    fn next_response(&mut self) -> ScriptedResponse {
        if self.responses.len() > 1 {
            self.responses.pop_front().unwrap_or_else(|| ScriptedResponse::ok(""))
        } else {
            self.responses
                .front()
                .cloned()
                .unwrap_or_else(|| ScriptedResponse::ok(""))
        }
    }
}

/// Gateway answering from a script instead of a real array.
///
/// A command is answered by the rule whose tokens all appear in it; when
/// several rules match, the one with the most tokens wins. A rule with a
/// sequence of responses hands them out in order and then keeps repeating
/// the last one. Commands without a rule exit with status 1.
pub struct ScriptedGateway {
    rules: Mutex<Vec<Rule>>,
    issued: Mutex<Vec<(ArrayCommand, OutputMode)>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            issued: Mutex::new(Vec::new()),
        }
    }

    /// Answer commands containing `tokens` with `response`
    pub fn on(&self, tokens: &[&str], response: ScriptedResponse) -> &Self {
        self.on_sequence(tokens, vec![response])
    }

    /// Answer commands containing `tokens` with `responses` in order
    pub fn on_sequence(&self, tokens: &[&str], responses: Vec<ScriptedResponse>) -> &Self {
        let rule = Rule {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            responses: responses.into(),
        };
        self.rules.lock().push(rule);
        self
    }

    /// Command lines issued so far, in order
    pub fn issued(&self) -> Vec<String> {
        self.issued
            .lock()
            .iter()
            .map(|(cmd, _)| cmd.to_string())
            .collect()
    }

    /// Issued command lines containing every token
    pub fn issued_matching(&self, tokens: &[&str]) -> Vec<String> {
        self.issued
            .lock()
            .iter()
            .filter(|(cmd, _)| cmd.contains_all(tokens))
            .map(|(cmd, _)| cmd.to_string())
            .collect()
    }

    /// Issued command lines that change array state
    pub fn mutating_issued(&self) -> Vec<String> {
        self.issued
            .lock()
            .iter()
            .filter(|(cmd, _)| cmd.is_mutating())
            .map(|(cmd, _)| cmd.to_string())
            .collect()
    }
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArrayGateway for ScriptedGateway {
    async fn run(
        &self,
        command: &ArrayCommand,
        mode: OutputMode,
        must_succeed: bool,
    ) -> Result<CommandOutput> {
        let line = command.to_string();
        debug!("symcli command: {}", line);

        self.issued.lock().push((command.clone(), mode));

        let response = {
            let mut rules = self.rules.lock();

            let mut best: Option<usize> = None;
            for (idx, rule) in rules.iter().enumerate() {
                if !rule.matches(command) {
                    continue;
                }
                let better = match best {
                    Some(b) => rule.tokens.len() > rules[b].tokens.len(),
                    None => true,
                };
                if better {
                    best = Some(idx);
                }
            }

            match best {
                Some(idx) => rules[idx].next_response(),
                None => ScriptedResponse::failed(1, format!("no scripted response for: {}", line)),
            }
        };

        finish(
            &line,
            mode,
            must_succeed,
            response.exit_code,
            response.stdout,
            String::new(),
        )
    }
}
