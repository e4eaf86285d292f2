//! Storage group name matching
//!
//! A database `NAME` owns the data storage group whose name ends with
//! `NAME_D<digits>` or `NAME_DATA`, compared case-insensitively. Groups
//! matching the exclusion pattern (offload backup servers, gatekeepers)
//! are never selected.

use crate::config::MatchingConfig;
use crate::error::Result;
use regex::{Regex, RegexBuilder};

/// Compiled matching rule for one logical database name
#[derive(Debug, Clone)]
pub struct GroupMatcher {
    data: Regex,
    exclude: Regex,
}

impl GroupMatcher {
    pub fn new(config: &MatchingConfig, logical_name: &str) -> Result<Self> {
        let pattern = format!("{}{}", regex::escape(logical_name), config.data_suffix);
        let data = RegexBuilder::new(&pattern).case_insensitive(true).build()?;
        let exclude = RegexBuilder::new(&config.exclude)
            .case_insensitive(true)
            .build()?;

        Ok(Self { data, exclude })
    }

    /// Pattern used for the data group
    pub fn pattern(&self) -> &str {
        self.data.as_str()
    }

    pub fn matches(&self, group_name: &str) -> bool {
        self.data.is_match(group_name) && !self.exclude.is_match(group_name)
    }
}
