//! Action-type filtering.
//!
//! Patterns are regular expressions; a list is joined with `|` and matched
//! anywhere in the action type, so any single pattern matching is enough.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::action::ActionRecord;
use crate::error::BridgeError;

/// Filter lists as they appear in configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blacklist: Option<Vec<String>>,
}

impl FilterConfig {
    pub fn whitelist<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            whitelist: Some(patterns.into_iter().map(Into::into).collect()),
            blacklist: None,
        }
    }

    pub fn blacklist<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            whitelist: None,
            blacklist: Some(patterns.into_iter().map(Into::into).collect()),
        }
    }

    pub fn compile(&self) -> Result<Filters, BridgeError> {
        Ok(Filters {
            whitelist: compile_list("whitelist", self.whitelist.as_deref())?,
            blacklist: compile_list("blacklist", self.blacklist.as_deref())?,
        })
    }
}

fn compile_list(list: &'static str, patterns: Option<&[String]>) -> Result<Option<Regex>, BridgeError> {
    patterns
        .map(|patterns| {
            Regex::new(&patterns.join("|")).map_err(|source| BridgeError::InvalidFilter { list, source })
        })
        .transpose()
}

/// Compiled filter lists.
#[derive(Clone, Debug)]
pub struct Filters {
    whitelist: Option<Regex>,
    blacklist: Option<Regex>,
}

/// Whether `record` should be hidden from the remote client.
///
/// Records without an action type are never filtered. Whitelist and
/// blacklist are checked independently; either one can suppress.
pub fn is_filtered(record: Option<&ActionRecord>, filters: &Filters) -> bool {
    let Some(action_type) = record.and_then(ActionRecord::action_type) else {
        return false;
    };
    let not_whitelisted = filters
        .whitelist
        .as_ref()
        .is_some_and(|re| !re.is_match(action_type));
    let blacklisted = filters
        .blacklist
        .as_ref()
        .is_some_and(|re| re.is_match(action_type));
    not_whitelisted || blacklisted
}
