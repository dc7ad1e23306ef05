use crate::{AddressError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A validated host name: LDH labels joined by dots, no empty labels,
/// no label longer than 63 scalars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Domain(String);

fn is_valid_label(label: &str) -> bool {
    if label.is_empty() || label.len() > 63 {
        return false;
    }
    if label.starts_with('-') || label.ends_with('-') {
        return false;
    }
    label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl Domain {
    /// Best-effort form: `None` rather than an error on invalid input.
    pub fn try_new(s: &str) -> Option<Self> {
        Self::from_str(s).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Domain {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s.len() > 253 {
            return Err(AddressError::InvalidDomain);
        }
        if !s.split('.').all(is_valid_label) {
            return Err(AddressError::InvalidDomain);
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for Domain {
    type Error = AddressError;
    fn try_from(s: String) -> Result<Self> {
        Self::from_str(&s)
    }
}

impl From<Domain> for String {
    fn from(d: Domain) -> String {
        d.0
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.write_str(&self.0)
    }
}
