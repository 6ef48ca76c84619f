//! Diagnostic codes: `E` followed by a three-digit number.
//!
//! The hundreds digit names the stage that reported the problem; `E1xx`
//! codes come from the parser and `E2xx` codes from semantic analysis.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The code of a diagnostic, e.g. `E203`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DiagnosticCode(u16);

impl DiagnosticCode {
    /// Creates the code `E<number>`.
    pub const fn new(number: u16) -> Self {
        Self(number)
    }

    /// The numeric part of the code.
    pub fn number(self) -> u16 {
        self.0
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:03}", self.0)
    }
}

impl Serialize for DiagnosticCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DiagnosticCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.strip_prefix('E')
            .and_then(|digits| digits.parse().ok())
            .map(DiagnosticCode)
            .ok_or_else(|| D::Error::custom(format!("invalid diagnostic code {text:?}")))
    }
}
