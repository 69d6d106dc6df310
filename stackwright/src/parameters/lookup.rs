//! The `@<stack>.<output>` cross-stack reference grammar.
//!
//! ```text
//! lookup := '@' stack '.' output
//! stack  := one or more characters, shortest match
//! output := one or more characters
//! ```
//!
//! The stack part ends at the first `.` that is preceded by at least one
//! character and followed by at least one more, so `@net.Vpc.Id` names the
//! output `Vpc.Id` of stack `net`.

use serde::{Deserialize, Serialize};

/// A parsed cross-stack output reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLookup {
    /// Stack whose outputs are consulted.
    pub stack: String,
    /// Output name.
    pub output: String,
}

impl OutputLookup {
    /// Parses `raw`, returning `None` when it is a plain value.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let rest = raw.strip_prefix('@')?;
        let (split, _) = rest
            .char_indices()
            .skip(1)
            .find(|&(i, c)| c == '.' && i + 1 < rest.len())?;
        Some(Self {
            stack: rest[..split].to_string(),
            output: rest[split + 1..].to_string(),
        })
    }
}

impl std::fmt::Display for OutputLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}.{}", self.stack, self.output)
    }
}
