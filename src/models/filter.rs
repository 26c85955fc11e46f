//! Issue query filter

use serde::{Deserialize, Serialize};

/// Query-shaping flags applied consistently to fetching, link building and
/// message formatting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Filter {
    /// Restrict to issues in the security taxonomy
    pub only_security: bool,
    /// Restrict to issues whose triage status is `not-triaged`
    pub only_untriaged: bool,
    /// Keep only Critical, High and Medium issues
    pub only_med_high: bool,
}

impl Filter {
    /// The same filter with `only-untriaged` forced on.
    pub fn untriaged(self) -> Self {
        Self {
            only_untriaged: true,
            ..self
        }
    }

    /// Words describing the active flags, in a fixed order.
    pub fn descriptions(&self) -> Vec<&'static str> {
        let mut words = Vec::new();
        if self.only_security {
            words.push("security");
        }
        if self.only_untriaged {
            words.push("untriaged");
        }
        if self.only_med_high {
            words.push("medium/high");
        }
        words
    }
}
