//! Post-hoc safety gates: no formatting is safer than wrong formatting.
//!
//! Both gates reject wholesale; a rejected attempt yields an empty edit
//! set and leaves the document untouched.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Location-free diagnostic identity, as compared by the diagnostics gate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: String,
    pub severity: Severity,
    pub message: String,
}

/// Compiler front-end for the composite document, used only to compare
/// diagnostics before and after formatting.
pub trait DiagnosticsProvider {
    fn diagnostics(&self, text: &str) -> Vec<Diagnostic>;
}

/// True when formatting changed nothing but whitespace.
pub fn content_preserved(before: &str, after: &str) -> bool {
    let significant = |text: &str| {
        text.chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
    };
    significant(before) == significant(after)
}

/// True when the diagnostics multiset (ignoring locations) is unchanged.
pub fn diagnostics_preserved(
    provider: &dyn DiagnosticsProvider,
    before: &str,
    after: &str,
) -> bool {
    let mut old = provider.diagnostics(before);
    let mut new = provider.diagnostics(after);
    old.sort();
    new.sort();
    old == new
}
