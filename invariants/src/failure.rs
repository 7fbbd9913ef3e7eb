//! A failing assertion and everything needed to reproduce it.

use crate::{Config, Entry, Report};
use std::fmt::{self, Debug, Display};

/// An assertion that failed during a run, with everything needed to reproduce it.
///
/// Replaying `trace` against freshly constructed state and invoking the assertion `test` with
/// `witness` reproduces the failure (see [Regression](crate::Regression)).
#[derive(Clone, Debug)]
pub struct Failure<I, W> {
    /// Name of the validator that invoked the assertion.
    pub validator: String,

    /// Name of the failing assertion.
    pub test: String,

    /// Exact arguments the assertion failed with.
    pub witness: W,

    /// Description of the most recently reproduced failure.
    pub description: String,

    /// Operations that lead to the failure (minimized once shrunk).
    pub trace: Vec<Entry<I>>,

    /// Configuration of the failing iteration.
    pub config: Config,

    /// Outcome of shrinking, once attempted.
    pub shrink: Option<Report>,
}

impl<I: Debug, W: Debug> Display for Failure<I, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({:?}) failed in validator {}: {} (seed {}/{}, {} operations",
            self.test,
            self.witness,
            self.validator,
            self.description,
            self.config.seed_prefix,
            self.config.seed_number,
            self.trace.len()
        )?;
        if let Some(report) = &self.shrink {
            write!(f, ", shrunk from {}", report.original)?;
        }
        write!(f, ")")?;
        for entry in &self.trace {
            write!(f, "\n  {}({:?})", entry.name, entry.input)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let failure = Failure {
            validator: "top".to_string(),
            test: "same_at".to_string(),
            witness: 0usize,
            description: "mismatch".to_string(),
            trace: vec![
                Entry {
                    name: "push".to_string(),
                    input: vec![7u32],
                },
                Entry {
                    name: "peek".to_string(),
                    input: vec![],
                },
            ],
            config: Config::default().with_seed("abc", 3),
            shrink: Some(Report {
                original: 9,
                ..Default::default()
            }),
        };
        assert_eq!(
            failure.to_string(),
            "same_at(0) failed in validator top: mismatch (seed abc/3, 2 operations, shrunk from 9)\n  push([7])\n  peek([])"
        );
    }
}
