//! User-facing diagnostics collected during a module walk.
//!
//! Problems a user can act on (bad version constraints, unreadable module
//! directories, failed downloads) do not abort the walk. They are collected
//! here and reported once, in aggregate, when installation finishes.

use std::fmt;

use modinst_schema::SourceRange;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Installation of the affected module did not fully succeed.
    Error,
    /// Something looks wrong but installation was not affected.
    Warning,
}

/// A single reported problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    /// Declaration the problem is attributed to, when there is one.
    pub subject: Option<SourceRange>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            subject: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            subject: None,
        }
    }

    /// Attach the declaration this diagnostic refers to.
    pub fn with_subject(mut self, subject: Option<&SourceRange>) -> Self {
        self.subject = subject.cloned();
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
        };
        write!(f, "{label}: {}", self.summary)?;
        if let Some(subject) = &self.subject {
            write!(f, "\n\n  on {subject}")?;
        }
        if !self.detail.is_empty() {
            write!(f, "\n\n{}", self.detail)?;
        }
        Ok(())
    }
}

/// An ordered collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.0.push(diag);
    }

    /// Append every diagnostic from `other`.
    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    /// Summaries of all diagnostics, mostly useful in tests.
    pub fn summaries(&self) -> Vec<&str> {
        self.0.iter().map(|d| d.summary.as_str()).collect()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diag) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n\n")?;
            }
            write!(f, "{diag}")?;
        }
        Ok(())
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diag: Diagnostic) -> Self {
        Self(vec![diag])
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_are_not_errors() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::warning("Odd", ""));
        assert!(!diags.has_errors());

        diags.push(Diagnostic::error("Broken", "details"));
        assert!(diags.has_errors());
        assert_eq!(diags.summaries(), vec!["Odd", "Broken"]);
    }

    #[test]
    fn test_display_includes_subject() {
        let subject = SourceRange::new("root/module.toml", 4, 10);
        let diag = Diagnostic::error("Unreadable module directory", "The directory x could not be read.")
            .with_subject(Some(&subject));
        let rendered = diag.to_string();
        assert!(rendered.starts_with("Error: Unreadable module directory"));
        assert!(rendered.contains("on root/module.toml:4,10"));
        assert!(rendered.ends_with("could not be read."));
    }

    #[test]
    fn test_display_joins_diagnostics() {
        let mut diags = Diagnostics::new();
        assert_eq!(diags.to_string(), "");

        diags.push(Diagnostic::error("First", ""));
        diags.push(Diagnostic::warning("Second", "more"));
        assert_eq!(diags.to_string(), "Error: First\n\nWarning: Second\n\nmore");
    }
}
