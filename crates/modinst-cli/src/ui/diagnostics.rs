//! Diagnostic rendering.

use crossterm::style::Stylize;
use modinst_core::{Diagnostic, Diagnostics, Severity};

/// Render one diagnostic in the console style: a coloured heading followed
/// by the location and indented detail.
pub fn render(diag: &Diagnostic) -> String {
    let heading = match diag.severity {
        Severity::Error => format!("Error: {}", diag.summary).red().bold().to_string(),
        Severity::Warning => format!("Warning: {}", diag.summary)
            .yellow()
            .bold()
            .to_string(),
    };

    let mut out = heading;
    if let Some(subject) = &diag.subject {
        out.push_str(&format!("\n  on {subject}").dark_grey().to_string());
    }
    for line in diag.detail.lines() {
        out.push_str("\n  ");
        out.push_str(line);
    }
    out
}

/// Print every diagnostic to stderr, separated by blank lines.
pub fn print(diags: &Diagnostics) {
    for diag in diags {
        eprintln!("\n{}", render(diag));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modinst_core::types::SourceRange;

    #[test]
    fn test_render_includes_location_and_detail() {
        let subject = SourceRange::new("root/module.toml", 3, 10);
        let diag = Diagnostic::error("Unreadable module directory", "The directory x could not be read.")
            .with_subject(Some(&subject));

        let rendered = render(&diag);
        assert!(rendered.contains("Error: Unreadable module directory"));
        assert!(rendered.contains("root/module.toml:3,10"));
        assert!(rendered.ends_with("  The directory x could not be read."));
    }
}
