//! Output formatting for reports

use console::style;
use reformar::{DeclarationStyle, ReconReport, RunReport};

/// Terminal reporter honoring quiet mode
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    /// Suppress non-error output
    pub quiet: bool,
}

impl Reporter {
    /// Create a reporter
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// Print a success line
    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{} {message}", style("✓").green().bold());
        }
    }

    /// Print a failure line to stderr
    pub fn failure(&self, message: &str) {
        eprintln!("{} {message}", style("✗").red().bold());
    }

    /// Print a warning line
    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("{} {message}", style("!").yellow().bold());
        }
    }

    /// Print an informational line
    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("  {message}");
        }
    }

    /// Render a full run report
    pub fn render_run_report(&self, report: &RunReport) {
        if report.success {
            self.success("refactoring complete; generated test passes");
        } else {
            self.failure("refactoring did not produce a passing test");
        }
        if let Some(path) = &report.generated_file {
            self.info(&format!("generated: {}", path.display()));
        }
        for file in &report.modified_files {
            self.info(&format!("modified:  {}", file.display()));
        }
        for warning in &report.warnings {
            self.warning(warning);
        }
        for error in &report.errors {
            self.failure(error);
        }
    }

    /// Render a reconnaissance report
    pub fn render_recon_report(&self, report: &ReconReport) {
        let context = &report.context;
        self.info(&format!("repository kind: {:?}", context.kind));
        match &context.page_object_dir {
            Some(dir) => self.info(&format!("page objects:    {}", dir.display())),
            None => self.warning("no page-object directory found"),
        }
        if let Some(dir) = &context.test_dir {
            self.info(&format!("tests:           {}", dir.display()));
        }
        if let Some(file) = &context.fixture_file {
            self.info(&format!("fixtures:        {}", file.display()));
        }
        self.info(&format!(
            "declaration:     {}",
            declaration_label(&report.style.declaration)
        ));

        for record in report.index.iter() {
            self.info(&format!(
                "{} — {} locator(s), {} method(s)",
                style(&record.class_name).cyan(),
                record.locators.len(),
                record.methods.len()
            ));
        }
        for (name, entry) in report.fixtures.iter() {
            self.info(&format!("fixture {name} → {}", entry.class_name));
        }
    }
}

fn declaration_label(declaration: &DeclarationStyle) -> String {
    match declaration {
        DeclarationStyle::Native => "native locator properties".to_string(),
        DeclarationStyle::Getter => "getter accessors".to_string(),
        DeclarationStyle::Wrapper { class_name } => format!("wrapper class {class_name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_labels() {
        assert_eq!(
            declaration_label(&DeclarationStyle::Native),
            "native locator properties"
        );
        assert_eq!(
            declaration_label(&DeclarationStyle::Wrapper {
                class_name: "Button".to_string()
            }),
            "wrapper class Button"
        );
    }
}
