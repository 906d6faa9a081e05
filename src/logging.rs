//! Pretty-printing diagnostics to the console

use colored::Colorize;

use crate::assembler::{Diagnostic, Level};

/// Pretty-print an error message to the console
pub fn error(error_message: String) {
    let error_title = "error:".red().bold();
    eprintln!("{} {}", error_title, error_message);
}

/// Pretty-print a warning message to the console
pub fn warning(message: String) {
    let warning = "warning:".yellow().bold();
    eprintln!("{} {}", warning, message);
}

/// Pretty-print a single diagnostic record with its source location
pub fn report(diagnostic: &Diagnostic) {
    let location = format!("{}:{}:", diagnostic.file, diagnostic.line);
    match diagnostic.level {
        Level::Error => error(format!("{} {}", location, diagnostic.message)),
        Level::Warning => warning(format!("{} {}", location, diagnostic.message)),
    }
}

/// Print every collected diagnostic, errors and warnings alike
pub fn report_all(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        report(diagnostic);
    }
}
