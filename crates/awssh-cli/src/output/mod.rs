//! Output formatting utilities for the CLI
//!
//! Tables for targets and profiles, plus colored status messages. Messages
//! go to stderr so they never mix with the remote shell's output.

use tabled::{settings::Style, Table, Tabled};

use awssh_core::Target;

/// Format targets as a numbered table
///
/// Row numbers start at 1 and match what the selection prompt accepts.
pub fn format_targets(targets: &[Target]) -> String {
    if targets.is_empty() {
        return "No running instances".to_string();
    }

    #[derive(Tabled)]
    struct TargetRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "INSTANCE ID")]
        id: String,
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "ZONE")]
        zone: String,
    }

    let rows: Vec<TargetRow> = targets
        .iter()
        .enumerate()
        .map(|(i, t)| TargetRow {
            index: i + 1,
            id: t.id.to_string(),
            name: t.name.clone().unwrap_or_else(|| "-".to_string()),
            zone: t.placement.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format profile names as a numbered table
pub fn format_profiles(profiles: &[String]) -> String {
    if profiles.is_empty() {
        return "No profiles with role_arn".to_string();
    }

    #[derive(Tabled)]
    struct ProfileRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "PROFILE")]
        name: String,
    }

    let rows: Vec<ProfileRow> = profiles
        .iter()
        .enumerate()
        .map(|(i, name)| ProfileRow {
            index: i + 1,
            name: name.clone(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr with red coloring for error feedback to the user.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow with a warning symbol prefix
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan with an info symbol prefix
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
