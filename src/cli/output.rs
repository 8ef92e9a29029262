//! CLI output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use crate::website::Website;

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print a warning message
pub fn warn(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

/// Ask for confirmation
pub fn confirm(message: &str) -> bool {
    use std::io::Write;
    print!("{} {} [y/N] ", "?".cyan(), message);
    let _ = std::io::stdout().flush();
    let mut input = String::new();
    if std::io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Print a table of websites
pub fn print_website_table(websites: &[Website]) {
    if websites.is_empty() {
        info("No websites found. Create one with 'sitectl create --domain <domain>'");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Alias").fg(Color::Cyan),
            Cell::new("Primary Domain").fg(Color::Cyan),
            Cell::new("Type").fg(Color::Cyan),
            Cell::new("Protocol").fg(Color::Cyan),
            Cell::new("Domains").fg(Color::Cyan),
            Cell::new("Created").fg(Color::Cyan),
        ]);

    for website in websites {
        let domains = website
            .domains
            .iter()
            .map(|d| format!("{}:{}", d.domain, d.port))
            .collect::<Vec<_>>()
            .join(", ");

        table.add_row(vec![
            Cell::new(&website.alias),
            Cell::new(&website.primary_domain),
            Cell::new(format!("{:?}", website.website_type).to_lowercase()),
            Cell::new(format!("{}", website.protocol)),
            Cell::new(domains),
            Cell::new(website.created_at.format("%Y-%m-%d %H:%M").to_string()),
        ]);
    }

    println!("{}", table);
}
