//! Display normalization for generated notes
//!
//! Models do not always follow the requested Markdown bullets. This rewrites
//! the common deviations before notes are printed or written to a file. The
//! stored note is never modified.

use regex::Regex;
use std::sync::OnceLock;

fn term_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\s*- )([A-Z][^:*\n]*?):").unwrap())
}

fn indent_for(leading_spaces: usize) -> &'static str {
    match leading_spaces {
        0..=1 => "",
        2..=3 => "  ",
        _ => "    ",
    }
}

/// Rewrites a note into consistent Markdown lists
///
/// - `•`, `◦`, `▪` bullets become `- `, `  - ` and `    - `
/// - `-item` becomes `- item`, indented by its original nesting
/// - a capitalized `Term:` at the start of a bullet becomes `**Term**:`
///
/// # Examples
///
/// ```
/// use notetion::notes::normalize_markdown;
///
/// let notes = normalize_markdown("• Sampling: random draws\n◦ detail");
/// assert_eq!(notes, "- **Sampling**: random draws\n  - detail");
/// ```
pub fn normalize_markdown(notes: &str) -> String {
    notes
        .lines()
        .map(normalize_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn normalize_line(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let leading = line.len() - line.trim_start().len();

    let bullet = if let Some(rest) = trimmed.strip_prefix('•') {
        Some(format!("- {}", rest.trim()))
    } else if let Some(rest) = trimmed.strip_prefix('◦') {
        Some(format!("  - {}", rest.trim()))
    } else if let Some(rest) = trimmed.strip_prefix('▪') {
        Some(format!("    - {}", rest.trim()))
    } else if trimmed.starts_with("- ") {
        Some(format!("{}{}", indent_for(leading), trimmed))
    } else if let Some(rest) = trimmed.strip_prefix('-').filter(|r| !r.starts_with('-')) {
        Some(format!("{}- {}", indent_for(leading), rest.trim()))
    } else {
        None
    };

    match bullet {
        Some(bullet) => term_pattern().replace(&bullet, "$1**$2**:").into_owned(),
        None => line.trim_end().to_string(),
    }
}
