use crate::analytics::{AnalyticsAggregator, AnalyticsSummary};
use crate::error::{NotetionError, Result};
use crate::storage::SqliteStorage;
use colored::Colorize;
use prettytable::{format, row, Table};

/// Print the analytics summary as a report or as JSON
pub fn show_analytics(storage: &SqliteStorage, json: bool) -> Result<AnalyticsSummary> {
    let summary = AnalyticsAggregator::new(storage.clone()).summary()?;

    if json {
        let json =
            serde_json::to_string_pretty(&summary).map_err(NotetionError::Serialization)?;
        println!("{}", json);
        return Ok(summary);
    }

    if summary.total_sessions == 0 && summary.in_flight_sessions == 0 {
        println!("{}", "No sessions recorded yet.".yellow());
        return Ok(summary);
    }

    println!("\n{}", "Session Analytics".bold());
    println!("  Total sessions:   {}", summary.total_sessions);
    println!(
        "  Successful:       {}",
        summary.successful_sessions.to_string().green()
    );
    println!(
        "  Failed:           {}",
        summary.failed_sessions.to_string().red()
    );
    if summary.in_flight_sessions > 0 {
        println!("  In flight:        {}", summary.in_flight_sessions);
    }
    println!("  Success rate:     {:.1}%", summary.success_rate);
    println!("  Total cost:       ${:.4}", summary.total_cost);
    println!(
        "  Tokens:           {} input / {} output",
        summary.total_input_tokens, summary.total_output_tokens
    );
    println!("  Avg. processing:  {:.1}s", summary.avg_processing_time);

    if !summary.per_model_counts.is_empty() {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
        table.add_row(row!["Model".bold(), "Sessions".bold()]);
        for (model, count) in &summary.per_model_counts {
            table.add_row(row![model, count]);
        }
        println!();
        table.printstd();
    }
    println!();

    Ok(summary)
}
