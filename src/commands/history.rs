use crate::cli::HistoryCommand;
use crate::error::{NotetionError, Result};
use crate::notes::normalize_markdown;
use crate::storage::{SearchQuery, SessionStatus, SessionSummary, SessionView, SqliteStorage};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use colored::Colorize;
use prettytable::{format, Table};

/// Handle history commands
pub fn handle_history(storage: &SqliteStorage, command: HistoryCommand) -> Result<()> {
    match command {
        HistoryCommand::List { limit } => {
            let sessions = storage.list_sessions(Some(limit))?;
            print_sessions("Session History:", &sessions);
        }
        HistoryCommand::Show { id } => match storage.get_session(&id)? {
            Some(view) => print_session(storage, &view)?,
            None => println!("{}", format!("No session found for {}", id).yellow()),
        },
        HistoryCommand::Search {
            query,
            model,
            status,
            from,
            to,
            limit,
        } => {
            let query = build_query(query, model, status, from, to, limit)?;
            let sessions = storage.search(&query)?;
            print_sessions("Matching Sessions:", &sessions);
        }
        HistoryCommand::Delete { id } => {
            if storage.delete_session(&id)? {
                println!("{}", format!("Deleted session {}", id).green());
            } else {
                println!("{}", format!("No session found for {}", id).yellow());
            }
        }
    }

    Ok(())
}

/// Turn CLI search flags into a [`SearchQuery`]
///
/// `from` and `to` accept `YYYY-MM-DD` (whole day, UTC) or RFC 3339.
pub fn build_query(
    text: Option<String>,
    model: Option<String>,
    status: Option<String>,
    from: Option<String>,
    to: Option<String>,
    limit: Option<usize>,
) -> Result<SearchQuery> {
    let status = status.map(|s| s.parse::<SessionStatus>()).transpose()?;
    let from = from.map(|d| parse_date_bound(&d, false)).transpose()?;
    let to = to.map(|d| parse_date_bound(&d, true)).transpose()?;

    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(NotetionError::InvalidParameter(
                "--from must not be later than --to".to_string(),
            )
            .into());
        }
    }

    Ok(SearchQuery {
        text,
        model,
        status,
        from,
        to,
        limit,
    })
}

fn parse_date_bound(value: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        NotetionError::InvalidParameter(format!(
            "Invalid date '{}': expected YYYY-MM-DD or RFC 3339",
            value
        ))
    })?;
    let time = if end_of_day {
        NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| NotetionError::InvalidParameter(format!("Invalid date '{}'", value)))?;
    Ok(date.and_time(time).and_utc())
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn colored_status(status: SessionStatus) -> colored::ColoredString {
    match status {
        SessionStatus::Succeeded => status.as_str().green(),
        SessionStatus::Failed => status.as_str().red(),
        SessionStatus::Running => status.as_str().yellow(),
    }
}

fn print_sessions(title: &str, sessions: &[SessionSummary]) {
    if sessions.is_empty() {
        println!("{}", "No sessions found.".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Started".bold(),
        "Model".bold(),
        "Status".bold(),
        "Files".bold(),
        "Tokens".bold(),
        "Cost".bold()
    ]);

    for session in sessions {
        let started = session.started_at.format("%Y-%m-%d %H:%M").to_string();
        let tokens = format!(
            "{}{}",
            session.totals.input_tokens + session.totals.output_tokens,
            if session.totals.tokens_approximate { "~" } else { "" }
        );
        table.add_row(prettytable::row![
            short_id(&session.id).cyan(),
            started,
            session.model,
            colored_status(session.status),
            session.file_count,
            tokens,
            format!("${:.4}", session.totals.estimated_cost)
        ]);
    }

    println!("\n{}", title);
    table.printstd();
    println!();
    println!(
        "Use {} to see the files and note of a session.",
        "notetion history show <ID>".cyan()
    );
    println!();
}

fn print_session(storage: &SqliteStorage, view: &SessionView) -> Result<()> {
    let session = &view.session;
    println!("\n{} {}", "Session".bold(), session.id.cyan());
    println!("  Status:     {}", colored_status(session.status));
    println!("  Model:      {}", session.model);
    println!("  Creativity: {}", session.creativity);
    println!(
        "  Started:    {}",
        session.started_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(secs) = session.processing_time_secs {
        println!("  Duration:   {:.1}s", secs);
    }
    println!(
        "  Tokens:     {} input / {} output{}",
        session.totals.input_tokens,
        session.totals.output_tokens,
        if session.totals.tokens_approximate {
            " (approximate)"
        } else {
            ""
        }
    );
    println!("  Cost:       ${:.4}", session.totals.estimated_cost);
    if let Some(kind) = session.failure {
        println!(
            "  Failure:    {}",
            format!(
                "{}: {}",
                kind,
                session.failure_detail.as_deref().unwrap_or_default()
            )
            .red()
        );
    }

    if !view.files.is_empty() {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
        table.add_row(prettytable::row![
            "File".bold(),
            "Type".bold(),
            "Size".bold(),
            "Status".bold(),
            "Seen In".bold()
        ]);
        for file in &view.files {
            let others = storage
                .file_occurrences(&file.content_hash)?
                .into_iter()
                .filter(|o| o.session_id != session.id)
                .count();
            let status = match file.failure {
                Some(kind) => kind.to_string().red(),
                None => file.status.as_str().green(),
            };
            table.add_row(prettytable::row![
                file.name,
                file.kind,
                file.size_bytes,
                status,
                format!("{} other", others)
            ]);
        }
        println!();
        table.printstd();
    }

    if let Some(note) = &view.note {
        println!("\n{}\n", normalize_markdown(&note.content));
    }
    Ok(())
}
