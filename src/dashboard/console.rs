//! Line-oriented console front end for the dashboard.

use super::{Dashboard, DashboardView};
use crate::activity::LogEntry;
use crate::selection::SelectionOutcome;
use crate::store::HistoryEntry;
use std::fmt::Write as _;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const STATUS_LOG_LINES: usize = 7;
const FULL_LOG_LINES: usize = 50;

pub const HELP: &str = "\
Commands:
  status | s        show patient, tablets, last pick and recent log
  patients | p      reload and list patients
  use <n> | u <n>   switch to patient number <n>
  pick | t          pick a random tablet now and record it
  fire | f          fire the counter now with whatever it has counted
  history | h       consumption history of the current patient
  log | l           show the activity log
  help | ?          this text
  quit | q          exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Status,
    Patients,
    Use(usize),
    Pick,
    Fire,
    History,
    Log,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let mut parts = line.split_whitespace();
    let cmd = parts.next().unwrap_or("").to_lowercase();
    let arg = parts.next();

    match cmd.as_str() {
        "status" | "s" => Ok(ConsoleCommand::Status),
        "patients" | "p" => Ok(ConsoleCommand::Patients),
        "use" | "u" => {
            let raw = arg.ok_or_else(|| "usage: use <n>".to_string())?;
            raw.parse::<usize>()
                .map(ConsoleCommand::Use)
                .map_err(|_| format!("not a patient number: {}", raw))
        }
        "pick" | "trigger" | "t" => Ok(ConsoleCommand::Pick),
        "fire" | "f" => Ok(ConsoleCommand::Fire),
        "history" | "h" => Ok(ConsoleCommand::History),
        "log" | "l" => Ok(ConsoleCommand::Log),
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "q" | "exit" => Ok(ConsoleCommand::Quit),
        other => Err(format!("unknown command: {}", other)),
    }
}

fn format_log(out: &mut String, entries: &[LogEntry]) {
    for entry in entries {
        let _ = writeln!(
            out,
            "[{}] {:<6} {}",
            entry.at.with_timezone(&chrono::Local).format("%H:%M:%S"),
            entry.kind.to_string(),
            entry.message
        );
    }
}

pub fn render_outcome(outcome: &SelectionOutcome) -> String {
    match outcome {
        SelectionOutcome::NoItemsAvailable => "- (no tablets loaded)".to_string(),
        SelectionOutcome::Recorded { item, .. } => item.label.clone(),
        SelectionOutcome::RecordingFailed { item, error } => {
            format!("{} (NOT recorded: {})", item.label, error)
        }
    }
}

pub fn render_view(view: &DashboardView) -> String {
    let mut out = String::new();

    match &view.subject {
        Some(subject) => {
            let _ = writeln!(out, "Patient: {} (ID:{})", subject.name, subject.id);
        }
        None => out.push_str("Patient: -\n"),
    }

    out.push_str("Tablets:\n");
    if view.items.is_empty() {
        out.push_str("  (none)\n");
    }
    for item in &view.items {
        let _ = writeln!(out, "  {} (MID:{})", item.label, item.id);
    }

    let selected = view
        .last_outcome
        .as_ref()
        .map(render_outcome)
        .unwrap_or_else(|| "-".to_string());
    let _ = writeln!(out, "Selected: {}", selected);

    match &view.counter {
        Some(c) => {
            let _ = writeln!(
                out,
                "Counter: {}/{} (window {}s)",
                c.tally, c.threshold, c.window_secs
            );
        }
        None => out.push_str("Counter: stopped\n"),
    }

    if !view.log.is_empty() {
        out.push_str("Log:\n");
        format_log(&mut out, &view.log);
    }
    out
}

pub fn render_patients(view: &DashboardView) -> String {
    if view.subjects.is_empty() {
        return "No patients.\n".to_string();
    }
    let active = view.subject.as_ref().map(|s| s.id.as_str());
    let mut out = String::new();
    for (i, subject) in view.subjects.iter().enumerate() {
        let marker = if Some(subject.id.as_str()) == active { "*" } else { " " };
        let _ = writeln!(out, "{}{:>3}. {} (ID:{})", marker, i + 1, subject.name, subject.id);
    }
    out
}

pub fn render_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No consumption recorded.\n".to_string();
    }
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(
            out,
            "{}  {}",
            entry
                .record
                .consumed_at
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S"),
            entry.label
        );
    }
    out
}

/// Execute one command; returns the text to print and whether to exit.
pub async fn execute(dashboard: &Dashboard, command: ConsoleCommand) -> (String, bool) {
    let text = match command {
        ConsoleCommand::Status => render_view(&dashboard.view(STATUS_LOG_LINES).await),
        ConsoleCommand::Patients => match dashboard.refresh().await {
            Ok(_) => render_patients(&dashboard.view(0).await),
            Err(e) => format!("DB Error: {}\n", e),
        },
        ConsoleCommand::Use(position) => match dashboard.change_subject_by_position(position).await {
            Ok(count) => format!("Switched patient, {} tablets loaded.\n", count),
            Err(e) => format!("{}\n", e),
        },
        ConsoleCommand::Pick => {
            let outcome = dashboard.manual_trigger().await;
            format!("Selected: {}\n", render_outcome(&outcome))
        }
        ConsoleCommand::Fire => match dashboard.fire_counter().await {
            Ok(count) => format!("Counter fired with {} pending events.\n", count),
            Err(e) => format!("{}\n", e),
        },
        ConsoleCommand::History => match dashboard.history().await {
            Ok(entries) => render_history(&entries),
            Err(e) => format!("DB Error: {}\n", e),
        },
        ConsoleCommand::Log => {
            let mut out = String::new();
            format_log(&mut out, &dashboard.log().recent(FULL_LOG_LINES));
            if out.is_empty() {
                out.push_str("Log is empty.\n");
            }
            out
        }
        ConsoleCommand::Help => format!("{}\n", HELP),
        ConsoleCommand::Quit => return (String::new(), true),
    };
    (text, false)
}

/// Why the console loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// The operator typed `quit`.
    Quit,
    /// Input closed (detached stdin, `</dev/null`, service manager).
    EndOfInput,
}

/// Read commands line by line until `quit` or end of input.
pub async fn run_console<R, W>(
    dashboard: &Dashboard,
    input: R,
    mut output: W,
) -> std::io::Result<ConsoleExit>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    output.write_all(b"> ").await?;
    output.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if !line.is_empty() {
            let (text, quit) = match parse_command(line) {
                Ok(command) => execute(dashboard, command).await,
                Err(e) => (format!("{}\n{}\n", e, HELP), false),
            };
            output.write_all(text.as_bytes()).await?;
            if quit {
                output.flush().await?;
                return Ok(ConsoleExit::Quit);
            }
        }
        output.write_all(b"> ").await?;
        output.flush().await?;
    }
    output.flush().await?;
    Ok(ConsoleExit::EndOfInput)
}
