use std::{
    env,
    io::Write,
    process::{Command, Stdio},
};

use anyhow::Context;
use chrono::{Datelike, Local, NaiveDate};

use assoplan::app::PlannerState;
use assoplan::storage::cache::Cache;
use assoplan::storage::config::Config;
use assoplan::sync::{HttpPlanningClient, SyncEngine, SyncError};
use assoplan::ui::{build_month_grid, MonthGrid};

#[derive(Clone, Copy)]
pub enum CliMode {
    Month(NaiveDate),
    Agenda(NaiveDate),
}

pub fn parse_cli_mode() -> Result<CliMode, String> {
    let mut month = None;
    let mut agenda = None;
    let mut args = env::args().skip(1).peekable();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--month" => {
                let target = if let Some(next) = args.peek() {
                    if !next.starts_with("--") {
                        let month_str = args.next().expect("peeked value must exist");
                        parse_month(&month_str)?
                    } else {
                        current_month()
                    }
                } else {
                    current_month()
                };
                month = Some(target);
            }
            "--agenda" => {
                let target = if let Some(next) = args.peek() {
                    if !next.starts_with("--") {
                        let date_str = args.next().expect("peeked value must exist");
                        NaiveDate::parse_from_str(&date_str, "%Y/%m/%d")
                            .map_err(|_| format!("Invalid date '{}'. Use YYYY/MM/DD.", date_str))?
                    } else {
                        Local::now().date_naive()
                    }
                } else {
                    Local::now().date_naive()
                };
                agenda = Some(target);
            }
            "--help" => {
                println!("Usage: assoplan [--month [YYYY/MM]] [--agenda [YYYY/MM/DD]]");
                std::process::exit(0);
            }
            _ => return Err(format!("Unknown argument: {}", arg)),
        }
    }

    if let Some(date) = agenda {
        Ok(CliMode::Agenda(date))
    } else {
        Ok(CliMode::Month(month.unwrap_or_else(current_month)))
    }
}

fn current_month() -> NaiveDate {
    let today = Local::now().date_naive();
    today.with_day(1).unwrap_or(today)
}

fn parse_month(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(&format!("{}/01", value), "%Y/%m/%d")
        .map_err(|_| format!("Invalid month '{}'. Use YYYY/MM.", value))
}

pub async fn run_month_mode(month: NaiveDate) -> anyhow::Result<()> {
    let config = Config::load_or_create().context("loading configuration")?;
    let client = HttpPlanningClient::new(config.server.base_url.clone());
    let mut engine = SyncEngine::new(config, client);

    let from_cache = hydrate(&mut engine).await?;

    let today = Local::now().date_naive();
    let grid = build_month_grid(month.year(), month.month(), today, engine.state());
    let mut text = format_month_text(&grid, engine.state());
    if from_cache {
        text.push_str("\n(offline: showing the last cached snapshot)\n");
    }
    display_with_pager(&text)
}

pub async fn run_agenda_mode(date: NaiveDate) -> anyhow::Result<()> {
    let config = Config::load_or_create().context("loading configuration")?;
    let client = HttpPlanningClient::new(config.server.base_url.clone());
    let mut engine = SyncEngine::new(config, client);

    let from_cache = hydrate(&mut engine).await?;

    let mut events: Vec<_> = engine
        .state()
        .events_on_day(date)
        .into_iter()
        .cloned()
        .collect();
    events.sort_by_key(|event| event.start);

    let mut lines = Vec::new();
    lines.push(format!("Agenda – {}", date.format("%A, %B %d, %Y")));
    lines.push(String::new());

    if events.is_empty() {
        lines.push("No events scheduled.".to_string());
    }

    for event in &events {
        lines.push(format!(
            "- {}-{}  {}",
            event.start.format("%H:%M"),
            event.end.format("%H:%M"),
            event.title
        ));
        if let Some(description) = &event.description
            && !description.is_empty()
        {
            lines.push(format!("    {}", description));
        }

        let invitations = engine.load_invitations(event.id).await?;
        for view in invitations {
            lines.push(format!("    invited: {} ({})", view.association_name, view.status));
        }
    }

    if from_cache {
        lines.push(String::new());
        lines.push("(offline: showing the last cached snapshot)".to_string());
    }

    display_with_pager(&lines.join("\n"))
}

/// Pulls the server state, caching it for offline runs; when the server is
/// unreachable, falls back to the cached snapshot and reports it.
async fn hydrate(engine: &mut SyncEngine<HttpPlanningClient>) -> anyhow::Result<bool> {
    match engine.refresh().await {
        Ok(()) => {
            if let Err(error) = save_snapshot(engine.state()) {
                tracing::warn!("Could not cache the snapshot: {}", error);
            }
            Ok(false)
        }
        Err(SyncError::Api(error)) if error.is_transport() => {
            tracing::warn!("Server unreachable ({}); loading the cached snapshot", error);
            let cache = open_cache()?;
            cache.load_snapshot(engine.state_mut())?;
            Ok(true)
        }
        Err(error) => Err(error.into()),
    }
}

fn open_cache() -> anyhow::Result<Cache> {
    let path = Config::cache_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = rusqlite::Connection::open(&path)?;
    let cache = Cache::new(conn);
    cache.initialize()?;
    Ok(cache)
}

fn save_snapshot(state: &PlannerState) -> anyhow::Result<()> {
    let cache = open_cache()?;
    cache.store_snapshot(state)?;
    Ok(())
}

fn format_month_text(grid: &MonthGrid, state: &PlannerState) -> String {
    let mut lines = Vec::new();

    let title = NaiveDate::from_ymd_opt(grid.year, grid.month, 1)
        .map(|d| d.format("%B %Y").to_string())
        .unwrap_or_else(|| format!("{}-{:02}", grid.year, grid.month));
    lines.push(title);
    lines.push(String::new());
    lines.push("  Mon  Tue  Wed  Thu  Fri  Sat  Sun".to_string());

    for week in &grid.weeks {
        let mut row = String::new();
        for cell in &week.days {
            let marker = if !cell.in_month {
                '.'
            } else if cell.is_today {
                '*'
            } else if cell.has_events {
                '+'
            } else {
                ' '
            };
            row.push_str(&format!(" {:>3}{}", cell.day(), marker));
        }
        lines.push(row);
    }

    let badged: Vec<_> = grid.cells().filter(|c| c.has_events).collect();
    if !badged.is_empty() {
        lines.push(String::new());
        for cell in badged {
            for badge in &cell.badges {
                let time = state
                    .find_event(badge.event_id)
                    .map(|e| format!("{}-{}", e.start.format("%H:%M"), e.end.format("%H:%M")))
                    .unwrap_or_default();
                lines.push(format!(
                    "  {} {:<11} {} [{}]",
                    cell.date.format("%b %d"),
                    time,
                    badge.title,
                    badge.color
                ));
            }
        }
    }

    lines.push(String::new());
    lines.join("\n")
}

fn display_with_pager(text: &str) -> anyhow::Result<()> {
    let pager_value = env::var("PAGER").unwrap_or_else(|_| "less".to_string());
    let mut parts = pager_value.split_whitespace();
    let cmd = match parts.next() {
        Some(c) => c,
        None => {
            print!("{text}");
            return Ok(());
        }
    };
    let args: Vec<&str> = parts.collect();

    match Command::new(cmd)
        .args(&args)
        .stdin(Stdio::piped())
        .spawn()
    {
        Ok(mut child) => {
            if let Some(stdin) = child.stdin.as_mut() {
                stdin.write_all(text.as_bytes())?;
            }
            let _ = child.wait();
        }
        Err(_) => {
            print!("{text}");
        }
    }

    Ok(())
}
