mod cli;
use cli::{parse_cli_mode, run_agenda_mode, run_month_mode, CliMode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging();

    let cli_mode = match parse_cli_mode() {
        Ok(mode) => mode,
        Err(err) => {
            eprintln!("Error: {}", err);
            println!("Usage: assoplan [--month [YYYY/MM]] [--agenda [YYYY/MM/DD]]");
            return Ok(());
        }
    };

    match cli_mode {
        CliMode::Month(month) => run_month_mode(month).await,
        CliMode::Agenda(date) => run_agenda_mode(date).await,
    }
}

fn setup_logging() {
    let log_dir = dirs::config_dir()
        .map(|d| d.join("assoplan"))
        .unwrap_or_else(|| std::path::PathBuf::from("."));

    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, "assoplan.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .init();

    std::mem::forget(_guard);

    tracing::info!("assoplan started");
}
