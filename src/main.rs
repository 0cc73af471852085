use std::path::PathBuf;

use clap::Parser;

mod shell;

use daybook::config::{ConfigError, DaybookConfig, default_config_path};
use daybook::controller::View;
use daybook::sync::{GeminiAssist, SupabaseClient};

#[derive(Debug, Parser)]
#[command(name = "daybook", version, about = "Goals, daily plans and routine from the terminal")]
struct Cli {
    /// Config file (defaults to ~/.config/daybook/config.json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log debug messages to the journal
    #[arg(long)]
    debug: bool,

    /// View to open with: goals, planning, routine or history
    #[arg(long, value_parser = parse_view, default_value = "goals")]
    view: View,
}

fn parse_view(s: &str) -> Result<View, String> {
    View::parse(s).ok_or_else(|| format!("unknown view \"{}\"", s))
}

/// Send logs to the systemd user journal (`journalctl --user -t daybook -f`).
/// This crate logs at info (debug when enabled), everything else at warn.
fn init_logging() {
    struct FilteredJournal {
        inner: systemd_journal_logger::JournalLog,
    }

    impl log::Log for FilteredJournal {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            if metadata.target().starts_with("daybook") {
                let max = if daybook::debug_logging() { log::LevelFilter::Debug } else { log::LevelFilter::Info };
                metadata.level() <= max
            } else {
                metadata.level() <= log::LevelFilter::Warn
            }
        }
        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                self.inner.log(record);
            }
        }
        fn flush(&self) {
            self.inner.flush();
        }
    }

    let journal = match systemd_journal_logger::JournalLog::new() {
        Ok(journal) => journal.with_syslog_identifier("daybook".to_string()),
        Err(e) => {
            eprintln!("daybook: journal unavailable ({}), logging disabled", e);
            return;
        }
    };
    if log::set_boxed_logger(Box::new(FilteredJournal { inner: journal })).is_ok() {
        // Global max must be Debug so debug logs can pass through when toggled
        log::set_max_level(log::LevelFilter::Debug);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging();

    let path = match cli.config {
        Some(path) => path,
        None => default_config_path().ok_or(ConfigError::NoConfigDir)?,
    };
    let config = DaybookConfig::load(Some(&path))?;
    daybook::set_debug_logging(cli.debug || config.debug_logging);

    if !config.has_backend() {
        match DaybookConfig::write_default_if_missing(&path) {
            Ok(true) => eprintln!("daybook: wrote a config template to {}", path.display()),
            Ok(false) => {}
            Err(e) => log::warn!("Could not write config template: {}", e),
        }
        eprintln!(
            "daybook: no backend configured. Set supabase_url and supabase_anon_key in {}, \
             or {} and {}.",
            path.display(),
            daybook::config::ENV_SUPABASE_URL,
            daybook::config::ENV_SUPABASE_ANON_KEY
        );
        std::process::exit(2);
    }

    let store = SupabaseClient::new(&config)?;
    let assist = GeminiAssist::new(&config);
    if !assist.is_configured() {
        log::info!("No Gemini key, text suggestions disabled");
    }

    let mut shell = shell::Shell::new(store, assist, config.supabase_url.clone(), cli.view);
    shell.restore_session().await;
    shell.run().await;
    Ok(())
}
