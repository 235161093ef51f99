use std::io;

use chrono::Local;
use fern::Dispatch;
use log::LevelFilter;

/// Name of the environment variable selecting the log level.
pub const LOG_ENV: &str = "EUDCC_LOG";

fn level_from(value: Option<&str>) -> LevelFilter {
    match value {
        Some("trace") => LevelFilter::Trace,
        Some("debug") => LevelFilter::Debug,
        Some("info") => LevelFilter::Info,
        Some("warn") => LevelFilter::Warn,
        Some("error") => LevelFilter::Error,
        Some("off") => LevelFilter::Off,
        _ => LevelFilter::Info, // default if unset or unknown
    }
}

fn logging_level() -> LevelFilter {
    level_from(std::env::var(LOG_ENV).ok().as_deref())
}

/// Logs go to stderr, stdout is reserved for the decoded document.
pub fn setup_logger() {
    let level_filter = logging_level();

    if let Err(e) = Dispatch::new()
        .format(move |out, message, record| match level_filter {
            LevelFilter::Debug | LevelFilter::Trace => {
                out.finish(format_args!(
                    "[{}][{}]: {} <{}:{}>",
                    Local::now().format("%b-%d-%Y %H:%M:%S.%f"),
                    record.level(),
                    message,
                    record.file().unwrap_or("unknown_file"),
                    record.line().unwrap_or(0),
                ));
            }
            _ => {
                out.finish(format_args!("[{}]: {}", record.level(), message));
            }
        })
        .level(level_filter)
        .chain(io::stderr())
        .apply()
    {
        eprintln!("Logger initialization failed: {}", e);
    }
    log::debug!("Enabled log {}.", level_filter);
}
