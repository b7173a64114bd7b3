use std::{
    fmt::Display,
    fs::OpenOptions,
    io::{self, Write},
    path::Path,
    sync::Mutex,
};

use tracing::error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive for the given verbosity: 0 for INFO, 1 for DEBUG, 2+ for TRACE.
///
/// Only events from the blockzip crates pass the filter.
pub fn filter_directive(verbose: u8) -> String {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    format!("blockzip={},blockzip_cli={}", level, level)
}

/// Initialize tracing with the specified verbosity level and output format.
///
/// Events go to standard output, or are appended to `log_file` when one is given. File output
/// never carries ANSI colors.
///
/// # Arguments
/// * `json` - If true, output logs in JSON format; otherwise, use human-readable format.
/// * `verbose` - Verbosity level: 0 for INFO, 1 for DEBUG, 2+ for TRACE.
/// * `log_file` - Optional file receiving the events instead of standard output.
///
/// # Examples
/// ```rust,no_run
/// init_tracing(false, 0, None)?; // INFO level, human-readable
/// init_tracing(true, 1, Some(Path::new("blockzip.log")))?; // DEBUG level, JSON, to a file
/// ```
pub fn init_tracing(json: bool, verbose: u8, log_file: Option<&Path>) -> io::Result<()> {
    let filter = EnvFilter::new(filter_directive(verbose));
    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let writer = Mutex::new(file);
            if json {
                registry
                    .with(fmt::layer().json().flatten_event(true).with_writer(writer))
                    .init();
            }
            else {
                registry
                    .with(fmt::layer().with_ansi(false).with_writer(writer))
                    .init();
            }
        },
        None if json => {
            registry
                .with(fmt::layer().json().flatten_event(true))
                .init();
        },
        None => registry.with(fmt::layer()).init(),
    }
    Ok(())
}

/// Report the error that ends the process.
///
/// Goes through tracing once a subscriber is installed. Before that, for instance when the log
/// file cannot be opened, the message is written to `fallback` instead.
pub fn report_fatal<W: Write>(err: &dyn Display, fallback: &mut W) {
    if tracing::dispatcher::has_been_set() {
        error!("{}", err);
    }
    else {
        let _ = writeln!(fallback, "blockzip: {}", err);
    }
}
