/// CLI module for command-line interface logic.
mod cli;
/// Commands module for subcommand implementations.
mod commands;
/// Logging module for setting up tracing.
mod logging;

fn main() {
    if let Err(e) = cli::run() {
        logging::report_fatal(&e, &mut std::io::stderr());
        std::process::exit(1);
    }
}
