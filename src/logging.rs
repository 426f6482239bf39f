//! Log output setup for the binary.

use std::io;
use std::path::Path;

use anyhow::Context;

/// Send log records to stderr at `level`, and to `log_file` at debug level
/// when one is given.
pub fn init_logging(level: log::LevelFilter, log_file: Option<&Path>) -> anyhow::Result<()> {
    let dispatch = fern::Dispatch::new().format(|out, message, record| {
        out.finish(format_args!(
            "{}[{}][{}] {}",
            chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
            record.target(),
            record.level(),
            message
        ))
    });

    let dispatch = match log_file {
        Some(path) => dispatch
            .chain(
                fern::Dispatch::new()
                    .level(log::LevelFilter::Debug)
                    .chain(
                        fern::log_file(path)
                            .with_context(|| format!("cannot open log file {}", path.display()))?,
                    ),
            )
            .chain(fern::Dispatch::new().level(level).chain(io::stderr())),
        None => dispatch.level(level).chain(io::stderr()),
    };
    dispatch.apply().context("logger already initialised")
}
