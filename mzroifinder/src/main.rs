use std::io;
use std::path::{Path, PathBuf};

use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mzroifinder::{MZRoiFinder, MZRoiFinderError};

fn configure_log(log_file: Option<&Path>) -> io::Result<Option<WorkerGuard>> {
    let stderr_layer = fmt::layer()
        .compact()
        .with_timer(fmt::time::ChronoLocal::rfc_3339())
        .with_writer(io::stderr)
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        );

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let file_name = path.file_name().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} does not name a file", path.display()),
                )
            })?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
            let layer = fmt::layer()
                .with_ansi(false)
                .with_timer(fmt::time::ChronoLocal::rfc_3339())
                .with_writer(writer)
                .with_filter(
                    EnvFilter::builder()
                        .with_default_directive(tracing::Level::DEBUG.into())
                        .from_env_lossy(),
                );
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(guard)
}

fn load_config(args: MZRoiFinder) -> Result<MZRoiFinder, MZRoiFinderError> {
    let config_file: Option<PathBuf> = args.config_file.clone();
    let mut config = Figment::from(Serialized::defaults(args)).merge(Toml::file("mzroifinder.toml"));
    if let Some(path) = config_file {
        config = config.merge(Toml::file_exact(path));
    }
    config = config.merge(Env::prefixed("MZROIFINDER_"));
    Ok(config.extract()?)
}

fn main() -> Result<(), MZRoiFinderError> {
    let args = MZRoiFinder::parse();
    let finder = load_config(args)?;
    let _guard = configure_log(finder.log_file.as_deref())?;

    match toml::to_string_pretty(&finder) {
        Ok(text) => debug!("Configuration:\n{text}"),
        Err(e) => warn!("Failed to render configuration: {e}"),
    }

    finder.main()?;
    Ok(())
}
