use std::{fs::OpenOptions, path::Path, sync::Arc};

use tracing_subscriber::{fmt, fmt::writer::MakeWriterExt, EnvFilter};

use crate::Result;

pub const LOG_FILE: &str = "stickfix.log";

/// Initialize tracing for the bot.
///
/// Logs go to stdout and, when `log_dir` is given, are also appended to
/// `<log_dir>/stickfix.log`.
pub fn init(service_name: &str, log_dir: Option<&Path>) -> Result<()> {
    // Default: info for our crates, warn for everything else.
    // Can be overridden with `RUST_LOG`.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,stickfix=info,stickfix_core=info,stickfix_telegram=info,{service_name}=info"
        ))
    });

    let builder = fmt().with_env_filter(filter).with_target(false);

    let installed = match log_dir {
        Some(dir) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(LOG_FILE))?;
            builder
                .with_ansi(false)
                .with_writer(std::io::stdout.and(Arc::new(file)))
                .try_init()
        }
        None => builder.with_ansi(true).try_init(),
    };

    // A subscriber may already be installed (tests, embedding); keep it.
    if let Err(e) = installed {
        tracing::debug!(error = %e, "tracing subscriber already installed");
    }
    Ok(())
}
