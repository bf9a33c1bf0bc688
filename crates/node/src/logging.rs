use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, util::SubscriberInitExt, FmtSubscriber};

/// The workspace crates the configured level applies to. Everything else
/// (dependencies included) stays at `warn` unless `RUST_LOG` says otherwise.
const WORKSPACE_CRATES: &[&str] = &[
    "laminar_block",
    "laminar_da",
    "laminar_executor",
    "laminar_node",
    "laminar_p2p",
    "laminar_settlement",
    "laminar_store",
    "laminar_types",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Error => f.write_str("error"),
            LogLevel::Warn => f.write_str("warn"),
            LogLevel::Info => f.write_str("info"),
            LogLevel::Debug => f.write_str("debug"),
            LogLevel::Trace => f.write_str("trace"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plaintext,
    Json,
}

/// Log settings carried in [`NodeConfig`](crate::NodeConfig).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub format: LogFormat,
}

impl LoggingConfig {
    /// The filter this config stands for. An operator-set `RUST_LOG` wins
    /// over the config.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.directives()))
    }

    fn directives(&self) -> String {
        let mut directives = String::from("warn");
        for krate in WORKSPACE_CRATES {
            let _ = write!(directives, ",{krate}={}", self.level);
        }
        directives
    }
}

/// Install the node's default subscriber: non-blocking stdout writer, ANSI
/// colors only when attached to a terminal. Embedders that already run
/// their own `tracing` subscriber should skip this.
///
/// Returns the guard that flushes buffered log lines when dropped; hold it
/// for the life of the process (binding it to `_` drops it immediately).
pub fn init(config: LoggingConfig) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let builder = FmtSubscriber::builder()
        .with_env_filter(config.filter())
        .with_writer(writer)
        .with_ansi(stdout_is_terminal())
        .with_target(false);

    match config.format {
        LogFormat::Plaintext => builder.finish().init(),
        LogFormat::Json => builder.json().finish().init(),
    }

    guard
}

fn stdout_is_terminal() -> bool {
    use std::io::IsTerminal;
    std::io::stdout().is_terminal()
}
