//! CLI parser.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "kvbot")]
#[command(about = "Telegram command bot with a local key/value store", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file name: a path, or a name looked up as `<name>.toml` in `.` and `./config`.
    #[arg(long, default_value = "config")]
    pub config: String,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR). RUST_LOG overrides it when set.
    #[arg(long = "log-level", default_value = "INFO")]
    pub log_level: String,
}
