//! Command line and environment configuration.
//!
//! ```bash
//! tinyserve --port 8080 --root ./public --workers 8
//! TINYSERVE_PORT=8080 TINYSERVE_ROOT=./public tinyserve
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use log::LevelFilter;

use crate::response::NotFoundStyle;

#[derive(Debug, Clone, Parser)]
#[command(name = "tinyserve")]
#[command(about = "Serves one GET request per connection from a local directory")]
#[command(version)]
pub struct Config {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1", env = "TINYSERVE_HOST")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080, env = "TINYSERVE_PORT")]
    pub port: u16,

    /// Number of connections handled at the same time
    #[arg(short, long, default_value_t = 4, env = "TINYSERVE_WORKERS",
          value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: u16,

    /// Directory request paths are resolved against
    #[arg(short, long, default_value = ".", env = "TINYSERVE_ROOT")]
    pub root: PathBuf,

    /// Seconds to wait for request bytes, 0 waits forever
    #[arg(long, default_value_t = 10, env = "TINYSERVE_READ_TIMEOUT")]
    pub read_timeout: u64,

    /// Seconds to wait on a stalled client while writing, 0 waits forever
    #[arg(long, default_value_t = 10, env = "TINYSERVE_WRITE_TIMEOUT")]
    pub write_timeout: u64,

    /// How missing files are reported
    #[arg(long, value_enum, default_value_t = NotFoundStyle::Legacy, env = "TINYSERVE_NOT_FOUND")]
    pub not_found: NotFoundStyle,

    /// Treat paths that climb out of the root as missing
    #[arg(long, env = "TINYSERVE_CONFINE")]
    pub confine: bool,

    /// Console log level
    #[arg(long, default_value_t = LevelFilter::Info, env = "TINYSERVE_LOG")]
    pub log_level: LevelFilter,
}

impl Config {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        seconds(self.read_timeout)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        seconds(self.write_timeout)
    }

    pub fn serve_options(&self) -> ServeOptions {
        ServeOptions {
            root: self.root.clone(),
            not_found: self.not_found,
            confine: self.confine,
        }
    }
}

fn seconds(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

/// What a connection handler needs to know to answer a request.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub root: PathBuf,
    pub not_found: NotFoundStyle,
    pub confine: bool,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            not_found: NotFoundStyle::default(),
            confine: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::parse_from(["tinyserve"]);
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert_eq!(config.workers, 4);
        assert_eq!(config.read_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.not_found, NotFoundStyle::Legacy);
        assert_eq!(config.log_level, LevelFilter::Info);

        let options = config.serve_options();
        assert_eq!(options.root, PathBuf::from("."));
        assert!(!options.confine);
    }

    #[test]
    fn explicit_flags() {
        let config = Config::parse_from([
            "tinyserve",
            "--host",
            "0.0.0.0",
            "-p",
            "4221",
            "--root",
            "/srv/www",
            "--read-timeout",
            "0",
            "--not-found",
            "conformant",
            "--confine",
            "--log-level",
            "debug",
        ]);
        assert_eq!(config.address(), "0.0.0.0:4221");
        assert_eq!(config.read_timeout(), None);
        assert_eq!(config.log_level, LevelFilter::Debug);

        let options = config.serve_options();
        assert_eq!(options.root, PathBuf::from("/srv/www"));
        assert_eq!(options.not_found, NotFoundStyle::Conformant);
        assert!(options.confine);
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(Config::try_parse_from(["tinyserve", "--workers", "0"]).is_err());
    }
}
