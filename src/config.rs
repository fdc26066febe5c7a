use std::{fs::read_to_string, net::SocketAddr, str::FromStr};

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Overlay {
    ///
    /// The address and port the overlay listener binds to.
    ///
    #[serde(default = "Overlay::listen")]
    pub listen: SocketAddr,
    ///
    /// external address
    ///
    /// The address other peers use to reach this node. Needed when the
    /// listen address is not what the outside world sees; defaults to the
    /// bound address.
    ///
    #[serde(default)]
    pub external: Option<SocketAddr>,
    ///
    /// root address
    ///
    /// The address of the network root. Leave unset to run this process
    /// as the root itself.
    ///
    #[serde(default)]
    pub root: Option<SocketAddr>,
}

impl Overlay {
    fn listen() -> SocketAddr {
        "127.0.0.1:5356".parse().unwrap()
    }
}

impl Default for Overlay {
    fn default() -> Self {
        Self {
            listen: Self::listen(),
            external: None,
            root: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" => Self::Warn,
            "error" => Self::Error,
            _ => return Err(format!("unknown log level: {value}")),
        })
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Log {
    ///
    /// log level
    ///
    /// An enum representing the available verbosity levels of the logger.
    ///
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub overlay: Overlay,
    #[serde(default)]
    pub log: Log,
}

#[derive(Parser, Debug)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    ///
    /// Specify the configuration file path
    ///
    /// Example: canopy-server --config /etc/canopy/config.json
    ///
    #[arg(long, short)]
    config: Option<String>,
}

impl Config {
    ///
    /// Load configure from config file and command line parameters.
    ///
    /// If no configuration file path is specified the default
    /// configuration is used: a root peer on the loopback interface.
    ///
    pub fn load() -> Result<Self> {
        Ok(match Cli::parse().config {
            Some(path) => serde_json5::from_str(&read_to_string(&path)?)?,
            None => Self::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_client_config() {
        let config: Config = serde_json5::from_str(
            r#"{
                overlay: {
                    listen: "127.0.0.1:31315",
                    root: "127.0.0.1:5356",
                },
                log: { level: "debug" },
            }"#,
        )
        .unwrap();

        assert_eq!(config.overlay.listen.port(), 31315);
        assert_eq!(config.overlay.root.unwrap().port(), 5356);
        assert!(matches!(config.log.level, LogLevel::Debug));
    }

    #[test]
    fn defaults_to_a_loopback_root() {
        let config: Config = serde_json5::from_str("{}").unwrap();

        assert!(config.overlay.root.is_none());
        assert_eq!(config.overlay.listen, "127.0.0.1:5356".parse().unwrap());
    }
}
