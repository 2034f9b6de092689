// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use clap::{builder::ValueParser, Parser};
use std::{collections::HashSet, path::PathBuf, sync::LazyLock};

#[cfg(not(test))]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::parse);

#[cfg(test)]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::new_for_test);

#[derive(Debug, Parser)]
#[clap(
    name = "mailblast",
    about = "A campaign dispatch engine that fans stored campaigns out into rendered,
    tracked, rate-limited, provider-routed send jobs and drives them to completion.",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Settings {
    /// mailblast log level (default: "info")
    #[clap(
        long,
        default_value = "info",
        env,
        help = "Set the log level for mailblast"
    )]
    pub mailblast_log_level: String,

    #[clap(
        long,
        default_value = "false",
        env,
        help = "Write logs to a rolling daily file instead of stdout"
    )]
    pub mailblast_log_to_file: bool,

    #[clap(
        long,
        default_value = "true",
        env,
        help = "Enable ANSI colors in log output"
    )]
    pub mailblast_ansi_logs: bool,

    #[clap(
        long,
        default_value = "./logs",
        env,
        help = "Directory for rolling log files when file logging is enabled"
    )]
    pub mailblast_log_dir: PathBuf,

    #[clap(
        long,
        default_value = "7",
        env,
        help = "Maximum number of rotated server log files to keep"
    )]
    pub mailblast_max_server_log_files: usize,

    /// The IP address that the node binds to, in IPv4 format (e.g., 192.168.1.1).
    #[clap(
        long,
        env,
        default_value = "0.0.0.0",
        help = "The IP address that the HTTP server binds to, in IPv4 format (e.g., 192.168.1.1).",
        value_parser = ValueParser::new(|s: &str| {
            if s.parse::<std::net::Ipv4Addr>().is_err() {
                return Err("The bind IP address must be a valid IPv4 address.".to_string());
            }
            Ok(s.to_string())
        })
    )]
    pub mailblast_bind_ip: Option<String>,

    /// mailblast HTTP port (default: 15830)
    #[clap(
        long,
        default_value = "15830",
        env,
        help = "Set the HTTP port for mailblast"
    )]
    pub mailblast_http_port: i32,

    /// Base URL under which the tracking endpoints are reachable from recipients.
    #[clap(
        long,
        default_value = "http://localhost:15830",
        env,
        help = "Set the public base URL used to build open/click tracking links"
    )]
    pub mailblast_public_url: String,

    /// CORS allowed origins (default: "*")
    #[clap(
        long,
        default_value = "*",
        env,
        help = "Set the allowed CORS origins (comma-separated list, e.g., \"https://example.com, https://another.com\")",
        value_parser = ValueParser::new(|s: &str| -> Result<HashSet<String>, String> {
            let set: HashSet<String> = s.split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
            Ok(set)
        })
    )]
    pub mailblast_cors_origins: HashSet<String>,

    /// CORS max age in seconds (default: 86400)
    #[clap(
        long,
        default_value = "86400",
        env,
        help = "Set the CORS max age in seconds"
    )]
    pub mailblast_cors_max_age: i32,

    #[clap(
        long,
        default_value = "10",
        env,
        help = "Default cap on jobs claimed per scheduling pass when a queue does not set its own"
    )]
    pub mailblast_max_concurrent_sends: usize,

    #[clap(
        long,
        default_value = "5",
        env,
        help = "Pause between scheduling passes of a sending queue, in seconds"
    )]
    pub mailblast_batch_interval_seconds: u64,

    #[clap(
        long,
        default_value = "30",
        env,
        help = "Transport timeout for provider sends, in seconds"
    )]
    pub mailblast_send_timeout_seconds: u64,
}

impl Settings {
    #[cfg(test)]
    pub fn new_for_test() -> Self {
        Self {
            mailblast_log_level: "info".into(),
            mailblast_log_to_file: false,
            mailblast_ansi_logs: false,
            mailblast_log_dir: PathBuf::from("./logs"),
            mailblast_max_server_log_files: 7,
            mailblast_bind_ip: None,
            mailblast_http_port: 15830,
            mailblast_public_url: "http://localhost:15830".into(),
            mailblast_cors_origins: ["*".to_string()].into_iter().collect(),
            mailblast_cors_max_age: 86400,
            mailblast_max_concurrent_sends: 10,
            mailblast_batch_interval_seconds: 0,
            mailblast_send_timeout_seconds: 5,
        }
    }
}
