//! Runtime settings for the pricing server.
//!
//! Every flag can also be supplied through the environment (or a `.env`
//! file loaded at start-up).

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "pricing_engine", version, about = "Job pricing service for the home-services marketplace")]
pub struct Settings {
    /// Directory holding versioned rate table JSON files.
    #[arg(long, env = "PRICING_RATE_TABLE_DIR", default_value = "rate_tables")]
    pub rate_table_dir: PathBuf,

    /// Pin a rate table version instead of using the latest one.
    #[arg(long, env = "PRICING_RATE_TABLE_VERSION")]
    pub rate_table_version: Option<String>,

    #[arg(long, env = "PRICING_BIND_ADDR", default_value = "127.0.0.1:3000")]
    pub bind_addr: SocketAddr,

    /// Emit logs as JSON lines.
    #[arg(long, env = "PRICING_LOG_JSON")]
    pub log_json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_flags() {
        let settings = Settings::try_parse_from(["pricing_engine"]).unwrap();
        assert_eq!(settings.bind_addr, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(settings.rate_table_dir, PathBuf::from("rate_tables"));
    }

    #[test]
    fn flags_override_defaults() {
        let settings = Settings::try_parse_from([
            "pricing_engine",
            "--rate-table-dir",
            "/etc/pricing",
            "--rate-table-version",
            "2025-03",
            "--bind-addr",
            "0.0.0.0:8080",
            "--log-json",
        ])
        .unwrap();
        assert_eq!(settings.rate_table_dir, PathBuf::from("/etc/pricing"));
        assert_eq!(settings.rate_table_version.as_deref(), Some("2025-03"));
        assert_eq!(settings.bind_addr.port(), 8080);
        assert!(settings.log_json);
    }
}
