use clap::Parser;
use std::path::PathBuf;

use crate::config::DEFAULT_PROFILE;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Point a Cloudflare DNS record at this host's public IP", long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file
    pub config: PathBuf,

    /// Configuration profile to reconcile
    #[arg(long, default_value = DEFAULT_PROFILE)]
    pub profile: String,

    /// Manually specify IP address (instead of asking the IP service)
    #[arg(long)]
    pub ip: Option<String>,

    /// IP echo service URL; must answer with {"ip": "..."}
    #[arg(long)]
    pub web: Option<String>,

    /// Cloudflare API base URL
    #[arg(long)]
    pub server: Option<String>,

    /// Per-request timeout in seconds (no timeout when omitted)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Test mode - look up the record and show the update without sending it
    #[arg(long, default_value = "false")]
    pub test: bool,

    /// Debug output
    #[arg(long, default_value = "false")]
    pub debug: bool,

    /// Quiet mode - suppress all output except errors
    #[arg(long, default_value = "false")]
    pub quiet: bool,
}

impl Args {
    pub fn new() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_required() {
        assert!(Args::try_parse_from(["cloudflare-ddns-updater"]).is_err());
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["cloudflare-ddns-updater", "ddns.yaml"]).unwrap();
        assert_eq!(args.config, PathBuf::from("ddns.yaml"));
        assert_eq!(args.profile, "cloudflare");
        assert!(args.ip.is_none());
        assert!(args.timeout.is_none());
        assert!(!args.test && !args.debug && !args.quiet);
    }
}
