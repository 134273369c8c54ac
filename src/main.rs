mod args;
mod clients;
mod config;
mod error;
mod http;
mod ip;
mod reconcile;

use clients::cloudflare::CloudflareClient;
use reconcile::Outcome;

/// User-Agent header value for HTTP requests
pub const USER_AGENT: &str = concat!("cloudflare-ddns-updater/", env!("CARGO_PKG_VERSION"));

fn init_logger(debug: bool, quiet: bool) {
    let log_level = if quiet {
        log::LevelFilter::Error
    } else if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // RUST_LOG, when set, refines the level chosen above
    env_logger::Builder::new()
        .filter_level(log_level)
        .parse_default_env()
        .init();
}

fn run(args: &args::Args) -> error::Result<Outcome> {
    let settings = config::Settings::load(args)?;
    log::debug!("Using profile '{}': {:?}", args.profile, settings.profile);

    if let Some(channels) = &settings.profile.notifications {
        let names: Vec<&str> = channels.keys().map(String::as_str).collect();
        log::debug!(
            "Notification channels configured ({}) but delivery is not supported",
            names.join(", ")
        );
    }

    let address = ip::get_public_address(settings.ip.as_deref(), &settings.web, settings.timeout)?;
    log::info!("IP address: {} (record type {})", address, address.record_type());

    let client = CloudflareClient::new(&settings.profile, &settings.server, settings.timeout);
    reconcile::reconcile(&client, &settings.profile, &address, settings.test)
}

fn main() {
    let args = args::Args::new();
    init_logger(args.debug, args.quiet);

    match run(&args) {
        Ok(outcome) => log::debug!("Finished: {:?}", outcome),
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
}
