//! Startup banner

use super::config::AppConfig;
use super::constants::{APP_NAME, TRIGGER_ROUTE};

/// Host shown in URLs; wildcard binds are displayed as localhost
fn display_host(host: &str) -> &str {
    match host {
        "0.0.0.0" | "::" | "[::]" => "localhost",
        other => other,
    }
}

/// Print the startup banner with trigger URL and forwarding targets
pub fn print_banner(config: &AppConfig, config_source: &str) {
    let base = format!(
        "http://{}:{}",
        display_host(&config.server.host),
        config.server.port
    );
    const W: usize = 12;

    println!();
    println!(
        "  \x1b[1m\x1b[36m{}\x1b[0m \x1b[90mv{}\x1b[0m",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m \x1b[36m{}{}\x1b[0m",
        "Trigger:", base, TRIGGER_ROUTE
    );
    println!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m \x1b[36m{}/api/v1/health\x1b[0m",
        "Health:", base
    );
    println!(
        "  \x1b[90m➜  {:<W$} {} ({})\x1b[0m",
        "New Relic:", config.new_relic.region, config.new_relic.metrics_url
    );
    println!("  \x1b[90m➜  {:<W$} {}\x1b[0m", "Config:", config_source);
    println!();
}
