mod config;
mod core;
mod network_tools;
mod report;
mod servers;
mod status_page;

use crate::config::ConfigManager;
use crate::core::{init_logger, LogLevel};
use crate::core::logging::{log_debug, log_error, log_info_with_metadata};
use crate::network_tools::{probe_all, PingProber};
use crate::servers::XEOVO_SERVERS;
use clap::Parser;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{self, IsTerminal, Write};
use std::time::Duration;

const MODULE: &str = "main";

/// Pings every Xeovo VPN gateway once and shows its latency next to the load
/// reported on the provider's status page.
#[derive(Parser, Debug, Default, PartialEq)]
#[command(version, long_about = None)]
struct CliOptions {
    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Disable coloured output
    #[arg(long)]
    no_color: bool,

    /// Ping all gateways at the same time
    #[arg(long)]
    parallel: bool,

    /// Wait for a keypress before exiting
    #[arg(long)]
    pause: bool,

    /// Read settings from a JSON file
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<String>,
}

// Restores the terminal even if reading the key fails.
struct RawModeGuard;

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            eprintln!("Failed to disable raw mode: {:?}", e);
        }
    }
}

fn wait_for_keypress() -> io::Result<()> {
    if !io::stdin().is_terminal() {
        return Ok(());
    }

    print!("\nPress any key to exit...");
    io::stdout().flush()?;

    enable_raw_mode()?;
    let _guard = RawModeGuard;
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                break;
            }
        }
    }
    println!();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = CliOptions::parse();

    let mut config_manager = ConfigManager::new(options.config_path.as_deref())?;
    {
        let config = config_manager.get_mut();
        if options.verbose {
            config.logging.enabled = true;
            config.logging.level = "debug".to_string();
        }
        if options.no_color {
            config.ui.color = false;
        }
        if options.parallel {
            config.network.parallel_probes = true;
        }
        if options.pause {
            config.ui.pause_on_exit = true;
        }
    }
    let config = config_manager.get();

    if config.logging.enabled {
        let level = LogLevel::from_name(&config.logging.level).unwrap_or(LogLevel::Warning);
        init_logger(
            config.logging.file_path.as_deref(),
            config.logging.console_output,
            level,
        );
    }
    log_debug(MODULE, &config_manager.get_config_info());

    if let Err(e) = servers::validate(XEOVO_SERVERS) {
        log_error(MODULE, &format!("Server table is malformed: {}", e));
        return Err(e);
    }

    let loads = status_page::fetch_server_load_data(&config.network);

    let prober = PingProber::new(Duration::from_secs(config.network.ping_timeout_seconds));
    let probes = probe_all(&prober, XEOVO_SERVERS, config.network.parallel_probes);

    let rows = report::build_rows(XEOVO_SERVERS, &probes, &loads);
    let color = config.ui.color && io::stdout().is_terminal();

    println!("\n{}\n", report::TABLE_TITLE);
    println!("{}", report::render_table(&rows, color));

    let reachable = probes.iter().filter(|p| p.latency.is_reachable()).count();
    log_info_with_metadata(
        MODULE,
        "Run complete",
        serde_json::json!({
            "servers": rows.len(),
            "reachable": reachable,
            "load_entries": loads.len(),
            "parallel": config.network.parallel_probes,
            "rows": rows,
        }),
    );

    if config.ui.pause_on_exit {
        wait_for_keypress()?;
    }

    Ok(())
}
