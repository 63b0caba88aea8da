//! CRI Proxy Bootstrap - Entry Point
//!
//! Points the local kubelet at the CRI proxy and makes sure the proxy container runs.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::Context;
use colored::Colorize;
use tracing::{error, info};

use criboot::app::run::{ensure_cri_proxy_with, BootstrapOutcome};
use criboot::filesys::file::File;
use criboot::logs::{init_logging, LogLevel, LogOptions};
use criboot::models::kubelet::load_kubelet_config;
use criboot::storage::settings::Settings;
use criboot::utils::{split_args, version_info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("{}", e),
        }
        return;
    }

    // Inspect a saved kubelet config and exit
    if let Some(path) = cli_args.get("show-saved") {
        if let Err(e) = show_saved(path).await {
            eprintln!("{} {:#}", "[ERROR]".red(), e);
            std::process::exit(1);
        }
        return;
    }

    let settings = match load_settings(&cli_args).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {:#}", "[ERROR]".red(), e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.json_logs,
        log_file: settings.log_file.clone(),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    let config = settings.bootstrap_config();
    info!("Running CRI proxy bootstrap with config: {:?}", config);

    match ensure_cri_proxy_with(&config, settings.bootstrap_options()).await {
        Ok(BootstrapOutcome::AlreadyConfigured) => {
            println!("{} kubelet already uses the CRI proxy", "[OK]".green());
        }
        Ok(BootstrapOutcome::Bootstrapped { container_id }) => {
            println!(
                "{} kubelet patched, CRI proxy running in container {}",
                "[SUCCESS]".green(),
                container_id
            );
            println!("Restart the kubelet to pick up the new runtime endpoint");
        }
        Ok(BootstrapOutcome::Reinstalled { container_id }) => {
            println!(
                "{} CRI proxy reinstalled in container {}",
                "[SUCCESS]".green(),
                container_id
            );
        }
        Err(e) => {
            error!("CRI proxy bootstrap failed: {}", e);
            eprintln!("{} CRI proxy bootstrap failed: {}", "[ERROR]".red(), e);
            std::process::exit(1);
        }
    }
}

/// Read the settings file, then apply command line overrides
async fn load_settings(cli_args: &HashMap<String, String>) -> anyhow::Result<Settings> {
    let mut settings = match cli_args.get("settings") {
        Some(path) => File::new(path)
            .read_json::<Settings>()
            .await
            .with_context(|| format!("reading settings file {}", path))?,
        None => Settings::default(),
    };

    if let Some(url) = cli_args.get("configz-url") {
        settings.kubelet.configz_base_url = url.clone();
    }
    if let Some(url) = cli_args.get("stats-url") {
        settings.kubelet.stats_base_url = url.clone();
    }
    if let Some(path) = cli_args.get("saved-config") {
        settings.saved_config_path = PathBuf::from(path);
    }
    if let Some(path) = cli_args.get("proxy-path") {
        settings.proxy.path = path.clone();
    }
    if let Some(raw) = cli_args.get("proxy-args") {
        settings.proxy.args = split_args(raw);
    }
    if let Some(path) = cli_args.get("proxy-socket") {
        settings.proxy.socket_path = PathBuf::from(path);
    }
    if let Some(level) = cli_args.get("log-level") {
        settings.log_level = level
            .parse::<LogLevel>()
            .map_err(anyhow::Error::msg)
            .context("parsing --log-level")?;
    }
    if let Some(path) = cli_args.get("log-file") {
        settings.log_file = Some(PathBuf::from(path));
    }
    if cli_args.contains_key("json-logs") {
        settings.json_logs = true;
    }
    if cli_args.contains_key("verify-liveness") {
        settings.verify_proxy_liveness = true;
    }
    if cli_args.contains_key("secure") {
        settings.kubelet.insecure_skip_verify = false;
    }

    Ok(settings)
}

async fn show_saved(path: &str) -> anyhow::Result<()> {
    let config = load_kubelet_config(path)
        .await
        .with_context(|| format!("loading saved kubelet config {}", path))?;

    println!("Saved kubelet config: {}", path);
    println!("  remote runtime: {}", config.uses_remote_runtime());
    println!(
        "  containerRuntime: {}",
        config.container_runtime.as_deref().unwrap_or("<unset>")
    );
    println!(
        "  dockerEndpoint: {}",
        config.docker_endpoint.as_deref().unwrap_or("<unset>")
    );
    println!(
        "  remoteRuntimeEndpoint: {}",
        config.remote_runtime_endpoint.as_deref().unwrap_or("<unset>")
    );
    println!("  other settings: {}", config.other.len());
    Ok(())
}
