mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use hf_core::config::Config;
use std::path::Path;

/// Effective configuration: file (or defaults), then environment.
fn load_config(config_path: Option<&Path>) -> Config {
    let mut config = Config::load_or_default(config_path);
    config.apply_env();
    config
}

async fn start_server(host: Option<String>, port: Option<u16>, config_path: Option<&Path>) -> Result<()> {
    let mut config = load_config(config_path);

    // CLI flags win over config file and environment.
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting hlsforge {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Cache directory {}, retention {}h",
        config.jobs.cache_dir.display(),
        config.jobs.retention_hours
    );

    hf_server::start(config).await?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise default based on the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "hlsforge=trace,hf_server=debug,hf_jobs=trace,hf_av=debug,hf_core=debug,tower_http=debug"
                .to_string()
        } else {
            "hlsforge=info,hf_server=info,hf_jobs=info,hf_av=info,hf_core=info,tower_http=info"
                .to_string()
        }
    });

    tracing_subscriber::fmt().with_env_filter(&env_filter).init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("hlsforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = load_config(config_path);
    let tools = hf_av::ToolRegistry::discover(&config.tools);
    let mut all_ok = true;

    for tool in tools.check_all() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
        Ok(())
    } else {
        anyhow::bail!("ffmpeg and ffprobe are both required to run jobs")
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let mut config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let contents = std::fs::read_to_string(p)
                .with_context(|| format!("failed to read {}", p.display()))?;
            Config::from_json(&contents)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };
    config.apply_env();

    println!("✓ Configuration is valid");
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Auth enabled: {}", config.auth.enabled());
    println!("  Max concurrent jobs: {}", config.jobs.ceiling());
    println!("  Cache dir: {}", config.jobs.cache_dir.display());
    println!("  HW accel: {}", config.jobs.hw_accel);
    println!(
        "  Retention: {}h (sweep every {}s)",
        config.jobs.retention_hours, config.jobs.cleanup_interval_secs
    );

    for warning in config.validate() {
        println!("  ⚠ {warning}");
    }

    Ok(())
}
