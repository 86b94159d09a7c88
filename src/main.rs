use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vigia::config::{Config, ConfigError};
use vigia::{Vigia, VigiaConfig};

#[derive(Parser)]
#[command(name = "vigia")]
#[command(
    about = "A transparent TCP relay that follows the Redis Sentinel primary"
)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Vigia Team")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay
    Run {
        /// Path to configuration file (defaults are used when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Local address to listen on
        #[arg(long)]
        listen: Option<String>,
        /// Sentinel address
        #[arg(long)]
        sentinel: Option<String>,
        /// Name of the monitored primary group
        #[arg(long)]
        master: Option<String>,
    },
    /// Generate an example configuration file
    Config {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            listen,
            sentinel,
            master,
        } => {
            let config = load_run_config(config, listen, sentinel, master)?;
            run_vigia(config)?;
        }
        Commands::Config { output } => {
            generate_config(output)?;
        }
        Commands::Validate { config } => {
            validate_config(config)?;
        }
        Commands::Version => {
            show_version();
        }
    }

    Ok(())
}

fn load_run_config(
    path: Option<PathBuf>,
    listen: Option<String>,
    sentinel: Option<String>,
    master: Option<String>,
) -> Result<Config> {
    let mut config = match &path {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::default(),
    };

    if let Some(listen) = listen {
        config.server.listen_addr = listen;
    }
    if let Some(sentinel) = sentinel {
        config.sentinel.addr = sentinel;
    }
    if let Some(master) = master {
        config.sentinel.master_name = master;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn run_vigia(config: Config) -> Result<()> {
    init_logging(&config)?;

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(threads) = config.server.worker_threads {
        builder.worker_threads(threads);
    }
    let runtime = builder
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(async move {
        info!("Starting vigia v{}", env!("CARGO_PKG_VERSION"));

        let vigia = Vigia::bind(VigiaConfig::from(&config))
            .await
            .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;

        let shutdown = vigia.shutdown_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received interrupt, shutting down");
                shutdown.cancel();
            }
        });

        vigia.run().await.context("Relay failed")?;
        Ok::<(), anyhow::Error>(())
    })
}

fn generate_config(output: PathBuf) -> Result<()> {
    println!("Generating configuration file: {:?}", output);

    Config::create_example_config(&output).context("Failed to generate config")?;

    println!("Configuration file generated successfully!");
    println!("Edit the file to match your environment and run:");
    println!("  vigia run --config {:?}", output);

    Ok(())
}

fn validate_config(config_path: PathBuf) -> Result<()> {
    println!("Validating configuration file: {:?}", config_path);

    match Config::load_from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration file is valid");
            println!("  Listen address: {}", config.server.listen_addr);
            println!("  Sentinel: {}", config.sentinel.addr);
            println!("  Master name: {}", config.sentinel.master_name);
            println!("  Poll interval: {}ms", config.sentinel.poll_interval_ms);
        }
        Err(e) => {
            eprintln!("✗ Configuration file validation failed:");
            match &e {
                ConfigError::IoError(msg) => eprintln!("  File error: {}", msg),
                ConfigError::ParseError(msg) => eprintln!("  Parse error: {}", msg),
                ConfigError::ValidationError(msg) => eprintln!("  Validation error: {}", msg),
                ConfigError::SerializeError(msg) => eprintln!("  Serialization error: {}", msg),
            }
            return Err(e.into());
        }
    }

    Ok(())
}

fn show_version() {
    println!("vigia v{}", env!("CARGO_PKG_VERSION"));
    println!("A transparent TCP relay that follows the Redis Sentinel primary");
    println!();
    println!("Target: {}", std::env::consts::ARCH);
    println!();
    println!("Features:");
    println!("  • Sentinel polling with automatic failover detection");
    println!("  • Byte-transparent relay to the current primary");
    println!("  • Stale connections dropped on primary change");
}

fn init_logging(config: &Config) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match config.logging.format.as_str() {
        "json" => subscriber.json().try_init(),
        _ => subscriber.try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized at level: {}", config.logging.level);
    Ok(())
}
