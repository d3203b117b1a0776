use std::path::Path;

use axum::middleware;
use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use routedef::{
    adapters::{request_id_middleware, request_timing_middleware},
    config::{
        ServerConfigValidator, default_config_toml, loader::load_config, models::ServerConfig,
    },
    sample, tracing_setup,
};
use tower_http::trace::TraceLayer;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Print the route table of the sample tree
    Print {
        /// Emit the table as JSON
        #[clap(long)]
        json: bool,
    },
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Serve the sample tree (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Print { json }) => print_command(json),
        Some(Commands::Validate { config }) => validate_config_command(&config).await,
        Some(Commands::Init { config }) => init_config_command(&config).await,
        Some(Commands::Serve { config }) => serve_command(&config).await,
        None => serve_command(&args.config).await,
    }
}

fn print_command(json: bool) -> Result<()> {
    let tree = sample::route_definition();
    if json {
        let table = serde_json::to_string_pretty(&tree.table())
            .context("Failed to serialize route table")?;
        println!("{table}");
    } else {
        tree.print();
    }
    Ok(())
}

async fn serve_command(config_path: &str) -> Result<()> {
    let config = if Path::new(config_path).exists() {
        load_config(config_path).await?
    } else {
        ServerConfig::default()
    };

    tracing_setup::init_tracing_with_config(&config.logging)
        .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;

    if !Path::new(config_path).exists() {
        tracing::warn!("{config_path} not found, using default configuration");
    }
    ServerConfigValidator::validate(&config).context("Invalid configuration")?;

    let tree = sample::route_definition();
    let url_for = tree
        .create_url_fn(config.url_mode)
        .context("Failed to build reverse lookup")?;
    for entry in tree.table() {
        match url_for(&entry.name, &[]) {
            Ok(url) => tracing::debug!("{} -> {} [{}]", entry.name, url, entry.methods),
            Err(e) => tracing::warn!("{}: {}", entry.name, e),
        }
    }

    let dispatcher = tree
        .build_new_router_with(config.strict_slash)
        .context("Failed to build router")?;
    tracing::info!("Registered {} endpoint(s)", dispatcher.endpoint_count());

    let app = dispatcher
        .into_router()
        .layer(middleware::from_fn(request_timing_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    tracing::info!("Listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Validate a configuration file
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e}");
            std::process::exit(1);
        }
    };

    match ServerConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr);
            println!("   • Strict Slash: {}", config.strict_slash);
            println!("   • URL Mode: {:?}", config.url_mode);
            println!("   • Log Level: {}", config.logging.level);
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Verify listen address format (e.g., '127.0.0.1:3000')");
            println!("   • Use a tracing filter for the log level (e.g., 'info' or 'routedef=debug')");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    tokio::fs::write(path, default_config_toml())
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'routedef serve --config {config_path}' to start the server");
    Ok(())
}
