use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use web_dispatch::config::{GatewayConfig, ResolverMode};

/// Web Dispatch - dynamic request dispatcher for microservice web apps
#[derive(Parser)]
#[command(name = "web-dispatch", version, about)]
struct Cli {
    /// Path to configuration file (.hcl)
    #[arg(short, long, default_value = "dispatch.hcl")]
    config: String,

    /// Listen address (e.g., 0.0.0.0:8082)
    #[arg(short, long, env = "MICRO_WEB_ADDRESS")]
    address: Option<String>,

    /// Namespace this instance serves
    #[arg(long, env = "MICRO_WEB_NAMESPACE")]
    namespace: Option<String>,

    /// Resolver: path or subdomain
    #[arg(long, env = "MICRO_WEB_RESOLVER")]
    resolver: Option<ResolverMode>,

    /// Service type the dashboard lists (default: web)
    #[arg(long = "type", env = "MICRO_WEB_TYPE")]
    service_type: Option<String>,

    /// Login page anonymous browser requests are redirected to
    #[arg(long, env = "MICRO_AUTH_LOGIN_URL")]
    auth_login_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file without starting the dispatcher
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long, default_value = "dispatch.hcl")]
        config: String,
    },
}

impl Cli {
    /// Flags and environment win over the file
    fn apply(&self, config: &mut GatewayConfig) {
        if let Some(address) = &self.address {
            config.address = address.clone();
        }
        if let Some(namespace) = &self.namespace {
            config.namespace = namespace.clone();
        }
        if let Some(resolver) = self.resolver {
            config.resolver = resolver;
        }
        if let Some(service_type) = &self.service_type {
            config.service_type = service_type.clone();
        }
        if let Some(login_url) = &self.auth_login_url {
            config.auth.login_url = Some(login_url.clone());
        }
    }
}

#[tokio::main]
async fn main() -> web_dispatch::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Validate { config: config_path }) = &cli.command {
        return validate_config(config_path).await;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    tracing::info!("Web Dispatch v{}", env!("CARGO_PKG_VERSION"));

    let mut config = if std::path::Path::new(&cli.config).exists() {
        tracing::info!(config = cli.config, "Loading configuration");
        GatewayConfig::from_file(&cli.config).await?
    } else {
        tracing::warn!("Config file not found, using defaults");
        GatewayConfig::default()
    };
    cli.apply(&mut config);

    let gateway = web_dispatch::Gateway::new(config)?;
    gateway.start().await?;

    if let Some(addr) = gateway.local_addr() {
        tracing::info!(address = %addr, state = %gateway.state(), "Dispatcher ready, press Ctrl+C to stop");
    }

    gateway.wait_for_shutdown().await;

    Ok(())
}

/// Validate a configuration file and print diagnostics
async fn validate_config(path: &str) -> web_dispatch::Result<()> {
    if !std::path::Path::new(path).exists() {
        eprintln!("✗ Config file not found: {}", path);
        std::process::exit(1);
    }

    let config = match GatewayConfig::from_file(path).await {
        Ok(c) => {
            println!("✓ Config parsed successfully ({})", path);
            c
        }
        Err(e) => {
            eprintln!("✗ Parse error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("✗ Validation error: {}", e);
        std::process::exit(1);
    }

    println!("✓ Configuration is valid");
    println!();
    println!("  Address:     {}", config.address);
    println!("  Namespace:   {}", config.namespace);
    println!("  Resolver:    {}", config.resolver);
    if let Some(prefix) = &config.service_prefix {
        println!("  Prefix:      {}", prefix);
    }
    if let Some(base) = config.base_domain() {
        println!("  Base domain: {}", base);
    }
    println!("  Services:    {}", config.directory.services.len());
    for (name, svc) in &config.directory.services {
        println!("    - {} → {}", name, svc.addresses.join(", "));
    }
    if let Some(discovery) = &config.directory.discovery {
        println!("  Discovery:   {} seeds", discovery.seeds.len());
    }
    println!(
        "  Auth:        {} ({:?}, {} rules)",
        if config.auth.enabled { "enabled" } else { "disabled" },
        config.auth.inspector,
        config.auth.rules.len()
    );

    Ok(())
}
