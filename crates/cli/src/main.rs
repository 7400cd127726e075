use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "WhatsApp to Gemini webhook relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the webhook gateway. Requires GEMINI_API_KEY (or generation.apiKey in the config file).
    Gateway {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from PORT, config, or 3000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Load the configuration and report what is missing, without serving.
    Check {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("relay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Gateway { config, port }) => {
            if let Err(e) = run_gateway(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Check { config }) => {
            if let Err(e) = run_check(config) {
                log::error!("check failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_gateway(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{} (config {})",
        config.gateway.bind,
        config.gateway.port,
        path.display()
    );
    lib::gateway::run_gateway(config).await
}

fn run_check(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    use lib::config;

    let (cfg, path) = config::load_config(config_path)?;
    println!("config: {}", path.display());
    println!("listen: {}:{}", cfg.gateway.bind, cfg.gateway.port);
    println!("webhook path: {}", cfg.channels.whatsapp.webhook_path);
    println!("model: {}", config::resolve_gemini_model(&cfg));

    let set = |present: bool| if present { "set" } else { "missing" };
    println!("generation api key: {}", set(config::resolve_gemini_api_key(&cfg).is_some()));
    println!("verify token: {}", set(config::resolve_verify_token(&cfg).is_some()));
    println!(
        "whatsapp access token: {}",
        set(config::resolve_whatsapp_access_token(&cfg).is_some())
    );
    println!(
        "whatsapp phone number id: {}",
        set(config::resolve_phone_number_id(&cfg).is_some())
    );

    if config::resolve_gemini_api_key(&cfg).is_none() {
        anyhow::bail!("generation API key is required (GEMINI_API_KEY)");
    }
    Ok(())
}
