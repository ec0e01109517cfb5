mod admin;
mod console;
mod export;
mod http_client;
mod import;
mod model;
mod registry;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use admin::AdminClient;
use admin::types::CredentialInput;
use clap::Parser;
use console::{Console, Notice};
use model::arg::{Args, Command};
use model::config::Config;
use registry::CredentialRegistry;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| Config::default_config_path().to_string());
    let mut config = Config::load(&config_path).unwrap_or_else(|e| {
        tracing::error!("Failed to load config: {}", e);
        std::process::exit(1);
    });
    tracing::debug!("Config file: {:?}", config.config_path());

    // Command line overrides
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(api_key) = &args.api_key {
        config.admin_api_key = Some(api_key.clone());
    }

    // Empty string is treated as not configured
    let api_key = config.api_key().map(str::to_string).unwrap_or_else(|| {
        tracing::error!("adminApiKey not set (config file or --api-key)");
        std::process::exit(1);
    });

    let client = AdminClient::new(&config, &api_key).unwrap_or_else(|e| {
        tracing::error!("Failed to create admin client: {}", e);
        std::process::exit(1);
    });

    let masked: String = api_key.chars().take(api_key.chars().count() / 2).collect();
    tracing::debug!("Admin API: {} (key {}***)", config.admin_base_url(), masked);

    let registry = Arc::new(CredentialRegistry::new(Arc::new(client)));

    // Exit explicitly: a pending stdin read would otherwise hold the runtime open
    let ok = run(args.command, &config, registry).await;
    std::process::exit(if ok { 0 } else { 1 });
}

/// Execute one command; returns `false` if anything failed
async fn run(command: Command, config: &Config, registry: Arc<CredentialRegistry>) -> bool {
    let default_page_size = config.effective_page_size();

    let notices = match command {
        Command::List { page, page_size } => {
            let mut console = Console::new(registry, page, page_size.unwrap_or(default_page_size));
            match console.load_page().await {
                Ok(listing) => {
                    print!("{}", console::render_listing(&listing, console.selection()));
                    Vec::new()
                }
                Err(e) => vec![console::load_failure(&e)],
            }
        }
        Command::Watch { page, page_size } => {
            let mut console = Console::new(registry, page, page_size.unwrap_or(default_page_size));
            let every = Duration::from_secs(config.refresh_interval_secs.max(1));
            tracing::info!("Refreshing every {}s, type h for help, q or Ctrl+C to stop", every.as_secs());

            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl+C: {}", e);
                }
            };
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            console
                .watch(every, input, shutdown, |frame| println!("{}", frame))
                .await;
            Vec::new()
        }
        command => {
            let mut console = Console::new(registry, 1, default_page_size);
            dispatch_mutation(command, config, &mut console).await
        }
    };

    let mut ok = true;
    for notice in &notices {
        if notice.is_error() {
            eprintln!("{}", notice);
            ok = false;
        } else {
            println!("{}", notice.message());
        }
    }
    ok
}

async fn dispatch_mutation(command: Command, config: &Config, console: &mut Console) -> Vec<Notice> {
    match command {
        Command::Enable { id } => vec![console.set_disabled(id, false).await],
        Command::Disable { id } => vec![console.set_disabled(id, true).await],
        Command::Priority { id, priority } => vec![console.set_priority(id, priority).await],
        Command::Reset { id } => vec![console.reset_failure_count(id).await],
        Command::Balance { id } => vec![console.balance(id).await],
        Command::Add {
            refresh_token,
            auth_method,
            client_id,
            client_secret,
            priority,
            region,
        } => {
            let input = CredentialInput {
                refresh_token,
                auth_method: auth_method.as_str().to_string(),
                client_id,
                client_secret,
                priority,
                region,
            };
            vec![console.add_credential(&input).await]
        }
        Command::Delete { id } => vec![console.delete_credential(id).await],
        Command::Import { file } => console.import_file(Path::new(&file)).await,
        Command::BatchDelete { ids } => {
            for id in ids {
                console.selection_mut().set_selected(id, true);
            }
            console.batch_delete_selected().await
        }
        Command::Export { format, output_dir } => {
            let dir = output_dir
                .as_deref()
                .map(Path::new)
                .unwrap_or_else(|| config.effective_export_dir());
            vec![console.export(format.into(), dir).await]
        }
        Command::List { .. } | Command::Watch { .. } => Vec::new(),
    }
}
