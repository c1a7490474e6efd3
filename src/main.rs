use std::fs::File;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dify_chat::api::{ChatApi, DifyApi, DifyApiOptions};
use dify_chat::core::app_store::{DifyAppItem, open_store};
use dify_chat::core::config::{self, ChatMode, CliOverrides, ResolvedConfig};
use dify_chat::tui::{self, RunOptions};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

#[derive(Parser)]
#[command(name = "dify-chat", about = "Terminal chat client for Dify apps")]
struct Args {
    /// Dify API base URL (e.g. https://api.dify.ai/v1)
    #[arg(long)]
    api_base: Option<String>,

    /// App API key
    #[arg(long)]
    api_key: Option<String>,

    /// User identifier sent with every request
    #[arg(short, long)]
    user: Option<String>,

    /// Single app from config, or several apps from the app store
    #[arg(short, long, value_enum)]
    mode: Option<ChatMode>,

    /// App id to open in multi mode
    #[arg(long)]
    app: Option<String>,

    /// Conversation id to open on startup
    #[arg(short, long)]
    conversation: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the apps available in multi mode
    Apps {
        #[command(subcommand)]
        action: AppsCommand,
    },
}

#[derive(Subcommand)]
enum AppsCommand {
    /// List configured apps
    List,
    /// Add an app
    Add {
        name: String,
        #[arg(long)]
        api_base: String,
        #[arg(long)]
        api_key: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Remove an app by id
    Remove { id: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Everything is recorded until the configured level is known
    if let Err(e) = init_logging(Path::new(LOG_FILE)) {
        eprintln!("Logging disabled: {e}");
    }

    let config = match config::load_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let resolved = config::resolve(
        &config,
        &CliOverrides {
            api_base: args.api_base.clone(),
            api_key: args.api_key.clone(),
            user: args.user.clone(),
            mode: args.mode,
        },
    );

    log::set_max_level(resolved.log_level);
    log::info!("dify-chat starting up in {:?} mode", resolved.mode);

    let result = match args.command {
        Some(Command::Apps { action }) => manage_apps(&resolved, action).await,
        None => start_chat(&resolved, args.app, args.conversation).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            log::error!("{message}");
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
    }
}

const LOG_FILE: &str = "dify-chat.log";

/// File logger at full verbosity; `log::set_max_level` narrows it later.
fn init_logging(path: &Path) -> Result<(), String> {
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let log_file =
        File::create(path).map_err(|e| format!("cannot create {}: {e}", path.display()))?;
    WriteLogger::init(LevelFilter::Trace, log_config, log_file).map_err(|e| e.to_string())
}

async fn start_chat(
    resolved: &ResolvedConfig,
    app_id: Option<String>,
    conversation: Option<String>,
) -> Result<(), String> {
    let mut options = RunOptions {
        conversation_limit: Some(resolved.conversation_limit),
        initial_conversation: conversation,
        ..Default::default()
    };

    let api: Arc<dyn ChatApi> = match resolved.mode {
        ChatMode::Single => {
            let api_key = resolved.api_key.clone().ok_or(
                "No API key configured. Set DIFY_API_KEY, pass --api-key, or add it to \
                 ~/.dify-chat/config.toml",
            )?;
            let api = DifyApi::new(DifyApiOptions {
                api_base: resolved.api_base.clone(),
                api_key,
                user: resolved.user.clone(),
            })
            .map_err(|e| e.to_string())?;
            Arc::new(api)
        }
        ChatMode::Multi => {
            let store = open_store(&resolved.store);
            let apps = store.list_apps().await.map_err(|e| e.to_string())?;
            let selected = match &app_id {
                Some(id) => apps
                    .iter()
                    .find(|app| &app.id == id)
                    .cloned()
                    .ok_or_else(|| format!("No app with id '{id}'"))?,
                None => apps.first().cloned().ok_or(
                    "No apps configured. Add one with `dify-chat apps add <name> --api-base <url> \
                     --api-key <key>`",
                )?,
            };
            log::info!("Opening app {} ({})", selected.info.name, selected.id);
            let api = DifyApi::new(selected.api_options(&resolved.user)).map_err(|e| e.to_string())?;
            options.current_app_id = Some(selected.id);
            options.apps = apps;
            Arc::new(api)
        }
    };

    tui::run(api, options).map_err(|e| e.to_string())
}

async fn manage_apps(resolved: &ResolvedConfig, action: AppsCommand) -> Result<(), String> {
    let store = open_store(&resolved.store);
    match action {
        AppsCommand::List => {
            let apps = store.list_apps().await.map_err(|e| e.to_string())?;
            if apps.is_empty() {
                println!("No apps configured.");
            }
            for app in apps {
                println!(
                    "{}  {}  {}",
                    app.id, app.info.name, app.request_config.api_base
                );
            }
        }
        AppsCommand::Add {
            name,
            api_base,
            api_key,
            description,
        } => {
            let mut app = DifyAppItem::new(name, api_base, api_key);
            app.info.description = description;
            let id = app.id.clone();
            store.add_app(app).await.map_err(|e| e.to_string())?;
            println!("Added app {id}");
        }
        AppsCommand::Remove { id } => {
            store.delete_app(&id).await.map_err(|e| e.to_string())?;
            println!("Removed app {id}");
        }
    }
    Ok(())
}
