//! Command-line interface parsing and dispatch.

pub mod personalities;
pub mod say;

use std::error::Error;

use clap::{Parser, Subcommand};
use tracing::error;

use crate::core::config::{api_token_from_env, Config};
use crate::ui::chat_loop::run_chat;

#[derive(Parser)]
#[command(name = "wildchat")]
#[command(version)]
#[command(about = "A terminal chat client for OpenAI-compatible streaming APIs")]
#[command(
    long_about = "Wildchat is a terminal chat client that streams replies from any \
OpenAI-compatible chat-completions endpoint.\n\n\
Environment Variables:\n\
  WILDCHAT_API_KEY  API token for the endpoint (optional)\n\
  OPENAI_API_KEY    Fallback token variable\n\
  RUST_LOG          Diagnostic verbosity (e.g. wildchat=debug)\n\n\
Controls:\n\
  Enter             Send the message\n\
  Ctrl+C            Stop a streaming reply; exit when idle\n\n\
Commands inside the chat loop:\n\
  /help             Show all slash commands\n\
  /personality <n>  Switch personality\n\
  /save, /load      Persist or restore the conversation"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to use for chat
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Base URL of the inference endpoint
    #[arg(short = 'u', long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Personality to activate at startup
    #[arg(short = 'P', long, global = true, value_name = "NAME")]
    pub personality: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive chat loop (default)
    Chat,
    /// Send a single prompt and print the streamed reply
    Say {
        /// The prompt text
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// List or edit personalities
    Personalities {
        #[command(subcommand)]
        action: Option<PersonalityAction>,
    },
}

#[derive(Subcommand)]
pub enum PersonalityAction {
    /// List personalities in the store
    List,
    /// Add a personality with free-text content
    Add {
        name: String,
        /// System prompt text (may be multiple words)
        #[arg(trailing_var_arg = true)]
        content: Vec<String>,
    },
    /// Remove a personality by name
    Remove { name: String },
    /// Show a personality's full content
    Show { name: String },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    crate::logging::init();
    install_panic_hook();
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let mut config = Config::load()?;
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(personality) = args.personality.clone() {
        config.default_personality = Some(personality);
    }

    // Read once at startup; never re-read mid-session.
    let api_token = api_token_from_env();
    let personalities_path = Config::personalities_path();

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(config, api_token, &personalities_path).await,
        Commands::Say { prompt } => {
            say::run_say(
                prompt,
                config,
                api_token,
                args.personality,
                &personalities_path,
            )
            .await
        }
        Commands::Personalities { action } => match action.unwrap_or(PersonalityAction::List) {
            PersonalityAction::List => personalities::list_personalities(&personalities_path),
            PersonalityAction::Add { name, content } => {
                personalities::add_personality(&personalities_path, name, content)
            }
            PersonalityAction::Remove { name } => {
                personalities::remove_personality(&personalities_path, &name)
            }
            PersonalityAction::Show { name } => {
                personalities::show_personality(&personalities_path, &name)
            }
        },
    }
}

/// Last-resort boundary: panics are logged before the default hook runs, so
/// unexpected failures are never silently swallowed.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        error!("unhandled panic: {info}");
        default_hook(info);
    }));
}
