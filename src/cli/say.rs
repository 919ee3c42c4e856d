//! One-shot "say" command: stream a single reply to stdout and exit.

use std::error::Error;
use std::io::{self, Write};
use std::path::Path;

use crate::core::chat_stream::ChatStreamService;
use crate::core::config::Config;
use crate::core::conversation::{ConversationController, TurnOutcome};
use crate::core::personality::PersonalityStore;

pub async fn run_say(
    prompt: Vec<String>,
    config: Config,
    api_token: Option<String>,
    personality: Option<String>,
    personalities_path: &Path,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: wildchat say <prompt>");
        std::process::exit(1);
    }

    let client = config.http_client()?;
    let (service, mut rx) = ChatStreamService::new();
    let mut controller = ConversationController::new(config, api_token, client, service);

    if let Some(name) = personality {
        let store = PersonalityStore::load(personalities_path)?;
        match store.find(&name) {
            Some(personality) => controller.set_personality(personality.content.clone()),
            None => {
                eprintln!("❌ Personality '{name}' not found");
                std::process::exit(1);
            }
        }
    }

    controller.submit_user_turn(&prompt)?;

    while let Some((event, stream_id)) = rx.recv().await {
        match controller.on_event(event, stream_id) {
            Some(TurnOutcome::Fragment(text)) => {
                print!("{text}");
                io::stdout().flush()?;
            }
            Some(TurnOutcome::Finished(_)) => {
                println!();
                break;
            }
            Some(TurnOutcome::Failed(error)) => {
                eprintln!("\n❌ {error}");
                std::process::exit(1);
            }
            None => {}
        }
    }

    Ok(())
}
