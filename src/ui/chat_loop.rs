//! Interactive line-oriented chat loop.
//!
//! The loop is the single consumer of the stream channel: fragments are
//! printed as they arrive and conversation state is mutated only here, never
//! on the worker task. `Ctrl+C` cancels an in-flight response; pressed while
//! idle, it exits.

use std::error::Error;
use std::io::{self, Write};
use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::core::chat_stream::ChatStreamService;
use crate::core::config::Config;
use crate::core::conversation::{ConversationController, SubmitError, TurnOutcome};
use crate::core::personality::PersonalityStore;
use crate::core::transcript;

const HELP_TEXT: &str = "Commands:
  /help                 Show this help
  /personalities        List personalities from the store
  /personality <name>   Switch the system prompt to a personality
  /save [file]          Save the conversation as JSON
  /load <file>          Replace the conversation with a saved one
  /clear                Reset to a single system message
  /quit                 Exit (Ctrl+C while idle also exits)

Anything else is sent as your next message. Ctrl+C stops a streaming reply.";

enum LoopControl {
    Continue,
    Quit,
}

pub async fn run_chat(
    config: Config,
    api_token: Option<String>,
    personalities_path: &Path,
) -> Result<(), Box<dyn Error>> {
    let client = config.http_client()?;
    let (service, mut rx) = ChatStreamService::new();

    let store = match PersonalityStore::load(personalities_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("⚠️  {e}");
            PersonalityStore::empty(personalities_path.to_path_buf())
        }
    };

    let default_personality = config.default_personality.clone();
    let mut controller = ConversationController::new(config.clone(), api_token, client, service);

    if let Some(name) = default_personality {
        match store.find(&name) {
            Some(personality) => {
                controller.set_personality(personality.content.clone());
                eprintln!("🎭 Personality: {}", personality.name);
            }
            None => eprintln!("⚠️  Personality '{name}' not found; using the default prompt"),
        }
    }

    eprintln!("🚀 wildchat — model {} via {}", config.model, config.base_url);
    eprintln!("💡 Type a message and press Enter. /help lists commands.");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    prompt()?;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    // EOF on stdin.
                    println!();
                    break;
                };
                match handle_line(&line, &mut controller, &store) {
                    LoopControl::Quit => break,
                    LoopControl::Continue => {
                        if !controller.is_busy() {
                            prompt()?;
                        }
                    }
                }
            }
            event = rx.recv() => {
                let Some((event, stream_id)) = event else { break; };
                match controller.on_event(event, stream_id) {
                    Some(TurnOutcome::Fragment(text)) => {
                        print!("{text}");
                        io::stdout().flush()?;
                    }
                    Some(TurnOutcome::Finished(_)) => {
                        println!();
                        prompt()?;
                    }
                    Some(TurnOutcome::Failed(error)) => {
                        println!();
                        eprintln!("❌ {error}");
                        prompt()?;
                    }
                    None => {
                        debug!(stream_id, "dropped event from inactive stream");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if controller.is_busy() {
                    match controller.cancel().await {
                        Some(_) => println!("\n[stopped]"),
                        None => println!("\n[stopped before any reply arrived]"),
                    }
                    prompt()?;
                } else {
                    println!();
                    break;
                }
            }
        }
    }

    Ok(())
}

fn prompt() -> io::Result<()> {
    print!("you> ");
    io::stdout().flush()
}

fn handle_line(
    line: &str,
    controller: &mut ConversationController,
    store: &PersonalityStore,
) -> LoopControl {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LoopControl::Continue;
    }

    if let Some(rest) = trimmed.strip_prefix('/') {
        let mut parts = rest.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or("");
        let argument = parts.next().map(str::trim).unwrap_or("");
        return handle_command(command, argument, controller, store);
    }

    match controller.submit_user_turn(trimmed) {
        Ok(_) => {}
        Err(SubmitError::Busy) => {
            eprintln!("⏳ Still streaming a reply — Ctrl+C stops it.");
        }
        Err(SubmitError::Empty) => {}
    }
    LoopControl::Continue
}

fn handle_command(
    command: &str,
    argument: &str,
    controller: &mut ConversationController,
    store: &PersonalityStore,
) -> LoopControl {
    match command {
        "quit" | "exit" => return LoopControl::Quit,
        "help" => println!("{HELP_TEXT}"),
        "clear" => {
            if reject_while_busy(controller) {
                return LoopControl::Continue;
            }
            controller.clear();
            println!("Conversation cleared.");
        }
        "personalities" => {
            if store.is_empty() {
                println!(
                    "No personalities found in {}.",
                    store.path().display()
                );
            } else {
                for personality in store.list() {
                    println!("  • {} — {}", personality.name, personality.preview());
                }
            }
        }
        "personality" => {
            if argument.is_empty() {
                println!("Usage: /personality <name>");
            } else if reject_while_busy(controller) {
                return LoopControl::Continue;
            } else {
                match store.find(argument) {
                    Some(personality) => {
                        controller.set_personality(personality.content.clone());
                        println!("🎭 Personality set to {}.", personality.name);
                    }
                    None => println!("Personality '{argument}' not found. Try /personalities."),
                }
            }
        }
        "save" => {
            let filename = if argument.is_empty() {
                format!("wildchat-{}.json", chrono::Local::now().format("%Y-%m-%d"))
            } else {
                argument.to_string()
            };
            match transcript::save(Path::new(&filename), controller.messages()) {
                Ok(()) => println!("Saved conversation to {filename}."),
                Err(e) => eprintln!("❌ {e}"),
            }
        }
        "load" => {
            if argument.is_empty() {
                println!("Usage: /load <file>");
            } else if reject_while_busy(controller) {
                return LoopControl::Continue;
            } else {
                match transcript::load(Path::new(argument)) {
                    Ok(messages) => {
                        let turns = messages.len();
                        controller.replace_messages(messages);
                        println!("Loaded {turns} messages from {argument}.");
                    }
                    Err(e) => eprintln!("❌ {e}"),
                }
            }
        }
        other => println!("Unknown command '/{other}'. Try /help."),
    }
    LoopControl::Continue
}

fn reject_while_busy(controller: &ConversationController) -> bool {
    if controller.is_busy() {
        eprintln!("⏳ Wait for the current reply to finish (or Ctrl+C to stop it).");
        true
    } else {
        false
    }
}
