//! NovaTalk console client.
//!
//! Usage:
//!   novatalk-cli
//!
//! Chat with the assistant line by line; prefix phrases like
//! "generate an image of ..." route to image generation. Commands:
//!   /call     enter call mode (typed lines become spoken turns)
//!   /hangup   leave call mode and merge the call into the conversation
//!   /quit     exit
//!
//! Requires NOVATALK_API_KEY (or api_key in user_config.toml).

mod console;

use console::{ConsoleRecognizer, ConsoleSynthesizer};
use novatalk_core::{
    ChatSession, CompletionGateway, ConversationVault, CoreError, Message, NovaConfig,
    ReplyGateway, Role,
};
use novatalk_voice::{CallController, CallState, VoiceError};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load .env file if present (before any env::var calls)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match NovaConfig::load() {
        Ok(config) => config,
        Err(CoreError::NotConfigured(hint)) => {
            render_config_error(&hint);
            std::process::exit(2);
        }
        Err(e) => return Err(e.into()),
    };

    let store = Arc::new(ConversationVault::open_path(&config.storage_path)?);
    let gateway: Arc<dyn ReplyGateway> = Arc::new(CompletionGateway::global()?.clone());
    let session = Arc::new(ChatSession::open(&config.session, store, gateway.clone()));

    info!(session = %config.session, "NovaTalk started");
    println!("NovaTalk — /call for voice mode, /quit to exit\n");
    for message in session.messages().await {
        render_message(&message);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt("you> ");
        let line = tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break, // stdin closed
            },
            _ = tokio::signal::ctrl_c() => break,
        };
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/call" => run_call(&session, gateway.clone(), &mut lines).await,
            _ => match session.send(line).await {
                Ok(reply) => render_message(&reply),
                Err(CoreError::Busy) => {
                    println!("NovaTalk is still answering; give it a moment.")
                }
                Err(e) => {
                    tracing::warn!(error = %e, "send failed");
                    println!("Something went wrong. Please try again.");
                }
            },
        }
    }

    println!("Goodbye!");
    Ok(())
}

/// Call mode: typed lines become spoken turns until /hangup.
async fn run_call(
    session: &ChatSession,
    gateway: Arc<dyn ReplyGateway>,
    lines: &mut Lines<BufReader<Stdin>>,
) {
    let (recognizer, line_input) = ConsoleRecognizer::new();
    let synthesizer = ConsoleSynthesizer::new();

    let durable = session.messages().await;
    let (controller, mut state_rx) =
        match CallController::new(&durable, recognizer, synthesizer, gateway) {
            Ok(built) => built,
            Err(VoiceError::Unsupported(reason)) => {
                println!("Calls are not available here: {reason}");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not start call");
                println!("The call could not be started. Please try again.");
                return;
            }
        };

    let (hangup_tx, hangup_rx) = watch::channel(false);
    let mut call = tokio::spawn(controller.run(hangup_rx));
    println!("— call started; type to talk, /hangup to end —");

    let transcript = loop {
        tokio::select! {
            finished = &mut call => {
                match finished {
                    Ok(Ok(transcript)) => break Some(transcript),
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "call loop failed");
                        break None;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "call task failed");
                        break None;
                    }
                }
            }
            changed = state_rx.changed() => {
                if changed.is_ok() {
                    println!("· {}", status_line(*state_rx.borrow()));
                }
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    _ => {
                        let _ = hangup_tx.send(true);
                        continue;
                    }
                };
                let line = line.trim();
                if line == "/hangup" {
                    let _ = hangup_tx.send(true);
                } else if !line.is_empty() && !line_input.push_line(line) {
                    println!("(not listening yet — wait for \"Listening...\")");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                let _ = hangup_tx.send(true);
            }
        }
    };

    if let Some(transcript) = transcript {
        let turns = transcript.len().saturating_sub(1);
        session.end_call(&transcript).await;
        println!("— call ended; {turns} message(s) added to the conversation —");
    } else {
        println!("— call ended —");
    }
}

fn status_line(state: CallState) -> &'static str {
    match state {
        CallState::Initializing => "Connecting...",
        CallState::AiSpeaking => "NovaTalk is speaking...",
        CallState::UserListening => "Listening...",
        CallState::Processing => "Thinking...",
        CallState::Error => "An error occurred.",
    }
}

fn render_message(message: &Message) {
    match message.role {
        Role::User => println!("you> {}", message.content),
        Role::Assistant => {
            println!("novatalk> {}", message.content);
            if let Some(url) = &message.image_url {
                println!("          [image] {url}");
            }
        }
    }
}

fn prompt(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}

/// Dedicated terminal screen for a missing credential; replaces the UI
/// rather than appearing as a passing notice.
fn render_config_error(hint: &str) {
    eprintln!();
    eprintln!("┌──────────────────────────────────────────────────────┐");
    eprintln!("│  NovaTalk is not configured                          │");
    eprintln!("└──────────────────────────────────────────────────────┘");
    eprintln!();
    eprintln!("  A provider API key is required: {hint}");
    eprintln!();
    eprintln!("  Example:");
    eprintln!("    export NOVATALK_API_KEY=sk-...   # or add it to user_config.toml");
    eprintln!();
}
