//! Voice Chat Demo - streaming a dish recommendation
//!
//! Loads a configuration file, grounds the system prompt in the dish
//! catalog, and streams one answer to the terminal. Thinking text is shown
//! dimmed.
//!
//! Run with:
//!   cargo run --example voice_chat -- murmur.yaml "Something light, I'm tired"
//!
//! Set RUST_LOG=murmur_core=debug to see request logging.

use anyhow::{Context, Result};
use murmur_core::config;
use murmur_core::recommend::{DishCatalog, Preference};
use murmur_core::{CallState, ChatStreamClient, FnObserver};
use std::io::Write;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut args = std::env::args().skip(1);
    let path = args.next().context("usage: voice_chat <config> [question]")?;
    let question = args
        .next()
        .unwrap_or_else(|| "Something light for dinner, I'm tired".to_string());

    let mut config = config::load(&path).with_context(|| format!("loading {}", path))?;

    let catalog = DishCatalog::with_defaults();
    let preference = Preference::new().with_taste("light").with_mood("tired");
    config.system_prompt = format!(
        "{}\n\n{}",
        config.system_prompt,
        catalog.context_prompt(&preference)
    );

    let client = ChatStreamClient::from_config(&config)?;
    println!("🎙️  {}\n", question);

    let observer = FnObserver::new(
        |text: &str| {
            print!("{}", text);
            let _ = std::io::stdout().flush();
        },
        |result| match result {
            Ok(answer) => println!("\n\n✅ {} characters", answer.chars().count()),
            Err(e) => eprintln!("\n\n❌ {}", e),
        },
    )
    .with_thinking(|text: &str| {
        print!("\x1b[2m{}\x1b[0m", text);
        let _ = std::io::stdout().flush();
    });

    let session = client.send_message_stream(&question, observer);

    tokio::select! {
        state = session.finished() => {
            if state != CallState::Completed {
                anyhow::bail!("call ended as {:?}", state);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            client.cancel_active();
            println!("\n⏹️  cancelled");
        }
    }

    Ok(())
}
