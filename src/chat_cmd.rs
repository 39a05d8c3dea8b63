//! The `cchat chat` command.
//!
//! Drives the streaming consumer and renders display units as they
//! finish, so answers appear progressively. Rendering is event-driven:
//! the loop waits on the handle's update signal rather than polling.
//! Ctrl-C cancels the stream cooperatively; whatever was rendered stays
//! on screen.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::consumer::ChatClient;
use crate::models::ChatRequest;
use crate::segment::DisplayUnit;
use crate::session::SessionStatus;

pub async fn run_chat(config: &Config, prompt: &str, grounded: bool) -> Result<()> {
    let client = ChatClient::new(&config.client, &config.stream)?;

    if grounded {
        // Grounding against an empty corpus silently does nothing; say so
        // up front instead of letting the user wonder.
        match client.corpus_stats().await {
            Ok(stats) if stats.documents == 0 => {
                eprintln!("warning: the corpus is empty; grounding will have no effect");
            }
            Ok(_) => {}
            Err(e) => eprintln!("warning: could not check corpus stats: {}", e),
        }
    }

    let handle = client.submit(ChatRequest::new(prompt, grounded))?;
    let mut updates = handle.updates();

    let mut rendered = 0usize;
    let mut banner_shown = false;

    loop {
        if !banner_shown {
            if let Some(banner) = handle.context_banner() {
                println!("({})", banner);
                banner_shown = true;
            }
        }

        let units = handle.display_units();
        for unit in &units[rendered..] {
            render_unit(unit);
        }
        rendered = units.len();

        let status = handle.status();
        if status.is_terminal() {
            return match status {
                SessionStatus::Completed => Ok(()),
                SessionStatus::Cancelled => {
                    eprintln!("(cancelled)");
                    Ok(())
                }
                _ => {
                    let reason = handle
                        .error()
                        .unwrap_or_else(|| "unknown failure".to_string());
                    bail!("stream failed: {}", reason)
                }
            };
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                handle.cancel();
            }
            // An Err means the stream task finished; loop once more to
            // render and report the final state.
            _ = updates.changed() => {}
        }
    }
}

fn render_unit(unit: &DisplayUnit) {
    if unit.bullet {
        println!("  • {}", unit.text);
    } else {
        println!("{}", unit.text);
    }
}
