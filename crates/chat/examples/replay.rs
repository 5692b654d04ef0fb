//! Replays a scripted research exchange through a file-backed session and prints the
//! derived view.
//!
//! Run with `RUST_LOG=debug` to follow the stream lifecycle.
use std::sync::Arc;
use std::time::Duration;

use finsight_chat::{ChatSession, ChatSettings, MessageStore, PartView, Role, init_tracing};
use finsight_llm::{ScriptedBackend, ScriptedReply};
use serde_json::json;

const FIRST_ANSWER: &str = "Gross margins rose about 2pp year on year, mostly on softer input costs.\n\n**Suggested Follow-up Questions:**\n1. What drove the input cost decline?\n2. How do margins compare with peers?\n3. Is the gain sustainable?";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let storage_dir = tempfile::tempdir()?;
    let settings = ChatSettings {
        storage_dir: Some(storage_dir.path().to_path_buf()),
        ..ChatSettings::default()
    };

    let backend = Arc::new(
        ScriptedBackend::new([
            ScriptedReply::text(FIRST_ANSWER)
                .tool_call(
                    "call-1",
                    "searchReports",
                    json!({ "query": "gross margin FY24" }),
                    json!({ "matches": 3 }),
                )
                .reasoning("Looking for margin commentary in the annual reports."),
            ScriptedReply::text("Palm oil and crude derivatives both fell sharply."),
        ])
        .with_chunk_delay(Duration::from_millis(5)),
    );

    let store = MessageStore::new(Arc::new(settings.file_persistence()?));
    let mut session =
        ChatSession::new(store, backend).with_max_input_chars(settings.max_input_chars);
    session.initialize(&settings.welcome_text());

    session.send("How did gross margins move this year?")?;
    session.run_to_completion().await;

    let followup = session
        .view()
        .iter()
        .rev()
        .flat_map(|message| message.parts.iter())
        .find_map(|part| match part {
            PartView::Answer(output) => output.followups.first().cloned(),
            _ => None,
        });
    if let Some(followup) = followup {
        session.follow_up(&followup)?;
        session.run_to_completion().await;
    }

    for message in session.view() {
        let speaker = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        for part in message.parts {
            match part {
                PartView::Text(text) => println!("[{speaker}] {text}"),
                PartView::Answer(output) => {
                    println!("[{speaker}] {}", output.answer);
                    for line in output.numbered_followups() {
                        println!("    -> {line}");
                    }
                }
                PartView::Reasoning {
                    content,
                    duration_ms,
                    ..
                } => println!(
                    "[{speaker}] (reasoned for {:.0} ms) {content}",
                    duration_ms.unwrap_or_default()
                ),
                PartView::ToolCall { name, input, .. } => {
                    println!("[{speaker}] calling {name} with {input}")
                }
                PartView::ToolResult { name, output, .. } => println!(
                    "[{speaker}] {name} returned {}",
                    output.unwrap_or_default()
                ),
            }
        }
    }

    println!("status: {}", session.status().label());
    Ok(())
}
