//! Draft a blog post interactively, keeping the conversation as history.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use llm_runnables::logging::init_logging;
use llm_runnables::{Chain, ChatModel, ChatMessage, ChatPromptTemplate, Settings};
use serde_json::json;

fn prompt_line(label: &str) -> io::Result<Option<String>> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    init_logging(settings.log_level.as_deref())?;
    let ctx = settings.exec_ctx();

    let prompt = ChatPromptTemplate::new()
        .system(
            "You are a professional blog writer and you will write blogs consciously. \
             The blog should be short, like a paragraph, and about {technology}.",
        )
        .optional_placeholder("chat_history")
        .human("{instruction}");

    let chain = Chain::new("blog")
        .then(prompt)
        .then(ChatModel::new("gemini", Arc::new(settings.gemini_backend()?)));

    let Some(topic) = prompt_line("Enter the blog topic: ")? else {
        return Ok(());
    };
    let mut history: Vec<ChatMessage> = Vec::new();

    while let Some(instruction) = prompt_line("Write instruction for blog (type 'exit' to quit): ")? {
        if instruction.eq_ignore_ascii_case("exit") {
            break;
        }
        if instruction.is_empty() {
            continue;
        }

        let input = json!({
            "technology": topic,
            "instruction": instruction,
            "chat_history": history,
        });
        let out = chain.execute(&ctx, input).await?;
        println!("Blog Idea: {}", out.raw_response);

        history.push(ChatMessage::human(instruction));
        history.push(ChatMessage::assistant(out.raw_response));

        println!("\n--- Conversation History ---");
        for msg in &history {
            println!("{:?}: {}", msg.role, msg.content);
        }
    }
    Ok(())
}
