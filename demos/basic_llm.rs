//! One question to each provider.

use std::sync::Arc;

use llm_runnables::logging::init_logging;
use llm_runnables::{ChatModel, Settings, Step};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    init_logging(settings.log_level.as_deref())?;
    let ctx = settings.exec_ctx();

    let groq = ChatModel::new("groq", Arc::new(settings.groq_backend()?));
    let reply = groq
        .invoke(&ctx, json!("Tell me about Dhaka in short summary?"))
        .await?;
    println!("[groq/{}]", reply.model.as_deref().unwrap_or("?"));
    println!("{}", reply.raw_response);

    let gemini = ChatModel::new("gemini", Arc::new(settings.gemini_backend()?));
    let reply = gemini
        .invoke(&ctx, json!("What about today's weather at Dhaka?"))
        .await?;
    println!("\n[gemini/{}]", reply.model.as_deref().unwrap_or("?"));
    println!("{}", reply.raw_response);
    if let Some(meta) = reply.metadata {
        println!("usage: {}", meta["usage"]);
    }

    Ok(())
}
