//! Topic → detailed report → five-line summary, as one chain.

use std::sync::Arc;

use llm_runnables::logging::init_logging;
use llm_runnables::{Chain, ChatModel, PromptTemplate, Settings, StrOutputParser};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    init_logging(settings.log_level.as_deref())?;
    let ctx = settings.exec_ctx();

    let model = ChatModel::new("groq", Arc::new(settings.groq_backend()?));

    let chain = Chain::new("black-holes")
        .then(PromptTemplate::new("Write a detailed report on {topic}"))
        .then(model.clone())
        .then(StrOutputParser::new())
        .then(PromptTemplate::new(
            "Write down 5 lines summary on the following {text} text",
        ))
        .then(model)
        .then(StrOutputParser::new());

    let outputs = chain
        .execute_all(&ctx, json!({"topic": "Black Holes"}))
        .await?;

    for (i, out) in outputs.iter().enumerate() {
        if let Some(model) = &out.model {
            println!("step {} ({}): {} chars", i, model, out.raw_response.len());
        }
    }
    if let Some(last) = outputs.last() {
        println!("\n{}", last.raw_response);
    }
    Ok(())
}
