//! Summarize a local text file, or a web page when a URL is given.
//!
//! ```text
//! cargo run --example document_summary                  # demos/ai_poem.txt
//! cargo run --example document_summary -- notes.txt
//! cargo run --example document_summary -- https://example.com/product
//! ```

use std::sync::Arc;

use llm_runnables::logging::init_logging;
use llm_runnables::{
    Chain, ChatModel, Loader, PromptTemplate, Settings, StrOutputParser, TextLoader, WebLoader,
};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    init_logging(settings.log_level.as_deref())?;
    let ctx = settings.exec_ctx();

    let source = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/ai_poem.txt".to_string());
    let is_web = source.starts_with("http://") || source.starts_with("https://");

    let loader: Box<dyn Loader> = if is_web {
        Box::new(WebLoader::new(&source).with_client(ctx.client.clone()))
    } else {
        Box::new(TextLoader::new(&source))
    };
    let documents = loader.load().await?;
    let Some(document) = documents.first() else {
        return Err(format!("no documents loaded from {}", source).into());
    };

    let template = if is_web {
        "Summarize the product information from the following webpage: \n {content}"
    } else {
        "Summarize the following poem in a few sentences: \n {content}"
    };

    let chain = Chain::new("document-summary")
        .then(PromptTemplate::new(template))
        .then(ChatModel::new("gemini", Arc::new(settings.gemini_backend()?)))
        .then(StrOutputParser::new());

    let out = chain
        .execute(&ctx, json!({"content": document.page_content}))
        .await?;
    println!("Source ===> {}", document.source().unwrap_or(&source));
    println!("Result ===> {}", out.raw_response);
    Ok(())
}
