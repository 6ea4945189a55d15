//! Classify a customer message, then answer with the matching tone.

use std::sync::Arc;

use llm_runnables::branch::field_equals;
use llm_runnables::events::{Event, FnEventHandler};
use llm_runnables::logging::init_logging;
use llm_runnables::{
    Branch, Chain, ChatModel, ExecCtx, Field, FieldType, Lambda, OutputParser, Parallel,
    Passthrough, PromptTemplate, Schema, SchemaOutputParser, Settings, StrOutputParser,
};
use serde_json::{json, Value};

fn responder(model: &ChatModel, tone: &str) -> Chain {
    Chain::new(format!("{}-reply", tone))
        .then(PromptTemplate::new(format!(
            "You are a helpful assistant. You get back to the customer with an appropriate {} \
             response to the following text: \n {{text}}",
            tone
        )))
        .then(model.clone())
        .then(StrOutputParser::new())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    init_logging(settings.log_level.as_deref())?;
    let model = ChatModel::new("gemini", Arc::new(settings.gemini_backend()?));

    let parser = SchemaOutputParser::new(Schema::new("Condition").field(Field::new(
        "sentiment",
        FieldType::one_of(["positive", "negative", "neutral"]),
        "The sentiment of the text",
    )));

    let classification = Chain::new("classification")
        .then(
            PromptTemplate::new(
                "Analyze the sentiment of the following text and classify it as positive, \
                 negative, or neutral: \n {text} \n {format_instructions}",
            )
            .partial("format_instructions", parser.format_instructions()),
        )
        .then(model.clone())
        .then(parser);

    let router = Branch::new("by-sentiment", responder(&model, "neutral"))
        .when(field_equals("sentiment", "positive"), responder(&model, "positive"))
        .when(field_equals("sentiment", "negative"), responder(&model, "negative"));

    let chain = Chain::new("conditional")
        .then(
            Parallel::new("text-and-sentiment")
                .branch("text", Passthrough::new())
                .branch("sentiment", classification),
        )
        .then(Lambda::new("flatten", |v: Value| {
            Ok(json!({
                "text": v["text"]["text"],
                "sentiment": v["sentiment"]["sentiment"],
            }))
        }))
        .then(router);

    let ctx = ExecCtx::builder()
        .timeout(settings.timeout)
        .event_handler(Arc::new(FnEventHandler(|event: Event| {
            if let Event::BranchSelected { target, .. } = event {
                eprintln!("routing to {}", target);
            }
        })))
        .build();

    let out = chain
        .execute(
            &ctx,
            json!({"text": "The phone is terrible. I hate the battery life"}),
        )
        .await?;
    println!("Result ===> {}", out.raw_response);
    Ok(())
}
