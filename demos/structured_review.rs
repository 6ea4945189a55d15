//! Extract a typed review from free text with structured output.

use std::sync::Arc;

use llm_runnables::logging::init_logging;
use llm_runnables::{ChatModel, Field, FieldType, Schema, Settings, Step};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct Review {
    key_themes: Vec<String>,
    summary: String,
    sentiment: String,
    pros: Option<Vec<String>>,
    cons: Option<Vec<String>>,
    name: Option<String>,
}

const TEXT: &str = "Recently, I purchased the Acme SuperWidget 3000, and I must say, it has \
exceeded my expectations in many ways. The build quality is exceptional, and it performs tasks \
quickly and accurately. The user interface is intuitive, making it easy for anyone to use. \
Additionally, the customer support from Acme has been top-notch, responding promptly to my \
inquiries.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    init_logging(settings.log_level.as_deref())?;
    let ctx = settings.exec_ctx();

    let schema = Schema::new("Review")
        .with_description("A structured product review")
        .field(Field::new(
            "key_themes",
            FieldType::StringList,
            "Write down the key themes discussed in the text.",
        ))
        .field(Field::new(
            "summary",
            FieldType::String,
            "Provide a concise brief summary of the text.",
        ))
        .field(Field::new(
            "sentiment",
            FieldType::one_of(["positive", "negative", "neutral"]),
            "Determine the overall sentiment of the text.",
        ))
        .field(
            Field::new("pros", FieldType::StringList, "List the positive aspects mentioned in the text.")
                .optional(),
        )
        .field(
            Field::new("cons", FieldType::StringList, "List the negative aspects mentioned in the text.")
                .optional(),
        )
        .field(
            Field::new(
                "name",
                FieldType::String,
                "Write down the name of the product or service mentioned in the text.",
            )
            .optional(),
        );

    let model = ChatModel::new("groq", Arc::new(settings.groq_backend()?))
        .with_structured_output(schema);

    let out = model.invoke(&ctx, json!(TEXT)).await?;
    let review: Review = out.parse_as()?;

    println!("{:#?}", review);
    println!(
        "\n{} ({}): {}",
        review.name.as_deref().unwrap_or("unnamed product"),
        review.sentiment,
        review.summary
    );
    println!("themes: {}", review.key_themes.join(", "));
    for pro in review.pros.iter().flatten() {
        println!("  + {}", pro);
    }
    for con in review.cons.iter().flatten() {
        println!("  - {}", con);
    }
    Ok(())
}
