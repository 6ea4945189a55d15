//! Notes from Groq and quiz questions from Gemini, generated concurrently,
//! then merged into one document.

use std::sync::Arc;

use llm_runnables::logging::init_logging;
use llm_runnables::{Chain, ChatModel, Parallel, PromptTemplate, Settings, StrOutputParser};
use serde_json::json;

const TEXT: &str = "Cross decomposition algorithms find the fundamental relations between two \
matrices (X and Y). They are latent variable approaches to modeling the covariance structures in \
these two spaces. PLS projects both X and Y into a lower-dimensional subspace such that the \
covariance between transformed(X) and transformed(Y) is maximal. Unlike Principal Component \
Regression, the dimensionality reduction takes the targets into account, which matters when the \
predictors outnumber the observations or are highly collinear.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    init_logging(settings.log_level.as_deref())?;
    let ctx = settings.exec_ctx();

    let groq = ChatModel::new("groq", Arc::new(settings.groq_backend()?));
    let gemini = ChatModel::new("gemini", Arc::new(settings.gemini_backend()?));

    let fan_out = Parallel::new("notes-and-questions")
        .branch(
            "notes",
            Chain::new("notes")
                .then(PromptTemplate::new(
                    "Write down short and simple notes based on the following topics: \n {topic}",
                ))
                .then(groq.clone())
                .then(StrOutputParser::new()),
        )
        .branch(
            "questions",
            Chain::new("questions")
                .then(PromptTemplate::new(
                    "Generate 5 short questions based on the following topic:  \n {topic}",
                ))
                .then(gemini)
                .then(StrOutputParser::new()),
        );

    let chain = Chain::new("study-guide")
        .then(fan_out)
        .then(PromptTemplate::new(
            "Merge the provided notes and questions into a single document. \n Notes: {notes} \n Questions: {questions}",
        ))
        .then(groq)
        .then(StrOutputParser::new());

    let out = chain.execute(&ctx, json!({"topic": TEXT})).await?;
    println!("{}", out.raw_response);
    Ok(())
}
