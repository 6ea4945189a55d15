//! End-to-end pipelines against the mock backend.

use std::sync::Arc;

use llm_runnables::backend::MockBackend;
use llm_runnables::branch::{field_equals, word_count_above};
use llm_runnables::{
    invoke_blocking, Branch, Chain, ChatModel, ChatPromptTemplate, ExecCtx, Field, FieldType,
    Lambda, OutputParser, Parallel, Passthrough, PipelineError, PromptTemplate, Schema,
    SchemaOutputParser, Step, StrOutputParser,
};
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};

fn echo_model() -> (ChatModel, Arc<MockBackend>) {
    let mock = Arc::new(MockBackend::echo());
    (ChatModel::new("echo", mock.clone()), mock)
}

fn sentiment_schema() -> Schema {
    Schema::new("Condition").field(Field::new(
        "sentiment",
        FieldType::one_of(["positive", "negative", "neutral"]),
        "The sentiment of the text",
    ))
}

#[tokio::test]
async fn black_holes_two_stage_summary() {
    let (model, mock) = echo_model();
    let first = PromptTemplate::new("Summarize the following {topic} topic");
    let second = PromptTemplate::new("Write down 5 lines summary on the following {text} text");

    let chain = Chain::new("report")
        .then(first.clone())
        .then(model.clone())
        .then(StrOutputParser::new())
        .then(second.clone())
        .then(model)
        .then(StrOutputParser::new());

    let ctx = ExecCtx::default();
    let out = assert_ok!(chain.execute(&ctx, json!({"topic": "Black Holes"})).await);

    let inner = first
        .render(json!({"topic": "Black Holes"}).as_object().unwrap())
        .unwrap();
    let expected = second
        .render(json!({ "text": inner }).as_object().unwrap())
        .unwrap();
    assert_eq!(out.value, json!(expected));
    assert_eq!(
        expected,
        "Write down 5 lines summary on the following Summarize the following Black Holes topic text"
    );
    assert_eq!(mock.call_count(), 2);
}

/// Classifier → keep text alongside sentiment → route to one responder.
fn sentiment_pipeline(
    classifier_reply: &str,
    declare_negative_first: bool,
) -> (Chain, [Arc<MockBackend>; 3]) {
    let classifier = ChatModel::new("classifier", Arc::new(MockBackend::fixed(classifier_reply)));
    let parser = SchemaOutputParser::new(sentiment_schema());
    let classify = Chain::new("classification")
        .then(
            PromptTemplate::new(
                "Analyze the sentiment of the following text and classify it as positive, \
                 negative, or neutral: \n {text} \n {format_instructions}",
            )
            .partial("format_instructions", parser.format_instructions()),
        )
        .then(classifier)
        .then(parser);

    let responders = [
        Arc::new(MockBackend::fixed("positive reply")),
        Arc::new(MockBackend::fixed("negative reply")),
        Arc::new(MockBackend::fixed("neutral reply")),
    ];
    let respond = |kind: &str, backend: &Arc<MockBackend>| {
        Chain::new(format!("{kind}-chain"))
            .then(PromptTemplate::new(format!(
                "You are a helpful assistant. Respond with a {kind} tone to: \n {{text}}"
            )))
            .then(ChatModel::new(kind, backend.clone()))
            .then(StrOutputParser::new())
    };

    let positive = (field_equals("sentiment", "positive"), respond("positive", &responders[0]));
    let negative = (field_equals("sentiment", "negative"), respond("negative", &responders[1]));
    let mut branch = Branch::new("router", respond("neutral", &responders[2]));
    if declare_negative_first {
        branch = branch.when(negative.0, negative.1).when(positive.0, positive.1);
    } else {
        branch = branch.when(positive.0, positive.1).when(negative.0, negative.1);
    }

    let pipeline = Chain::new("conditional")
        .then(
            Parallel::new("gather")
                .branch("text", Passthrough::new())
                .branch("sentiment", classify),
        )
        .then(Lambda::new("merge", |v: Value| {
            Ok(json!({
                "text": v["text"]["text"],
                "sentiment": v["sentiment"]["sentiment"],
            }))
        }))
        .then(branch);

    (pipeline, responders)
}

#[tokio::test]
async fn negative_sentiment_runs_only_negative_branch() {
    for negative_first in [true, false] {
        let (pipeline, [pos, neg, neu]) =
            sentiment_pipeline(r#"{"sentiment": "negative"}"#, negative_first);
        let ctx = ExecCtx::default();

        let out = assert_ok!(
            pipeline
                .execute(&ctx, json!({"text": "The phone is terrible. I hate the battery life"}))
                .await
        );

        assert_eq!(out.value, json!("negative reply"));
        assert_eq!(neg.call_count(), 1);
        assert_eq!(pos.call_count(), 0);
        assert_eq!(neu.call_count(), 0);
        assert!(neg.prompts()[0].contains("The phone is terrible"));
    }
}

#[tokio::test]
async fn unmatched_sentiment_falls_back_to_neutral() {
    let (pipeline, [pos, neg, neu]) = sentiment_pipeline(r#"{"sentiment": "neutral"}"#, false);
    let out = assert_ok!(
        pipeline
            .execute(&ExecCtx::default(), json!({"text": "It is a phone."}))
            .await
    );
    assert_eq!(out.value, json!("neutral reply"));
    assert_eq!((pos.call_count(), neg.call_count(), neu.call_count()), (0, 0, 1));
}

#[tokio::test]
async fn classifier_outside_enum_fails_whole_pipeline() {
    let (pipeline, responders) = sentiment_pipeline(r#"{"sentiment": "angry"}"#, false);
    let err = assert_err!(
        pipeline
            .execute(&ExecCtx::default(), json!({"text": "grr"}))
            .await
    );
    assert!(matches!(err, PipelineError::SchemaValidation { .. }));
    assert!(responders.iter().all(|r| r.call_count() == 0));
}

#[tokio::test]
async fn parallel_notes_and_quiz_merge() {
    let notes_model = ChatModel::new("notes", Arc::new(MockBackend::fixed("1. gravity")));
    let quiz_model = ChatModel::new("quiz", Arc::new(MockBackend::fixed("Q1: what bends light?")));

    let pipeline = Chain::new("study")
        .then(
            Parallel::new("fan-out")
                .branch(
                    "notes",
                    Chain::new("notes")
                        .then(PromptTemplate::new("Generate short notes on:\n{text}"))
                        .then(notes_model)
                        .then(StrOutputParser::new()),
                )
                .branch(
                    "quiz",
                    Chain::new("quiz")
                        .then(PromptTemplate::new("Generate 5 questions from:\n{text}"))
                        .then(quiz_model)
                        .then(StrOutputParser::new()),
                ),
        )
        .then(PromptTemplate::new(
            "Merge the notes and quiz into a single document\nnotes -> {notes}\nquiz -> {quiz}",
        ));

    let out = assert_ok!(
        pipeline
            .execute(&ExecCtx::default(), json!({"text": "Black holes bend light."}))
            .await
    );
    assert_eq!(
        out.value,
        json!("Merge the notes and quiz into a single document\nnotes -> 1. gravity\nquiz -> Q1: what bends light?")
    );
}

#[tokio::test]
async fn long_report_is_summarized_short_one_passes_through() {
    let long_report = "word ".repeat(250);
    let summarizer = Arc::new(MockBackend::fixed("short summary"));

    let make = |report: String| {
        Chain::new("report")
            .then(ChatModel::new("writer", Arc::new(MockBackend::fixed(report))))
            .then(StrOutputParser::new())
            .then(
                Branch::new("maybe-summarize", Passthrough::new()).when(
                    word_count_above(200),
                    Chain::new("summarize")
                        .then(PromptTemplate::new("Summarize the following text \n {topic}."))
                        .then(ChatModel::new("summarizer", summarizer.clone()))
                        .then(StrOutputParser::new()),
                ),
            )
    };

    let ctx = ExecCtx::default();
    let long = assert_ok!(make(long_report).execute(&ctx, json!("Bangladesh 1971 history")).await);
    assert_eq!(long.value, json!("short summary"));

    let short = assert_ok!(make("brief".into()).execute(&ctx, json!("topic")).await);
    assert_eq!(short.value, json!("brief"));
    assert_eq!(summarizer.call_count(), 1);
}

#[test]
fn chat_history_round_trip_blocking() {
    let (model, mock) = echo_model();
    let prompt = ChatPromptTemplate::new()
        .system("You are a professional blog writer.")
        .optional_placeholder("chat_history")
        .human("{query}");
    let chain = Chain::new("blog").then(prompt).then(model);
    let ctx = ExecCtx::default();

    let mut history: Vec<Value> = Vec::new();
    for query in ["write about rust", "make it shorter"] {
        let input = json!({"chat_history": history, "query": query});
        let out = invoke_blocking(&chain, &ctx, input).unwrap();
        history.push(json!({"role": "human", "content": query}));
        history.push(json!({"role": "assistant", "content": out.value}));
    }

    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].messages.len(), 2);
    assert_eq!(requests[1].messages.len(), 4);
    assert_eq!(requests[1].messages[2].content, "write about rust");
}

#[tokio::test]
async fn schema_parser_round_trip() {
    let schema = Schema::new("Review")
        .field(Field::new("key_themes", FieldType::StringList, "Key themes"))
        .field(Field::new("summary", FieldType::String, "A brief summary"))
        .field(Field::new(
            "sentiment",
            FieldType::one_of(["pos", "neg"]),
            "Overall sentiment",
        ))
        .field(Field::new("rating", FieldType::Integer, "Stars").optional());
    let parser = SchemaOutputParser::new(schema);
    let ctx = ExecCtx::default();

    for value in [
        json!({"key_themes": ["battery", "camera"], "summary": "Solid.", "sentiment": "pos", "rating": 4}),
        json!({"key_themes": [], "summary": "", "sentiment": "neg"}),
    ] {
        let out = assert_ok!(parser.invoke(&ctx, json!(value.to_string())).await);
        assert_eq!(out.value, value);
    }
}
