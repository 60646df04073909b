//! # lookup_info Tests
//!
//! Behaviour of the knowledge-base tool against in-memory retrieval and
//! generation fakes: acknowledgement ordering, the grounding prompt, the
//! no-documents fallback and error propagation.

mod common;

use serde_json::json;
use std::sync::Arc;

use common::{EventLog, FakeGenerator, FakeRetriever, RecordingSpeech};
use speech_assistant::llm::tools::lookup_info::LookupInfoTool;
use speech_assistant::llm::tools::{RunContext, ToolError, ToolHandler, ToolOutput, ToolRegistry};
use speech_assistant::retrieval::{RetrievalError, TOP_K};

const QUESTION: &str = "What are your business hours?";

struct Fixture {
    log: EventLog,
    retriever: Arc<FakeRetriever>,
    generator: Arc<FakeGenerator>,
    tool: LookupInfoTool,
    ctx: RunContext,
}

fn fixture(retriever: FakeRetriever, generator: FakeGenerator, log: EventLog) -> Fixture {
    let retriever = Arc::new(retriever);
    let generator = Arc::new(generator);
    let tool = LookupInfoTool::new(retriever.clone(), generator.clone(), "faq", "gpt-4o-mini");
    let ctx = RunContext::new(Arc::new(RecordingSpeech::new(&log)));

    Fixture {
        log,
        retriever,
        generator,
        tool,
        ctx,
    }
}

fn with_docs(texts: &[&str], answer: &str) -> Fixture {
    let log = EventLog::default();
    fixture(
        FakeRetriever::new(&log, texts),
        FakeGenerator::new(&log, answer),
        log,
    )
}

#[tokio::test]
async fn test_answers_from_retrieved_context() {
    let f = with_docs(
        &["Open 9-5 Mon-Fri", "Closed weekends"],
        "We're open 9 to 5, Monday through Friday.",
    );

    let output = f.tool.call(&f.ctx, json!({ "query": QUESTION })).await.unwrap();

    assert_eq!(
        output,
        ToolOutput::text("We're open 9 to 5, Monday through Friday.")
    );
    assert!(output.structured.is_none());
    assert_eq!(
        f.generator.prompts(),
        vec![(
            "Answer using context:\nOpen 9-5 Mon-Fri\nClosed weekends\nQ: What are your business hours?"
                .to_string(),
            "gpt-4o-mini".to_string()
        )]
    );
}

#[tokio::test]
async fn test_no_documents_falls_back_without_generating() {
    let f = with_docs(&[], "should never be used");

    let output = f.tool.call(&f.ctx, json!({ "query": "Do you sell shoes?" })).await.unwrap();

    assert_eq!(output.text, "Sorry, I couldn't find an answer.");
    assert!(output.structured.is_none());
    assert!(f.generator.prompts().is_empty());
    assert_eq!(
        f.log.events(),
        vec!["say:One moment please.", "retrieve:Do you sell shoes?"]
    );
}

#[tokio::test]
async fn test_acknowledges_before_retrieving() {
    let f = with_docs(&["Open 9-5 Mon-Fri"], "9 to 5.");

    f.tool.call(&f.ctx, json!({ "query": QUESTION })).await.unwrap();

    assert_eq!(
        f.log.events(),
        vec![
            "say:One moment please.".to_string(),
            format!("retrieve:{}", QUESTION),
            "generate".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_answer_is_trimmed() {
    let f = with_docs(&["Open 9-5 Mon-Fri"], "  \n We open at nine. \n\t");

    let output = f.tool.call(&f.ctx, json!({ "query": QUESTION })).await.unwrap();
    assert_eq!(output.text, "We open at nine.");
}

#[tokio::test]
async fn test_requests_at_most_three_documents_from_namespace() {
    let f = with_docs(&["a", "b", "c", "d", "e"], "letters");

    f.tool.call(&f.ctx, json!({ "query": "letters?" })).await.unwrap();

    let calls = f.retriever.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].k, TOP_K);
    assert_eq!(calls[0].k, 3);
    assert_eq!(calls[0].namespace, "faq");
    assert_eq!(calls[0].query, "letters?");

    let prompts = f.generator.prompts();
    let (prompt, _) = &prompts[0];
    assert_eq!(prompt, "Answer using context:\na\nb\nc\nQ: letters?");
}

#[tokio::test]
async fn test_duplicate_documents_are_kept() {
    let f = with_docs(&["Closed weekends", "Closed weekends"], "Closed on weekends.");

    f.tool.call(&f.ctx, json!({ "query": "Weekends?" })).await.unwrap();

    let prompts = f.generator.prompts();
    let (prompt, _) = &prompts[0];
    assert_eq!(
        prompt,
        "Answer using context:\nClosed weekends\nClosed weekends\nQ: Weekends?"
    );
}

#[tokio::test]
async fn test_retrieval_failure_propagates() {
    let log = EventLog::default();
    let f = fixture(
        FakeRetriever::failing(&log),
        FakeGenerator::new(&log, "unused"),
        log,
    );

    let result = f.tool.call(&f.ctx, json!({ "query": QUESTION })).await;

    assert!(matches!(
        result,
        Err(ToolError::Retrieval(RetrievalError::ApiError { status: 503, .. }))
    ));
    assert!(f.generator.prompts().is_empty());
}

#[tokio::test]
async fn test_generation_failure_propagates() {
    let log = EventLog::default();
    let f = fixture(
        FakeRetriever::new(&log, &["Open 9-5 Mon-Fri"]),
        FakeGenerator::failing(&log),
        log,
    );

    let result = f.tool.call(&f.ctx, json!({ "query": QUESTION })).await;
    assert!(matches!(result, Err(ToolError::Generation(_))));
}

#[tokio::test]
async fn test_failed_acknowledgement_aborts_lookup() {
    let log = EventLog::default();
    let retriever = Arc::new(FakeRetriever::new(&log, &["Open 9-5 Mon-Fri"]));
    let generator = Arc::new(FakeGenerator::new(&log, "9 to 5."));
    let tool = LookupInfoTool::new(retriever.clone(), generator.clone(), "faq", "gpt-4o-mini");
    let ctx = RunContext::new(Arc::new(RecordingSpeech::failing(&log)));

    let result = tool.call(&ctx, json!({ "query": QUESTION })).await;

    assert!(matches!(result, Err(ToolError::Speech(_))));
    assert_eq!(log.events(), vec!["say:One moment please."]);
    assert!(!log.events().iter().any(|e| e.starts_with("retrieve:")));
    assert!(retriever.calls().is_empty());
    assert!(generator.prompts().is_empty());
}

#[tokio::test]
async fn test_invoked_through_registry() {
    let f = with_docs(&["Open 9-5 Mon-Fri"], "9 to 5.");
    let mut registry = ToolRegistry::new();
    registry.register_tool(LookupInfoTool::descriptor(), Arc::new(f.tool));

    let definitions = registry.get_tool_definitions();
    assert_eq!(definitions[0]["function"]["name"], "lookup_info");

    let output = registry
        .execute_tool("lookup_info", json!({ "query": QUESTION }), &f.ctx)
        .await
        .unwrap();
    assert_eq!(output.text, "9 to 5.");

    // A call without a query never reaches the tool
    let missing = registry.execute_tool("lookup_info", json!({}), &f.ctx).await;
    assert!(matches!(missing, Err(ToolError::InvalidParameters(_))));
    assert_eq!(f.log.events().len(), 3);
}
