use std::sync::Arc;
use std::time::Duration;

use cloudcrafters_core::GeminiClient;
use cloudcrafters_core::LlmError;
use cloudcrafters_core::ModelExecutor;
use cloudcrafters_core::ToolRegistry;
use cloudcrafters_core::config::SearchConfig;
use cloudcrafters_core::llm::Content;
use cloudcrafters_core::llm::GenerateContentRequest;
use cloudcrafters_crew::StageExecutor;
use cloudcrafters_crew::StageRequest;
use cloudcrafters_crew::TaskChain;
use cloudcrafters_crew::TemplateVars;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_string_contains;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;

const GENERATE_PATH: &str = "/models/gemini-1.5-flash:generateContent";

fn text_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
}

fn search_call(query: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [
                {"functionCall": {"name": "web_search", "args": {"query": query}}}
            ]}
        }]
    })
}

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::new("test-key", server.uri(), Duration::from_secs(5)).unwrap()
}

fn executor(server: &MockServer, search: &MockServer, limit: u32) -> ModelExecutor {
    let tools = ToolRegistry::from_config(&SearchConfig {
        enabled: true,
        base_url: search.uri(),
        max_results: 3,
    })
    .unwrap();
    ModelExecutor::new(client(server), "gemini/gemini-1.5-flash", Arc::new(tools))
        .with_max_tool_iterations(limit)
}

fn design_request() -> StageRequest {
    let chain = TaskChain::new(cloudcrafters_core::builtin_pipeline().unwrap());
    let stage = &chain.definition().stages()[0];
    let agent = chain
        .definition()
        .agent(stage.agent())
        .unwrap()
        .render(chain.definition().inputs())
        .unwrap();
    StageRequest {
        stage: stage.name().to_string(),
        index: 0,
        agent,
        task: stage.render(chain.definition().inputs()).unwrap(),
        vars: chain.initial_vars(&TemplateVars::new()),
    }
}

#[tokio::test]
async fn client_sends_key_and_parses_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_string_contains("\"contents\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("hello")))
        .expect(1)
        .mount(&server)
        .await;

    let request = GenerateContentRequest {
        contents: vec![Content::user_text("hi")],
        ..GenerateContentRequest::default()
    };
    let response = client(&server)
        .generate_content("gemini/gemini-1.5-flash", &request)
        .await
        .unwrap();
    assert_eq!(response.into_content().unwrap().text(), "hello");
}

#[tokio::test]
async fn client_maps_error_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/limited:generateContent"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/broken:generateContent"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&server)
        .await;

    let request = GenerateContentRequest::default();
    let err = client(&server)
        .generate_content("limited", &request)
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::RateLimited { retry_after: Some(7) }));

    let err = client(&server)
        .generate_content("broken", &request)
        .await
        .unwrap_err();
    match err {
        LlmError::ApiError { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "bad request");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn executor_answers_tool_calls_before_final_text() {
    let model = MockServer::start().await;
    let search = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("q", "sharepoint on ec2"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AbstractText": "SharePoint can run on Windows Server EC2 instances.",
            "AbstractURL": "https://example.com/sharepoint"
        })))
        .expect(1)
        .mount(&search)
        .await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_string_contains("functionResponse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("# Design\nUse EC2 and RDS.")))
        .with_priority(1)
        .expect(1)
        .mount(&model)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_string_contains("functionDeclarations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_call("sharepoint on ec2")))
        .with_priority(2)
        .expect(1)
        .mount(&model)
        .await;

    let text = executor(&model, &search, 3)
        .execute(design_request())
        .await
        .unwrap();
    assert_eq!(text, "# Design\nUse EC2 and RDS.");

    let requests = model.received_requests().await.unwrap();
    let second: Value = serde_json::from_slice(&requests[1].body).unwrap();
    let result = &second["contents"][2]["parts"][0]["functionResponse"]["response"]["result"];
    assert!(
        result
            .as_str()
            .unwrap()
            .contains("SharePoint can run on Windows Server EC2 instances.")
    );
    assert_eq!(second["contents"][1]["role"], "model");
}

#[tokio::test]
async fn executor_stops_after_tool_budget() {
    let model = MockServer::start().await;
    let search = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&search)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_call("again")))
        .mount(&model)
        .await;

    let err = executor(&model, &search, 2)
        .execute(design_request())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("after 2 round trips"), "{err}");
    assert_eq!(model.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn search_failure_is_reported_to_the_model() {
    let model = MockServer::start().await;
    let search = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&search)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_string_contains("search backend returned status 503"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("answered without search")))
        .with_priority(1)
        .mount(&model)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_call("terraform")))
        .with_priority(2)
        .mount(&model)
        .await;

    let text = executor(&model, &search, 3)
        .execute(design_request())
        .await
        .unwrap();
    assert_eq!(text, "answered without search");
}

#[tokio::test]
async fn blank_reply_is_an_error() {
    let model = MockServer::start().await;
    let search = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("   ")))
        .mount(&model)
        .await;

    let err = executor(&model, &search, 3)
        .execute(design_request())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no text for stage `design`"), "{err}");
}
