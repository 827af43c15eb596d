use clap::ValueEnum;
use endercom_config::EndercomConfig;
use endercom_core::{Result, function_fn};
use endercom_server::AgentFunction;

use super::shutdown_on_ctrl_c;
use crate::handlers::{
    DATA_PROCESSOR_CAPABILITIES, SIMPLE_ECHO_CAPABILITIES, TEXT_ANALYZER_CAPABILITIES,
    analyze_text, process_data, simple_echo,
};

/// Which built-in function to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub(crate) enum FunctionKind {
    /// Statistics over a list of numbers (name and description from config)
    #[default]
    Data,
    /// Text metrics and readability
    Text,
    /// Echo the input back
    Echo,
}

impl FunctionKind {
    fn usage(self) -> &'static str {
        match self {
            Self::Data => r#"{"input": {"data": [1, 2, 3]}}"#,
            Self::Text => r#"{"input": {"text": "Hello world."}}"#,
            Self::Echo => r#"{"input": "anything"}"#,
        }
    }
}

pub(super) async fn cmd_function(
    config: &EndercomConfig,
    kind: FunctionKind,
    port: Option<u16>,
) -> Result<()> {
    let function = build_function(config, kind);
    let mut options = config.function_options();
    if let Some(port) = port {
        options.port = port;
    }

    println!("🧮 {} on http://{}", function.name(), options.addr());
    println!("   POST /execute with {}", kind.usage());
    function.serve(&options, shutdown_on_ctrl_c()).await
}

pub(crate) fn build_function(config: &EndercomConfig, kind: FunctionKind) -> AgentFunction {
    let function = match kind {
        FunctionKind::Data => return data_processor(config),
        FunctionKind::Text => AgentFunction::new(
            "Text Analyzer",
            "Analyzes text and returns metrics and readability insights",
            TEXT_ANALYZER_CAPABILITIES,
        )
        .handler(function_fn(analyze_text)),
        FunctionKind::Echo => AgentFunction::new(
            "Simple Echo",
            "Echoes back any input it receives",
            SIMPLE_ECHO_CAPABILITIES,
        )
        .handler(function_fn(simple_echo)),
    };
    function.with_timeout(std::time::Duration::from_secs(config.function.timeout_secs))
}

pub(crate) fn data_processor(config: &EndercomConfig) -> AgentFunction {
    AgentFunction::new(
        config.function.name.clone(),
        config.function.description.clone(),
        DATA_PROCESSOR_CAPABILITIES,
    )
    .with_timeout(std::time::Duration::from_secs(config.function.timeout_secs))
    .handler(function_fn(process_data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_data_processor_from_config() {
        let config = EndercomConfig::default();
        let function = data_processor(&config);
        assert_eq!(function.name(), config.function.name);
        assert_eq!(function.capabilities().len(), 4);

        let out = function.execute(json!({ "data": [2, 4] })).await.unwrap();
        assert_eq!(out["statistics"]["mean"], 3.0);
    }

    #[tokio::test]
    async fn test_echo_function_takes_string_input() {
        let function = build_function(&EndercomConfig::default(), FunctionKind::Echo);
        assert_eq!(function.name(), "Simple Echo");

        let out = function.execute(json!("plain text")).await.unwrap();
        assert_eq!(out["original_input"], "plain text");
        assert_eq!(out["type"], "string");
    }

    #[tokio::test]
    async fn test_text_function_counts_words() {
        let function = build_function(&EndercomConfig::default(), FunctionKind::Text);
        let out = function
            .execute(json!({ "content": "Short and sweet." }))
            .await
            .unwrap();
        assert_eq!(out["metrics"]["word_count"], 3);
        assert_eq!(out["metrics"]["sentence_count"], 1);
    }

    #[tokio::test]
    async fn test_echo_endpoint_accepts_non_numeric_input() {
        let app = build_function(&EndercomConfig::default(), FunctionKind::Echo).router();
        for (input, kind) in [
            (json!("hello"), "string"),
            (json!(["a", true]), "array"),
            (json!({ "nested": { "k": null } }), "object"),
        ] {
            let req = Request::post("/execute")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "input": input }).to_string()))
                .unwrap();
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            let bytes = resp.into_body().collect().await.unwrap().to_bytes();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body["output"]["original_input"], input);
            assert_eq!(body["output"]["type"], kind);
        }
    }
}
