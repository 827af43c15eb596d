//! Demo handlers used by the `agent` and `function` commands.
//!
//! The function handlers report bad input inside their output (an `error`
//! field) rather than failing the execution.

use std::sync::Arc;

use chrono::Local;
use endercom_core::{Message, MessageHandler, handler_fn};
use serde_json::{Value, json};

/// Keyword responder: hello, time, status, analyze, otherwise echo.
pub fn keyword_reply(message: &Message) -> String {
    let lower = message.content.to_lowercase();
    if lower.contains("hello") {
        "Hello back!".to_string()
    } else if lower.contains("time") {
        format!("Current time: {}", Local::now().to_rfc3339())
    } else if lower.contains("status") {
        "Agent is running and ready to process requests.".to_string()
    } else if lower.contains("analyze") {
        format!("Analysis complete for: {}", message.content)
    } else {
        format!("Echo: {}", message.content)
    }
}

pub fn demo_handler() -> Arc<dyn MessageHandler> {
    handler_fn(|message: &Message| {
        tracing::info!(message_id = %message.id, content = %message.content, "processing message");
        Ok(keyword_reply(message))
    })
}

pub const DATA_PROCESSOR_CAPABILITIES: [&str; 4] = ["analyze", "process", "statistics", "data"];

/// Summary statistics over `{"data" | "numbers" | "values": [...]}` or a bare array.
///
/// Bad input yields an output object with an `error` field rather than a
/// failed execution, so callers always get a usable hint back.
pub fn process_data(input: Value) -> anyhow::Result<Value> {
    let data = match &input {
        Value::Object(map) => ["data", "numbers", "values"]
            .iter()
            .filter_map(|k| map.get(*k))
            .find(|v| is_truthy(v))
            .cloned(),
        Value::Array(_) if is_truthy(&input) => Some(input.clone()),
        _ => None,
    };

    let Some(data) = data else {
        return Ok(json!({
            "error": "No data found. Expected format: {'data': [1,2,3,4,5]}",
            "example": { "data": [1, 2, 3, 4, 5] },
        }));
    };

    let numbers: Option<Vec<f64>> = match &data {
        Value::Array(items) => items.iter().map(as_number).collect(),
        _ => None,
    };
    let Some(numbers) = numbers else {
        return Ok(json!({
            "error": "Data must be an array of numbers",
            "received": data,
        }));
    };

    Ok(json!({
        "input_data": data,
        "processed_at": Local::now().to_rfc3339(),
        "statistics": statistics(&numbers),
    }))
}

pub const SIMPLE_ECHO_CAPABILITIES: [&str; 2] = ["echo", "test"];

/// Echo the input back, tagged with its JSON type.
pub fn simple_echo(input: Value) -> anyhow::Result<Value> {
    let kind = json_type(&input);
    Ok(json!({
        "original_input": input,
        "message": "Echo from Rust function!",
        "type": kind,
    }))
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub const TEXT_ANALYZER_CAPABILITIES: [&str; 4] = ["analyze", "text", "nlp", "metrics"];

const PREVIEW_CHARS: usize = 200;
const WORD_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':', '"', '(', ')', '[', ']', '{', '}'];

/// Text metrics over `{"text" | "content" | "message": "..."}` or a bare string.
pub fn analyze_text(input: Value) -> anyhow::Result<Value> {
    let text = match &input {
        Value::Object(map) => ["text", "content", "message"]
            .iter()
            .filter_map(|k| map.get(*k))
            .find(|v| is_truthy(v))
            .and_then(Value::as_str),
        Value::String(s) => Some(s.as_str()),
        _ => None,
    };
    let Some(text) = text.filter(|t| !t.is_empty()) else {
        return Ok(json!({
            "error": "No text found. Expected format: {'text': 'your text here'}",
            "example": { "text": "Hello world! This is a sample text." },
        }));
    };

    let words: Vec<&str> = text.split_whitespace().collect();
    let sentences = text
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count();
    let paragraphs = text
        .split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .count();

    let char_count = text.chars().count();
    let char_count_no_spaces = text.chars().filter(|c| *c != ' ').count();

    let avg_word_length = if words.is_empty() {
        0.0
    } else {
        let total: usize = words
            .iter()
            .map(|w| w.trim_matches(WORD_PUNCTUATION).chars().count())
            .sum();
        total as f64 / words.len() as f64
    };
    let avg_sentence_length = if sentences == 0 {
        0.0
    } else {
        words.len() as f64 / sentences as f64
    };

    let readability = if avg_word_length < 4.0 && avg_sentence_length < 15.0 {
        "Simple"
    } else if avg_word_length < 6.0 && avg_sentence_length < 25.0 {
        "Moderate"
    } else {
        "Complex"
    };

    let preview = if char_count > PREVIEW_CHARS {
        format!("{}...", text.chars().take(PREVIEW_CHARS).collect::<String>())
    } else {
        text.to_string()
    };

    Ok(json!({
        "original_text": preview,
        "analyzed_at": Local::now().to_rfc3339(),
        "metrics": {
            "character_count": char_count,
            "character_count_no_spaces": char_count_no_spaces,
            "word_count": words.len(),
            "sentence_count": sentences,
            "paragraph_count": paragraphs,
            "average_word_length": round2(avg_word_length),
            "average_sentence_length": round2(avg_sentence_length),
        },
        "insights": {
            "readability": readability,
            "most_common_words": top_words(&words, 5),
            "text_type": if sentences > 5 { "Long form" } else { "Short form" },
        },
    }))
}

/// Most frequent words longer than two characters, ties in first-seen order.
fn top_words(words: &[&str], n: usize) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for word in words {
        let clean: String = word
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if clean.chars().count() <= 2 {
            continue;
        }
        match counts.iter_mut().find(|(w, _)| *w == clean) {
            Some((_, count)) => *count += 1,
            None => counts.push((clean, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(n);
    counts
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
    }
}

/// Numbers and numeric strings both count.
fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `numbers` must be non-empty.
fn statistics(numbers: &[f64]) -> Value {
    let n = numbers.len() as f64;
    let sum: f64 = numbers.iter().sum();
    let mean = sum / n;
    let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut stats = json!({
        "count": numbers.len(),
        "sum": sum,
        "mean": mean,
        "min": min,
        "max": max,
        "range": max - min,
    });

    if numbers.len() > 1 {
        let mut sorted = numbers.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };
        let variance = numbers.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
        stats["median"] = json!(median);
        stats["std_dev"] = json!(variance.sqrt());
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(content: &str) -> Message {
        Message::direct(content, Some("agent-a".into()), None)
    }

    #[test]
    fn test_keyword_replies() {
        assert_eq!(keyword_reply(&message("Hello there")), "Hello back!");
        assert!(keyword_reply(&message("what TIME is it")).starts_with("Current time: "));
        assert_eq!(
            keyword_reply(&message("status?")),
            "Agent is running and ready to process requests."
        );
        assert_eq!(
            keyword_reply(&message("analyze this")),
            "Analysis complete for: analyze this"
        );
        assert_eq!(keyword_reply(&message("ping")), "Echo: ping");
    }

    #[test]
    fn test_statistics_for_several_numbers() {
        let out = process_data(json!({ "data": [1, 2, 3, 4, 5] })).unwrap();
        let stats = &out["statistics"];
        assert_eq!(stats["count"], 5);
        assert_eq!(stats["sum"], 15.0);
        assert_eq!(stats["mean"], 3.0);
        assert_eq!(stats["min"], 1.0);
        assert_eq!(stats["max"], 5.0);
        assert_eq!(stats["range"], 4.0);
        assert_eq!(stats["median"], 3.0);
        let sd = stats["std_dev"].as_f64().unwrap();
        assert!((sd - 1.5811388).abs() < 1e-6);
        assert!(out["processed_at"].is_string());
        assert_eq!(out["input_data"], json!([1, 2, 3, 4, 5]));
    }

    #[test]
    fn test_even_count_median() {
        let out = process_data(json!({ "numbers": [4, 1, 3, 2] })).unwrap();
        assert_eq!(out["statistics"]["median"], 2.5);
    }

    #[test]
    fn test_single_value_has_no_spread_stats() {
        let out = process_data(json!([7])).unwrap();
        assert_eq!(out["statistics"]["count"], 1);
        assert!(out["statistics"].get("median").is_none());
        assert!(out["statistics"].get("std_dev").is_none());
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let out = process_data(json!({ "values": ["1.5", 2.5] })).unwrap();
        assert_eq!(out["statistics"]["sum"], 4.0);
    }

    #[test]
    fn test_empty_data_falls_through_keys() {
        let out = process_data(json!({ "data": [], "numbers": [10, 20] })).unwrap();
        assert_eq!(out["statistics"]["mean"], 15.0);
    }

    #[test]
    fn test_missing_data_reports_example() {
        let out = process_data(json!({ "other": 1 })).unwrap();
        assert!(out["error"].as_str().unwrap().contains("No data found"));
        assert_eq!(out["example"]["data"], json!([1, 2, 3, 4, 5]));

        let out = process_data(Value::Null).unwrap();
        assert!(out["error"].is_string());
    }

    #[test]
    fn test_non_numeric_data_reports_received() {
        let out = process_data(json!({ "data": [1, "two", 3] })).unwrap();
        assert_eq!(out["error"], "Data must be an array of numbers");
        assert_eq!(out["received"], json!([1, "two", 3]));
    }

    #[test]
    fn test_simple_echo_tags_type() {
        let out = simple_echo(json!({ "a": 1 })).unwrap();
        assert_eq!(out["original_input"], json!({ "a": 1 }));
        assert_eq!(out["type"], "object");
        assert_eq!(simple_echo(json!("hi")).unwrap()["type"], "string");
        assert_eq!(simple_echo(Value::Null).unwrap()["type"], "null");
    }

    #[test]
    fn test_text_metrics() {
        let text = "The cat sat. The cat ran!\n\nDogs bark?";
        let out = analyze_text(json!({ "text": text })).unwrap();
        let metrics = &out["metrics"];
        assert_eq!(metrics["word_count"], 8);
        assert_eq!(metrics["sentence_count"], 3);
        assert_eq!(metrics["paragraph_count"], 2);
        assert_eq!(metrics["character_count"], text.chars().count());
        assert_eq!(metrics["average_sentence_length"], 2.67);
        assert_eq!(out["insights"]["readability"], "Simple");
        assert_eq!(out["insights"]["text_type"], "Short form");
        assert_eq!(out["insights"]["most_common_words"][0], json!(["the", 2]));
        assert_eq!(out["insights"]["most_common_words"][1], json!(["cat", 2]));
        assert_eq!(out["original_text"], text);
    }

    #[test]
    fn test_text_from_bare_string_and_fallback_keys() {
        let out = analyze_text(json!("one two")).unwrap();
        assert_eq!(out["metrics"]["word_count"], 2);
        let out = analyze_text(json!({ "text": "", "message": "a b c" })).unwrap();
        assert_eq!(out["metrics"]["word_count"], 3);
    }

    #[test]
    fn test_long_text_is_previewed() {
        let text = "word ".repeat(100);
        let out = analyze_text(json!(text)).unwrap();
        let preview = out["original_text"].as_str().unwrap();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 3);
    }

    #[test]
    fn test_missing_text_reports_example() {
        let out = analyze_text(json!({ "data": [1] })).unwrap();
        assert!(out["error"].as_str().unwrap().contains("No text found"));
        assert!(out["example"]["text"].is_string());
    }

    #[tokio::test]
    async fn test_demo_handler_through_adapter() {
        let adapter = endercom_core::HandlerAdapter::new(demo_handler());
        let reply = adapter.invoke(&message("hello")).await.unwrap();
        assert_eq!(reply, "Hello back!");
    }
}
