#![allow(dead_code)]

use flowstream::config::ChatConfig;

pub fn chat_config(endpoint: impl Into<String>) -> ChatConfig {
    ChatConfig::builder()
        .endpoint(endpoint)
        .api_key("sk-test")
        .provider("openai")
        .model("gpt-4o-mini")
        .build()
        .expect("chat config")
}

/// Join SSE `data:` payloads into one body, each frame followed by a blank line.
pub fn sse_body(payloads: &[&str]) -> String {
    payloads
        .iter()
        .map(|p| format!("data: {p}\n\n"))
        .collect()
}
