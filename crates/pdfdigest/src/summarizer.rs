use pdfdigest_core::summary::{build_prompt, clean_response, SYSTEM_PREAMBLE};
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::ollama;
use serde_json::json;

use crate::config::RetryPolicy;
use crate::prelude::*;

const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u64 = 1024;

/// Turns a text into a shorter text.
#[allow(async_fn_in_trait)]
pub trait Summarizer {
    async fn summarize(&self, text: &str) -> Result<String, Error>;
}

/// Summarizer backed by a model served by Ollama.
pub struct OllamaSummarizer {
    client: ollama::Client,
    model: String,
}

impl OllamaSummarizer {
    pub fn new(ollama_url: &str, model: &str) -> Result<Self, Error> {
        use rig::client::Nothing;

        let client = ollama::Client::builder()
            .api_key(Nothing)
            .base_url(ollama_url)
            .build()
            .map_err(|e| Error::Open(format!("Ollama client at {}: {}", ollama_url, e)))?;

        Ok(Self {
            client,
            model: model.to_string(),
        })
    }
}

impl Summarizer for OllamaSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, Error> {
        let agent = self
            .client
            .agent(&self.model)
            .preamble(SYSTEM_PREAMBLE)
            .temperature(TEMPERATURE)
            .max_tokens(MAX_TOKENS)
            .additional_params(json!({
                "think": false,
                "options": {
                    "top_p": 0.8,
                    "top_k": 20,
                    "min_p": 0.0,
                    "num_predict": MAX_TOKENS,
                }
            }))
            .build();

        let prompt = build_prompt(text);
        agent
            .prompt(&prompt)
            .await
            .map_err(|e| Error::Summarization(e.to_string()))
    }
}

/// Call `summarizer` under `policy`, returning the cleaned answer of the first
/// attempt that succeeds in time.
pub async fn try_summarize<S: Summarizer>(
    summarizer: &S,
    text: &str,
    policy: RetryPolicy,
) -> Result<String, Error> {
    let mut last_error = Error::Summarization("no attempt was made".to_string());

    for attempt in 1..=policy.attempts.max(1) {
        match tokio::time::timeout(policy.timeout, summarizer.summarize(text)).await {
            Ok(Ok(answer)) => return Ok(clean_response(&answer)),
            Ok(Err(err)) => last_error = err,
            Err(_) => {
                last_error =
                    Error::Summarization(format!("timed out after {:?}", policy.timeout));
            }
        }
        log::warn!(
            "Summarization attempt {}/{} failed: {}",
            attempt,
            policy.attempts,
            last_error
        );
    }

    Err(last_error)
}

/// Like [`try_summarize`], but a final failure is logged and becomes an empty
/// summary so the run can go on.
pub async fn summarize_or_empty<S: Summarizer>(
    summarizer: &S,
    text: &str,
    policy: RetryPolicy,
) -> String {
    log::debug!("Requesting summary of {} chars", text.len());
    match try_summarize(summarizer, text, policy).await {
        Ok(answer) => {
            log::debug!("Model returned a summary");
            answer
        }
        Err(err) => {
            log::error!("Error while summarizing text: {}", err);
            String::new()
        }
    }
}
