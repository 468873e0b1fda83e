//! Prompt construction and model response cleanup for summarization

/// System message sent with every summarization request.
pub const SYSTEM_PREAMBLE: &str =
    "Você é uma assistente que auxilia na tarefa de resumir documentos pdf.";

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

pub fn build_prompt(text: &str) -> String {
    format!("Resuma o texto a seguir. Texto: {}.", text)
}

/// Strip reasoning output from a model answer.
///
/// Everything up to the last `</think>` is discarded, as is an unterminated
/// `<think>` block left by a truncated generation.
pub fn clean_response(raw: &str) -> String {
    let answer = match raw.rfind(THINK_CLOSE) {
        Some(i) => &raw[i + THINK_CLOSE.len()..],
        None => raw,
    };
    let answer = match answer.find(THINK_OPEN) {
        Some(i) => &answer[..i],
        None => answer,
    };
    answer.trim().to_string()
}

/// Input for the document-level summary: page summaries in page order,
/// blank ones dropped.
pub fn join_page_summaries<S: AsRef<str>>(summaries: &[S]) -> String {
    summaries
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
