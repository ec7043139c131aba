//! Context compression (C5, §4.7): when a task's `current.jsonl` token
//! count crosses `context_length * compression_threshold`, summarize the
//! head of the conversation with a one-shot LLM call and rewrite the log
//! down to `{summary, retained_tail}`.

use std::sync::Arc;

use orc_domain::error::Result;
use orc_domain::tool::Message;
use orc_providers::{ChatRequest, LlmProvider};

use crate::message_store::{estimate_tokens, MessageRecord, MessageRole, MessageStore};
use crate::summary_store::SummaryStore;

pub struct Compressor {
    provider: Arc<dyn LlmProvider>,
    context_length: u32,
    compression_threshold: f64,
    retained_tail: usize,
    summary_prompt: String,
}

impl Compressor {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        context_length: u32,
        compression_threshold: f64,
        retained_tail: usize,
        summary_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            context_length,
            compression_threshold,
            retained_tail,
            summary_prompt: summary_prompt.into(),
        }
    }

    /// True once `current_token_count` crosses the configured fraction of
    /// `context_length`.
    pub fn should_compress(&self, current_token_count: u64) -> bool {
        let threshold = (self.context_length as f64) * self.compression_threshold;
        current_token_count as f64 >= threshold
    }

    /// Summarize the compressible head of `current.jsonl`, append the
    /// summary to `summaries.jsonl`, and rewrite `current.jsonl` down to
    /// `{summary, retained_tail}` via [`MessageStore::rewrite_after_compression`].
    ///
    /// Returns `Ok(None)` when there are too few messages to compress
    /// (nothing ahead of the retained tail) — a no-op, not an error.
    pub async fn compress(
        &self,
        messages: &MessageStore,
        summaries: &SummaryStore,
    ) -> Result<Option<CompressionOutcome>> {
        let all = messages.read_all()?;
        if all.len() <= self.retained_tail {
            return Ok(None);
        }

        let split_at = all.len() - self.retained_tail;
        let (head, tail) = all.split_at(split_at);

        let original_tokens: u32 = head.iter().map(|r| r.tokens).sum();
        let rendered = render_for_summary(head);

        let prompt = format!("{}\n\n{}", self.summary_prompt, rendered);
        let request = ChatRequest {
            messages: vec![Message::user(prompt)],
            tools: Vec::new(),
            temperature: Some(0.0),
            max_tokens: None,
            model: None,
        };
        let response = self.provider.chat(&request).await?;
        let summary_text = response.content;
        let summary_tokens = estimate_tokens(&summary_text);

        let start_seq = head.first().map(|r| r.seq).unwrap_or(0);
        let end_seq = head.last().map(|r| r.seq).unwrap_or(0);
        summaries.append(start_seq, end_seq, &summary_text, original_tokens, summary_tokens)?;

        messages.rewrite_after_compression(&summary_text, summary_tokens, tail)?;

        Ok(Some(CompressionOutcome {
            original_tokens,
            summary_tokens,
        }))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompressionOutcome {
    pub original_tokens: u32,
    pub summary_tokens: u32,
}

fn render_for_summary(records: &[MessageRecord]) -> String {
    let mut out = String::new();
    for record in records {
        let role = match record.role {
            MessageRole::System => "SYSTEM",
            MessageRole::User => "USER",
            MessageRole::Assistant => "ASSISTANT",
            MessageRole::Tool => "TOOL",
            MessageRole::Summary => "SUMMARY",
        };
        out.push_str(&format!("[{role}]: {}\n", record.content));
    }
    out
}
