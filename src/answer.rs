//! Query relay and the index-backed answer service.
//!
//! [`QueryRelay`] is what the dispatcher calls: it forwards the user's text
//! to an [`AnswerService`] and strips trailing newlines from the result.
//!
//! [`IndexAnswerService`] is the production backend. It retrieves the
//! best-ranked chunks from the pre-built index and synthesizes one answer
//! from them in a single completion call ("compact" mode: as many chunks as
//! fit in `answer.max_context_chars`, packed into one prompt).

use anyhow::Context as _;
use async_trait::async_trait;
use secrecy::SecretString;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::completion::CompletionClient;
use crate::config::{Config, OPENAI_API_KEY};
use crate::db;
use crate::error::Result;
use crate::models::ContextChunk;
use crate::search::retrieve_context;
use crate::traits::AnswerService;

const SYSTEM_PROMPT: &str = "You are an expert Q&A system that is trusted around the world. \
Always answer the query using the provided context information, and not prior knowledge.";

/// Forwards questions to an [`AnswerService`] and normalises the answer.
#[derive(Clone)]
pub struct QueryRelay {
    service: Arc<dyn AnswerService>,
}

impl QueryRelay {
    pub fn new(service: Arc<dyn AnswerService>) -> Self {
        Self { service }
    }

    /// Answers `query`, passing it through verbatim.
    ///
    /// The returned text has trailing `\n` characters removed and is
    /// otherwise exactly what the service produced.
    pub async fn answer(&self, query: &str) -> Result<String> {
        let raw = self.service.query(query).await.inspect_err(|e| {
            tracing::error!(service = self.service.name(), error = %e, "answer service failed");
        })?;
        tracing::debug!(
            service = self.service.name(),
            chars = raw.chars().count(),
            "answer received"
        );
        Ok(trim_answer(&raw).to_string())
    }
}

/// Strips trailing newline characters only.
pub fn trim_answer(raw: &str) -> &str {
    raw.trim_end_matches('\n')
}

/// Answer service backed by the retrieval index and a completion model.
pub struct IndexAnswerService {
    pool: SqlitePool,
    top_k: i64,
    max_context_chars: usize,
    completion: CompletionClient,
}

impl IndexAnswerService {
    pub fn new(
        pool: SqlitePool,
        top_k: i64,
        max_context_chars: usize,
        completion: CompletionClient,
    ) -> Self {
        Self {
            pool,
            top_k,
            max_context_chars,
            completion,
        }
    }

    /// Opens the index and builds the completion client from configuration.
    pub async fn from_config(config: &Config, api_key: SecretString) -> anyhow::Result<Self> {
        let pool = db::connect_read_only(&config.index)
            .await
            .with_context(|| "Failed to open retrieval index")?;
        let completion = CompletionClient::new(&config.answer, api_key)?;
        Ok(Self::new(
            pool,
            config.index.top_k,
            config.answer.max_context_chars,
            completion,
        ))
    }
}

#[async_trait]
impl AnswerService for IndexAnswerService {
    fn name(&self) -> &str {
        "index"
    }

    async fn query(&self, text: &str) -> Result<String> {
        let chunks = retrieve_context(&self.pool, text, self.top_k).await?;
        let top = chunks.first();
        tracing::debug!(
            retrieved = chunks.len(),
            top_document = top.map_or("-", |c| c.document_id.as_str()),
            top_score = top.map_or(0.0, |c| c.score),
            model = self.completion.model(),
            "synthesizing answer"
        );

        let prompt = build_prompt(text, &chunks, self.max_context_chars);
        self.completion.complete(SYSTEM_PROMPT, &prompt).await
    }
}

/// Packs retrieved chunks and the question into one prompt.
///
/// Chunks are taken in rank order until the character budget is spent; the
/// chunk that crosses the budget is cut on a char boundary. A chunk whose
/// document has a title is headed by a `title: ...` line, which does not
/// count against the budget.
pub fn build_prompt(question: &str, chunks: &[ContextChunk], max_context_chars: usize) -> String {
    let mut context = String::new();
    let mut remaining = max_context_chars;

    for chunk in chunks {
        if remaining == 0 {
            break;
        }
        let separator = if context.is_empty() { "" } else { "\n\n" };
        let text: String = chunk.text.chars().take(remaining).collect();
        remaining = remaining.saturating_sub(text.chars().count());
        context.push_str(separator);
        if let Some(title) = chunk.title.as_deref().filter(|t| !t.trim().is_empty()) {
            context.push_str("title: ");
            context.push_str(title);
            context.push('\n');
        }
        context.push_str(&text);
    }

    format!(
        "Context information is below.\n\
         ---------------------\n\
         {}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {}\n\
         Answer: ",
        context, question
    )
}

/// Runs one question through the full answer pipeline and prints the result.
///
/// Backs `relay ask`; needs only the answer backend key.
pub async fn run_ask(config: &Config, question: &str) -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let api_key = std::env::var(OPENAI_API_KEY)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
        .with_context(|| format!("missing required environment variable: {}", OPENAI_API_KEY))?;

    let service = IndexAnswerService::from_config(config, api_key).await?;
    let relay = QueryRelay::new(Arc::new(service));

    let answer = relay.answer(question).await?;
    println!("{}", answer);
    Ok(())
}
