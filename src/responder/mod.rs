// Responder module
// Answers a question from the passages of a knowledge base


pub mod prompt;
pub mod usage;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ConfigError;
use crate::embeddings::Embedder;
use crate::index::{KnowledgeBase, SearchHit, VectorIndex};
use crate::{AskPdfError, Result};

pub use usage::{LedgerUsageSink, LogUsageSink, UsageSink};

const MAX_TOP_K: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// Passages retrieved per question
    pub top_k: usize,
    /// Ask the model even when nothing was retrieved
    pub allow_empty_context: bool,
    pub prompt_cost_per_1k: f64,
    pub completion_cost_per_1k: f64,
}

impl Default for ResponderConfig {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: 4,
            allow_empty_context: true,
            prompt_cost_per_1k: 0.0,
            completion_cost_per_1k: 0.0,
        }
    }
}

impl ResponderConfig {
    #[inline]
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(1..=MAX_TOP_K).contains(&self.top_k) {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }

        for cost in [self.prompt_cost_per_1k, self.completion_cost_per_1k] {
            if !cost.is_finite() || cost < 0.0 {
                return Err(ConfigError::InvalidCost(cost));
            }
        }

        Ok(())
    }

    /// Estimated price of `usage` at the configured rates
    #[inline]
    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        f64::from(usage.prompt_tokens) / 1000.0 * self.prompt_cost_per_1k
            + f64::from(usage.completion_tokens) / 1000.0 * self.completion_cost_per_1k
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    #[inline]
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// Raw output of an answer model
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub answer: String,
    pub usage: TokenUsage,
}

/// Produces an answer from a question and the passages retrieved for it
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, question: &str, passages: &[String]) -> Result<Generation>;

    fn model_name(&self) -> &str;
}

/// Usage of one answered question, as handed to a [`UsageSink`]
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub namespace: Option<String>,
    pub model: String,
    pub usage: TokenUsage,
    pub cost: f64,
    pub passages: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// The generator's answer, unmodified
    pub text: String,
    /// Passages the answer was generated from, best first
    pub passages: Vec<SearchHit>,
    pub usage: TokenUsage,
    pub cost: f64,
}

/// Retrieval-augmented question answering over a [`KnowledgeBase`]
#[derive(Clone)]
pub struct Responder {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    config: ResponderConfig,
    sink: Arc<dyn UsageSink>,
}

impl Responder {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        config: ResponderConfig,
    ) -> Self {
        Self {
            embedder,
            generator,
            config,
            sink: Arc::new(LogUsageSink),
        }
    }

    #[inline]
    pub fn with_usage_sink(mut self, sink: Arc<dyn UsageSink>) -> Self {
        self.sink = sink;
        self
    }

    #[inline]
    pub fn config(&self) -> &ResponderConfig {
        &self.config
    }

    /// Answer `question` from `knowledge_base`.
    ///
    /// Returns `Ok(None)` without doing any work when the question is blank.
    #[inline]
    pub async fn ask(
        &self,
        question: &str,
        knowledge_base: &KnowledgeBase,
    ) -> Result<Option<Answer>> {
        if question.trim().is_empty() {
            debug!("Ignoring empty question");
            return Ok(None);
        }

        let in_namespace = |e: AskPdfError| match knowledge_base.namespace() {
            Some(namespace) => e.in_namespace(namespace),
            None => e,
        };

        let query = self.embedder.embed(question).await.map_err(in_namespace)?;
        let hits = knowledge_base.search(&query, self.config.top_k)?;
        debug!(
            "Retrieved {} passages (top_k {}) from {} chunks",
            hits.len(),
            self.config.top_k,
            knowledge_base.len()
        );

        if hits.is_empty() {
            if !self.config.allow_empty_context {
                return Err(AskPdfError::EmptyContext);
            }
            warn!("No passages retrieved, asking {} without context", self.generator.model_name());
        }

        let passages: Vec<String> = hits.iter().map(|hit| hit.chunk.text.clone()).collect();
        let generation = self
            .generator
            .generate(question, &passages)
            .await
            .map_err(in_namespace)?;
        let cost = self.config.cost(&generation.usage);

        self.sink.record(UsageRecord {
            namespace: knowledge_base.namespace().map(ToString::to_string),
            model: self.generator.model_name().to_string(),
            usage: generation.usage,
            cost,
            passages: hits.len(),
        });
        info!(
            "Answered question with {} passages using {}",
            hits.len(),
            self.generator.model_name()
        );

        Ok(Some(Answer {
            text: generation.answer,
            passages: hits,
            usage: generation.usage,
            cost,
        }))
    }
}
