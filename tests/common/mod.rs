//! Fake collaborators shared by the integration tests

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ask_pdf::embeddings::Embedder;
use ask_pdf::responder::{Generation, Generator, TokenUsage, UsageRecord, UsageSink};
use async_trait::async_trait;

pub const VOCABULARY: [&str; 4] = ["hello", "world", "cat", "dog"];

pub fn fixture_pdf() -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/three_pages.pdf");
    std::fs::read(path).expect("fixture exists")
}

pub fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

/// Bag-of-words embedder over [`VOCABULARY`], with a constant bias so no
/// vector is zero
pub struct BagOfWordsEmbedder {
    calls: AtomicUsize,
    texts: AtomicUsize,
    delay: Duration,
}

impl BagOfWordsEmbedder {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            texts: AtomicUsize::new(0),
            delay,
        }
    }

    /// Number of `embed_batch` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of texts embedded so far
    pub fn texts(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        let mut vector: Vec<f32> = VOCABULARY
            .iter()
            .map(|word| text.matches(word).count() as f32)
            .collect();
        vector.push(0.1);
        vector
    }
}

#[async_trait]
impl Embedder for BagOfWordsEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> ask_pdf::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|text| Self::vector(text)).collect())
    }

    fn model_name(&self) -> &str {
        "bag-of-words"
    }
}

/// Answers by echoing the best passage
#[derive(Default)]
pub struct EchoGenerator {
    pub questions: Mutex<Vec<String>>,
}

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, question: &str, passages: &[String]) -> ask_pdf::Result<Generation> {
        self.questions
            .lock()
            .expect("lock")
            .push(question.to_string());

        let answer = passages
            .first()
            .map_or_else(|| "I don't know.".to_string(), |p| p.trim().to_string());
        Ok(Generation {
            answer,
            usage: TokenUsage {
                prompt_tokens: 40,
                completion_tokens: 8,
            },
        })
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}

#[derive(Default)]
pub struct CollectingSink {
    pub records: Mutex<Vec<UsageRecord>>,
}

impl UsageSink for CollectingSink {
    fn record(&self, record: UsageRecord) {
        self.records.lock().expect("lock").push(record);
    }
}
