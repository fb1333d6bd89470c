use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Input;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::database::{NamespaceStore, UsageLedger};
use crate::index::{IndexOrigin, KnowledgeBase, Namespace, VectorIndex};
use crate::indexer::Indexer;
use crate::ollama::OllamaClient;
use crate::responder::{Answer, LedgerUsageSink, Responder};

const RECENT_USAGE_LIMIT: usize = 10;

/// Extract, chunk and embed a PDF, reporting whether embeddings were computed
/// or loaded from disk
#[inline]
pub async fn index_document(config: &Config, pdf: &Path) -> Result<()> {
    let client = Arc::new(OllamaClient::new(&config.ollama)?);
    let indexer = Indexer::from_config(config, client).await?;

    let knowledge_base = load_knowledge_base(&indexer, pdf).await?;
    print_index_summary(&knowledge_base);

    Ok(())
}

/// Answer questions about a PDF. Without a question, prompt until an empty
/// line is entered.
#[inline]
pub async fn ask_document(config: &Config, pdf: &Path, question: Option<String>) -> Result<()> {
    let client = Arc::new(OllamaClient::new(&config.ollama)?);
    let indexer = Indexer::from_config(config, Arc::clone(&client) as _).await?;

    let knowledge_base = load_knowledge_base(&indexer, pdf).await?;
    print_index_summary(&knowledge_base);

    let mut responder = Responder::new(
        Arc::clone(&client) as _,
        client,
        config.responder.clone(),
    );

    let sink = match UsageLedger::open(config.usage_db_path()).await {
        Ok(ledger) => {
            let sink = Arc::new(LedgerUsageSink::new(Arc::new(ledger)));
            responder = responder.with_usage_sink(Arc::clone(&sink) as _);
            Some(sink)
        }
        Err(e) => {
            warn!("Usage ledger unavailable, usage will only be logged: {}", e);
            None
        }
    };

    let result = match question {
        Some(question) => answer_question(&responder, &knowledge_base, &question).await,
        None => question_loop(&responder, &knowledge_base).await,
    };

    if let Some(sink) = sink {
        sink.flush().await;
    }

    result
}

/// List persisted namespaces
#[inline]
pub async fn list_namespaces(config: &Config) -> Result<()> {
    let store = NamespaceStore::open(config.vector_dir()).await?;
    let namespaces = store.list().await?;

    if namespaces.is_empty() {
        println!("No documents have been indexed yet.");
        println!("Use 'ask-pdf index <pdf>' to index one.");
        return Ok(());
    }

    println!("Indexed documents ({} total):", namespaces.len());
    println!();

    for namespace in &namespaces {
        println!("📄 {}", style(&namespace.name).bold());
        match &namespace.manifest {
            Some(manifest) => {
                println!("   Chunks: {}", manifest.chunk_count);
                println!(
                    "   Embedding model: {} ({} dimensions)",
                    manifest.embedding_model, manifest.dimension
                );
                println!(
                    "   Created: {}",
                    manifest.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
            None => println!("   ⚠️  Unreadable, run 'ask-pdf forget {}'", namespace.name),
        }
        println!();
    }

    Ok(())
}

/// Delete a persisted namespace
#[inline]
pub async fn forget_namespace(config: &Config, name: &str) -> Result<()> {
    let store = NamespaceStore::open(config.vector_dir()).await?;
    let namespace = Namespace::parse(name)?;

    if store.remove(&namespace).await? {
        info!("Forgot namespace {}", namespace);
        println!("Removed embeddings for '{}'", namespace);
    } else {
        println!("No embeddings stored for '{}'", namespace);
    }

    Ok(())
}

/// Print token usage totals from the usage ledger
#[inline]
pub async fn show_usage(config: &Config) -> Result<()> {
    let path = config.usage_db_path();
    if !path.exists() {
        println!("No questions have been answered yet.");
        return Ok(());
    }

    let ledger = UsageLedger::open(&path).await?;
    let summary = ledger.summary().await?;

    println!("{}", style("Usage").bold().cyan());
    println!("  Questions: {}", summary.overall.questions);
    println!(
        "  Tokens: {} (prompt: {}, completion: {})",
        summary.overall.total_tokens,
        summary.overall.prompt_tokens,
        summary.overall.completion_tokens
    );
    println!("  Estimated cost: ${:.4}", summary.overall.cost);

    if !summary.per_namespace.is_empty() {
        println!();
        println!("{}", style("Per document").bold().cyan());
        for totals in &summary.per_namespace {
            println!(
                "  {}: {} questions, {} tokens, ${:.4}",
                totals.namespace.as_deref().unwrap_or("(in memory)"),
                totals.questions,
                totals.total_tokens,
                totals.cost
            );
        }
    }

    let recent = ledger.recent(RECENT_USAGE_LIMIT).await?;
    if !recent.is_empty() {
        println!();
        println!("{}", style("Recent questions").bold().cyan());
        for record in &recent {
            println!(
                "  {} {} {} tokens via {}",
                record.created_at.format("%Y-%m-%d %H:%M:%S"),
                record.namespace.as_deref().unwrap_or("(in memory)"),
                record.total_tokens,
                record.model
            );
        }
    }

    Ok(())
}

async fn load_knowledge_base(indexer: &Indexer, pdf: &Path) -> Result<Arc<KnowledgeBase>> {
    let Some(document_name) = pdf.file_name().map(|name| name.to_string_lossy().into_owned())
    else {
        bail!("Not a file: {}", pdf.display());
    };

    let bytes = tokio::fs::read(pdf)
        .await
        .with_context(|| format!("Failed to read {}", pdf.display()))?;

    Ok(indexer.knowledge_base(&document_name, bytes).await?)
}

fn print_index_summary(knowledge_base: &KnowledgeBase) {
    let chunks = knowledge_base.len();
    match (knowledge_base.origin(), knowledge_base.namespace()) {
        (IndexOrigin::Loaded, Some(namespace)) => println!(
            "{}",
            style(format!(
                "Embeddings loaded from disk for '{}' ({} chunks)",
                namespace, chunks
            ))
            .blue()
        ),
        (_, Some(namespace)) => println!(
            "{}",
            style(format!(
                "Embedding computation completed for '{}' ({} chunks)",
                namespace, chunks
            ))
            .yellow()
        ),
        (_, None) => println!(
            "{}",
            style(format!("Embedding computation completed ({} chunks)", chunks)).yellow()
        ),
    }

    if knowledge_base.is_empty() {
        println!(
            "{}",
            style("⚠ The document has no extractable text, answers will have no context").yellow()
        );
    }
}

async fn question_loop(responder: &Responder, knowledge_base: &KnowledgeBase) -> Result<()> {
    loop {
        let question: String = Input::new()
            .with_prompt("Ask a question about your PDF")
            .allow_empty(true)
            .interact_text()?;

        if question.trim().is_empty() {
            return Ok(());
        }

        answer_question(responder, knowledge_base, &question).await?;
    }
}

async fn answer_question(
    responder: &Responder,
    knowledge_base: &KnowledgeBase,
    question: &str,
) -> Result<()> {
    if let Some(answer) = responder.ask(question, knowledge_base).await? {
        print_answer(&answer);
    }
    Ok(())
}

fn print_answer(answer: &Answer) {
    println!();
    println!("{}", answer.text);
    println!();
    eprintln!(
        "{}",
        style(format!(
            "{} passages, {} tokens (prompt: {}, completion: {}), ${:.6}",
            answer.passages.len(),
            answer.usage.total_tokens(),
            answer.usage.prompt_tokens,
            answer.usage.completion_tokens,
            answer.cost
        ))
        .dim()
    );
}
