#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! Namespace builds under concurrent and cancelled requests

mod common;

use std::sync::Arc;
use std::time::Duration;

use ask_pdf::chunking::ChunkingConfig;
use ask_pdf::database::NamespaceStore;
use ask_pdf::index::{IndexOrigin, Namespace, VectorStoreKind};
use ask_pdf::indexer::Indexer;
use tempfile::TempDir;

use common::{BagOfWordsEmbedder, fixture_pdf};

async fn shared_indexer(temp_dir: &TempDir, embedder: &Arc<BagOfWordsEmbedder>) -> Arc<Indexer> {
    let store = NamespaceStore::open(temp_dir.path())
        .await
        .expect("store opens");
    Arc::new(
        Indexer::new(
            Arc::clone(embedder) as _,
            store,
            &ChunkingConfig::default(),
            VectorStoreKind::Disk,
        )
        .expect("valid indexer"),
    )
}

fn hidden_entries(temp_dir: &TempDir) -> usize {
    std::fs::read_dir(temp_dir.path())
        .expect("root is readable")
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
        .count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_builds_embed_once() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    // Texts embedded by a single build, for reference
    let reference_dir = TempDir::new().expect("should create temp dir");
    let reference = Arc::new(BagOfWordsEmbedder::new());
    shared_indexer(&reference_dir, &reference)
        .await
        .knowledge_base("report.pdf", fixture_pdf())
        .await
        .expect("build succeeds");

    let embedder = Arc::new(BagOfWordsEmbedder::with_delay(Duration::from_millis(100)));
    let indexer = shared_indexer(&temp_dir, &embedder).await;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let indexer = Arc::clone(&indexer);
            tokio::spawn(async move { indexer.knowledge_base("report.pdf", fixture_pdf()).await })
        })
        .collect();

    let mut knowledge_bases = Vec::new();
    for handle in handles {
        knowledge_bases.push(
            handle
                .await
                .expect("task completes")
                .expect("build succeeds"),
        );
    }

    assert_eq!(embedder.texts(), reference.texts());
    assert!(
        knowledge_bases
            .iter()
            .all(|kb| Arc::ptr_eq(kb, &knowledge_bases[0]))
    );
    assert_eq!(knowledge_bases[0].origin(), IndexOrigin::Computed);

    let listed = indexer.list().await.expect("list succeeds");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "report");
    assert_eq!(hidden_entries(&temp_dir), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn different_documents_build_independently() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let embedder = Arc::new(BagOfWordsEmbedder::with_delay(Duration::from_millis(20)));
    let indexer = shared_indexer(&temp_dir, &embedder).await;

    let (first, second) = tokio::join!(
        indexer.knowledge_base("first.pdf", fixture_pdf()),
        indexer.knowledge_base("second.pdf", fixture_pdf()),
    );
    let first = first.expect("build succeeds");
    let second = second.expect("build succeeds");

    assert!(!Arc::ptr_eq(&first, &second));
    let names: Vec<String> = indexer
        .list()
        .await
        .expect("list succeeds")
        .into_iter()
        .map(|n| n.name)
        .collect();
    assert_eq!(names, vec!["first", "second"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_build_publishes_nothing() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let embedder = Arc::new(BagOfWordsEmbedder::with_delay(Duration::from_millis(500)));
    let indexer = shared_indexer(&temp_dir, &embedder).await;

    let task = {
        let indexer = Arc::clone(&indexer);
        tokio::spawn(async move { indexer.knowledge_base("report.pdf", fixture_pdf()).await })
    };

    // Wait until the build is embedding, then cancel it
    while embedder.calls() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    task.abort();
    let outcome = task.await;
    assert!(outcome.is_err_and(|e| e.is_cancelled()));

    let report = Namespace::new("report").expect("valid namespace");
    assert!(!indexer.store().exists(&report).await);
    assert!(indexer.list().await.expect("list succeeds").is_empty());
    assert_eq!(hidden_entries(&temp_dir), 0);

    // The next request starts over and succeeds
    let knowledge_base = indexer
        .knowledge_base("report.pdf", fixture_pdf())
        .await
        .expect("build succeeds");
    assert_eq!(knowledge_base.origin(), IndexOrigin::Computed);
    assert!(indexer.store().exists(&report).await);
}
