// Indexer module
// Turns an uploaded PDF into a knowledge base, reusing persisted namespaces


use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chunking::{ChunkingConfig, Splitter, TextSplitter};
use crate::config::Config;
use crate::database::{NamespaceInfo, NamespaceStore};
use crate::embeddings::Embedder;
use crate::extractor::{check_pdf_header, extract_text};
use crate::index::{
    FlatIndex, IndexCache, IndexOrigin, KnowledgeBase, Namespace, VectorIndex, VectorStoreKind,
};
use crate::Result;

const DEFAULT_BATCH_SIZE: usize = 16;

/// Builds or loads the knowledge base for a document.
///
/// Disk-backed namespaces are resolved through an [`IndexCache`], so
/// concurrent requests for the same document embed it at most once.
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    splitter: Splitter,
    vector_store: VectorStoreKind,
    batch_size: usize,
    store: NamespaceStore,
    cache: IndexCache,
}

impl Indexer {
    /// Chunking settings are validated here, before any document is read
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: NamespaceStore,
        chunking: &ChunkingConfig,
        vector_store: VectorStoreKind,
    ) -> Result<Self> {
        Ok(Self {
            embedder,
            splitter: Splitter::from_config(chunking)?,
            vector_store,
            batch_size: DEFAULT_BATCH_SIZE,
            store,
            cache: IndexCache::new(),
        })
    }

    /// Indexer for the settings in `config`, storing namespaces under its
    /// vector directory
    #[inline]
    pub async fn from_config(config: &Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        config.validate()?;
        let store = NamespaceStore::open(config.vector_dir()).await?;

        Ok(Self::new(embedder, store, &config.chunking, config.index.vector_store)?
            .with_batch_size(config.ollama.batch_size as usize))
    }

    #[inline]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[inline]
    pub fn vector_store(&self) -> VectorStoreKind {
        self.vector_store
    }

    #[inline]
    pub fn store(&self) -> &NamespaceStore {
        &self.store
    }

    /// The knowledge base for the PDF `bytes` uploaded as `document_name`.
    ///
    /// With the disk store, a namespace that already exists is loaded as is,
    /// even if the document has changed since it was built.
    #[inline]
    pub async fn knowledge_base(
        &self,
        document_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Arc<KnowledgeBase>> {
        check_pdf_header(&bytes)?;

        match self.vector_store {
            VectorStoreKind::Memory => {
                let index = self.build(bytes).await?;
                Ok(Arc::new(KnowledgeBase::Memory(index)))
            }
            VectorStoreKind::Disk => {
                let namespace = Namespace::from_document_name(document_name)?;
                self.cache
                    .get_or_try_init(&namespace, || self.load_or_build(namespace.clone(), bytes))
                    .await
            }
        }
    }

    /// Persisted namespaces, sorted by name
    #[inline]
    pub async fn list(&self) -> Result<Vec<NamespaceInfo>> {
        self.store.list().await
    }

    /// Delete a persisted namespace so the next upload rebuilds it. Returns
    /// whether it existed.
    #[inline]
    pub async fn forget(&self, name: &str) -> Result<bool> {
        let namespace = Namespace::parse(name)?;
        self.cache.invalidate(&namespace);
        self.store.remove(&namespace).await
    }

    async fn load_or_build(&self, namespace: Namespace, bytes: Vec<u8>) -> Result<KnowledgeBase> {
        if let Some(index) = self.store.load(&namespace).await? {
            if index.model() != self.embedder.model_name() {
                warn!(
                    "Namespace {} was embedded with {}, questions are embedded with {}",
                    namespace,
                    index.model(),
                    self.embedder.model_name()
                );
            }
            info!("Embeddings for {} loaded from disk", namespace);
            return Ok(KnowledgeBase::Persisted {
                namespace,
                index,
                origin: IndexOrigin::Loaded,
            });
        }

        let index = self
            .build(bytes)
            .await
            .map_err(|e| e.in_namespace(&namespace))?;
        self.store.persist(&namespace, &index).await?;
        info!("Embedding computation for {} completed", namespace);

        Ok(KnowledgeBase::Persisted {
            namespace,
            index,
            origin: IndexOrigin::Computed,
        })
    }

    async fn build(&self, bytes: Vec<u8>) -> Result<FlatIndex> {
        let text = extract_text(bytes).await?;
        let chunks = self.splitter.split(&text);
        debug!("Document produced {} chunks", chunks.len());

        let index = FlatIndex::build(chunks, self.embedder.as_ref(), self.batch_size).await?;
        debug!(
            "Built index of {} vectors with dimension {:?}",
            index.len(),
            index.dimension()
        );
        Ok(index)
    }
}
