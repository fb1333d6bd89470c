// Vector index module
// Exact nearest-neighbour search over chunk embeddings, in memory or backed
// by a persisted namespace


pub mod cache;
pub mod flat;
pub mod namespace;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::chunking::Chunk;

pub use cache::IndexCache;
pub use flat::FlatIndex;
pub use namespace::Namespace;

/// Where built indexes live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreKind {
    /// In-process only, rebuilt on every run
    Memory,
    /// Persisted under a namespace and reloaded on later runs
    #[default]
    Disk,
}

impl fmt::Display for VectorStoreKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            VectorStoreKind::Memory => write!(f, "memory"),
            VectorStoreKind::Disk => write!(f, "disk"),
        }
    }
}

/// One search result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: Chunk,
    /// Position of the chunk in document order
    pub position: usize,
    /// Cosine similarity in `[-1, 1]`
    pub score: f32,
}

/// Search capability shared by every vector store
pub trait VectorIndex: Send + Sync {
    fn len(&self) -> usize;

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimension of the stored vectors, `None` while the index is empty
    fn dimension(&self) -> Option<usize>;

    /// The `k` chunks most similar to `query`, best first. Equal scores keep
    /// document order.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;
}

/// How a knowledge base came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
    /// Embeddings were computed during this run
    Computed,
    /// Embeddings were read back from a persisted namespace
    Loaded,
}

/// The index a question is answered from
#[derive(Debug, Clone)]
pub enum KnowledgeBase {
    Memory(FlatIndex),
    Persisted {
        namespace: Namespace,
        index: FlatIndex,
        origin: IndexOrigin,
    },
}

impl KnowledgeBase {
    #[inline]
    pub fn origin(&self) -> IndexOrigin {
        match self {
            Self::Memory(_) => IndexOrigin::Computed,
            Self::Persisted { origin, .. } => *origin,
        }
    }

    #[inline]
    pub fn namespace(&self) -> Option<&Namespace> {
        match self {
            Self::Memory(_) => None,
            Self::Persisted { namespace, .. } => Some(namespace),
        }
    }

    #[inline]
    pub fn index(&self) -> &FlatIndex {
        match self {
            Self::Memory(index) | Self::Persisted { index, .. } => index,
        }
    }

    #[inline]
    pub fn kind(&self) -> VectorStoreKind {
        match self {
            Self::Memory(_) => VectorStoreKind::Memory,
            Self::Persisted { .. } => VectorStoreKind::Disk,
        }
    }
}

impl VectorIndex for KnowledgeBase {
    #[inline]
    fn len(&self) -> usize {
        self.index().len()
    }

    #[inline]
    fn dimension(&self) -> Option<usize> {
        self.index().dimension()
    }

    #[inline]
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.index().search(query, k)
    }
}
