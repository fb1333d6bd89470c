use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OnceCell;
use tracing::debug;

use super::{KnowledgeBase, Namespace};
use crate::Result;

type Cell = Arc<OnceCell<Arc<KnowledgeBase>>>;

/// Process-wide map from namespace to its knowledge base.
///
/// Initialisation of a namespace runs at most once at a time: concurrent
/// callers wait for the first one and share its result. A failed or
/// cancelled initialisation leaves the slot empty for the next caller.
#[derive(Debug, Default)]
pub struct IndexCache {
    cells: Mutex<HashMap<Namespace, Cell>>,
}

impl IndexCache {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached knowledge base for `namespace`, running `init` to
    /// create it if no caller has done so yet
    #[inline]
    pub async fn get_or_try_init<F, Fut>(
        &self,
        namespace: &Namespace,
        init: F,
    ) -> Result<Arc<KnowledgeBase>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<KnowledgeBase>>,
    {
        let cell = Arc::clone(self.lock().entry(namespace.clone()).or_default());

        let knowledge_base = cell
            .get_or_try_init(|| async move {
                debug!("Initialising knowledge base for namespace {}", namespace);
                init().await.map(Arc::new)
            })
            .await?;

        Ok(Arc::clone(knowledge_base))
    }

    /// The knowledge base for `namespace`, if one has been initialised
    #[inline]
    pub fn get(&self, namespace: &Namespace) -> Option<Arc<KnowledgeBase>> {
        self.lock()
            .get(namespace)
            .and_then(|cell| cell.get().map(Arc::clone))
    }

    /// Forget `namespace` so the next request rebuilds or reloads it
    #[inline]
    pub fn invalidate(&self, namespace: &Namespace) -> bool {
        self.lock().remove(namespace).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Namespace, Cell>> {
        self.cells.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
