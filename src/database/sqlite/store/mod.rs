
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Context;
use chrono::Utc;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::models::{Manifest, StoredChunk};
use super::queries::{ChunkQueries, ManifestQueries};
use super::{Database, NAMESPACE_MIGRATOR};
use crate::index::{FlatIndex, Namespace, VectorIndex};
use crate::{AskPdfError, PersistStage, Result};

const INDEX_FILE: &str = "index.db";
const STAGING_PREFIX: &str = ".staging-";
/// Staging directories older than this belong to writers that died
const STALE_STAGING_AGE: Duration = Duration::from_secs(60 * 60);

/// A published namespace as reported by [`NamespaceStore::list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceInfo {
    pub name: String,
    /// `None` when the namespace directory could not be read
    pub manifest: Option<Manifest>,
}

/// Directory of persisted namespaces, one sub-directory each.
///
/// A namespace is written into a hidden staging directory and published with
/// a single rename, so readers only ever see complete namespaces.
#[derive(Debug, Clone)]
pub struct NamespaceStore {
    root: PathBuf,
}

impl NamespaceStore {
    /// Open the store, creating its directory and sweeping abandoned staging
    /// directories
    #[inline]
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            AskPdfError::persistence(root.display().to_string(), PersistStage::Staging, e)
        })?;

        let store = Self { root };
        let swept = store.sweep_stale_staging(STALE_STAGING_AGE).await;
        if swept > 0 {
            info!("Removed {} abandoned staging directories", swept);
        }

        Ok(store)
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn namespace_dir(&self, namespace: &Namespace) -> PathBuf {
        self.root.join(namespace.as_str())
    }

    /// Whether `namespace` has been published
    #[inline]
    pub async fn exists(&self, namespace: &Namespace) -> bool {
        is_dir(&self.namespace_dir(namespace)).await
    }

    /// Write `index` under `namespace`. If another writer publishes the same
    /// namespace first, its copy is kept.
    #[inline]
    pub async fn persist(&self, namespace: &Namespace, index: &FlatIndex) -> Result<()> {
        let staging = StagingDir::create(&self.root)
            .await
            .map_err(|e| AskPdfError::persistence(namespace.as_str(), PersistStage::Staging, e))?;
        debug!(
            "Writing namespace {} into {}",
            namespace,
            staging.path().display()
        );

        write_index(staging.path(), namespace, index)
            .await
            .map_err(|e| {
                AskPdfError::persistence(namespace.as_str(), PersistStage::Writing, format!("{:#}", e))
            })?;

        let target = self.namespace_dir(namespace);
        if fs::try_exists(&target).await.unwrap_or(false) {
            warn!(
                "Namespace {} was published by another writer, discarding this copy",
                namespace
            );
            return Ok(());
        }

        if let Err(e) = fs::rename(staging.path(), &target).await {
            if is_dir(&target).await {
                warn!(
                    "Namespace {} was published concurrently, discarding this copy",
                    namespace
                );
                return Ok(());
            }
            return Err(AskPdfError::persistence(
                namespace.as_str(),
                PersistStage::Publishing,
                e,
            ));
        }
        staging.disarm();

        info!(
            "Persisted {} chunks under namespace {}",
            index.len(),
            namespace
        );
        Ok(())
    }

    /// Read a published namespace back, `None` if it does not exist
    #[inline]
    pub async fn load(&self, namespace: &Namespace) -> Result<Option<FlatIndex>> {
        if !self.exists(namespace).await {
            return Ok(None);
        }

        let index = read_index(&self.namespace_dir(namespace).join(INDEX_FILE))
            .await
            .map_err(|e| {
                AskPdfError::persistence(namespace.as_str(), PersistStage::Loading, format!("{:#}", e))
            })?;

        info!(
            "Loaded {} chunks from namespace {}",
            index.len(),
            namespace
        );
        Ok(Some(index))
    }

    /// Every published namespace, sorted by name
    #[inline]
    pub async fn list(&self) -> Result<Vec<NamespaceInfo>> {
        let mut names = Vec::new();
        let read_error = |e: std::io::Error| {
            AskPdfError::persistence(self.root.display().to_string(), PersistStage::Loading, e)
        };
        let mut entries = fs::read_dir(&self.root).await.map_err(read_error)?;
        while let Some(entry) = entries.next_entry().await.map_err(read_error)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !is_dir(&entry.path()).await {
                continue;
            }
            names.push(name);
        }
        names.sort();

        let mut namespaces = Vec::with_capacity(names.len());
        for name in names {
            let path = self.root.join(&name).join(INDEX_FILE);
            let manifest = match read_manifest(&path).await {
                Ok(manifest) => Some(manifest),
                Err(e) => {
                    warn!("Could not read namespace {}: {:#}", name, e);
                    None
                }
            };
            namespaces.push(NamespaceInfo { name, manifest });
        }

        Ok(namespaces)
    }

    /// Delete a published namespace. Returns whether it existed.
    #[inline]
    pub async fn remove(&self, namespace: &Namespace) -> Result<bool> {
        let target = self.namespace_dir(namespace);
        if !is_dir(&target).await {
            return Ok(false);
        }

        // Unpublish atomically first so a partial delete is never loadable
        let graveyard = self.root.join(format!("{}{}", STAGING_PREFIX, Uuid::new_v4()));
        fs::rename(&target, &graveyard)
            .await
            .map_err(|e| AskPdfError::persistence(namespace.as_str(), PersistStage::Removing, e))?;
        fs::remove_dir_all(&graveyard)
            .await
            .map_err(|e| AskPdfError::persistence(namespace.as_str(), PersistStage::Removing, e))?;

        info!("Removed namespace {}", namespace);
        Ok(true)
    }

    /// Delete staging directories last modified more than `max_age` ago.
    /// Returns how many were removed.
    #[inline]
    pub async fn sweep_stale_staging(&self, max_age: Duration) -> usize {
        let Ok(mut entries) = fs::read_dir(&self.root).await else {
            return 0;
        };

        let now = SystemTime::now();
        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if !entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
                continue;
            }

            let age = entry
                .metadata()
                .await
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }

            match fs::remove_dir_all(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(
                    "Failed to remove staging directory {}: {}",
                    entry.path().display(),
                    e
                ),
            }
        }

        removed
    }
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

async fn write_index(dir: &Path, namespace: &Namespace, index: &FlatIndex) -> anyhow::Result<()> {
    let database = Database::new(dir.join(INDEX_FILE), &NAMESPACE_MIGRATOR).await?;

    let manifest = Manifest {
        namespace: namespace.to_string(),
        embedding_model: index.model().to_string(),
        dimension: index.dimension().unwrap_or(0) as i64,
        chunk_count: index.len() as i64,
        created_at: Utc::now().naive_utc(),
    };

    let mut transaction = database
        .pool()
        .begin()
        .await
        .context("Failed to begin namespace transaction")?;

    ManifestQueries::insert(&mut *transaction, &manifest).await?;
    for (position, (chunk, embedding)) in index.chunks().iter().zip(index.embeddings()).enumerate()
    {
        ChunkQueries::insert(&mut *transaction, &StoredChunk::new(position, chunk, embedding))
            .await?;
    }

    transaction
        .commit()
        .await
        .context("Failed to commit namespace transaction")?;
    database.close().await;

    Ok(())
}

async fn read_manifest(path: &Path) -> anyhow::Result<Manifest> {
    let database = Database::open_read_only(path).await?;
    let manifest = ManifestQueries::get(database.pool()).await;
    database.close().await;

    manifest?.context("Namespace has no manifest")
}

async fn read_index(path: &Path) -> anyhow::Result<FlatIndex> {
    let database = Database::open_read_only(path).await?;
    let manifest = ManifestQueries::get(database.pool()).await;
    let rows = ChunkQueries::list(database.pool()).await;
    database.close().await;

    let manifest = manifest?.context("Namespace has no manifest")?;
    let rows = rows?;

    if rows.len() as i64 != manifest.chunk_count {
        anyhow::bail!(
            "Manifest lists {} chunks but {} were stored",
            manifest.chunk_count,
            rows.len()
        );
    }

    let mut chunks = Vec::with_capacity(rows.len());
    let mut embeddings = Vec::with_capacity(rows.len());
    for row in rows {
        let (chunk, embedding) = row.into_parts().map_err(anyhow::Error::msg)?;
        if embedding.len() as i64 != manifest.dimension {
            anyhow::bail!(
                "Stored vector has dimension {}, manifest says {}",
                embedding.len(),
                manifest.dimension
            );
        }
        chunks.push(chunk);
        embeddings.push(embedding);
    }

    FlatIndex::new(manifest.embedding_model, chunks, embeddings).map_err(anyhow::Error::from)
}

/// Hidden directory removed on drop unless it was published
struct StagingDir {
    path: PathBuf,
    armed: bool,
}

impl StagingDir {
    async fn create(root: &Path) -> std::io::Result<Self> {
        let path = root.join(format!("{}{}", STAGING_PREFIX, Uuid::new_v4()));
        fs::create_dir_all(&path).await?;
        Ok(Self { path, armed: true })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.armed && self.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!(
                    "Failed to remove staging directory {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}
