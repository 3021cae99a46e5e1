//! JSON snapshots of a [`MemoryStore`].
//!
//! The CLI loads the snapshot before running a command and writes it back
//! afterwards, so state survives between invocations. A missing file is an
//! empty store.
//!
//! ```text
//! data/
//! └── articles.json   # array of Article, id order
//! ```

use super::MemoryStore;
use crate::error::Result;
use crate::models::Article;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Load a store from `path`, or an empty store if the file does not exist.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load(path: &Path) -> Result<MemoryStore> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("No snapshot yet, starting empty");
            return Ok(MemoryStore::new());
        }
        Err(e) => return Err(e.into()),
    };
    let articles: Vec<Article> = serde_json::from_str(&raw)?;
    info!(count = articles.len(), "Loaded snapshot");
    MemoryStore::from_articles(articles)
}

/// Write every article in `store` to `path`, creating parent directories.
///
/// The JSON is written to a sibling temp file first and renamed into place.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn save(store: &MemoryStore, path: &Path) -> Result<()> {
    let articles = store.all().await;
    let json = serde_json::to_string_pretty(&articles)?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create snapshot dir");
            return Err(e.into());
        }
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).await?;
    fs::rename(&tmp, path).await?;
    info!(count = articles.len(), "Wrote snapshot");
    Ok(())
}
