//! Background dataset loading.
//!
//! The index is read and built off the render thread and published once,
//! whole, through a watch channel. Until then receivers see `None`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use memtrace_core::{build_index, parse_dataset, DatasetError, EmotionIndex};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read dataset {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed dataset: {0}")]
    Dataset(#[from] DatasetError),
    #[error("index build task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Read `path` and build the emotion index.
pub async fn load_index(path: &Path) -> Result<EmotionIndex, LoadError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let index = tokio::task::spawn_blocking(move || -> Result<EmotionIndex, DatasetError> {
        let records = parse_dataset(&bytes)?;
        Ok(build_index(&records))
    })
    .await??;

    tracing::info!(
        path = %path.display(),
        classes = index.class_count(),
        lines = index.total_lines(),
        skipped = index.skipped_turns(),
        "dataset indexed"
    );
    if index.is_empty() {
        tracing::warn!(path = %path.display(), "dataset holds no labeled lines; only the fallback line will be shown");
    }
    Ok(index)
}

/// Start loading `path` on `runtime` and return the channel the index will
/// be published on.
///
/// A failed load is logged and an empty index is published in its place, so
/// the installation keeps running on the fallback line.
pub fn spawn_loader(runtime: &Handle, path: PathBuf) -> watch::Receiver<Option<Arc<EmotionIndex>>> {
    let (tx, rx) = watch::channel(None);
    runtime.spawn(async move {
        let index = match load_index(&path).await {
            Ok(index) => index,
            Err(e) => {
                tracing::error!(error = %e, "dataset load failed; showing fallback text");
                EmotionIndex::default()
            }
        };
        tx.send_replace(Some(Arc::new(index)));
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use memtrace_core::EmotionClass;
    use std::io::Write;
    use std::time::Duration;

    fn write_dataset(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_index_from_jsonl() {
        let file = write_dataset(
            "{\"dialog\": [\"hi\", \"great!\"], \"emotion\": [0, 4]}\n\
             {\"dialog\": [\"oh no\"], \"emotion\": [5]}\n",
        );
        let index = load_index(file.path()).await.unwrap();
        assert_eq!(index.total_lines(), 3);
        assert_eq!(index.pool(&EmotionClass::from("4")), Some(&["great!".to_string()][..]));
    }

    #[tokio::test]
    async fn test_load_index_missing_file() {
        let err = load_index(Path::new("/nonexistent/dataset.json")).await.unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
    }

    #[tokio::test]
    async fn test_load_index_malformed() {
        let file = write_dataset("{\"dialog\": [\"hi\"]\nnot json\n");
        let err = load_index(file.path()).await.unwrap_err();
        assert!(matches!(err, LoadError::Dataset(_)));
    }

    #[tokio::test]
    async fn test_spawn_loader_publishes_once() {
        let file = write_dataset("[{\"dialog\": [\"hello\"], \"emotion\": [\"0\"]}]");
        let mut rx = spawn_loader(&Handle::current(), file.path().to_path_buf());

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        let index = rx.borrow().clone().unwrap();
        assert_eq!(index.pool(&EmotionClass::neutral()).map(|p| p.len()), Some(1));
    }

    #[tokio::test]
    async fn test_spawn_loader_failure_publishes_empty_index() {
        let mut rx = spawn_loader(&Handle::current(), PathBuf::from("/nonexistent/dataset.json"));
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        let index = rx.borrow().clone().unwrap();
        assert!(index.is_empty());
    }
}
