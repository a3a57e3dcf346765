//! Output persistence: PNG files numbered per preset prefix.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use qedit_core::naming::{next_sequence, output_filename};

use crate::engine::EngineError;

/// Flat output directory. Saves are serialized so two writers never pick
/// the same sequence number.
pub struct OutputStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl OutputStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `png` as the next `{prefix}-api_NNN.png` and return its path.
    pub async fn save(&self, prefix: &str, png: &[u8]) -> Result<PathBuf, EngineError> {
        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }

        let number = next_sequence(prefix, names.iter().map(String::as_str));
        let path = self.dir.join(output_filename(prefix, number));

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(png).await?;
        file.flush().await?;

        tracing::debug!(path = %path.display(), bytes = png.len(), "Output image saved");
        Ok(path)
    }
}

/// Normalize engine output to PNG. PNG passes through untouched; JPEG is
/// decoded and re-encoded.
pub fn ensure_png(bytes: Vec<u8>) -> Result<Vec<u8>, EngineError> {
    match image::guess_format(&bytes) {
        Ok(ImageFormat::Png) => Ok(bytes),
        Ok(ImageFormat::Jpeg) => {
            let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
                .map_err(|e| EngineError::InvalidOutput(e.to_string()))?;
            let mut out = Cursor::new(Vec::new());
            decoded
                .write_to(&mut out, ImageFormat::Png)
                .map_err(|e| EngineError::InvalidOutput(e.to_string()))?;
            Ok(out.into_inner())
        }
        Ok(other) => Err(EngineError::InvalidOutput(format!(
            "unsupported format {other:?}"
        ))),
        Err(_) => Err(EngineError::InvalidOutput(
            "unrecognized image data".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[tokio::test]
    async fn numbers_continue_from_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("qwen04-api_007.png"), b"old").unwrap();
        std::fs::write(dir.path().join("qwen08-api_099.png"), b"other").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let store = OutputStore::new(dir.path());
        let first = store.save("qwen04", PNG_MAGIC).await.unwrap();
        let second = store.save("qwen04", PNG_MAGIC).await.unwrap();

        assert_eq!(first.file_name().unwrap(), "qwen04-api_008.png");
        assert_eq!(second.file_name().unwrap(), "qwen04-api_009.png");
        assert_eq!(std::fs::read(&first).unwrap(), PNG_MAGIC);
    }

    #[tokio::test]
    async fn creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path().join("nested/out"));
        let path = store.save("qwen40", PNG_MAGIC).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "qwen40-api_001.png");
    }

    #[test]
    fn png_passes_through() {
        assert_eq!(ensure_png(PNG_MAGIC.to_vec()).unwrap(), PNG_MAGIC);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            ensure_png(b"not an image".to_vec()),
            Err(EngineError::InvalidOutput(_))
        ));
    }
}
