use crate::ai::mime::{detect_image_mime, extension_for};
use crate::models::GeneratedImage;
use crate::Result;
use chrono::Utc;
use std::path::{Path, PathBuf};

/// Writes gallery images to a download directory.
pub struct ImageExporter {
    output_dir: PathBuf,
}

impl ImageExporter {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File name for gallery entry `index`, unique per second.
    pub fn file_name(index: usize, timestamp: i64, image_bytes: &[u8]) -> String {
        let ext = extension_for(detect_image_mime(image_bytes));
        format!("generated_image_{}_{}.{}", index, timestamp, ext)
    }

    /// Save `image` (gallery position `index`) into `dir` and return the
    /// written path.
    pub async fn save_to(&self, dir: &Path, image: &GeneratedImage, index: usize) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;

        let file_name = Self::file_name(index, Utc::now().timestamp(), &image.image_bytes);
        let path = dir.join(file_name);
        tokio::fs::write(&path, &image.image_bytes).await?;

        tracing::info!(
            "Saved image {} ({} bytes) to {}",
            index,
            image.image_bytes.len(),
            path.display()
        );
        Ok(path)
    }
}
