//! Chunk producers: turn a corpus location into `(source id, text)` pairs.

use async_trait::async_trait;
use docrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use text_splitter::{ChunkConfig, TextSplitter};
use walkdir::WalkDir;

use super::signature::decode_text;

/// One unit of text to embed and index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceChunk {
    pub source_id: String,
    pub text: String,
}

impl SourceChunk {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
        }
    }
}

/// Produces chunks for a corpus location.
#[async_trait]
pub trait ChunkProducer: Send + Sync {
    /// Extract chunks from a single resource or a whole directory tree.
    async fn extract(&self, location: &Path) -> AppResult<Vec<SourceChunk>>;
}

/// Chunking settings for [`FileChunkProducer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingOptions {
    /// Maximum characters per chunk
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,

    /// Prefix every chunk with "<file name>. "
    pub prefix_file_name: bool,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 200,
            prefix_file_name: true,
        }
    }
}

/// Reads plain-text files from disk.
///
/// Binary formats are recognized by signature and skipped, as are files
/// that do not decode as text. Directory walks are sorted by file name so
/// ingestion order is deterministic.
#[derive(Debug, Clone, Default)]
pub struct FileChunkProducer {
    options: ChunkingOptions,
}

impl FileChunkProducer {
    pub fn new(options: ChunkingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ChunkingOptions {
        &self.options
    }

    /// Blocking extraction; [`ChunkProducer::extract`] runs this on the
    /// blocking pool.
    pub fn extract_blocking(&self, location: &Path) -> AppResult<Vec<SourceChunk>> {
        let splitter = self.splitter()?;

        if !location.exists() {
            return Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Corpus location does not exist: {}", location.display()),
            )));
        }

        let mut chunks = Vec::new();
        let mut files = 0usize;
        for path in discover_files(location) {
            files += 1;
            match std::fs::read(&path) {
                Ok(bytes) => match decode_text(&bytes) {
                    Some(text) => chunks.extend(self.chunk_file(&splitter, &path, &text)),
                    None => tracing::warn!("Skipping non-text file: {:?}", path),
                },
                Err(e) => tracing::warn!("Skipping unreadable file {:?}: {}", path, e),
            }
        }

        tracing::debug!(
            "Extracted {} chunks from {} files under {:?}",
            chunks.len(),
            files,
            location
        );
        Ok(chunks)
    }

    fn splitter(&self) -> AppResult<TextSplitter<text_splitter::Characters>> {
        let config = ChunkConfig::new(self.options.chunk_size)
            .with_overlap(self.options.chunk_overlap)
            .map_err(|e| AppError::Config(format!("Invalid chunk settings: {}", e)))?;
        Ok(TextSplitter::new(config))
    }

    fn chunk_file(
        &self,
        splitter: &TextSplitter<text_splitter::Characters>,
        path: &Path,
        text: &str,
    ) -> Vec<SourceChunk> {
        let source_id = path.display().to_string();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_id.clone());

        splitter
            .chunks(text)
            .filter(|chunk| !chunk.trim().is_empty())
            .map(|chunk| {
                let body = flatten_newlines(chunk);
                let text = if self.options.prefix_file_name {
                    format!("{}. {}", file_name, body)
                } else {
                    body
                };
                SourceChunk::new(source_id.clone(), text)
            })
            .collect()
    }
}

#[async_trait]
impl ChunkProducer for FileChunkProducer {
    async fn extract(&self, location: &Path) -> AppResult<Vec<SourceChunk>> {
        let producer = self.clone();
        let location = location.to_path_buf();
        tokio::task::spawn_blocking(move || producer.extract_blocking(&location))
            .await
            .map_err(|e| AppError::Knowledge(format!("Chunk extraction task failed: {}", e)))?
    }
}

/// Regular files at `location`, sorted for a stable order.
fn discover_files(location: &Path) -> Vec<PathBuf> {
    if location.is_file() {
        return vec![location.to_path_buf()];
    }

    WalkDir::new(location)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

/// Collapse line breaks so every chunk reads as one run of sentences.
fn flatten_newlines(text: &str) -> String {
    text.trim()
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join(". ")
}

/// Producer over a fixed list of chunks, ignoring the location.
#[derive(Debug, Clone, Default)]
pub struct StaticChunkProducer {
    chunks: Vec<SourceChunk>,
}

impl StaticChunkProducer {
    pub fn new(chunks: Vec<SourceChunk>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl ChunkProducer for StaticChunkProducer {
    async fn extract(&self, _location: &Path) -> AppResult<Vec<SourceChunk>> {
        Ok(self.chunks.clone())
    }
}
