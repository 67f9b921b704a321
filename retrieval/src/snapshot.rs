//! On-disk snapshot of the vector index.
//!
//! A snapshot is two JSON files in one directory:
//!
//! - `chunks.json`: `{format_version, build_id, chunks}`
//! - `vectors.json`: `{format_version, build_id, dimension, vectors}`
//!
//! Both carry the same `build_id`, so a half-written or mixed snapshot is
//! detected on load instead of silently pairing vectors with the wrong text.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use baggage_documents::Chunk;
use baggage_embeddings::{Embedding, VectorIndex};

use crate::error::{Result, RetrievalError};

/// Version of the snapshot format.
pub const FORMAT_VERSION: u32 = 1;

const CHUNKS_FILE: &str = "chunks.json";
const VECTORS_FILE: &str = "vectors.json";

#[derive(Debug, Serialize, Deserialize)]
struct ChunksFile {
    format_version: u32,
    build_id: String,
    chunks: Vec<Chunk>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VectorsFile {
    format_version: u32,
    build_id: String,
    dimension: usize,
    vectors: Vec<Embedding>,
}

/// Reads and writes index snapshots in a directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Create a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn chunks_path(&self) -> PathBuf {
        self.dir.join(CHUNKS_FILE)
    }

    fn vectors_path(&self) -> PathBuf {
        self.dir.join(VECTORS_FILE)
    }

    /// Whether both snapshot files are present.
    pub fn exists(&self) -> bool {
        self.chunks_path().is_file() && self.vectors_path().is_file()
    }

    /// Write `index` as a new snapshot, replacing any previous one.
    ///
    /// Returns the build id shared by both files.
    pub fn save(&self, index: &VectorIndex<Chunk>) -> Result<String> {
        fs::create_dir_all(&self.dir)?;
        let build_id = uuid::Uuid::new_v4().to_string();

        let chunks = ChunksFile {
            format_version: FORMAT_VERSION,
            build_id: build_id.clone(),
            chunks: index.items().to_vec(),
        };
        let vectors = VectorsFile {
            format_version: FORMAT_VERSION,
            build_id: build_id.clone(),
            dimension: index.dimension(),
            vectors: index.vectors().to_vec(),
        };

        // Chunks first, vectors last
        write_all_atomic(&[
            (self.chunks_path(), serde_json::to_vec_pretty(&chunks)?),
            (self.vectors_path(), serde_json::to_vec(&vectors)?),
        ])?;

        info!(
            "Saved index snapshot {build_id} ({} chunks, dimension {}) to {}",
            index.len(),
            index.dimension(),
            self.dir.display()
        );
        Ok(build_id)
    }

    /// Load the snapshot, verifying both files belong to the same build.
    pub fn load(&self) -> Result<VectorIndex<Chunk>> {
        if !self.exists() {
            return Err(RetrievalError::SnapshotMissing {
                dir: self.dir.clone(),
            });
        }

        let chunks: ChunksFile = read_json(&self.chunks_path())?;
        let vectors: VectorsFile = read_json(&self.vectors_path())?;

        for version in [chunks.format_version, vectors.format_version] {
            if version != FORMAT_VERSION {
                return Err(RetrievalError::SnapshotCorrupt(format!(
                    "format version {version}, expected {FORMAT_VERSION}"
                )));
            }
        }
        if chunks.build_id != vectors.build_id {
            return Err(RetrievalError::SnapshotCorrupt(format!(
                "{CHUNKS_FILE} is from build {} but {VECTORS_FILE} is from build {}",
                chunks.build_id, vectors.build_id
            )));
        }

        let count = chunks.chunks.len();
        let index = VectorIndex::from_parts(vectors.dimension, vectors.vectors, chunks.chunks)
            .map_err(|e| RetrievalError::SnapshotCorrupt(e.to_string()))?;

        info!(
            "Loaded index snapshot {} ({count} chunks) from {}",
            chunks.build_id,
            self.dir.display()
        );
        Ok(index)
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        RetrievalError::SnapshotCorrupt(format!("{}: {e}", path.display()))
    })
}

/// Stage every file next to its target, then rename them into place. A
/// failed write leaves the previous files untouched.
fn write_all_atomic(files: &[(PathBuf, Vec<u8>)]) -> Result<()> {
    let mut staged = Vec::with_capacity(files.len());
    for (path, bytes) in files {
        let tmp = path.with_extension("json.tmp");
        if let Err(err) = fs::write(&tmp, bytes) {
            let _ = fs::remove_file(&tmp);
            for (staged_tmp, _) in &staged {
                let _ = fs::remove_file(staged_tmp);
            }
            return Err(err.into());
        }
        staged.push((tmp, path));
    }

    for (tmp, path) in staged {
        fs::rename(&tmp, path)?;
        debug!("Wrote {}", path.display());
    }
    Ok(())
}
