use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tempfile::Builder as TempFileBuilder;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::generator::ImageBytes;

pub const PROMPT_SLUG_MAX_CHARS: usize = 50;
pub const REQUESTER_SLUG_MAX_CHARS: usize = 64;
pub const MAX_NAME_ATTEMPTS: u32 = 1000;
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A persisted image. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedArtifact {
    pub filename: String,
    pub path: PathBuf,
    pub byte_len: u64,
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    write_timeout: Duration,
    #[cfg(test)]
    stall: Option<Duration>,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, write_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            write_timeout,
            #[cfg(test)]
            stall: None,
        }
    }

    /// Delays every worker before it touches the disk.
    #[cfg(test)]
    fn with_stall(mut self, stall: Duration) -> Self {
        self.stall = Some(stall);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn persist(
        &self,
        image: ImageBytes,
        requester_id: &str,
        prompt: &str,
    ) -> Result<GeneratedArtifact, StorageError> {
        self.persist_at(image, requester_id, prompt, Utc::now())
    }

    /// Writes `image` under a name derived from `timestamp`, requester and prompt.
    ///
    /// The bytes land in a hidden temporary file first and are then linked into
    /// place without clobbering; an existing name moves on to the next suffix.
    pub fn persist_at(
        &self,
        image: ImageBytes,
        requester_id: &str,
        prompt: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<GeneratedArtifact, StorageError> {
        std::fs::create_dir_all(&self.root).map_err(|source| StorageError::CreateDir {
            path: self.root.clone(),
            source,
        })?;

        let stem = artifact_stem(timestamp, requester_id, prompt);
        let byte_len = image.bytes.len() as u64;
        let sha256 = hex::encode(Sha256::digest(&image.bytes));

        let (tx, rx) = mpsc::channel();
        let abandoned = Arc::new(AtomicBool::new(false));
        let worker_abandoned = Arc::clone(&abandoned);
        let root = self.root.clone();
        let worker_stem = stem.clone();
        #[cfg(test)]
        let stall = self.stall;
        thread::Builder::new()
            .name("artifact-writer".to_string())
            .spawn(move || {
                #[cfg(test)]
                if let Some(stall) = stall {
                    thread::sleep(stall);
                }
                let result = write_unique(&root, &worker_stem, &image.bytes, &worker_abandoned);
                let _ = tx.send(result);
            })
            .map_err(|source| StorageError::Write {
                path: self.root.clone(),
                source,
            })?;

        let (filename, path) = match rx.recv_timeout(self.write_timeout) {
            Ok(result) => result?,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                abandoned.store(true, Ordering::SeqCst);
                warn!(stem = %stem, "artifact write timed out; abandoning");
                return Err(StorageError::TimedOut {
                    timeout: self.write_timeout,
                });
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => return Err(StorageError::WorkerLost),
        };

        debug!(filename = %filename, byte_len, "artifact persisted");
        Ok(GeneratedArtifact {
            filename,
            path,
            byte_len,
            sha256,
            created_at: timestamp,
        })
    }

    /// Re-reads a stored artifact by the filename `persist` returned.
    ///
    /// Only names shaped like `{YYYYMMDD_HHMMSS}_{slug}.png` are served, so
    /// nothing else living under the root can be read back.
    pub fn fetch(&self, filename: &str) -> Result<Vec<u8>, StorageError> {
        if !is_artifact_name(filename) {
            return Err(StorageError::InvalidName {
                name: filename.to_string(),
            });
        }
        let path = self.root.join(filename);
        std::fs::read(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StorageError::NotFound {
                    name: filename.to_string(),
                }
            } else {
                StorageError::Read { path, source }
            }
        })
    }
}

fn write_unique(
    root: &Path,
    stem: &str,
    bytes: &[u8],
    abandoned: &AtomicBool,
) -> Result<(String, PathBuf), StorageError> {
    let write_err = |path: &Path, source: io::Error| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut temp = TempFileBuilder::new()
        .prefix(".stickerme-")
        .suffix(".part")
        .tempfile_in(root)
        .map_err(|source| write_err(root, source))?;
    temp.write_all(bytes)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|source| write_err(temp.path(), source))?;

    for attempt in 0..MAX_NAME_ATTEMPTS {
        if abandoned.load(Ordering::SeqCst) {
            return Err(StorageError::Abandoned);
        }
        let filename = if attempt == 0 {
            format!("{stem}.png")
        } else {
            format!("{stem}_{attempt}.png")
        };
        let path = root.join(&filename);
        match temp.persist_noclobber(&path) {
            Ok(_) => return Ok((filename, path)),
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                temp = err.file;
            }
            Err(err) => return Err(write_err(&path, err.error)),
        }
    }

    Err(StorageError::NamesExhausted {
        stem: stem.to_string(),
        attempts: MAX_NAME_ATTEMPTS,
    })
}

/// `{YYYYMMDD_HHMMSS}_{requester}_{prompt}` without extension or suffix.
pub fn artifact_stem(timestamp: DateTime<Utc>, requester_id: &str, prompt: &str) -> String {
    format!(
        "{}_{}_{}",
        timestamp.format(TIMESTAMP_FORMAT),
        sanitize_requester(requester_id),
        sanitize_prompt(prompt)
    )
}

pub fn sanitize_prompt(prompt: &str) -> String {
    let slug = slugify(prompt, PROMPT_SLUG_MAX_CHARS);
    if slug.is_empty() {
        "image".to_string()
    } else {
        slug
    }
}

pub fn sanitize_requester(requester_id: &str) -> String {
    let slug = slugify(requester_id, REQUESTER_SLUG_MAX_CHARS);
    if slug.is_empty() {
        "anonymous".to_string()
    } else {
        slug
    }
}

/// Keeps ASCII alphanumerics, `-` and `_`; whitespace runs become one `_`.
fn slugify(raw: &str, max_chars: usize) -> String {
    let mut out = String::new();
    let mut pending_gap = false;
    for ch in raw.chars() {
        if ch.is_whitespace() {
            pending_gap = true;
            continue;
        }
        if !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_') {
            continue;
        }
        if pending_gap && !out.is_empty() {
            out.push('_');
        }
        pending_gap = false;
        out.push(ch);
    }
    let trimmed: String = out
        .trim_matches(|c: char| c == '_' || c == '-')
        .chars()
        .take(max_chars)
        .collect();
    trimmed.trim_end_matches(|c: char| c == '_' || c == '-').to_string()
}

fn is_artifact_name(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".png") else {
        return false;
    };
    let bytes = stem.as_bytes();
    let is_digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);
    bytes.len() > 16
        && is_digits(0..8)
        && bytes[8] == b'_'
        && is_digits(9..15)
        && bytes[15] == b'_'
        && bytes[16..]
            .iter()
            .all(|byte| byte.is_ascii_alphanumeric() || *byte == b'-' || *byte == b'_')
}
