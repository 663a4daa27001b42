//! The tracked-file set: per-file upload/delete lifecycle state shared by
//! every in-flight task. All mutations go through the tracker and are keyed
//! by the entry's id, never by file identity, so two identical files dropped
//! together can never clobber each other's state.

use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

use crate::accept::OfferedFile;

pub type FileId = Uuid;

/// One file's lifecycle record.
///
/// Invariants: `key` is present exactly when the upload endpoint has
/// responded successfully; `uploading` and `is_deleting` are never both
/// true; confirmed deletion removes the entry outright.
#[derive(Debug, Clone)]
pub struct TrackedFile {
    pub id: FileId,
    pub name: String,
    pub content_type: String,
    pub size: u64,
    pub path: PathBuf,
    pub uploading: bool,
    pub progress: u8,
    pub key: Option<String>,
    pub is_deleting: bool,
    pub error: bool,
    /// In-memory preview bytes for images, released on removal.
    pub preview: Option<Bytes>,
}

impl TrackedFile {
    pub fn new(offer: OfferedFile, preview: Option<Bytes>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: offer.name,
            content_type: offer.content_type,
            size: offer.size,
            path: offer.path,
            uploading: false,
            progress: 0,
            key: None,
            is_deleting: false,
            error: false,
            preview,
        }
    }
}

#[derive(Debug, Default)]
pub struct Tracker {
    files: Mutex<Vec<TrackedFile>>,
}

impl Tracker {
    pub fn insert(&self, file: TrackedFile) {
        self.files.lock().expect("tracker lock").push(file);
    }

    /// Apply `apply` to the entry with the given id. Returns false when the
    /// entry is gone (removed while the caller's task was in flight).
    pub fn update(&self, id: FileId, apply: impl FnOnce(&mut TrackedFile)) -> bool {
        let mut files = self.files.lock().expect("tracker lock");
        match files.iter_mut().find(|file| file.id == id) {
            Some(file) => {
                apply(file);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: FileId) -> Option<TrackedFile> {
        self.files
            .lock()
            .expect("tracker lock")
            .iter()
            .find(|file| file.id == id)
            .cloned()
    }

    pub fn remove(&self, id: FileId) -> Option<TrackedFile> {
        let mut files = self.files.lock().expect("tracker lock");
        let index = files.iter().position(|file| file.id == id)?;
        Some(files.remove(index))
    }

    /// Release the entry's preview without touching the rest of its state.
    pub fn take_preview(&self, id: FileId) -> Option<Bytes> {
        let mut files = self.files.lock().expect("tracker lock");
        files
            .iter_mut()
            .find(|file| file.id == id)
            .and_then(|file| file.preview.take())
    }

    pub fn len(&self) -> usize {
        self.files.lock().expect("tracker lock").len()
    }

    pub fn snapshot(&self) -> Vec<TrackedFile> {
        self.files.lock().expect("tracker lock").clone()
    }
}
