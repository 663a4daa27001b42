//! The upload engine: screens dropped files, drives the two-step upload
//! (ticket request, then a direct streamed PUT against the presigned URL)
//! and deletion, and keeps the tracked-file set consistent throughout.
//!
//! Every accepted file runs as its own task; there is no shared queue, no
//! retry and no cancellation. A failed file never disturbs its siblings.

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use thiserror::Error;
use tokio::fs::File;
use tokio::sync::broadcast;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::accept::{
    AcceptPolicy, FileKind, OfferedFile, RejectReason, Rejection, rejection_notices,
};
use crate::config::EVENT_CHANNEL_CAPACITY;
use crate::delete::DeleteRequest;
use crate::events::{DropEvent, Notice, NoticeKind};
use crate::tracker::{FileId, TrackedFile, Tracker};
use crate::upload::{UploadTicketRequest, UploadTicketResponse};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct Engine {
    api_base: String,
    http: reqwest::Client,
    policy: AcceptPolicy,
    tracker: Arc<Tracker>,
    events: broadcast::Sender<DropEvent>,
}

impl Engine {
    pub fn new(api_base: impl Into<String>, policy: AcceptPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            policy,
            tracker: Arc::new(Tracker::default()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DropEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> Vec<TrackedFile> {
        self.tracker.snapshot()
    }

    /// Accept a batch of dropped paths. Rejections become notices; each
    /// accepted file is tracked and its upload spawned immediately. Returns
    /// the ids of the accepted entries.
    pub async fn drop_files(&self, paths: &[PathBuf]) -> Vec<FileId> {
        let mut offered = Vec::new();
        let mut unreadable = Vec::new();
        for path in paths {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            match tokio::fs::metadata(path).await {
                Ok(meta) if meta.is_file() => {
                    let content_type = mime_guess::from_path(path)
                        .first_or_octet_stream()
                        .essence_str()
                        .to_string();
                    offered.push(OfferedFile {
                        path: path.clone(),
                        name,
                        content_type,
                        size: meta.len(),
                    });
                }
                Ok(_) => unreadable.push(Rejection {
                    file: placeholder_offer(path, name),
                    reason: RejectReason::Unknown("not a regular file".to_string()),
                }),
                Err(err) => unreadable.push(Rejection {
                    file: placeholder_offer(path, name),
                    reason: RejectReason::Unknown(err.to_string()),
                }),
            }
        }

        let mut screened = self.policy.screen(offered, self.tracker.len());
        screened.rejections.extend(unreadable);
        for notice in rejection_notices(&screened.rejections) {
            let _ = self.events.send(DropEvent::Notice(notice));
        }

        let mut ids = Vec::new();
        for offer in screened.accepted {
            let kind = FileKind::of(&offer.name, &offer.content_type);
            let preview = if kind == FileKind::Image {
                tokio::fs::read(&offer.path).await.ok().map(Bytes::from)
            } else {
                None
            };
            let entry = TrackedFile::new(offer, preview);
            let id = entry.id;
            let _ = self.events.send(DropEvent::Added {
                id,
                name: entry.name.clone(),
                size: entry.size,
                kind,
            });
            self.tracker.insert(entry);
            ids.push(id);

            let engine = self.clone();
            tokio::spawn(async move {
                engine.upload_file(id).await;
            });
        }
        ids
    }

    /// Run one file's upload to completion: ticket, then the direct
    /// transfer. All state changes target the entry by id.
    pub async fn upload_file(&self, id: FileId) {
        let Some(entry) = self.tracker.get(id) else {
            return;
        };
        if entry.uploading || entry.is_deleting {
            return;
        }
        self.tracker.update(id, |file| file.uploading = true);

        let ticket = match self.request_ticket(&entry).await {
            Ok(ticket) => ticket,
            Err(err) => {
                warn!(name = entry.name, error = %err, "presign request failed");
                self.fail_upload(id, "Failed to get presigned url");
                return;
            }
        };
        self.tracker
            .update(id, |file| file.key = Some(ticket.key.clone()));

        match self.transfer(&entry, id, &ticket.presigned_url).await {
            Ok(()) => {
                self.tracker.update(id, |file| {
                    file.progress = 100;
                    file.uploading = false;
                    file.error = false;
                });
                self.notify(
                    NoticeKind::Uploaded,
                    "Upload complete",
                    format!("\"{}\" uploaded successfully.", entry.name),
                );
                let _ = self.events.send(DropEvent::Uploaded { id });
                info!(name = entry.name, size = entry.size, key = ticket.key, "upload complete");
            }
            Err(err) => {
                warn!(name = entry.name, error = %err, "upload failed");
                self.fail_upload(id, "Failed to upload your file");
            }
        }
    }

    /// Delete a tracked entry through the delete endpoint. No-op while the
    /// entry is uploading or already deleting.
    pub async fn remove_file(&self, id: FileId) {
        let Some(entry) = self.tracker.get(id) else {
            return;
        };
        if entry.uploading || entry.is_deleting {
            return;
        }

        // The preview is released up front; the entry itself survives a
        // failed delete.
        self.tracker.take_preview(id);
        self.tracker.update(id, |file| file.is_deleting = true);

        match self.request_delete(entry.key.clone()).await {
            Ok(()) => {
                self.notify(
                    NoticeKind::Deleted,
                    "File deleted",
                    format!("\"{}\" deleted successfully.", entry.name),
                );
                self.tracker.remove(id);
                let _ = self.events.send(DropEvent::Removed { id });
                info!(
                    name = entry.name,
                    key = entry.key.as_deref().unwrap_or(""),
                    "entry removed"
                );
            }
            Err(err) => {
                warn!(name = entry.name, error = %err, "delete failed");
                self.tracker.update(id, |file| {
                    file.is_deleting = false;
                    file.error = true;
                });
                self.notify(
                    NoticeKind::DeleteFailed,
                    "Delete failed",
                    "Failed to delete file".to_string(),
                );
                let _ = self.events.send(DropEvent::RemoveFailed { id });
            }
        }
    }

    async fn request_ticket(
        &self,
        entry: &TrackedFile,
    ) -> Result<UploadTicketResponse, EngineError> {
        let response = self
            .http
            .post(format!("{}/api/s3/upload", self.api_base))
            .json(&UploadTicketRequest {
                file_name: entry.name.clone(),
                content_type: entry.content_type.clone(),
                size: entry.size,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(EngineError::Status(response.status()));
        }
        Ok(response.json::<UploadTicketResponse>().await?)
    }

    /// Stream the file's bytes to the presigned URL, publishing progress as
    /// an integer percentage while the transfer runs.
    async fn transfer(
        &self,
        entry: &TrackedFile,
        id: FileId,
        presigned_url: &str,
    ) -> Result<(), EngineError> {
        let file = File::open(&entry.path).await?;
        let total = entry.size.max(1);
        let sent = Arc::new(AtomicU64::new(0));
        let last_percent = Arc::new(AtomicU8::new(0));
        let tracker = self.tracker.clone();
        let events = self.events.clone();
        let stream = ReaderStream::new(file).inspect(move |chunk| {
            let Ok(chunk) = chunk else {
                return;
            };
            let done = sent.fetch_add(chunk.len() as u64, Ordering::SeqCst) + chunk.len() as u64;
            let percent = ((done * 100) / total).min(100) as u8;
            if last_percent.swap(percent, Ordering::SeqCst) != percent {
                tracker.update(id, |file| file.progress = percent);
                let _ = events.send(DropEvent::Progress { id, percent });
            }
        });

        let response = self
            .http
            .put(presigned_url)
            .header(header::CONTENT_TYPE, entry.content_type.as_str())
            .header(header::CONTENT_LENGTH, entry.size)
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(EngineError::Status(response.status()));
        }
        Ok(())
    }

    async fn request_delete(&self, key: Option<String>) -> Result<(), EngineError> {
        let response = self
            .http
            .delete(format!("{}/api/s3/delete", self.api_base))
            .json(&DeleteRequest { key })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(EngineError::Status(response.status()));
        }
        Ok(())
    }

    fn fail_upload(&self, id: FileId, detail: &str) {
        self.tracker.update(id, |file| {
            file.uploading = false;
            file.error = true;
            file.progress = 0;
        });
        self.notify(NoticeKind::UploadFailed, "Upload failed", detail.to_string());
        let _ = self.events.send(DropEvent::UploadFailed { id });
    }

    fn notify(&self, kind: NoticeKind, title: &str, detail: String) {
        let _ = self.events.send(DropEvent::Notice(Notice {
            kind,
            title: title.to_string(),
            detail,
        }));
    }
}

fn placeholder_offer(path: &Path, name: String) -> OfferedFile {
    OfferedFile {
        path: path.to_path_buf(),
        name,
        content_type: String::new(),
        size: 0,
    }
}
