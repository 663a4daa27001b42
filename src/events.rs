//! Events broadcast by the upload engine to whatever front-end is attached.

use crate::accept::FileKind;
use crate::tracker::FileId;

#[derive(Debug, Clone)]
pub enum DropEvent {
    Added {
        id: FileId,
        name: String,
        size: u64,
        kind: FileKind,
    },
    Progress {
        id: FileId,
        percent: u8,
    },
    Uploaded {
        id: FileId,
    },
    UploadFailed {
        id: FileId,
    },
    Removed {
        id: FileId,
    },
    RemoveFailed {
        id: FileId,
    },
    Notice(Notice),
}

/// A transient user-facing message, the toast analog.
#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    TooManyFiles,
    TooLarge,
    TooSmall,
    InvalidType,
    Unknown,
    Uploaded,
    UploadFailed,
    Deleted,
    DeleteFailed,
}

impl NoticeKind {
    pub fn is_error(self) -> bool {
        !matches!(self, NoticeKind::Uploaded | NoticeKind::Deleted)
    }
}
