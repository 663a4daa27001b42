//! Drop-time acceptance policy: batch cap, per-file size window and the
//! content-type allow-list, plus the display taxonomy for accepted files.

use std::path::PathBuf;

use crate::config::{MAX_BATCH_FILES, MAX_FILE_SIZE, MIN_FILE_SIZE};
use crate::events::{Notice, NoticeKind};

/// A file offered for upload, as seen before any tracking state exists.
#[derive(Debug, Clone)]
pub struct OfferedFile {
    pub path: PathBuf,
    pub name: String,
    pub content_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    TooManyFiles,
    TooLarge,
    TooSmall,
    InvalidType,
    /// The file could not be inspected at all; carries the underlying error.
    Unknown(String),
}

#[derive(Debug, Clone)]
pub struct Rejection {
    pub file: OfferedFile,
    pub reason: RejectReason,
}

#[derive(Debug, Default)]
pub struct Screened {
    pub accepted: Vec<OfferedFile>,
    pub rejections: Vec<Rejection>,
}

#[derive(Debug, Clone, Copy)]
pub struct AcceptPolicy {
    pub max_batch: usize,
    pub max_size: u64,
    pub min_size: u64,
}

impl Default for AcceptPolicy {
    fn default() -> Self {
        Self {
            max_batch: MAX_BATCH_FILES,
            max_size: MAX_FILE_SIZE,
            min_size: MIN_FILE_SIZE,
        }
    }
}

impl AcceptPolicy {
    /// Screen one drop. `tracked` is how many entries the caller already
    /// holds: a full tracker refuses further drops outright, and a batch
    /// larger than the cap is rejected whole rather than truncated.
    pub fn screen(&self, offered: Vec<OfferedFile>, tracked: usize) -> Screened {
        let mut screened = Screened::default();

        if tracked >= self.max_batch || offered.len() > self.max_batch {
            screened.rejections = offered
                .into_iter()
                .map(|file| Rejection {
                    file,
                    reason: RejectReason::TooManyFiles,
                })
                .collect();
            return screened;
        }

        for file in offered {
            let reason = if file.size > self.max_size {
                Some(RejectReason::TooLarge)
            } else if file.size < self.min_size {
                Some(RejectReason::TooSmall)
            } else if !is_allowed(&file.name, &file.content_type) {
                Some(RejectReason::InvalidType)
            } else {
                None
            };
            match reason {
                Some(reason) => screened.rejections.push(Rejection { file, reason }),
                None => screened.accepted.push(file),
            }
        }

        screened
    }
}

/// Map rejections to user-facing notices. Too-many-files collapses to one
/// aggregated notice regardless of how many files it affected.
pub fn rejection_notices(rejections: &[Rejection]) -> Vec<Notice> {
    let mut notices = Vec::new();
    let mut too_many_shown = false;

    for rejection in rejections {
        let name = rejection.file.name.as_str();
        match &rejection.reason {
            RejectReason::TooManyFiles => {
                if !too_many_shown {
                    notices.push(Notice {
                        kind: NoticeKind::TooManyFiles,
                        title: "Too many files".to_string(),
                        detail: "You can only upload up to 5 files at a time.".to_string(),
                    });
                    too_many_shown = true;
                }
            }
            RejectReason::TooLarge => notices.push(Notice {
                kind: NoticeKind::TooLarge,
                title: "File too large".to_string(),
                detail: format!("\"{name}\" exceeds the 5 MB limit."),
            }),
            RejectReason::TooSmall => notices.push(Notice {
                kind: NoticeKind::TooSmall,
                title: "File too small".to_string(),
                detail: format!("\"{name}\" is empty or too small."),
            }),
            RejectReason::InvalidType => notices.push(Notice {
                kind: NoticeKind::InvalidType,
                title: "Invalid file type".to_string(),
                detail: format!(
                    "\"{name}\" is not allowed. Only images, PDF, Word, Excel, TXT, and CSV files are accepted."
                ),
            }),
            RejectReason::Unknown(message) => notices.push(Notice {
                kind: NoticeKind::Unknown,
                title: "File rejected".to_string(),
                detail: if message.is_empty() {
                    format!("Error with \"{name}\"")
                } else {
                    message.clone()
                },
            }),
        }
    }

    notices
}

const DOC_MIMES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/plain",
    "text/csv",
];

const DOC_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".dot", ".docx", ".dotx", ".xls", ".xlsx", ".xlsm", ".xltx", ".xltm", ".txt",
    ".csv",
];

/// Allow-list check: any image, or one of the document types by MIME or by
/// extension.
fn is_allowed(name: &str, content_type: &str) -> bool {
    if content_type.starts_with("image/") {
        return true;
    }
    if DOC_MIMES.contains(&content_type) {
        return true;
    }
    let name = name.to_lowercase();
    DOC_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Display taxonomy for a tracked file, used to pick a glyph in the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Pdf,
    Word,
    Spreadsheet,
    Text,
    Csv,
    Other,
}

impl FileKind {
    pub fn of(name: &str, content_type: &str) -> Self {
        let name = name.to_lowercase();
        if content_type.starts_with("image/") {
            FileKind::Image
        } else if content_type == "application/pdf" || name.ends_with(".pdf") {
            FileKind::Pdf
        } else if content_type.contains("word") || name.ends_with(".doc") || name.ends_with(".docx")
        {
            FileKind::Word
        } else if content_type.contains("excel")
            || content_type.contains("spreadsheet")
            || name.ends_with(".xls")
            || name.ends_with(".xlsx")
        {
            FileKind::Spreadsheet
        } else if name.ends_with(".txt") {
            FileKind::Text
        } else if name.ends_with(".csv") {
            FileKind::Csv
        } else {
            FileKind::Other
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            FileKind::Image => "IMG",
            FileKind::Pdf => "PDF",
            FileKind::Word => "DOC",
            FileKind::Spreadsheet => "XLS",
            FileKind::Text => "TXT",
            FileKind::Csv => "CSV",
            FileKind::Other => "BIN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(name: &str, content_type: &str, size: u64) -> OfferedFile {
        OfferedFile {
            path: PathBuf::from(name),
            name: name.to_string(),
            content_type: content_type.to_string(),
            size,
        }
    }

    #[test]
    fn oversized_file_is_rejected() {
        let screened = AcceptPolicy::default().screen(vec![offer("big.png", "image/png", 6 * 1024 * 1024)], 0);
        assert!(screened.accepted.is_empty());
        assert_eq!(screened.rejections[0].reason, RejectReason::TooLarge);
    }

    #[test]
    fn empty_file_is_rejected() {
        let screened = AcceptPolicy::default().screen(vec![offer("empty.txt", "text/plain", 0)], 0);
        assert_eq!(screened.rejections[0].reason, RejectReason::TooSmall);
    }

    #[test]
    fn docx_with_conforming_mime_is_accepted() {
        let screened = AcceptPolicy::default().screen(
            vec![offer(
                "report.docx",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                1024,
            )],
            0,
        );
        assert_eq!(screened.accepted.len(), 1);
        assert!(screened.rejections.is_empty());
    }

    #[test]
    fn executable_is_rejected_as_invalid_type() {
        let screened = AcceptPolicy::default().screen(
            vec![offer("setup.exe", "application/x-msdownload", 1024)],
            0,
        );
        assert_eq!(screened.rejections[0].reason, RejectReason::InvalidType);
    }

    #[test]
    fn oversized_batch_is_rejected_whole_with_one_notice() {
        let offered: Vec<OfferedFile> = (0..6)
            .map(|index| offer(&format!("file-{index}.png"), "image/png", 1024))
            .collect();
        let screened = AcceptPolicy::default().screen(offered, 0);

        assert!(screened.accepted.is_empty());
        assert_eq!(screened.rejections.len(), 6);
        let notices = rejection_notices(&screened.rejections);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::TooManyFiles);
    }

    #[test]
    fn full_tracker_refuses_further_drops() {
        let screened = AcceptPolicy::default().screen(vec![offer("late.png", "image/png", 1024)], 5);
        assert!(screened.accepted.is_empty());
        assert_eq!(screened.rejections[0].reason, RejectReason::TooManyFiles);
    }

    #[test]
    fn mixed_batch_rejects_individually() {
        let screened = AcceptPolicy::default().screen(
            vec![
                offer("ok.csv", "text/csv", 2048),
                offer("huge.pdf", "application/pdf", 10 * 1024 * 1024),
                offer("virus.exe", "application/x-msdownload", 2048),
            ],
            0,
        );
        assert_eq!(screened.accepted.len(), 1);
        assert_eq!(screened.accepted[0].name, "ok.csv");
        assert_eq!(screened.rejections.len(), 2);
    }

    #[test]
    fn file_kind_follows_type_then_extension() {
        assert_eq!(FileKind::of("photo.jpeg", "image/jpeg"), FileKind::Image);
        assert_eq!(FileKind::of("scan", "application/pdf"), FileKind::Pdf);
        assert_eq!(FileKind::of("data.xlsx", "application/octet-stream"), FileKind::Spreadsheet);
        assert_eq!(FileKind::of("notes.txt", "application/octet-stream"), FileKind::Text);
        assert_eq!(FileKind::of("blob.bin", "application/octet-stream"), FileKind::Other);
    }
}
