// Ordered photo album with upload, drag reordering and derived labels.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use ::image::ImageFormat;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::layout::IMAGES_PER_PAGE;
use crate::thai::{ACTIVITY_CAPTION, PAGE_CAPTION, ROW_CAPTION, TEACHER_CAPTION};

// ============================================================================
// Entries
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(Uuid);

impl EntryId {
    fn new() -> Self {
        EntryId(Uuid::new_v4())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = format!("{:x}", self.0);
        f.write_str(&hex[..8])
    }
}

/// One photograph in the album.
#[derive(Debug, Clone)]
pub struct AlbumEntry {
    pub id: EntryId,
    pub display_name: String,
    pub source_bytes: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    /// 0-based, dense and unique across the album.
    pub position: usize,
}

impl AlbumEntry {
    pub fn label(&self) -> DerivedLabel {
        DerivedLabel::for_position(self.position)
    }
}

/// A file handed to the album by the user.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Read a file from disk, guessing its media type from the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let media_type = ImageFormat::from_path(path)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            media_type,
            bytes,
        })
    }

    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

// ============================================================================
// Labels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelRole {
    Teacher,
    Activity,
}

impl LabelRole {
    pub fn caption(self) -> &'static str {
        match self {
            LabelRole::Teacher => TEACHER_CAPTION,
            LabelRole::Activity => ACTIVITY_CAPTION,
        }
    }
}

/// Label color, alternating per output page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelColor {
    Light,
    Accent,
}

impl LabelColor {
    pub fn hex(self) -> &'static str {
        match self {
            LabelColor::Light => "#F0F0F0",
            LabelColor::Accent => "#FCF259",
        }
    }
}

/// What an entry's position says about where it lands in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DerivedLabel {
    pub page: usize,
    pub pair: usize,
    pub role: LabelRole,
    pub color: LabelColor,
}

impl DerivedLabel {
    pub fn for_position(position: usize) -> Self {
        let page_index = position / IMAGES_PER_PAGE;
        Self {
            page: page_index + 1,
            pair: (position % IMAGES_PER_PAGE) / 2 + 1,
            role: if position % 2 == 0 {
                LabelRole::Teacher
            } else {
                LabelRole::Activity
            },
            color: if page_index % 2 == 0 {
                LabelColor::Light
            } else {
                LabelColor::Accent
            },
        }
    }

    /// Caption lines shown under the thumbnail; the page line only after page 1.
    pub fn caption_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("{} {}", ROW_CAPTION, self.pair),
            self.role.caption().to_string(),
        ];
        if self.page > 1 {
            lines.push(format!("{} {}", PAGE_CAPTION, self.page));
        }
        lines
    }
}

// ============================================================================
// Album
// ============================================================================

/// An item in the displayed sequence: the upload control always leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Upload,
    Entry(EntryId),
}

/// Outcome of one upload batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AppendReport {
    pub added: usize,
    pub skipped: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct Album {
    entries: Vec<AlbumEntry>,
}

impl Album {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[AlbumEntry] {
        &self.entries
    }

    /// Decode a batch of uploads concurrently and append the images that decode.
    ///
    /// Non-image media types and undecodable files are skipped. Successful
    /// files are appended in the order they were supplied once the whole
    /// batch has settled.
    pub async fn append(&mut self, files: Vec<UploadFile>) -> AppendReport {
        let mut report = AppendReport::default();
        let mut tasks = Vec::new();

        for file in files {
            if !file.is_image() {
                tracing::debug!(name = %file.name, media_type = %file.media_type, "skipping non-image upload");
                report.skipped.push(file.name);
                continue;
            }
            let name = file.name.clone();
            tasks.push((name, tokio::task::spawn_blocking(move || decode_upload(file))));
        }

        let mut decoded = Vec::with_capacity(tasks.len());
        for (name, task) in tasks {
            match task.await {
                Ok(Ok(upload)) => decoded.push(upload),
                Ok(Err(e)) => {
                    tracing::debug!(name = %name, error = %e, "skipping undecodable upload");
                    report.skipped.push(name);
                }
                Err(e) => {
                    tracing::debug!(name = %name, error = %e, "decode task failed");
                    report.skipped.push(name);
                }
            }
        }

        for upload in decoded {
            self.entries.push(AlbumEntry {
                id: EntryId::new(),
                display_name: upload.name,
                source_bytes: upload.bytes.into(),
                width: upload.width,
                height: upload.height,
                position: self.entries.len(),
            });
            report.added += 1;
        }

        report
    }

    /// The displayed sequence: upload control first, then entries in order.
    pub fn slots(&self) -> Vec<Slot> {
        std::iter::once(Slot::Upload)
            .chain(self.entries.iter().map(|e| Slot::Entry(e.id)))
            .collect()
    }

    /// Apply a new ordering of the displayed sequence.
    ///
    /// `order` must be a permutation of `slots()` that keeps the upload control
    /// first. Anything else is rejected and the album is left untouched.
    pub fn reorder(&mut self, order: &[Slot]) -> Result<()> {
        if order.first() != Some(&Slot::Upload) {
            return Err(AppError::ReorderRejected(
                "nothing may be placed before the upload control".to_string(),
            ));
        }
        if order.len() != self.entries.len() + 1 {
            return Err(AppError::ReorderRejected(format!(
                "expected {} items, got {}",
                self.entries.len() + 1,
                order.len()
            )));
        }

        let mut remaining: HashMap<EntryId, AlbumEntry> =
            self.entries.iter().map(|e| (e.id, e.clone())).collect();
        let mut reordered = Vec::with_capacity(self.entries.len());
        for slot in &order[1..] {
            let id = match slot {
                Slot::Entry(id) => *id,
                Slot::Upload => {
                    return Err(AppError::ReorderRejected(
                        "upload control appears more than once".to_string(),
                    ))
                }
            };
            let taken = remaining
                .remove(&id)
                .ok_or_else(|| AppError::ReorderRejected(format!("unknown or repeated entry {}", id)))?;
            reordered.push(taken);
        }

        for (position, entry) in reordered.iter_mut().enumerate() {
            entry.position = position;
        }
        self.entries = reordered;
        Ok(())
    }

    /// A drag gesture: move the slot at `from` to index `to` of `slots()`.
    pub fn move_slot(&mut self, from: usize, to: usize) -> Result<()> {
        let mut order = self.slots();
        if from >= order.len() || to >= order.len() {
            return Err(AppError::ReorderRejected(format!(
                "slot index out of range ({} -> {})",
                from, to
            )));
        }
        let slot = order.remove(from);
        order.insert(to, slot);
        self.reorder(&order)
    }

    /// Labels for the current ordering, recomputed on every call.
    pub fn labels(&self) -> Vec<DerivedLabel> {
        self.entries.iter().map(AlbumEntry::label).collect()
    }
}

struct DecodedUpload {
    name: String,
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

fn decode_upload(file: UploadFile) -> Result<DecodedUpload> {
    let img = ::image::load_from_memory(&file.bytes)
        .map_err(|e| AppError::DecodeError(format!("{}: {}", file.name, e)))?;
    Ok(DecodedUpload {
        name: file.name,
        width: img.width(),
        height: img.height(),
        bytes: file.bytes,
    })
}
