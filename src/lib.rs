//! Student photo-album forms rendered to paginated PDFs.
//!
//! A [`StudentForm`] holds the record fields and is auto-saved through a
//! [`FieldStore`]; an [`Album`] keeps the ordered photographs; the
//! [`Assembler`] splits the album into pages of ten, has a [`Compositor`]
//! draw each page over the background [`Template`], and writes the PDF.

pub mod album;
pub mod assembler;
pub mod compositor;
pub mod error;
pub mod fields;
pub mod layout;
pub mod mode;
pub mod store;
pub mod text;
pub mod thai;

pub use album::{Album, AlbumEntry, DerivedLabel, LabelColor, LabelRole, Slot, UploadFile};
pub use assembler::{Assembler, Document};
pub use compositor::{Compositor, PageComposer, PageContext, PageImage, RenderedPage, Template};
pub use error::{AppError, Result};
pub use fields::{FieldSnapshot, FieldStore, StudentForm};
pub use mode::{Mode, ModeToggle, SectionGroup};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use text::{GlyphPainter, TextPainter};
