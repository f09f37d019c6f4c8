// student-album: Fill a student record, arrange photos and render the album PDF

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use student_album::fields::TRACKED_FIELDS;
use student_album::layout::FONT_SIZE_PX;
use student_album::{
    Album, AppError, Assembler, Compositor, DerivedLabel, FieldStore, GlyphPainter, JsonFileStore, KeyValueStore,
    Mode, ModeToggle, SectionGroup, Slot, StudentForm, Template, UploadFile,
};

// ============================================================================
// Data Structures
// ============================================================================

/// CLI Arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Fill a student record and render the photo album to PDF")]
struct Args {
    /// Storage file for the saved form and mode
    /// (defaults to <data dir>/student-album/storage.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set one form field; the whole form is saved immediately
    Set { field: String, value: String },

    /// Show the saved form for the current mode
    Show,

    /// Switch between monthly and semester grading
    Mode { mode: Mode },

    /// Print the label each image gets in the album
    Labels {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        files: Vec<PathBuf>,
    },

    /// Render the album into a PDF
    Generate {
        /// Background template image (file path or URL)
        #[arg(short, long)]
        template: String,

        /// TrueType font used for all text
        #[arg(short, long)]
        font: PathBuf,

        /// Directory the PDF is written to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// New album order as 1-based positions, e.g. 3,1,2
        #[arg(long, value_delimiter = ',')]
        order: Option<Vec<usize>>,

        /// Images to add to the album, in order
        files: Vec<PathBuf>,
    },

    /// Forget the saved form and mode
    Reset,
}

/// One album entry as printed by `labels --json`
#[derive(Debug, Serialize)]
struct LabelRow<'a> {
    position: usize,
    name: &'a str,
    caption: Vec<String>,
    #[serde(flatten)]
    label: DerivedLabel,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let args = Args::parse();

    let store_path = match args.store {
        Some(path) => path,
        None => JsonFileStore::default_path()?,
    };
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(store_path));

    let field_store = FieldStore::new(store.clone());
    let mut form = StudentForm::default();
    field_store.load(&mut form);

    match args.command {
        Command::Set { field, value } => {
            field_store.record_input(&mut form, &field, &value)?;
            println!("✓ Saved {} = {}", field, value);
        }
        Command::Show => {
            let toggle = ModeToggle::restore(store);
            print_form(&form, &toggle);
        }
        Command::Mode { mode } => {
            let mut toggle = ModeToggle::restore(store);
            toggle.set(mode)?;
            println!("✓ Mode: {}", toggle.mode());
        }
        Command::Labels { json, files } => {
            let album = load_album(&files).await;
            if json {
                print_labels_json(&album)?;
            } else {
                print_labels(&album);
            }
        }
        Command::Generate {
            template,
            font,
            output_dir,
            order,
            files,
        } => {
            let mut album = load_album(&files).await;
            if let Some(order) = order {
                apply_order(&mut album, &order)?;
            }
            if album.is_empty() {
                return Err(AppError::EmptyAlbum);
            }

            let template = Template::load(&template)?;
            let painter = GlyphPainter::load(&font, FONT_SIZE_PX)?;
            let compositor = Compositor::new(Arc::new(template), Arc::new(painter));
            let assembler = Assembler::new(Arc::new(compositor));

            let document = assembler.assemble(album.entries(), &form.snapshot()).await?;
            let path = document.save_in(&output_dir)?;

            println!("✓ Generated: {}", path.display());
            println!("  Images: {}", album.len());
            println!("  Pages: {}", document.page_count);
        }
        Command::Reset => {
            store.clear()?;
            println!("✓ Cleared saved form and mode");
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Read the named files as one upload batch. Unreadable files are skipped
/// like any other rejected upload.
async fn load_album(files: &[PathBuf]) -> Album {
    let uploads = files
        .iter()
        .filter_map(|path| match UploadFile::from_path(path) {
            Ok(upload) => Some(upload),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
                None
            }
        })
        .collect();

    let mut album = Album::new();
    album.append(uploads).await;
    album
}

/// Reorder with 1-based entry positions, as a drag gesture would.
fn apply_order(album: &mut Album, order: &[usize]) -> Result<(), AppError> {
    let slots = album.slots();
    let mut reordered = vec![Slot::Upload];
    for &position in order {
        let slot = slots
            .get(position)
            .filter(|_| position > 0)
            .ok_or_else(|| AppError::ReorderRejected(format!("no image at position {}", position)))?;
        reordered.push(*slot);
    }
    album.reorder(&reordered)
}

fn print_form(form: &StudentForm, toggle: &ModeToggle) {
    println!("Mode: {}", toggle.mode());
    for id in TRACKED_FIELDS {
        let hidden = [SectionGroup::Monthly, SectionGroup::Semester]
            .into_iter()
            .any(|group| !toggle.is_visible(group) && group.fields().contains(&id));
        if hidden {
            continue;
        }
        println!("  {}: {}", id, form.get(id).unwrap_or(""));
    }
}

fn print_labels(album: &Album) {
    if album.is_empty() {
        println!("Album is empty");
        return;
    }
    for entry in album.entries() {
        let label = entry.label();
        println!(
            "{:>3}. {}  {}  [page {}, {}]",
            entry.position + 1,
            entry.display_name,
            label.caption_lines().join(" / "),
            label.page,
            label.color.hex()
        );
    }
}

fn print_labels_json(album: &Album) -> Result<(), AppError> {
    let rows: Vec<LabelRow> = album
        .entries()
        .iter()
        .map(|entry| {
            let label = entry.label();
            LabelRow {
                position: entry.position,
                name: &entry.display_name,
                caption: label.caption_lines(),
                label,
            }
        })
        .collect();

    let json = serde_json::to_string_pretty(&rows)?;
    println!("{}", json);
    Ok(())
}
