// Monthly / semester grading mode.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::Result;
use crate::fields::{MONTHS, SEMESTER, SEMESTER_YEAR};
use crate::store::KeyValueStore;

/// Storage key holding the mode.
pub const MODE_KEY: &str = "gradeMode";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Monthly,
    Semester,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Monthly => "monthly",
            Mode::Semester => "semester",
        }
    }

    /// The section group this mode shows.
    pub fn visible_group(self) -> SectionGroup {
        match self {
            Mode::Monthly => SectionGroup::Monthly,
            Mode::Semester => SectionGroup::Semester,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Mode::Monthly),
            "semester" => Ok(Mode::Semester),
            other => Err(format!("unknown mode '{}' (expected monthly or semester)", other)),
        }
    }
}

/// Two disjoint groups of form sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionGroup {
    Monthly,
    Semester,
}

impl SectionGroup {
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            SectionGroup::Monthly => &[MONTHS],
            SectionGroup::Semester => &[SEMESTER, SEMESTER_YEAR],
        }
    }
}

/// Persisted mode plus the visibility it implies.
pub struct ModeToggle {
    store: Arc<dyn KeyValueStore>,
    mode: Mode,
}

impl ModeToggle {
    /// Restore the persisted mode. Anything other than a stored `"semester"`
    /// leaves the default monthly layout in place.
    pub fn restore(store: Arc<dyn KeyValueStore>) -> Self {
        let stored = match store.get(MODE_KEY) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "could not read grade mode");
                None
            }
        };

        let mode = match stored.as_deref().map(str::parse::<Mode>) {
            Some(Ok(mode)) => mode,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "ignoring stored grade mode");
                Mode::default()
            }
            None => Mode::default(),
        };

        Self { store, mode }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch mode and persist it.
    pub fn set(&mut self, mode: Mode) -> Result<()> {
        self.mode = mode;
        self.store.set(MODE_KEY, mode.as_str())
    }

    pub fn is_visible(&self, group: SectionGroup) -> bool {
        self.mode.visible_group() == group
    }

    /// Tracked field ids shown under the current mode.
    pub fn visible_fields(&self) -> &'static [&'static str] {
        self.mode.visible_group().fields()
    }
}
