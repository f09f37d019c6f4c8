// Student form controls and their auto-saved snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::store::KeyValueStore;

/// Storage key holding the serialized snapshot.
pub const FIELD_SNAPSHOT_KEY: &str = "studentFormData";

/// Control identifiers, in form order.
pub const PREFIX: &str = "prefix";
pub const FIRST_NAME: &str = "firstName";
pub const LAST_NAME: &str = "lastName";
pub const STUDENT_ID: &str = "studentId";
pub const CLASS: &str = "class";
pub const POINTS: &str = "points";
pub const MONTHS: &str = "months";
pub const SEMESTER: &str = "semester";
pub const SEMESTER_YEAR: &str = "semesterYear";
pub const DATE: &str = "date";

pub const TRACKED_FIELDS: [&str; 10] = [
    PREFIX,
    FIRST_NAME,
    LAST_NAME,
    STUDENT_ID,
    CLASS,
    POINTS,
    MONTHS,
    SEMESTER,
    SEMESTER_YEAR,
    DATE,
];

/// Field id to current value.
pub type FieldSnapshot = BTreeMap<String, String>;

/// Read a field, treating a missing id as empty.
pub fn field<'a>(fields: &'a FieldSnapshot, id: &str) -> &'a str {
    fields.get(id).map(String::as_str).unwrap_or("")
}

// ============================================================================
// Form
// ============================================================================

/// The set of tracked controls and their current values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentForm {
    values: FieldSnapshot,
}

impl Default for StudentForm {
    fn default() -> Self {
        Self::with_controls(TRACKED_FIELDS)
    }
}

impl StudentForm {
    /// Blank form with the given control ids.
    pub fn with_controls<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: ids.into_iter().map(|id| (id.into(), String::new())).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.values.get(id).map(String::as_str)
    }

    /// Set a control's value; unknown ids are rejected.
    pub fn set(&mut self, id: &str, value: impl Into<String>) -> Result<()> {
        match self.values.get_mut(id) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(AppError::UnknownField(id.to_string())),
        }
    }

    pub fn has_control(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    /// Current values of every control.
    pub fn snapshot(&self) -> FieldSnapshot {
        self.values.clone()
    }

    /// Copy values for ids this form tracks; everything else is left alone.
    /// Returns how many controls were restored.
    pub fn merge(&mut self, snapshot: &FieldSnapshot) -> usize {
        let mut restored = 0;
        for (id, value) in snapshot {
            if let Some(slot) = self.values.get_mut(id) {
                slot.clone_from(value);
                restored += 1;
            }
        }
        restored
    }
}

// ============================================================================
// Field store
// ============================================================================

/// Persists the form snapshot on every change and restores it on start-up.
pub struct FieldStore {
    store: Arc<dyn KeyValueStore>,
}

impl FieldStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persist every control value, overwriting the previous snapshot.
    pub fn save(&self, form: &StudentForm) -> Result<()> {
        let json = serde_json::to_string(&form.values)
            .map_err(|e| AppError::StoreError(e.to_string()))?;
        self.store.set(FIELD_SNAPSHOT_KEY, &json)
    }

    /// Restore matching controls from the stored snapshot.
    ///
    /// A missing, unreadable or malformed snapshot restores nothing.
    pub fn load(&self, form: &mut StudentForm) -> usize {
        match self.read_snapshot() {
            Some(snapshot) => form.merge(&snapshot),
            None => 0,
        }
    }

    /// A value-changing interaction with one control; saves immediately.
    pub fn record_input(&self, form: &mut StudentForm, id: &str, value: &str) -> Result<()> {
        form.set(id, value)?;
        self.save(form)
    }

    fn read_snapshot(&self) -> Option<FieldSnapshot> {
        let raw = match self.store.get(FIELD_SNAPSHOT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "could not read form snapshot");
                return None;
            }
        };

        match serde_json::from_str::<FieldSnapshot>(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed form snapshot");
                None
            }
        }
    }
}
