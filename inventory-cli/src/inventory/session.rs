//! Technician-facing workflows over one workbook
//!
//! Pipeline: decode identifier → find → (edit | register) → persist.
//! Registration and verification scans persist on their own; plain edits
//! leave that to the caller.

use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::identity::{IdentityMatch, IdentityResolver, MatchTier, decode_identifier, normalize_identifier};
use super::mutator;
use super::schema::{SchemaResolver, SheetSchema};
use super::store::{RecordPatch, RecordStore, StoreError};
use super::types::{Cell, LogicalRole, Sheet, TabularDocument};
use crate::persistence::{PersistenceError, PersistenceGateway};

/// Placeholder shown for records without an equipment name
pub const UNNAMED_EQUIPMENT: &str = "Sin nombre";

/// Tuning for interactive lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupOptions {
    /// Queries shorter than this get no partial suggestions
    pub min_partial_len: usize,
    /// Maximum number of partial suggestions returned
    pub max_suggestions: usize,
}

impl Default for LookupOptions {
    fn default() -> Self {
        LookupOptions {
            min_partial_len: 2,
            max_suggestions: 5,
        }
    }
}

/// A near-miss offered when a lookup found no exact match
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub index: usize,
    pub serial: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Found {
        index: usize,
        tier: MatchTier,
        /// Other rows carrying the same identifier
        duplicates: Vec<usize>,
    },
    NotFound {
        /// The decoded, normalized identifier (prefills registration)
        query: String,
        suggestions: Vec<Suggestion>,
        /// Partial matches beyond `suggestions`
        more: usize,
    },
}

/// Everything needed to show or edit one record
#[derive(Debug, Clone, PartialEq)]
pub struct RecordView {
    pub index: usize,
    pub id: String,
    pub serial: Option<String>,
    pub equipment_name: Option<String>,
    pub location: Option<String>,
    /// Calibration date as `YYYY-MM-DD` (empty when unset or unparseable)
    pub calibration_date: Option<String>,
    pub verified: Option<String>,
    /// `(column, text)` for every observation column
    pub observations: Vec<(String, String)>,
    /// `(column, filename)` for every non-empty image column
    pub images: Vec<(String, String)>,
}

impl RecordView {
    /// Spreadsheet row number (header on row 1)
    pub fn row_number(&self) -> usize {
        self.index + 2
    }
}

/// Input for the registration workflow
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub serial: String,
    pub location: String,
    pub observation: String,
    /// Encoded photo to attach
    pub image: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationKind {
    Created,
    Updated,
}

#[derive(Debug)]
pub struct RegistrationOutcome {
    pub kind: RegistrationKind,
    pub index: usize,
    pub serial: String,
    pub image: Option<String>,
    /// Set when the record changed in memory but could not be stored
    pub persist_error: Option<PersistenceError>,
}

/// Edits applied by the edit workflow
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    pub date: Option<NaiveDate>,
    pub location: Option<String>,
    /// `(observation column, text)` pairs
    pub observations: Vec<(String, String)>,
}

#[derive(Debug)]
pub struct ImageAttachment {
    pub column: String,
    pub filename: String,
    pub slot: usize,
    pub persist_error: Option<PersistenceError>,
}

/// An image reference and whether its blob exists on this device
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRef {
    pub column: String,
    pub filename: String,
    pub stored: bool,
}

#[derive(Debug)]
pub enum VerifyOutcome {
    Verified {
        index: usize,
        column: String,
        at: NaiveDateTime,
        persist_error: Option<PersistenceError>,
    },
    NotFound {
        query: String,
        suggestions: Vec<Suggestion>,
    },
}

/// Filename for a record's image slot: `<serial>_<slot>.jpg`
///
/// Every character outside `[A-Za-z0-9]` in the serial becomes `_`.
pub fn image_filename(serial: &str, slot: usize) -> String {
    let safe: String = serial
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_{}.jpg", safe, slot)
}

fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Caller-owned session: one workbook, one technician
pub struct InventorySession {
    store: RecordStore,
    identity: IdentityResolver,
    lookup: LookupOptions,
}

impl InventorySession {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        schema: SchemaResolver,
        lookup: LookupOptions,
    ) -> Self {
        InventorySession {
            store: RecordStore::new(gateway, schema.clone()),
            identity: IdentityResolver::new(schema),
            lookup,
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut RecordStore {
        &mut self.store
    }

    /// Restore the stored workbook, if any. Returns true when one was found.
    pub async fn open(&mut self) -> Result<bool, PersistenceError> {
        Ok(self.store.restore().await?.is_some())
    }

    /// Replace the workbook with an imported document
    pub fn import(&mut self, document: TabularDocument) {
        self.store.load(document);
    }

    pub async fn persist(&mut self) -> Result<(), PersistenceError> {
        self.store.persist().await
    }

    fn sheet(&self) -> Result<&Sheet, StoreError> {
        self.store.current_sheet()
    }

    fn schema(&self) -> Result<SheetSchema, StoreError> {
        Ok(self.store.schema().schema(self.sheet()?.headers()))
    }

    fn check_index(&self, index: usize) -> Result<(), StoreError> {
        let sheet = self.sheet()?;
        if index >= sheet.len() {
            return Err(StoreError::OutOfRange {
                sheet: sheet.name().to_string(),
                index,
                len: sheet.len(),
            });
        }
        Ok(())
    }

    /// Raw lookup on the current sheet
    pub fn find(&self, query: &str) -> Result<IdentityMatch, StoreError> {
        Ok(self.identity.find(query, self.sheet()?))
    }

    /// Resolve a raw scanned or typed identifier
    pub fn scan(&self, raw: &str) -> Result<ScanOutcome, StoreError> {
        let decoded = decode_identifier(raw);
        let result = self.find(&decoded)?;

        if let Some(index) = result.primary() {
            if result.has_duplicates() {
                log::warn!(
                    "'{}' matches {} rows; using row index {}",
                    decoded.trim(),
                    result.shadowed.len() + 1,
                    index
                );
            }
            return Ok(ScanOutcome::Found {
                index,
                tier: result.tier,
                duplicates: result.shadowed,
            });
        }

        let query = normalize_identifier(&decoded);
        let (suggestions, more) = self.suggestions(&query, &result)?;
        Ok(ScanOutcome::NotFound {
            query,
            suggestions,
            more,
        })
    }

    fn suggestions(
        &self,
        query: &str,
        result: &IdentityMatch,
    ) -> Result<(Vec<Suggestion>, usize), StoreError> {
        if result.tier != MatchTier::Partial || query.chars().count() < self.lookup.min_partial_len {
            return Ok((Vec::new(), 0));
        }

        let sheet = self.sheet()?;
        let serial_key = self.store.schema().column(LogicalRole::Serial, sheet.headers());
        let suggestions: Vec<Suggestion> = result
            .matches
            .iter()
            .take(self.lookup.max_suggestions)
            .map(|&index| Suggestion {
                index,
                serial: serial_key
                    .and_then(|key| sheet.record(index).map(|r| r.cell(key).to_text()))
                    .unwrap_or_default(),
            })
            .collect();
        let more = result.matches.len() - suggestions.len();
        Ok((suggestions, more))
    }

    /// Resolved view of one record
    pub fn record_view(&self, index: usize) -> Result<RecordView, StoreError> {
        self.check_index(index)?;
        let sheet = self.sheet()?;
        let schema = self.schema()?;
        let record = sheet
            .record(index)
            .ok_or(StoreError::NoSheetLoaded)?;

        let text = |column: &Option<String>| column.as_deref().map(|c| record.cell(c).to_text());

        let equipment_name = text(&schema.equipment_name).map(|name| {
            if name.trim().is_empty() {
                UNNAMED_EQUIPMENT.to_string()
            } else {
                name
            }
        });

        Ok(RecordView {
            index,
            id: schema
                .id
                .as_deref()
                .map(|c| record.cell(c).to_text())
                .unwrap_or_default(),
            serial: text(&schema.serial),
            equipment_name,
            location: text(&schema.location),
            calibration_date: schema
                .calibration_date
                .as_deref()
                .map(|c| record.cell(c).to_input_date()),
            verified: schema
                .verified
                .as_deref()
                .map(|c| record.cell(c).display()),
            observations: schema
                .observations
                .iter()
                .map(|c| (c.clone(), record.cell(c).to_text()))
                .collect(),
            images: schema
                .images
                .iter()
                .filter(|c| !record.cell(c).is_empty())
                .map(|c| (c.clone(), record.cell(c).to_text()))
                .collect(),
        })
    }

    /// Image references of a record and whether each blob is on this device
    pub async fn image_refs(&self, index: usize) -> Result<Vec<ImageRef>, StoreError> {
        let view = self.record_view(index)?;
        let mut refs = Vec::with_capacity(view.images.len());
        for (column, filename) in view.images {
            let stored = self.store.load_image(&filename).await?.is_some();
            refs.push(ImageRef {
                column,
                filename,
                stored,
            });
        }
        Ok(refs)
    }

    /// Create or update a record by serial, then persist
    ///
    /// An existing serial gets its main observation (when one is given) and
    /// image updated. Otherwise a new row is appended with the serial,
    /// location, main observation, calibration date set to now and the
    /// image reference.
    pub async fn register(
        &mut self,
        registration: Registration,
    ) -> Result<RegistrationOutcome, StoreError> {
        let serial = normalize_identifier(&registration.serial);
        if serial.is_empty() {
            return Err(StoreError::InvalidInput("serial number is required".to_string()));
        }
        let location = registration.location.trim().to_string();
        if location.is_empty() {
            return Err(StoreError::InvalidInput("location is required".to_string()));
        }
        let observation = registration.observation.trim().to_string();

        let sheet_name = self.store.current_sheet_name()?;
        let schema = self.schema()?;
        let serial_key = schema
            .serial
            .clone()
            .ok_or(StoreError::MissingRole(LogicalRole::Serial))?;

        let existing = self.identity.exact_serial(&serial, self.sheet()?);
        let (kind, index) = match existing {
            Some(index) => {
                if !observation.is_empty() {
                    let column = self.main_observation_column(&sheet_name)?;
                    let patch = RecordPatch::new().with(column, observation.as_str());
                    self.store.mutate(&sheet_name, index, &patch)?;
                }
                log::info!("Updated existing serial '{}' (row index {})", serial, index);
                (RegistrationKind::Updated, index)
            }
            None => {
                let observation_column = if observation.is_empty() {
                    None
                } else {
                    Some(self.main_observation_column(&sheet_name)?)
                };
                // Re-read: the observation column may have just been added
                let schema = self.schema()?;
                let mut record = self.sheet()?.blank_record();
                record.set(&serial_key, serial.as_str());
                match &schema.location {
                    Some(column) => {
                        record.set(column, location.as_str());
                    }
                    None => log::warn!("No location column; location '{}' not recorded", location),
                }
                if let Some(column) = &observation_column {
                    record.set(column, observation.as_str());
                }
                if let Some(column) = &schema.calibration_date {
                    record.set(column, now());
                }

                let index = self.store.append(&sheet_name, record)?;
                log::info!("Registered new serial '{}' (row index {})", serial, index);
                (RegistrationKind::Created, index)
            }
        };

        let mut persist_error = None;
        let image = match registration.image {
            Some(bytes) => {
                let attachment = self.attach_image(index, &bytes).await?;
                persist_error = attachment.persist_error;
                Some(attachment.filename)
            }
            None => None,
        };

        if let Err(e) = self.store.persist().await {
            log::warn!("Registration kept in memory only: {}", e);
            persist_error.get_or_insert(e);
        }

        Ok(RegistrationOutcome {
            kind,
            index,
            serial,
            image,
            persist_error,
        })
    }

    fn main_observation_column(&mut self, sheet_name: &str) -> Result<String, StoreError> {
        if let Some(column) = self.schema()?.observations.into_iter().next() {
            return Ok(column);
        }
        let column = LogicalRole::Observation.default_header();
        self.store.ensure_column(sheet_name, column)?;
        Ok(column.to_string())
    }

    /// Apply edits to one record. The caller persists.
    pub fn update(&mut self, index: usize, update: RecordUpdate) -> Result<(), StoreError> {
        self.check_index(index)?;
        let sheet_name = self.store.current_sheet_name()?;
        let schema = self.schema()?;
        let mut patch = RecordPatch::new();

        if let Some(date) = update.date {
            match &schema.calibration_date {
                Some(column) => patch.set(column.clone(), Cell::date(date)),
                None => log::warn!("No calibration date column; date not updated"),
            }
        }

        if let Some(location) = update.location.as_deref().map(str::trim) {
            if !location.is_empty() {
                match &schema.location {
                    Some(column) => patch.set(column.clone(), location),
                    None => log::warn!("No location column; location not updated"),
                }
            }
        }

        for (column, text) in update.observations {
            if schema.observations.contains(&column) {
                patch.set(column, text.trim());
            } else {
                log::warn!("'{}' is not an observation column; skipped", column);
            }
        }

        if patch.is_empty() {
            return Ok(());
        }
        self.store.mutate(&sheet_name, index, &patch)
    }

    /// Grow a new observation column and return its name
    pub fn add_observation_slot(&mut self) -> Result<String, StoreError> {
        let sheet_name = self.store.current_sheet_name()?;
        let prefix = self
            .schema()?
            .observations
            .into_iter()
            .next()
            .unwrap_or_else(|| LogicalRole::Observation.default_header().to_string());
        self.store.add_numbered_column(&sheet_name, &prefix)
    }

    /// Store a photo in the record's first free image slot
    ///
    /// With no free slot the base image column is created, or, when it
    /// already exists, a new numbered one. The blob is written right away;
    /// the snapshot is left to the caller.
    pub async fn attach_image(
        &mut self,
        index: usize,
        bytes: &[u8],
    ) -> Result<ImageAttachment, StoreError> {
        self.check_index(index)?;
        let sheet_name = self.store.current_sheet_name()?;
        let schema = self.schema()?;

        let free = {
            let record = self.sheet()?.record(index).ok_or(StoreError::NoSheetLoaded)?;
            schema
                .images
                .iter()
                .find(|c| record.cell(c).is_empty())
                .cloned()
        };

        let column = match free {
            Some(column) => column,
            None => match schema.images.first() {
                None => {
                    let column = LogicalRole::Image.default_header();
                    self.store.ensure_column(&sheet_name, column)?;
                    column.to_string()
                }
                Some(first) => self.store.add_numbered_column(&sheet_name, first)?,
            },
        };

        let slots = self.schema()?.images;
        let slot = mutator::slot_number(&column, &slots).unwrap_or(slots.len().max(1));

        let serial = self
            .schema()?
            .serial
            .and_then(|key| {
                self.sheet()
                    .ok()?
                    .record(index)
                    .map(|r| r.cell(&key).to_text())
            })
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("equipo_{}", index));
        let filename = image_filename(serial.trim(), slot);

        self.store.mutate(
            &sheet_name,
            index,
            &RecordPatch::new().with(column.clone(), filename.as_str()),
        )?;

        let persist_error = match self.store.save_image(&filename, bytes).await {
            Ok(()) => None,
            Err(e) => {
                log::warn!("Image '{}' not stored: {}", filename, e);
                Some(e)
            }
        };

        Ok(ImageAttachment {
            column,
            filename,
            slot,
            persist_error,
        })
    }

    /// Mark a scanned record as verified now, then persist
    pub async fn verify_scan(&mut self, raw: &str) -> Result<VerifyOutcome, StoreError> {
        let index = match self.scan(raw)? {
            ScanOutcome::Found { index, .. } => index,
            ScanOutcome::NotFound {
                query, suggestions, ..
            } => return Ok(VerifyOutcome::NotFound { query, suggestions }),
        };

        let sheet_name = self.store.current_sheet_name()?;
        let column = match self.schema()?.verified {
            Some(column) => column,
            None => {
                let column = LogicalRole::Verified.default_header();
                self.store.ensure_column(&sheet_name, column)?;
                column.to_string()
            }
        };

        let at = now();
        self.store
            .mutate(&sheet_name, index, &RecordPatch::new().with(column.clone(), at))?;
        log::info!("Verified row index {} at {}", index, at);

        let persist_error = self.store.persist().await.err();
        Ok(VerifyOutcome::Verified {
            index,
            column,
            at,
            persist_error,
        })
    }

    /// Distinct non-empty locations in the current sheet, sorted
    pub fn location_options(&self) -> Result<Vec<String>, StoreError> {
        let sheet = self.sheet()?;
        let Some(column) = self.store.schema().column(LogicalRole::Location, sheet.headers()) else {
            return Ok(Vec::new());
        };

        let mut locations: Vec<String> = sheet
            .records()
            .iter()
            .map(|r| r.cell(column).to_text().trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        locations.sort();
        locations.dedup();
        Ok(locations)
    }

    /// Indices of records whose serial contains the text
    ///
    /// An empty filter or a sheet without a serial column keeps every row.
    pub fn filter_by_serial(&self, text: &str) -> Result<Vec<usize>, StoreError> {
        let sheet = self.sheet()?;
        let needle = normalize_identifier(text);
        let column = self.store.schema().column(LogicalRole::Serial, sheet.headers());

        let indices = match column {
            Some(column) if !needle.is_empty() => sheet
                .records()
                .iter()
                .enumerate()
                .filter(|(_, r)| normalize_identifier(&r.cell(column).to_text()).contains(&needle))
                .map(|(i, _)| i)
                .collect(),
            _ => (0..sheet.len()).collect(),
        };
        Ok(indices)
    }
}

impl std::fmt::Debug for InventorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventorySession")
            .field("store", &self.store)
            .field("lookup", &self.lookup)
            .finish()
    }
}
