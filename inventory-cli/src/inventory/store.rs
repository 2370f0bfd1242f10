//! In-memory workbook ownership and synchronization with the persistence gateway

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::mutator;
use super::schema::SchemaResolver;
use super::types::{Cell, LogicalRole, Record, Sheet, TabularDocument, TabularSheet, Workbook};
use crate::persistence::{
    IMAGE_PREFIX, PersistenceError, PersistenceGateway, SNAPSHOT_KEY, Snapshot, image_key,
};

/// Contract violations raised by the store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("row index {index} out of range for sheet '{sheet}' ({len} records)")]
    OutOfRange {
        sheet: String,
        index: usize,
        len: usize,
    },

    #[error("unknown sheet '{0}'")]
    UnknownSheet(String),

    #[error("no workbook loaded")]
    NoSheetLoaded,

    #[error("column '{column}' does not exist in sheet '{sheet}'")]
    UnknownColumn { sheet: String, column: String },

    #[error("record does not match sheet headers (missing: {missing:?}, unexpected: {extra:?})")]
    RecordShape {
        missing: Vec<String>,
        extra: Vec<String>,
    },

    #[error("identifier '{value}' already present in column '{column}' (row index {index})")]
    DuplicateIdentifier {
        column: String,
        value: String,
        index: usize,
    },

    #[error("sheet has no column for role '{0}'")]
    MissingRole(LogicalRole),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Partial update of a record: only the listed fields change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    changed_fields: HashMap<String, Cell>,
}

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter
    pub fn with(mut self, header: impl Into<String>, cell: impl Into<Cell>) -> Self {
        self.set(header, cell);
        self
    }

    pub fn set(&mut self, header: impl Into<String>, cell: impl Into<Cell>) {
        self.changed_fields.insert(header.into(), cell.into());
    }

    pub fn is_empty(&self) -> bool {
        self.changed_fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Cell)> {
        self.changed_fields.iter()
    }
}

/// Owns the workbook and keeps it in sync with durable storage
///
/// Mutations never persist on their own; callers decide when to call
/// [`RecordStore::persist`]. A failed persist leaves the in-memory state
/// untouched.
pub struct RecordStore {
    workbook: Workbook,
    gateway: Arc<dyn PersistenceGateway>,
    schema: SchemaResolver,
    dirty: bool,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("sheets", &self.workbook.sheet_names())
            .field("current_sheet", &self.workbook.current_sheet_name())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl RecordStore {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, schema: SchemaResolver) -> Self {
        RecordStore {
            workbook: Workbook::new(),
            gateway,
            schema,
            dirty: false,
        }
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    pub fn schema(&self) -> &SchemaResolver {
        &self.schema
    }

    pub fn gateway(&self) -> &Arc<dyn PersistenceGateway> {
        &self.gateway
    }

    /// True when there are mutations not yet persisted
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The current sheet, or `NoSheetLoaded`
    pub fn current_sheet(&self) -> Result<&Sheet, StoreError> {
        self.workbook.current_sheet().ok_or(StoreError::NoSheetLoaded)
    }

    pub fn current_sheet_name(&self) -> Result<String, StoreError> {
        Ok(self.current_sheet()?.name().to_string())
    }

    pub fn sheet(&self, name: &str) -> Result<&Sheet, StoreError> {
        self.workbook
            .sheet(name)
            .ok_or_else(|| StoreError::UnknownSheet(name.to_string()))
    }

    fn sheet_mut(&mut self, name: &str) -> Result<&mut Sheet, StoreError> {
        self.workbook
            .sheet_mut(name)
            .ok_or_else(|| StoreError::UnknownSheet(name.to_string()))
    }

    /// Replace the workbook with an imported document
    ///
    /// Each sheet's headers come from the key order of its first row. Keys
    /// that later rows carry beyond those headers are dropped; missing keys
    /// become empty cells. A sheet without rows is kept with no headers.
    pub fn load(&mut self, document: TabularDocument) -> &Workbook {
        let mut sheets = Vec::with_capacity(document.sheets.len());

        for tabular in document.sheets {
            let headers = tabular.headers();
            let mut sheet = Sheet::with_headers(tabular.name, headers);
            let mut dropped = 0usize;

            for row in tabular.rows {
                let mut record = sheet.blank_record();
                for (key, cell) in row {
                    if !record.set(&key, cell) {
                        dropped += 1;
                    }
                }
                sheet.push_record(record);
            }

            if dropped > 0 {
                log::warn!(
                    "Sheet '{}': dropped {} cells outside the header row",
                    sheet.name(),
                    dropped
                );
            }
            log_duplicates(&self.schema, &sheet);
            log::info!(
                "Loaded sheet '{}' ({} columns, {} records)",
                sheet.name(),
                sheet.headers().len(),
                sheet.len()
            );
            sheets.push(sheet);
        }

        self.workbook = Workbook::from_sheets(sheets);
        self.dirty = true;
        &self.workbook
    }

    /// Export the workbook as plain rows, headers in order, sheets in order
    pub fn export(&self) -> TabularDocument {
        let sheets = self
            .workbook
            .sheets()
            .iter()
            .map(|sheet| {
                let rows = sheet
                    .records()
                    .iter()
                    .map(|record| {
                        sheet
                            .headers()
                            .iter()
                            .map(|h| (h.clone(), record.cell(h).clone()))
                            .collect()
                    })
                    .collect();
                TabularSheet::new(sheet.name(), rows)
            })
            .collect();
        TabularDocument::new(sheets)
    }

    /// Apply a partial update to one record
    ///
    /// Every patched field must be an existing header; nothing is written
    /// unless the whole patch applies.
    pub fn mutate(
        &mut self,
        sheet_name: &str,
        index: usize,
        patch: &RecordPatch,
    ) -> Result<(), StoreError> {
        let sheet = self.sheet_mut(sheet_name)?;
        let len = sheet.len();

        if let Some((column, _)) = patch.fields().find(|(h, _)| !sheet.has_header(h)) {
            return Err(StoreError::UnknownColumn {
                sheet: sheet_name.to_string(),
                column: column.clone(),
            });
        }

        let record = sheet.record_mut(index).ok_or_else(|| StoreError::OutOfRange {
            sheet: sheet_name.to_string(),
            index,
            len,
        })?;

        for (header, cell) in patch.fields() {
            record.set(header, cell.clone());
        }

        log::debug!(
            "Updated {} field(s) of record {} in '{}'",
            patch.changed_fields.len(),
            index,
            sheet_name
        );
        self.dirty = true;
        Ok(())
    }

    /// Append a fully shaped record and return its index
    ///
    /// The record's keys must equal the sheet's headers. A non-empty primary
    /// identifier or serial already present in the sheet is rejected.
    pub fn append(&mut self, sheet_name: &str, record: Record) -> Result<usize, StoreError> {
        let schema = self.schema.clone();
        let sheet = self.sheet_mut(sheet_name)?;

        let (missing, extra) = record.shape_diff(sheet.headers());
        if !missing.is_empty() || !extra.is_empty() {
            return Err(StoreError::RecordShape { missing, extra });
        }

        for role in [LogicalRole::Id, LogicalRole::Serial] {
            let Some(column) = schema.column(role, sheet.headers()) else {
                continue;
            };
            if let Some(index) = find_duplicate(sheet, column, record.cell(column)) {
                return Err(StoreError::DuplicateIdentifier {
                    column: column.to_string(),
                    value: record.cell(column).to_text(),
                    index,
                });
            }
        }

        let index = sheet.push_record(record);
        log::debug!("Appended record {} to '{}'", index, sheet_name);
        self.dirty = true;
        Ok(index)
    }

    /// Make another sheet current
    ///
    /// Edits are applied to the workbook directly, so the previous sheet's
    /// state is already committed. The switch itself is not persisted.
    pub fn switch_sheet(&mut self, name: &str) -> Result<(), StoreError> {
        if self.workbook.sheet(name).is_none() {
            return Err(StoreError::UnknownSheet(name.to_string()));
        }
        if self.workbook.current_sheet_name() != Some(name) {
            log::info!("Switching to sheet '{}'", name);
            self.workbook.set_current(name);
            self.dirty = true;
        }
        Ok(())
    }

    /// Add a column to a sheet if missing. Returns true if it was added.
    pub fn ensure_column(&mut self, sheet_name: &str, column: &str) -> Result<bool, StoreError> {
        let sheet = self.sheet_mut(sheet_name)?;
        let added = mutator::ensure_column(column, sheet);
        self.dirty |= added;
        Ok(added)
    }

    /// Grow a numbered column (`<prefix> N`) and return its name
    pub fn add_numbered_column(
        &mut self,
        sheet_name: &str,
        prefix: &str,
    ) -> Result<String, StoreError> {
        let sheet = self.sheet_mut(sheet_name)?;
        let name = mutator::add_numbered_column(prefix, sheet).ok_or_else(|| {
            StoreError::InvalidInput(format!("no numbered column left after '{}'", prefix))
        })?;
        self.dirty = true;
        Ok(name)
    }

    /// Write the whole workbook as the current snapshot (last write wins)
    pub async fn persist(&mut self) -> Result<(), PersistenceError> {
        let snapshot = Snapshot::new(self.workbook.clone());
        let bytes = snapshot.encode()?;
        self.gateway.put(SNAPSHOT_KEY, &bytes).await?;
        self.dirty = false;
        log::debug!(
            "Persisted snapshot ({} bytes, {} records)",
            bytes.len(),
            self.workbook.total_records()
        );
        Ok(())
    }

    /// Replace the in-memory workbook with the stored snapshot
    ///
    /// An absent snapshot yields an empty workbook. Returns the snapshot
    /// timestamp when one was found.
    pub async fn restore(&mut self) -> Result<Option<chrono::DateTime<chrono::Utc>>, PersistenceError> {
        let Some(bytes) = self.gateway.get(SNAPSHOT_KEY).await? else {
            log::debug!("No stored snapshot");
            self.workbook = Workbook::new();
            self.dirty = false;
            return Ok(None);
        };

        let snapshot = Snapshot::decode(&bytes)?;
        log::info!(
            "Restored snapshot from {} ({} sheets)",
            snapshot.saved_at,
            snapshot.workbook.sheets().len()
        );
        self.workbook = snapshot.workbook;
        self.dirty = false;
        Ok(Some(snapshot.saved_at))
    }

    /// Drop the workbook and its stored snapshot. Images are kept.
    pub async fn clear(&mut self) -> Result<(), PersistenceError> {
        self.workbook = Workbook::new();
        self.dirty = false;
        self.gateway.delete(SNAPSHOT_KEY).await
    }

    pub async fn save_image(&self, filename: &str, bytes: &[u8]) -> Result<(), PersistenceError> {
        self.gateway.put(&image_key(filename), bytes).await
    }

    pub async fn load_image(&self, filename: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        self.gateway.get(&image_key(filename)).await
    }

    /// Filenames of every stored image
    pub async fn image_names(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self
            .gateway
            .keys(IMAGE_PREFIX)
            .await?
            .into_iter()
            .filter_map(|k| k.strip_prefix(IMAGE_PREFIX).map(str::to_string))
            .collect())
    }
}

fn normalized(cell: &Cell) -> String {
    cell.to_text().trim().to_uppercase()
}

fn find_duplicate(sheet: &Sheet, column: &str, value: &Cell) -> Option<usize> {
    let target = normalized(value);
    if target.is_empty() {
        return None;
    }
    sheet
        .records()
        .iter()
        .position(|r| normalized(r.cell(column)) == target)
}

/// Imported data may already hold duplicates; they are reported, not rejected
fn log_duplicates(schema: &SchemaResolver, sheet: &Sheet) {
    let Some(column) = schema.column(LogicalRole::Serial, sheet.headers()) else {
        return;
    };
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (index, record) in sheet.records().iter().enumerate() {
        let value = normalized(record.cell(column));
        if value.is_empty() {
            continue;
        }
        if let Some(first) = seen.get(&value) {
            log::warn!(
                "Sheet '{}': serial '{}' at row index {} duplicates row index {}",
                sheet.name(),
                value,
                index,
                first
            );
        } else {
            seen.insert(value, index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryGateway;

    fn row(pairs: &[(&str, &str)]) -> Vec<(String, Cell)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Cell::text(*v)))
            .collect()
    }

    fn document() -> TabularDocument {
        TabularDocument::new(vec![
            TabularSheet::new(
                "Equipos",
                vec![
                    row(&[("ID", "1"), ("Serie", "ABC-100"), ("Equipo", "Bomba")]),
                    row(&[("ID", "2"), ("Serie", "ABC-101"), ("Equipo", "Motor")]),
                ],
            ),
            TabularSheet::new("Vacia", vec![]),
        ])
    }

    fn store() -> (RecordStore, Arc<MemoryGateway>) {
        let gateway = Arc::new(MemoryGateway::new());
        let store = RecordStore::new(gateway.clone(), SchemaResolver::default());
        (store, gateway)
    }

    #[test]
    fn test_load_takes_headers_from_first_row() {
        let (mut store, _) = store();
        let workbook = store.load(document());

        assert_eq!(workbook.sheet_names(), vec!["Equipos", "Vacia"]);
        assert_eq!(workbook.current_sheet_name(), Some("Equipos"));
        let sheet = workbook.sheet("Equipos").unwrap();
        assert_eq!(sheet.headers(), &["ID", "Serie", "Equipo"]);
        assert_eq!(sheet.len(), 2);
        assert!(workbook.sheet("Vacia").unwrap().headers().is_empty());
    }

    #[test]
    fn test_load_normalizes_ragged_rows() {
        let (mut store, _) = store();
        store.load(TabularDocument::new(vec![TabularSheet::new(
            "S",
            vec![
                row(&[("ID", "1"), ("Serie", "A")]),
                row(&[("ID", "2"), ("Extra", "x")]),
            ],
        )]));

        let sheet = store.sheet("S").unwrap();
        let second = sheet.record(1).unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second.cell("Serie"), &Cell::Empty);
        assert!(!second.contains("Extra"));
    }

    #[test]
    fn test_export_keeps_header_order() {
        let (mut store, _) = store();
        store.load(document());
        let exported = store.export();

        let sheet = exported.sheet("Equipos").unwrap();
        assert_eq!(sheet.headers(), vec!["ID", "Serie", "Equipo"]);
        assert_eq!(sheet.rows[1][1], ("Serie".to_string(), Cell::text("ABC-101")));
        assert!(exported.sheet("Vacia").unwrap().rows.is_empty());
    }

    #[test]
    fn test_mutate_patches_fields() {
        let (mut store, _) = store();
        store.load(document());

        let patch = RecordPatch::new().with("Equipo", "Bomba nueva");
        store.mutate("Equipos", 0, &patch).unwrap();

        let record = store.sheet("Equipos").unwrap().record(0).unwrap();
        assert_eq!(record.cell("Equipo"), &Cell::text("Bomba nueva"));
        assert_eq!(record.cell("Serie"), &Cell::text("ABC-100"));
    }

    #[test]
    fn test_mutate_errors() {
        let (mut store, _) = store();
        store.load(document());
        let patch = RecordPatch::new().with("Equipo", "x");

        assert!(matches!(
            store.mutate("Equipos", 2, &patch),
            Err(StoreError::OutOfRange { index: 2, len: 2, .. })
        ));
        assert!(matches!(
            store.mutate("Nope", 0, &patch),
            Err(StoreError::UnknownSheet(_))
        ));

        let bad = RecordPatch::new().with("Equipo", "y").with("Color", "rojo");
        assert!(matches!(
            store.mutate("Equipos", 0, &bad),
            Err(StoreError::UnknownColumn { .. })
        ));
        let record = store.sheet("Equipos").unwrap().record(0).unwrap();
        assert_eq!(record.cell("Equipo"), &Cell::text("Bomba"));
    }

    #[test]
    fn test_append_validates_shape() {
        let (mut store, _) = store();
        store.load(document());

        let partial: Record = row(&[("ID", "3"), ("Serie", "Z")]).into_iter().collect();
        match store.append("Equipos", partial) {
            Err(StoreError::RecordShape { missing, extra }) => {
                assert_eq!(missing, vec!["Equipo"]);
                assert!(extra.is_empty());
            }
            other => panic!("expected shape error, got {:?}", other),
        }

        let mut record = store.sheet("Equipos").unwrap().blank_record();
        record.set("ID", "3");
        record.set("Serie", "XYZ-200");
        assert_eq!(store.append("Equipos", record).unwrap(), 2);
    }

    #[test]
    fn test_append_rejects_duplicate_serial() {
        let (mut store, _) = store();
        store.load(document());

        let mut record = store.sheet("Equipos").unwrap().blank_record();
        record.set("ID", "9");
        record.set("Serie", " abc-100 ");
        assert!(matches!(
            store.append("Equipos", record),
            Err(StoreError::DuplicateIdentifier { index: 0, .. })
        ));

        // Blank identifiers never collide
        let blank = store.sheet("Equipos").unwrap().blank_record();
        store.append("Equipos", blank.clone()).unwrap();
        store.append("Equipos", blank).unwrap();
    }

    #[test]
    fn test_switch_sheet() {
        let (mut store, _) = store();
        assert!(matches!(store.current_sheet(), Err(StoreError::NoSheetLoaded)));

        store.load(document());
        store.switch_sheet("Vacia").unwrap();
        assert_eq!(store.current_sheet_name().unwrap(), "Vacia");
        assert!(matches!(
            store.switch_sheet("Otra"),
            Err(StoreError::UnknownSheet(_))
        ));
        assert_eq!(store.current_sheet_name().unwrap(), "Vacia");
    }

    #[test]
    fn test_edits_survive_sheet_switch() {
        let (mut store, _) = store();
        store.load(document());
        store
            .mutate("Equipos", 1, &RecordPatch::new().with("Equipo", "Compresor"))
            .unwrap();
        store.switch_sheet("Vacia").unwrap();
        store.switch_sheet("Equipos").unwrap();

        let record = store.current_sheet().unwrap().record(1).unwrap();
        assert_eq!(record.cell("Equipo"), &Cell::text("Compresor"));
    }

    #[test]
    fn test_column_growth_through_store() {
        let (mut store, _) = store();
        store.load(document());

        assert!(store.ensure_column("Equipos", "Observaciones").unwrap());
        assert!(!store.ensure_column("Equipos", "Observaciones").unwrap());
        let name = store.add_numbered_column("Equipos", "Observaciones").unwrap();
        assert_eq!(name, "Observaciones 2");

        let sheet = store.sheet("Equipos").unwrap();
        for record in sheet.records() {
            assert_eq!(record.len(), sheet.headers().len());
        }
    }

    #[test]
    fn test_numbered_column_overflow_is_an_error() {
        let (mut store, _) = store();
        store.load(document());
        store.ensure_column("Equipos", "Observaciones 4294967295").unwrap();

        assert!(matches!(
            store.add_numbered_column("Equipos", "Observaciones"),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_persist_and_restore() {
        let (mut store, gateway) = store();
        store.load(document());
        store.switch_sheet("Vacia").unwrap();
        store.persist().await.unwrap();
        assert!(!store.is_dirty());

        let mut other = RecordStore::new(gateway, SchemaResolver::default());
        let saved_at = other.restore().await.unwrap();
        assert!(saved_at.is_some());
        assert_eq!(other.workbook(), store.workbook());
        assert_eq!(other.current_sheet_name().unwrap(), "Vacia");
    }

    #[tokio::test]
    async fn test_restore_without_snapshot_is_empty() {
        let (mut store, _) = store();
        store.load(document());
        assert_eq!(store.restore().await.unwrap(), None);
        assert!(store.workbook().is_empty());
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_memory_state() {
        let (mut store, gateway) = store();
        store.load(document());
        store
            .mutate("Equipos", 0, &RecordPatch::new().with("Equipo", "Valvula"))
            .unwrap();

        gateway.set_offline(true);
        assert!(store.persist().await.is_err());
        assert!(store.is_dirty());

        let record = store.sheet("Equipos").unwrap().record(0).unwrap();
        assert_eq!(record.cell("Equipo"), &Cell::text("Valvula"));
    }

    #[tokio::test]
    async fn test_clear_removes_snapshot_but_keeps_images() {
        let (mut store, gateway) = store();
        store.load(document());
        store.persist().await.unwrap();
        store.save_image("ABC_100_1.jpg", b"jpeg").await.unwrap();

        store.clear().await.unwrap();
        assert!(store.workbook().is_empty());
        assert_eq!(gateway.get(SNAPSHOT_KEY).await.unwrap(), None);
        assert_eq!(store.image_names().await.unwrap(), vec!["ABC_100_1.jpg"]);
        assert_eq!(
            store.load_image("ABC_100_1.jpg").await.unwrap(),
            Some(b"jpeg".to_vec())
        );
    }
}
