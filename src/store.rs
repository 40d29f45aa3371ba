//! Typed CRUD over one worksheet.
//!
//! The worksheet is the only state. Every mutating call re-reads the sheet,
//! locates its target by a linear scan, then writes to the row position found.
//!
//! # Consistency
//!
//! Nothing reconciles concurrent writers. If another client inserts or deletes
//! rows between the scan and the write, the write either fails with
//! `NotFound` (the position no longer exists) or lands on whatever row now
//! occupies that position. Key-addressed kinds (todos) narrow this window to a
//! single round trip but cannot close it; row-addressed kinds (tools, prompts)
//! are exposed for as long as the caller holds on to a row number. Last writer
//! wins.

use std::fmt;
use std::sync::Arc;

use crate::error::StoreError;
use crate::schema::{
    coerce, PromptSchema, Row, Schema, TodoSchema, ToolSchema, ValidationError,
};
use crate::sheets::SheetClient;

/// How a caller addresses a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordId {
    /// 1-based row position as last observed by `list`.
    Row(usize),
    /// Value of the kind's key column.
    Key(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Row(row) => write!(f, "at row {}", row),
            RecordId::Key(key) => f.write_str(key),
        }
    }
}

/// A record together with the row it was read from or written to.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<R> {
    pub row: usize,
    pub record: R,
}

/// A row `list` skipped because it failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RowWarning {
    pub row: usize,
    pub error: ValidationError,
}

impl fmt::Display for RowWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row, self.error)
    }
}

/// Result of `list`: the valid records plus what was dropped on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<R> {
    pub records: Vec<Stored<R>>,
    pub warnings: Vec<RowWarning>,
}

impl<R> Listing<R> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Just the records, in sheet order.
    pub fn into_records(self) -> Vec<R> {
        self.records.into_iter().map(|s| s.record).collect()
    }
}

pub struct RecordStore<S: Schema> {
    schema: S,
    client: Arc<dyn SheetClient>,
    sheet: String,
}

pub type ToolStore = RecordStore<ToolSchema>;
pub type PromptStore = RecordStore<PromptSchema>;
pub type TodoStore = RecordStore<TodoSchema>;

impl<S: Schema> RecordStore<S> {
    pub fn new(schema: S, client: Arc<dyn SheetClient>, sheet: impl Into<String>) -> Self {
        Self {
            schema,
            client,
            sheet: sheet.into(),
        }
    }

    pub fn schema(&self) -> &S {
        &self.schema
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    /// The id callers should use for a stored record: its key when the kind
    /// has one, otherwise its row position.
    pub fn id_of(&self, stored: &Stored<S::Record>) -> RecordId {
        match self.schema.key(&stored.record) {
            Some(key) => RecordId::Key(key.to_string()),
            None => RecordId::Row(stored.row),
        }
    }

    /// Write the header row if the worksheet is completely empty.
    ///
    /// Returns `true` when a header was written.
    pub async fn init(&self) -> Result<bool, StoreError> {
        let rows = self.client.read_all(&self.sheet).await?;
        if !rows.is_empty() {
            return Ok(false);
        }
        self.write_header().await?;
        Ok(true)
    }

    async fn write_header(&self) -> Result<(), StoreError> {
        let header: Row = self.schema.headers().iter().map(|h| h.to_string()).collect();
        self.client.append_row(&self.sheet, header).await?;
        log::info!("RecordStore[{}]: wrote header row", self.sheet);
        Ok(())
    }

    /// All valid records in sheet order.
    ///
    /// Row 1 is the header and blank rows are skipped. Rows that fail
    /// validation, and later rows repeating an earlier key, are left out of
    /// `records` and reported in `warnings` instead of failing the call.
    pub async fn list(&self) -> Result<Listing<S::Record>, StoreError> {
        let rows = self.client.read_all(&self.sheet).await?;
        Ok(self.parse_rows(&rows))
    }

    fn parse_rows(&self, rows: &[Row]) -> Listing<S::Record> {
        let mut records: Vec<Stored<S::Record>> = Vec::new();
        let mut warnings = Vec::new();

        for (idx, raw) in rows.iter().enumerate().skip(1) {
            let row = idx + 1;
            if coerce::is_blank(raw) {
                continue;
            }

            let result = self.schema.validate(raw).and_then(|record| {
                let duplicate = self
                    .schema
                    .key(&record)
                    .filter(|key| records.iter().any(|s| self.schema.key(&s.record) == Some(*key)))
                    .map(str::to_string);
                match duplicate {
                    Some(key) => Err(ValidationError::DuplicateKey(key)),
                    None => Ok(record),
                }
            });

            match result {
                Ok(record) => records.push(Stored { row, record }),
                Err(error) => {
                    log::warn!("RecordStore[{}]: skipping row {}: {}", self.sheet, row, error);
                    warnings.push(RowWarning { row, error });
                }
            }
        }

        log::debug!(
            "RecordStore[{}]: listed {} record(s), {} warning(s)",
            self.sheet,
            records.len(),
            warnings.len()
        );
        Listing { records, warnings }
    }

    fn locate(
        &self,
        listing: Listing<S::Record>,
        id: &RecordId,
    ) -> Result<Stored<S::Record>, StoreError> {
        listing
            .records
            .into_iter()
            .find(|stored| match id {
                RecordId::Row(row) => stored.row == *row,
                RecordId::Key(key) => self.schema.key(&stored.record) == Some(key.as_str()),
            })
            .ok_or_else(|| StoreError::NotFound {
                kind: self.schema.kind(),
                id: id.clone(),
            })
    }

    pub async fn get(&self, id: &RecordId) -> Result<Stored<S::Record>, StoreError> {
        let listing = self.list().await?;
        self.locate(listing, id)
    }

    /// Validate and append a new record.
    ///
    /// Writes the header first when the worksheet is completely empty, so the
    /// new record never lands in row 1.
    pub async fn create(&self, draft: S::Draft) -> Result<Stored<S::Record>, StoreError> {
        let record = self.schema.normalize(&self.schema.build(draft)?)?;
        let row = self.schema.serialize(&record);

        let rows = self.client.read_all(&self.sheet).await?;
        if rows.is_empty() {
            self.write_header().await?;
        } else if let Some(key) = self.schema.key(&record) {
            let existing = self.parse_rows(&rows);
            if existing
                .records
                .iter()
                .any(|s| self.schema.key(&s.record) == Some(key))
            {
                return Err(ValidationError::DuplicateKey(key.to_string()).into());
            }
        }

        let index = self.client.append_row(&self.sheet, row).await?;
        log::info!(
            "RecordStore[{}]: created {} at row {}",
            self.sheet,
            self.schema.kind(),
            index
        );
        Ok(Stored { row: index, record })
    }

    /// Merge `patch` into the record `id` resolves to and write it back.
    pub async fn update(
        &self,
        id: &RecordId,
        patch: S::Patch,
    ) -> Result<Stored<S::Record>, StoreError> {
        let target = self.get(id).await?;

        let mut merged = target.record;
        self.schema.merge(&mut merged, patch);
        let merged = self.schema.normalize(&merged)?;
        let row = self.schema.serialize(&merged);

        self.client.update_row(&self.sheet, target.row, row).await?;
        log::info!(
            "RecordStore[{}]: updated {} {} at row {}",
            self.sheet,
            self.schema.kind(),
            id,
            target.row
        );
        Ok(Stored {
            row: target.row,
            record: merged,
        })
    }

    pub async fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        let target = self.get(id).await?;
        self.client.delete_row(&self.sheet, target.row).await?;
        log::info!(
            "RecordStore[{}]: deleted {} {} at row {}",
            self.sheet,
            self.schema.kind(),
            id,
            target.row
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SheetError;
    use crate::schema::{row, Prompt, PromptPatch, Tool, ToolPatch};
    use crate::sheets::{Fault, MemorySheets};

    fn tool_store(rows: Vec<Row>) -> (ToolStore, Arc<MemorySheets>) {
        let sheets = Arc::new(MemorySheets::new().with_sheet("Tools", rows));
        let store = RecordStore::new(ToolSchema::default(), sheets.clone(), "Tools");
        (store, sheets)
    }

    #[tokio::test]
    async fn test_list_skips_header() {
        let (store, _) = tool_store(vec![
            row(&["Name", "URL", "Category"]),
            row(&["VSCode", "https://code.visualstudio.com", "Frontend Tools"]),
        ]);

        let listing = store.list().await.unwrap();
        assert!(listing.warnings.is_empty());
        assert_eq!(listing.len(), 1);
        let stored = &listing.records[0];
        assert_eq!(stored.row, 2);
        assert_eq!(stored.record.name, "VSCode");
        assert_eq!(stored.record.url, "https://code.visualstudio.com");
        assert_eq!(stored.record.category, "Frontend Tools");
    }

    #[tokio::test]
    async fn test_list_blank_rows_silent_invalid_rows_warned() {
        let (store, _) = tool_store(vec![
            row(&["Name", "URL", "Category"]),
            row(&["", "", ""]),
            row(&["NoUrl", "", "Python"]),
            row(&["Ruff", "https://docs.astral.sh/ruff", "Python"]),
        ]);

        let listing = store.list().await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing.records[0].row, 4);
        assert_eq!(
            listing.warnings,
            vec![RowWarning {
                row: 3,
                error: ValidationError::MissingField { field: "url" },
            }]
        );
    }

    #[tokio::test]
    async fn test_create_on_empty_sheet_writes_header_first() {
        let (store, sheets) = tool_store(Vec::new());
        let created = store
            .create(Tool {
                name: "Ollama".into(),
                url: "https://ollama.com".into(),
                category: "Artificial Intelligence".into(),
                ..Tool::default()
            })
            .await
            .unwrap();

        assert_eq!(created.row, 2);
        let rows = sheets.rows("Tools").unwrap();
        assert_eq!(rows[0][0], "Name");
        assert_eq!(store.list().await.unwrap().into_records(), vec![created.record]);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_category_without_writing() {
        let (store, sheets) = tool_store(vec![row(&["Name", "URL", "Category"])]);
        let err = store
            .create(Tool {
                name: "X".into(),
                url: "https://x".into(),
                category: "Nope".into(),
                ..Tool::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::UnknownCategory(_))
        ));
        assert_eq!(sheets.rows("Tools").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_by_row() {
        let (store, _) = tool_store(vec![
            row(&["Name", "URL", "Category"]),
            row(&["Black", "https://black.rtfd.io", "Python"]),
        ]);
        let updated = store
            .update(
                &RecordId::Row(2),
                ToolPatch {
                    description: Some("Formatter".into()),
                    ..ToolPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.row, 2);
        assert_eq!(updated.record.description, "Formatter");
        assert_eq!(updated.record.name, "Black");
    }

    #[tokio::test]
    async fn test_header_row_is_not_addressable() {
        let (store, _) = tool_store(vec![
            row(&["Name", "URL", "Category"]),
            row(&["Black", "https://black.rtfd.io", "Python"]),
        ]);
        let err = store.delete(&RecordId::Row(1)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_invalid_merge_is_rejected() {
        let (store, sheets) = tool_store(vec![
            row(&["Name", "URL", "Category"]),
            row(&["Black", "https://black.rtfd.io", "Python"]),
        ]);
        let before = sheets.rows("Tools").unwrap();
        let err = store
            .update(
                &RecordId::Row(2),
                ToolPatch {
                    name: Some("  ".into()),
                    ..ToolPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(sheets.rows("Tools").unwrap(), before);
    }

    #[tokio::test]
    async fn test_adapter_errors_propagate_unchanged() {
        let (store, sheets) = tool_store(vec![row(&["Name", "URL", "Category"])]);
        sheets.inject(Fault::Auth);
        assert!(matches!(
            store.list().await,
            Err(StoreError::Sheet(SheetError::Auth(_)))
        ));
        sheets.inject(Fault::RateLimit);
        assert!(store.list().await.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn test_missing_worksheet() {
        let sheets = Arc::new(MemorySheets::new());
        let store = RecordStore::new(PromptSchema, sheets, "ChatGPT Prompts");
        let err = store.list().await.unwrap_err();
        assert!(matches!(err, StoreError::Sheet(SheetError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_init_only_on_empty_sheet() {
        let sheets = Arc::new(MemorySheets::new().with_sheet("Prompts", Vec::new()));
        let store = RecordStore::new(PromptSchema, sheets.clone(), "Prompts");
        assert!(store.init().await.unwrap());
        assert!(!store.init().await.unwrap());
        assert_eq!(sheets.rows("Prompts").unwrap(), vec![row(&["Title", "Prompt", "Tags"])]);
    }

    fn assert_canonical<S: Schema>(schema: &S, raw: &Row) {
        let reread = schema.validate(raw).unwrap();
        assert_eq!(&schema.serialize(&reread), raw);
    }

    #[tokio::test]
    async fn test_create_writes_canonical_row() {
        let (store, sheets) = tool_store(vec![row(&["Name", "URL", "Category"])]);
        let created = store
            .create(Tool {
                name: "  VSCode ".into(),
                url: "https://code.visualstudio.com".into(),
                category: "Frontend Tools".into(),
                ..Tool::default()
            })
            .await
            .unwrap();

        let written = &sheets.rows("Tools").unwrap()[1];
        assert_eq!(written[0], "VSCode");
        assert_canonical(store.schema(), written);
        assert_eq!(&store.schema().serialize(&created.record), written);
    }

    #[tokio::test]
    async fn test_update_writes_canonical_row() {
        let sheets = Arc::new(MemorySheets::new().with_sheet(
            "Prompts",
            vec![row(&["Title", "Prompt", "Tags"]), row(&["t", "b"])],
        ));
        let store = RecordStore::new(PromptSchema, sheets.clone(), "Prompts");
        let updated = store
            .update(
                &RecordId::Row(2),
                PromptPatch {
                    tags: Some(vec!["review".into(), "review".into()]),
                    ..PromptPatch::default()
                },
            )
            .await
            .unwrap();

        let written = &sheets.rows("Prompts").unwrap()[1];
        assert_eq!(written, &row(&["t", "b", "review"]));
        assert_canonical(&PromptSchema, written);
        assert_eq!(&PromptSchema.serialize(&updated.record), written);
    }

    #[tokio::test]
    async fn test_prompt_update_tags() {
        let sheets = Arc::new(
            MemorySheets::new().with_sheet("Prompts", vec![row(&["Title", "Prompt", "Tags"])]),
        );
        let store = RecordStore::new(PromptSchema, sheets, "Prompts");
        let created = store
            .create(Prompt {
                title: "Review".into(),
                body: "Review this code".into(),
                tags: vec!["code".into()],
            })
            .await
            .unwrap();
        let id = store.id_of(&created);
        assert_eq!(id, RecordId::Row(2));

        let updated = store
            .update(
                &id,
                PromptPatch {
                    tags: Some(vec!["code".into(), "review".into()]),
                    ..PromptPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.record.tags, vec!["code", "review"]);
        assert_eq!(updated.record.body, "Review this code");
    }
}
