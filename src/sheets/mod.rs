pub mod auth;
pub mod google;
pub mod memory;

pub use auth::{AuthSession, ServiceAccountKey};
pub use google::GoogleSheetsClient;
pub use memory::{Fault, MemorySheets};

use crate::error::SheetError;
use crate::schema::Row;

/// Primitive row operations against one spreadsheet document.
///
/// Row indices are 1-based, with row 1 being the header. Every call is a
/// single remote mutation; implementations neither batch, buffer nor retry.
///
/// `NotFound` for a stale row index is best effort. A remote worksheet has
/// blank grid rows past its data, so writing to an index beyond the last
/// record lands in an empty row instead of failing. Callers that need the
/// check re-read first, as `RecordStore` does.
#[async_trait::async_trait]
pub trait SheetClient: Send + Sync {
    fn name(&self) -> &str;

    /// All rows of the worksheet in sheet order, header included.
    async fn read_all(&self, sheet: &str) -> Result<Vec<Row>, SheetError>;

    /// Append a row after the last non-empty row and return its index.
    async fn append_row(&self, sheet: &str, row: Row) -> Result<usize, SheetError>;

    async fn update_row(&self, sheet: &str, row_index: usize, row: Row)
        -> Result<(), SheetError>;

    async fn delete_row(&self, sheet: &str, row_index: usize) -> Result<(), SheetError>;
}
