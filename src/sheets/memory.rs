use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::SheetClient;
use crate::error::SheetError;
use crate::schema::Row;

/// A failure to inject into the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Auth,
    RateLimit,
}

/// In-process worksheets with the same 1-based row semantics as the remote
/// service. Used by tests and by the credential-free `--memory` mode.
#[derive(Debug, Default)]
pub struct MemorySheets {
    sheets: Mutex<HashMap<String, Vec<Row>>>,
    faults: Mutex<VecDeque<Fault>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        self.add_sheet(name, rows);
        self
    }

    /// Create (or replace) a worksheet.
    pub fn add_sheet(&self, name: impl Into<String>, rows: Vec<Row>) {
        lock(&self.sheets).insert(name.into(), rows);
    }

    /// Snapshot of a worksheet's rows.
    pub fn rows(&self, name: &str) -> Option<Vec<Row>> {
        lock(&self.sheets).get(name).cloned()
    }

    /// Make the next call fail with `fault`. Faults queue up in order.
    pub fn inject(&self, fault: Fault) {
        lock(&self.faults).push_back(fault);
    }

    fn take_fault(&self) -> Result<(), SheetError> {
        match lock(&self.faults).pop_front() {
            None => Ok(()),
            Some(Fault::Auth) => Err(SheetError::Auth("injected auth failure".to_string())),
            Some(Fault::RateLimit) => Err(SheetError::RateLimit { retry_after: None }),
        }
    }

    fn with_rows<T>(
        &self,
        sheet: &str,
        f: impl FnOnce(&mut Vec<Row>) -> Result<T, SheetError>,
    ) -> Result<T, SheetError> {
        self.take_fault()?;
        let mut sheets = lock(&self.sheets);
        let rows = sheets
            .get_mut(sheet)
            .ok_or_else(|| SheetError::NotFound(format!("worksheet '{}'", sheet)))?;
        f(rows)
    }
}

fn check_index(rows: &[Row], sheet: &str, row_index: usize) -> Result<usize, SheetError> {
    if row_index == 0 || row_index > rows.len() {
        return Err(SheetError::NotFound(format!(
            "row {} of worksheet '{}'",
            row_index, sheet
        )));
    }
    Ok(row_index - 1)
}

#[async_trait::async_trait]
impl SheetClient for MemorySheets {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read_all(&self, sheet: &str) -> Result<Vec<Row>, SheetError> {
        self.with_rows(sheet, |rows| Ok(rows.clone()))
    }

    async fn append_row(&self, sheet: &str, row: Row) -> Result<usize, SheetError> {
        self.with_rows(sheet, |rows| {
            rows.push(row);
            Ok(rows.len())
        })
    }

    async fn update_row(&self, sheet: &str, row_index: usize, row: Row) -> Result<(), SheetError> {
        self.with_rows(sheet, |rows| {
            let idx = check_index(rows, sheet, row_index)?;
            rows[idx] = row;
            Ok(())
        })
    }

    async fn delete_row(&self, sheet: &str, row_index: usize) -> Result<(), SheetError> {
        self.with_rows(sheet, |rows| {
            let idx = check_index(rows, sheet, row_index)?;
            rows.remove(idx);
            Ok(())
        })
    }
}
