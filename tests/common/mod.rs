//! Common test utilities for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use collectify::schema::Row;
use collectify::{
    MemorySheets, PromptSchema, PromptStore, RecordStore, TodoSchema, TodoStore, ToolSchema,
    ToolStore,
};

pub const TOOLS: &str = "collectify_data";
pub const PROMPTS: &str = "ChatGPT Prompts";
pub const TODOS: &str = "Todo";

pub fn row(cells: &[&str]) -> Row {
    cells.iter().map(|c| c.to_string()).collect()
}

/// Todo sheet holding only its header row.
pub fn todo_store() -> (TodoStore, Arc<MemorySheets>) {
    let sheets = Arc::new(MemorySheets::new().with_sheet(
        TODOS,
        vec![row(&["ID", "Title", "Status", "Priority", "Created At", "Completed At"])],
    ));
    (RecordStore::new(TodoSchema, sheets.clone(), TODOS), sheets)
}

pub fn tool_store(rows: Vec<Row>) -> (ToolStore, Arc<MemorySheets>) {
    let sheets = Arc::new(MemorySheets::new().with_sheet(TOOLS, rows));
    (
        RecordStore::new(ToolSchema::default(), sheets.clone(), TOOLS),
        sheets,
    )
}

pub fn prompt_store(rows: Vec<Row>) -> (PromptStore, Arc<MemorySheets>) {
    let sheets = Arc::new(MemorySheets::new().with_sheet(PROMPTS, rows));
    (RecordStore::new(PromptSchema, sheets.clone(), PROMPTS), sheets)
}
