//! Collectify: a spreadsheet-backed record store
//!
//! Three small tables (a tool directory, a prompt vault and a todo list) live
//! as worksheets of one hosted spreadsheet. This library maps typed CRUD
//! operations onto row reads and writes against that spreadsheet.
//!
//! # Architecture
//!
//! - **Schema** (`schema`): record shapes and cell coercion, pure functions
//! - **Adapter** (`sheets`): service-account auth and the four row primitives
//! - **Store** (`store`): list/create/update/delete with validation
//! - **Catalog** (`catalog`): directory filters and dashboard counters
//!
//! The spreadsheet is the only source of truth. See [`store`] for the
//! consistency guarantees under concurrent edits.
//!
//! # Example
//!
//! ```no_run
//! use collectify::{Collectify, Config, TodoDraft};
//! use anyhow::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::from_file("config.toml")?;
//!     let app = Collectify::connect(&config)?;
//!     let todo = app.todos.create(TodoDraft::new("Write report")).await?;
//!     println!("added {} at row {}", todo.record.id, todo.row);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod retry;
pub mod schema;
pub mod sheets;
pub mod store;

use std::sync::Arc;

use anyhow::{Context, Result};

pub use config::Config;
pub use error::{SheetError, StoreError};
pub use retry::{retry_rate_limited, RetryPolicy};
pub use schema::{
    Priority, Prompt, PromptPatch, PromptSchema, Schema, Status, Todo, TodoDraft, TodoPatch,
    TodoSchema, Tool, ToolPatch, ToolSchema, ValidationError,
};
pub use sheets::{AuthSession, GoogleSheetsClient, MemorySheets, SheetClient};
pub use store::{
    Listing, PromptStore, RecordId, RecordStore, RowWarning, Stored, TodoStore, ToolStore,
};

/// The three stores of one spreadsheet document, sharing a single client.
pub struct Collectify {
    pub tools: ToolStore,
    pub prompts: PromptStore,
    pub todos: TodoStore,
}

impl Collectify {
    /// Build stores against the configured Google spreadsheet.
    ///
    /// No request is made here; credentials are read and exchanged on first
    /// use, so a bad key file shows up as an auth error from the first call.
    pub fn connect(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let auth = Arc::new(AuthSession::from_file(
            config.credentials.service_account_file.clone(),
            config.credentials.scopes.clone(),
            http.clone(),
        ));
        let client = GoogleSheetsClient::new(
            config.sheets.api_base.clone(),
            config.sheets.spreadsheet_id.clone(),
            auth,
            http,
        );

        log::info!(
            "Collectify: using spreadsheet {} via {}",
            config.sheets.spreadsheet_id,
            client.name()
        );
        Ok(Self::with_client(config, Arc::new(client)))
    }

    /// Build stores on top of any [`SheetClient`].
    pub fn with_client(config: &Config, client: Arc<dyn SheetClient>) -> Self {
        let sheets = &config.worksheets;
        Self {
            tools: RecordStore::new(config.tool_schema(), client.clone(), sheets.tools.clone()),
            prompts: RecordStore::new(PromptSchema, client.clone(), sheets.prompts.clone()),
            todos: RecordStore::new(TodoSchema, client, sheets.todos.clone()),
        }
    }

    /// In-memory worksheets pre-seeded with header rows.
    pub fn in_memory(config: &Config) -> Self {
        let sheets = &config.worksheets;
        let memory = MemorySheets::new()
            .with_sheet(sheets.tools.clone(), vec![header(&config.tool_schema())])
            .with_sheet(sheets.prompts.clone(), vec![header(&PromptSchema)])
            .with_sheet(sheets.todos.clone(), vec![header(&TodoSchema)]);
        Self::with_client(config, Arc::new(memory))
    }
}

fn header<S: Schema>(schema: &S) -> schema::Row {
    schema.headers().iter().map(|h| h.to_string()).collect()
}
