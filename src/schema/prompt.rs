use serde::Serialize;

use super::coerce;
use super::{Row, Schema, ValidationError};

/// Column positions in the prompts worksheet.
pub mod columns {
    pub const TITLE: usize = 0;
    pub const BODY: usize = 1;
    pub const TAGS: usize = 2;

    pub const NUM_COLS: usize = 3;
}

const HEADERS: [&str; columns::NUM_COLS] = ["Title", "Prompt", "Tags"];

/// A saved prompt in the vault.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Prompt {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PromptPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct PromptSchema;

impl Schema for PromptSchema {
    type Record = Prompt;
    type Draft = Prompt;
    type Patch = PromptPatch;

    fn kind(&self) -> &'static str {
        "prompt"
    }

    fn headers(&self) -> &'static [&'static str] {
        &HEADERS
    }

    fn validate(&self, raw: &[String]) -> Result<Prompt, ValidationError> {
        Ok(Prompt {
            title: coerce::optional_text(raw, columns::TITLE),
            body: coerce::required_text(raw, columns::BODY, "body")?,
            tags: coerce::tags(coerce::cell(raw, columns::TAGS)),
        })
    }

    fn serialize(&self, prompt: &Prompt) -> Row {
        vec![
            prompt.title.clone(),
            prompt.body.clone(),
            coerce::format_tags(&prompt.tags),
        ]
    }

    fn build(&self, draft: Prompt) -> Result<Prompt, ValidationError> {
        Ok(draft)
    }

    fn merge(&self, prompt: &mut Prompt, patch: PromptPatch) {
        if let Some(title) = patch.title {
            prompt.title = title;
        }
        if let Some(body) = patch.body {
            prompt.body = body;
        }
        if let Some(tags) = patch.tags {
            prompt.tags = tags;
        }
    }
}
