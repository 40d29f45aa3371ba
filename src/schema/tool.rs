use serde::Serialize;

use super::coerce;
use super::{Row, Schema, ValidationError};

/// Column positions in the tools worksheet.
pub mod columns {
    pub const NAME: usize = 0;
    pub const URL: usize = 1;
    pub const CATEGORY: usize = 2;
    pub const ICON: usize = 3;
    pub const DESCRIPTION: usize = 4;
    pub const USED: usize = 5;

    pub const NUM_COLS: usize = 6;
}

const HEADERS: [&str; columns::NUM_COLS] =
    ["Name", "URL", "Category", "Icon", "Description", "Used"];

/// Categories accepted when none are configured.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Artificial Intelligence",
    "Chrome Extensions",
    "Django",
    "Free API Resources",
    "Frontend Tools",
    "Icons Website",
    "Programming Tools",
    "Python",
    "React",
    "Useful Websites",
    "VSCode Extensions",
    "Web Design",
    "Web Scraping",
    "Youtube Videos",
];

/// An entry of the tool directory.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Tool {
    pub name: String,
    pub url: String,
    pub category: String,
    pub icon: String,
    pub description: String,
    pub used: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ToolPatch {
    pub name: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub used: Option<bool>,
}

/// Tool rows, checked against a fixed category set.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    categories: Vec<String>,
}

impl ToolSchema {
    pub fn new<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categories: categories.into_iter().map(Into::into).collect(),
        }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Case-insensitive category membership.
    pub fn is_known_category(&self, category: &str) -> bool {
        self.categories
            .iter()
            .any(|c| c.trim().eq_ignore_ascii_case(category.trim()))
    }
}

impl Default for ToolSchema {
    fn default() -> Self {
        Self::new(DEFAULT_CATEGORIES.iter().copied())
    }
}

impl Schema for ToolSchema {
    type Record = Tool;
    type Draft = Tool;
    type Patch = ToolPatch;

    fn kind(&self) -> &'static str {
        "tool"
    }

    fn headers(&self) -> &'static [&'static str] {
        &HEADERS
    }

    fn validate(&self, raw: &[String]) -> Result<Tool, ValidationError> {
        let name = coerce::required_text(raw, columns::NAME, "name")?;
        let url = coerce::required_text(raw, columns::URL, "url")?;
        let category = coerce::required_text(raw, columns::CATEGORY, "category")?;
        if !self.is_known_category(&category) {
            return Err(ValidationError::UnknownCategory(category));
        }

        Ok(Tool {
            name,
            url,
            category,
            icon: coerce::optional_text(raw, columns::ICON),
            description: coerce::optional_text(raw, columns::DESCRIPTION),
            used: coerce::flag(coerce::cell(raw, columns::USED), "used")?,
        })
    }

    fn serialize(&self, tool: &Tool) -> Row {
        vec![
            tool.name.clone(),
            tool.url.clone(),
            tool.category.clone(),
            tool.icon.clone(),
            tool.description.clone(),
            coerce::format_flag(tool.used),
        ]
    }

    fn build(&self, draft: Tool) -> Result<Tool, ValidationError> {
        Ok(draft)
    }

    fn merge(&self, tool: &mut Tool, patch: ToolPatch) {
        if let Some(name) = patch.name {
            tool.name = name;
        }
        if let Some(url) = patch.url {
            tool.url = url;
        }
        if let Some(category) = patch.category {
            tool.category = category;
        }
        if let Some(icon) = patch.icon {
            tool.icon = icon;
        }
        if let Some(description) = patch.description {
            tool.description = description;
        }
        if let Some(used) = patch.used {
            tool.used = used;
        }
    }
}
