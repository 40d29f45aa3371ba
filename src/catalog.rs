//! Read-only views over listed records: the directory filters and the
//! dashboard counters.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::schema::{Prompt, Status, Todo, Tool};

pub fn matches_category(tool: &Tool, category: &str) -> bool {
    tool.category.trim().eq_ignore_ascii_case(category.trim())
}

/// Case-insensitive substring match on the name; an empty query matches.
pub fn matches_name(tool: &Tool, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    query.is_empty() || tool.name.to_lowercase().contains(&query)
}

/// Tools whose category matches `category`, ignoring case, in sheet order.
pub fn tools_in_category<'a>(tools: &'a [Tool], category: &str) -> Vec<&'a Tool> {
    tools.iter().filter(|t| matches_category(t, category)).collect()
}

pub fn search_by_name<'a, I>(tools: I, query: &str) -> Vec<&'a Tool>
where
    I: IntoIterator<Item = &'a Tool>,
{
    tools.into_iter().filter(|t| matches_name(t, query)).collect()
}

/// Distinct, non-empty categories present in the sheet, sorted.
pub fn categories_in_use(tools: &[Tool]) -> Vec<String> {
    tools
        .iter()
        .map(|t| t.category.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// The dashboard's headline numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_tools: usize,
    pub categories: usize,
    pub used: usize,
    pub unused: usize,
    pub prompts: usize,
}

impl Summary {
    pub fn collect(tools: &[Tool], prompts: &[Prompt]) -> Self {
        let used = tools.iter().filter(|t| t.used).count();
        Self {
            total_tools: tools.len(),
            categories: categories_in_use(tools).len(),
            used,
            unused: tools.len() - used,
            prompts: prompts.len(),
        }
    }
}

/// Number of todos per status; every status is present, possibly with zero.
pub fn todo_counts(todos: &[Todo]) -> BTreeMap<&'static str, usize> {
    let mut counts: BTreeMap<&'static str, usize> =
        Status::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    for todo in todos {
        *counts.entry(todo.status.as_str()).or_default() += 1;
    }
    counts
}
