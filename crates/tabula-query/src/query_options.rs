//! Query options and pagination for the row fetch layer

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::compiler::Filter;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn toggle(&self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Single-column sort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    /// `{ "<column>": "asc" | "desc" }`
    pub fn to_json(&self) -> serde_json::Value {
        json!({ self.column.as_str(): self.direction.label() })
    }
}

/// Options object handed to the fetch layer. `filter: None` means no filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryOptions {
    pub filter: Option<Filter>,
    pub sort: Option<SortSpec>,
}

impl QueryOptions {
    pub fn new(filter: Option<Filter>, sort: Option<SortSpec>) -> Self {
        Self { filter, sort }
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }
}

/// Number of pages needed for `total` rows; an empty table still has one page
pub fn total_pages(total: u64, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    let pages = total.div_ceil(page_size as u64) as usize;
    pages.max(1)
}

/// Zero-based page position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest {
    pub fn new(page_size: usize) -> Self {
        Self { page: 0, page_size }
    }

    pub fn offset(&self) -> usize {
        self.page * self.page_size
    }

    /// Advance one page, staying on the last page
    pub fn next(self, total_pages: usize) -> Self {
        Self {
            page: (self.page + 1).min(total_pages.saturating_sub(1)),
            ..self
        }
    }

    pub fn previous(self) -> Self {
        Self {
            page: self.page.saturating_sub(1),
            ..self
        }
    }

    pub fn first(self) -> Self {
        Self { page: 0, ..self }
    }
}

/// A fully described row fetch: options plus page
#[derive(Debug, Clone, PartialEq)]
pub struct RowQuery {
    pub options: QueryOptions,
    pub page: PageRequest,
}

impl RowQuery {
    pub fn new(page_size: usize) -> Self {
        Self {
            options: QueryOptions::default(),
            page: PageRequest::new(page_size),
        }
    }

    /// Replace the query options. A new filter or sort starts from the
    /// first page again.
    pub fn apply_options(&mut self, options: QueryOptions) {
        self.options = options;
        self.page = self.page.first();
    }

    /// Query-string pairs for the fetch endpoint
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("limit".to_string(), self.page.page_size.to_string()),
            ("offset".to_string(), self.page.offset().to_string()),
        ];
        if let Some(filter) = &self.options.filter {
            pairs.push(("filter".to_string(), filter.to_json().to_string()));
        }
        if let Some(sort) = &self.options.sort {
            pairs.push(("sort".to_string(), sort.to_json().to_string()));
        }
        pairs
    }
}
