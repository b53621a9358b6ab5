//! Tabula Query - filter rules and query options
//!
//! Turns the ordered filter rules a user builds in the filter panel into a
//! single predicate for the row fetch layer, and carries the sort and
//! pagination options that travel with it.
//!
//! Rules combine as a flat left-to-right chain: `a and b or c` means
//! `(a and b) or c`. There is no grouping.

mod compiler;
mod filter_types;
mod query_options;

pub use compiler::{compile_filter, Condition, Filter};
pub use filter_types::{
    FilterOperator, FilterRule, FilterRuleSet, LogicalOperator, RuleField, NO_VALUE_OPERATORS,
};
pub use query_options::{total_pages, PageRequest, QueryOptions, RowQuery, SortDirection, SortSpec};
