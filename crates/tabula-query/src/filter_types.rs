//! Filter rule types for the filter panel
//!
//! Shared data structures for building an ordered list of filter rules.

use serde::{Deserialize, Serialize};
use tabula_core::ColumnDefinition;

use crate::compiler::{compile_filter, Filter};

/// Comparison operators a rule can use
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FilterOperator {
    #[default]
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    StartsWith,
    EndsWith,
    In,
    IsNull,
    IsNotNull,
}

/// Operators that compile without consulting the rule value
pub const NO_VALUE_OPERATORS: &[FilterOperator] = &[FilterOperator::IsNull, FilterOperator::IsNotNull];

impl FilterOperator {
    /// Get the display label for the operator
    pub fn label(&self) -> &'static str {
        match self {
            Self::Eq => "equals",
            Self::Ne => "not equals",
            Self::Gt => "greater than",
            Self::Gte => "greater or equal",
            Self::Lt => "less than",
            Self::Lte => "less or equal",
            Self::Contains => "contains",
            Self::StartsWith => "starts with",
            Self::EndsWith => "ends with",
            Self::In => "in",
            Self::IsNull => "is null",
            Self::IsNotNull => "is not null",
        }
    }

    /// Short form used when rendering a compiled predicate
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            other => other.label(),
        }
    }

    /// Key of the operator in the JSON predicate
    pub fn wire_key(&self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::Contains => "$contains",
            Self::StartsWith => "$startsWith",
            Self::EndsWith => "$endsWith",
            Self::In => "$in",
            Self::IsNull => "$isNull",
            Self::IsNotNull => "$isNotNull",
        }
    }

    /// Returns true if this operator requires a value input
    pub fn requires_value(&self) -> bool {
        !NO_VALUE_OPERATORS.contains(self)
    }

    /// Text-matching operators always compare against the raw text
    pub fn is_text_match(&self) -> bool {
        matches!(self, Self::Contains | Self::StartsWith | Self::EndsWith)
    }

    /// Get all available operators in display order
    pub fn all() -> &'static [FilterOperator] {
        &[
            Self::Eq,
            Self::Ne,
            Self::Gt,
            Self::Gte,
            Self::Lt,
            Self::Lte,
            Self::Contains,
            Self::StartsWith,
            Self::EndsWith,
            Self::In,
            Self::IsNull,
            Self::IsNotNull,
        ]
    }
}

/// Logical operator joining a rule to everything before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    pub fn label(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }

    pub fn toggle(&self) -> Self {
        match self {
            Self::And => Self::Or,
            Self::Or => Self::And,
        }
    }
}

/// A single filter rule as edited in the panel.
///
/// `logical_operator` joins this rule to the accumulated predicate of the
/// rules before it; on the first rule it is never consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRule {
    pub id: String,
    pub column: String,
    #[serde(default)]
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub logical_operator: LogicalOperator,
}

impl FilterRule {
    pub fn new(
        id: impl Into<String>,
        column: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            column: column.into(),
            operator,
            value: value.into(),
            logical_operator: LogicalOperator::And,
        }
    }

    pub fn with_logical(mut self, logical_operator: LogicalOperator) -> Self {
        self.logical_operator = logical_operator;
        self
    }

    /// A rule is complete when it names a column and, for operators that
    /// need one, carries a value. Incomplete rules still compile.
    pub fn is_complete(&self) -> bool {
        if self.column.is_empty() {
            return false;
        }
        !self.operator.requires_value() || !self.value.is_empty()
    }
}

/// Field of a rule targeted by [`FilterRuleSet::update_rule`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleField {
    Column(String),
    Operator(FilterOperator),
    Value(String),
    LogicalOperator(LogicalOperator),
}

/// Ordered rule list backing the filter panel
#[derive(Debug, Clone, Default)]
pub struct FilterRuleSet {
    rules: Vec<FilterRule>,
    default_column: String,
    next_id: usize,
}

impl FilterRuleSet {
    /// New rules preselect the first column of the table
    pub fn new(columns: &[ColumnDefinition]) -> Self {
        Self {
            rules: Vec::new(),
            default_column: columns.first().map(|c| c.name.clone()).unwrap_or_default(),
            next_id: 0,
        }
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Append a fresh `column = ''` rule joined with `and`
    pub fn add_rule(&mut self) -> &FilterRule {
        self.next_id += 1;
        let rule = FilterRule::new(
            format!("rule-{}", self.next_id),
            self.default_column.clone(),
            FilterOperator::Eq,
            "",
        );
        self.rules.push(rule);
        tracing::debug!(rule_count = self.rules.len(), "Added filter rule");
        &self.rules[self.rules.len() - 1]
    }

    /// Remove a rule by id. Returns false when the id is unknown.
    pub fn remove_rule(&mut self, id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.id != id);
        before != self.rules.len()
    }

    /// Update one field of a rule. Returns false when the id is unknown.
    pub fn update_rule(&mut self, id: &str, field: RuleField) -> bool {
        let Some(rule) = self.rules.iter_mut().find(|r| r.id == id) else {
            return false;
        };
        match field {
            RuleField::Column(column) => rule.column = column,
            RuleField::Operator(operator) => rule.operator = operator,
            RuleField::Value(value) => rule.value = value,
            RuleField::LogicalOperator(logical) => rule.logical_operator = logical,
        }
        true
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    /// Compile the current rules; `None` means no filter
    pub fn compile(&self, columns: &[ColumnDefinition]) -> Option<Filter> {
        compile_filter(&self.rules, columns)
    }
}
