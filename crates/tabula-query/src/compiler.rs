//! Filter compilation
//!
//! Folds an ordered rule list into a left-nested predicate tree. Each rule
//! after the first wraps everything compiled so far:
//!
//! ```text
//! [a, and b, or c]  =>  Or(And(a, b), c)
//! ```

use std::cmp::Ordering;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use tabula_core::{find_column, ColumnDefinition, ColumnType, FieldMap};

use crate::filter_types::{FilterOperator, FilterRule, LogicalOperator};

/// One `column operator value` comparison
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub operator: FilterOperator,
    /// `None` for operators that take no value
    pub value: Option<Value>,
}

/// Compiled predicate handed to the row fetch layer
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Condition(Condition),
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
}

/// Compile rules into a predicate. An empty rule list means "no filter".
///
/// Rules are not validated here: a value-taking operator with an empty value
/// still compiles and is left for the query layer to judge.
pub fn compile_filter(rules: &[FilterRule], columns: &[ColumnDefinition]) -> Option<Filter> {
    let mut rules = rules.iter();
    let first = Filter::Condition(compile_rule(rules.next()?, columns));

    let filter = rules.fold(first, |acc, rule| {
        let next = Filter::Condition(compile_rule(rule, columns));
        match rule.logical_operator {
            LogicalOperator::And => Filter::And(Box::new(acc), Box::new(next)),
            LogicalOperator::Or => Filter::Or(Box::new(acc), Box::new(next)),
        }
    });

    tracing::debug!(filter = %filter, "Compiled filter rules");
    Some(filter)
}

fn compile_rule(rule: &FilterRule, columns: &[ColumnDefinition]) -> Condition {
    let value = if rule.operator.requires_value() {
        let column_type = find_column(columns, &rule.column).map(|c| c.column_type);
        Some(rule_value(rule.operator, &rule.value, column_type))
    } else {
        None
    };

    Condition {
        column: rule.column.clone(),
        operator: rule.operator,
        value,
    }
}

/// Convert the text typed into a rule into a typed comparison value
fn rule_value(operator: FilterOperator, text: &str, column_type: Option<ColumnType>) -> Value {
    if operator.is_text_match() {
        return Value::String(text.to_string());
    }
    if operator == FilterOperator::In {
        let items = text
            .split(',')
            .map(|item| scalar_value(item.trim(), column_type))
            .collect();
        return Value::Array(items);
    }
    scalar_value(text, column_type)
}

fn scalar_value(text: &str, column_type: Option<ColumnType>) -> Value {
    match column_type {
        Some(ColumnType::Number) => parse_number(text).unwrap_or_else(|| Value::String(text.to_string())),
        Some(ColumnType::Boolean) => parse_bool(text).unwrap_or_else(|| Value::String(text.to_string())),
        Some(_) => Value::String(text.to_string()),
        None => parse_number(text)
            .or_else(|| parse_bool(text))
            .unwrap_or_else(|| Value::String(text.to_string())),
    }
}

fn parse_number(text: &str) -> Option<Value> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::from(i));
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

fn parse_bool(text: &str) -> Option<Value> {
    if text.eq_ignore_ascii_case("true") {
        Some(Value::Bool(true))
    } else if text.eq_ignore_ascii_case("false") {
        Some(Value::Bool(false))
    } else {
        None
    }
}

impl Filter {
    /// JSON predicate in the shape the fetch layer consumes
    pub fn to_json(&self) -> Value {
        let (first, steps) = self.left_spine();
        steps.into_iter().fold(first.to_json(), |acc, (op, rhs)| {
            let mut combined = serde_json::Map::new();
            combined.insert(
                combinator_key(op).to_string(),
                Value::Array(vec![acc, rhs.to_json()]),
            );
            Value::Object(combined)
        })
    }

    /// Number of comparisons in the predicate
    pub fn condition_count(&self) -> usize {
        let (_, steps) = self.left_spine();
        1 + steps
            .iter()
            .map(|(_, rhs)| rhs.condition_count())
            .sum::<usize>()
    }

    /// Evaluate the predicate against an in-memory row
    pub fn matches(&self, row: &FieldMap) -> bool {
        let (first, steps) = self.left_spine();
        steps
            .into_iter()
            .fold(first.matches(row), |acc, (op, rhs)| match op {
                LogicalOperator::And => acc && rhs.matches(row),
                LogicalOperator::Or => acc || rhs.matches(row),
            })
    }

    /// The innermost condition and the `(operator, rhs)` pairs wrapped
    /// around it, innermost first. Compiled chains nest only to the left, so
    /// walking this spine in a loop keeps long rule lists off the stack.
    fn left_spine(&self) -> (&Condition, Vec<(LogicalOperator, &Filter)>) {
        let mut steps = Vec::new();
        let mut node = self;
        loop {
            match node {
                Filter::Condition(c) => {
                    steps.reverse();
                    return (c, steps);
                }
                Filter::And(lhs, rhs) => {
                    steps.push((LogicalOperator::And, rhs.as_ref()));
                    node = lhs.as_ref();
                }
                Filter::Or(lhs, rhs) => {
                    steps.push((LogicalOperator::Or, rhs.as_ref()));
                    node = lhs.as_ref();
                }
            }
        }
    }

    /// Detach the left operand, leaving an empty condition in its place
    fn take_lhs(&mut self) -> Option<Filter> {
        match self {
            Filter::And(lhs, _) | Filter::Or(lhs, _) => {
                Some(std::mem::replace(lhs.as_mut(), Filter::Condition(Condition::empty())))
            }
            Filter::Condition(_) => None,
        }
    }
}

impl Drop for Filter {
    fn drop(&mut self) {
        let mut next = self.take_lhs();
        while let Some(mut node) = next {
            next = node.take_lhs();
        }
    }
}

fn combinator_key(op: LogicalOperator) -> &'static str {
    match op {
        LogicalOperator::And => "$and",
        LogicalOperator::Or => "$or",
    }
}

impl Condition {
    fn empty() -> Self {
        Self {
            column: String::new(),
            operator: FilterOperator::IsNull,
            value: None,
        }
    }

    fn to_json(&self) -> Value {
        let operand = self.value.clone().unwrap_or(Value::Bool(true));
        json!({ self.column.as_str(): { self.operator.wire_key(): operand } })
    }

    fn matches(&self, row: &FieldMap) -> bool {
        let cell = row.get(&self.column).unwrap_or(&Value::Null);

        match self.operator {
            FilterOperator::IsNull => cell.is_null(),
            FilterOperator::IsNotNull => !cell.is_null(),
            _ if cell.is_null() => false,
            op => {
                let target = self.value.as_ref().unwrap_or(&Value::Null);
                evaluate_operator(op, cell, target)
            }
        }
    }
}

fn evaluate_operator(operator: FilterOperator, cell: &Value, target: &Value) -> bool {
    let cell_lower = text_of(cell).to_lowercase();
    let target_lower = text_of(target).to_lowercase();

    match operator {
        FilterOperator::Eq => loose_cmp(cell, target) == Ordering::Equal,
        FilterOperator::Ne => loose_cmp(cell, target) != Ordering::Equal,
        FilterOperator::Gt => loose_cmp(cell, target).is_gt(),
        FilterOperator::Gte => loose_cmp(cell, target).is_ge(),
        FilterOperator::Lt => loose_cmp(cell, target).is_lt(),
        FilterOperator::Lte => loose_cmp(cell, target).is_le(),
        FilterOperator::Contains => cell_lower.contains(&target_lower),
        FilterOperator::StartsWith => cell_lower.starts_with(&target_lower),
        FilterOperator::EndsWith => cell_lower.ends_with(&target_lower),
        FilterOperator::In => match target {
            Value::Array(items) => items.iter().any(|item| loose_cmp(cell, item) == Ordering::Equal),
            single => loose_cmp(cell, single) == Ordering::Equal,
        },
        FilterOperator::IsNull => cell.is_null(),
        FilterOperator::IsNotNull => !cell.is_null(),
    }
}

/// Compare two values, preferring numeric comparison when both read as numbers
fn loose_cmp(a: &Value, b: &Value) -> Ordering {
    match (number_of(a), number_of(b)) {
        (Some(na), Some(nb)) => na.partial_cmp(&nb).unwrap_or(Ordering::Equal),
        _ => text_of(a).to_lowercase().cmp(&text_of(b).to_lowercase()),
    }
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} {} {}", self.column, self.operator.symbol(), value),
            None => write!(f, "{} {}", self.column, self.operator.symbol()),
        }
    }
}

/// `((a) and (b)) or (c)`: one opening paren per combinator up front, then
/// each step closes the accumulated side.
impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (first, steps) = self.left_spine();
        for _ in 0..steps.len() {
            f.write_str("(")?;
        }
        write!(f, "{}", first)?;
        for (op, rhs) in steps {
            write!(f, ") {} ({})", op.label(), rhs)?;
        }
        Ok(())
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
