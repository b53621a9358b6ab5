//! Subcommand implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tabula_core::{ColumnDefinition, FieldMap};
use tabula_query::{compile_filter, FilterRule, QueryOptions, RowQuery, SortDirection, SortSpec};
use tabula_services::{BatchCommitter, ClientConfig, EditSession, HttpRowsApi};

/// Contents of a `commit` changes file
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangesFile {
    /// Rows to create, in the order they were added
    #[serde(default)]
    new_rows: Vec<FieldMap>,
    #[serde(default)]
    updates: Vec<RowUpdate>,
}

#[derive(Debug, Deserialize)]
struct RowUpdate {
    id: String,
    data: FieldMap,
}

pub fn filter(
    rules_path: &Path,
    columns_path: Option<&Path>,
    sort: Option<&str>,
    desc: bool,
    config: ClientConfig,
) -> anyhow::Result<()> {
    let rules: Vec<FilterRule> = read_json(rules_path)?;
    let columns: Vec<ColumnDefinition> = match columns_path {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };

    let filter = compile_filter(&rules, &columns);
    if let Some(filter) = &filter {
        tracing::info!(conditions = filter.condition_count(), "Compiled filter: {}", filter);
    }

    let direction = if desc {
        SortDirection::Desc
    } else {
        SortDirection::Asc
    };
    let options = QueryOptions::new(filter, sort.map(|column| SortSpec::new(column, direction)));

    let mut query = RowQuery::new(config.page_size);
    query.apply_options(options.clone());
    let params: serde_json::Map<String, serde_json::Value> = query
        .to_query_pairs()
        .into_iter()
        .map(|(k, v)| (k, v.into()))
        .collect();

    print_json(&json!({
        "filter": options.filter,
        "sort": options.sort.as_ref().map(SortSpec::to_json),
        "params": params,
    }))
}

pub async fn commit(
    changes_path: &Path,
    columns_path: &Path,
    config: ClientConfig,
) -> anyhow::Result<()> {
    let changes: ChangesFile = read_json(changes_path)?;
    let columns: Vec<ColumnDefinition> = read_json(columns_path)?;

    let committer = BatchCommitter::new(Arc::new(HttpRowsApi::new(&config)?));
    let mut session = EditSession::new(columns);
    stage_changes(&mut session, &changes);

    for row in session.new_rows() {
        let missing = session.missing_required_fields(&row.temp_id);
        if !missing.is_empty() {
            tracing::warn!(temp_id = %row.temp_id, missing = ?missing, "New row is missing required fields");
        }
    }

    let report = session
        .save(&committer, || tracing::info!("Changes saved"))
        .await?;

    print_json(&json!({
        "created": report.created,
        "updated": report.updated,
    }))
}

pub async fn delete(ids: &[String], config: ClientConfig) -> anyhow::Result<()> {
    let committer = BatchCommitter::new(Arc::new(HttpRowsApi::new(&config)?));
    let report = committer.delete_rows(ids).await?;
    print_json(&json!({ "deleted": report.deleted }))
}

/// Replay a changes file as user edits. Rows are added in file order, so
/// the last row in the file is the newest and is created first.
fn stage_changes(session: &mut EditSession, changes: &ChangesFile) {
    for data in &changes.new_rows {
        let temp_id = session.add_new_row();
        for (column, value) in data {
            session.update_new_row_cell(&temp_id, column, value.clone());
        }
    }
    for update in &changes.updates {
        for (column, value) in &update.data {
            session.update_existing_row_cell(&update.id, column, value.clone());
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
