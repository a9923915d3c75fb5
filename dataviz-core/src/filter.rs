//! Chart filter engine
//!
//! Pure, synchronous derivation of the visible chart subset and of the
//! selectable options. Options always come from the charts currently loaded,
//! never from a global catalog.
//!
//! A chart is visible iff
//!   (no type selected OR graph_type == selected type)
//!   AND (no column selected OR "all columns" selected OR columns ∩ selection ≠ ∅)

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::models::Chart;

/// Sentinel column value meaning "no column restriction".
pub const ALL_COLUMNS: &str = "__all__";

pub const ALL_COLUMNS_LABEL: &str = "All Columns";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterState {
    pub selected_type: Option<String>,
    pub selected_columns: BTreeSet<String>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, graph_type: impl Into<String>) -> Self {
        self.selected_type = Some(graph_type.into());
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// `None` or an empty string clears the type restriction.
    pub fn select_type(&mut self, graph_type: Option<&str>) {
        self.selected_type = graph_type.filter(|t| !t.is_empty()).map(str::to_string);
    }

    /// Single-select: replaces any prior column. The sentinel clears the
    /// restriction.
    pub fn select_column(&mut self, column: &str) {
        self.selected_columns.clear();
        if column != ALL_COLUMNS && !column.is_empty() {
            self.selected_columns.insert(column.to_string());
        }
    }

    pub fn reset(&mut self) {
        self.selected_type = None;
        self.selected_columns.clear();
    }

    pub fn restricts_columns(&self) -> bool {
        !self.selected_columns.is_empty() && !self.selected_columns.contains(ALL_COLUMNS)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.selected_type.is_none() && !self.restricts_columns()
    }

    pub fn matches(&self, chart: &Chart) -> bool {
        let type_match = self
            .selected_type
            .as_deref()
            .map_or(true, |t| chart.graph_type == t);
        let columns_match =
            !self.restricts_columns() || self.selected_columns.iter().any(|c| chart.involves(c));
        type_match && columns_match
    }
}

/// One entry of the column selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnOption {
    pub value: String,
    pub label: String,
}

/// Visible subset, in input order.
pub fn filter_charts(charts: &[Chart], filter: &FilterState) -> Vec<Chart> {
    charts.iter().filter(|c| filter.matches(c)).cloned().collect()
}

/// Distinct graph types in first-seen order.
pub fn type_options(charts: &[Chart]) -> Vec<String> {
    let mut seen = HashSet::new();
    charts
        .iter()
        .filter(|c| seen.insert(c.graph_type.as_str()))
        .map(|c| c.graph_type.clone())
        .collect()
}

/// The "all columns" sentinel followed by every distinct column in
/// first-seen order.
pub fn column_options(charts: &[Chart]) -> Vec<ColumnOption> {
    let mut seen = HashSet::new();
    let columns = charts
        .iter()
        .flat_map(|c| c.columns.iter())
        .filter(|col| seen.insert(col.as_str()))
        .map(|col| ColumnOption {
            value: col.clone(),
            label: col.clone(),
        });

    std::iter::once(ColumnOption {
        value: ALL_COLUMNS.to_string(),
        label: ALL_COLUMNS_LABEL.to_string(),
    })
    .chain(columns)
    .collect()
}

// ============================================================================
// TESTS
// ============================================================================
