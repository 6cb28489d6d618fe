use rayon::prelude::*;
use tracing::trace;

use crate::record::{Record, compare_values};

pub const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn marker(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn ascending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Ascending,
        }
    }

    /// The sort spec after the user picked `field`.
    ///
    /// Picking the active ascending field flips it to descending, anything
    /// else starts over ascending.
    pub fn select(&self, field: &str) -> Self {
        if self.field == field && self.direction == SortDirection::Ascending {
            Self {
                field: field.to_string(),
                direction: SortDirection::Descending,
            }
        } else {
            Self::ascending(field)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewParams {
    pub filter: String,
    pub sort: SortSpec,
    pub limit: usize,
}

impl ViewParams {
    pub fn new(sort: SortSpec) -> Self {
        Self {
            filter: String::new(),
            sort,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Parse the top-N input. Reads the leading integer of the text and falls
/// back to [`DEFAULT_LIMIT`] for anything that is not a positive number.
pub fn parse_limit(input: &str) -> usize {
    let s = input.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    match digits[..end].parse::<usize>() {
        Ok(n) if n > 0 && !negative => n,
        _ => DEFAULT_LIMIT,
    }
}

/// Indices of `records` that make up the view for `params`, in display order.
pub fn project_indices(records: &[Record], params: &ViewParams) -> Vec<usize> {
    let needle = params.filter.to_lowercase();

    let mut rows: Vec<usize> = records
        .par_iter()
        .enumerate()
        .filter(|(_, r)| r.contains_text(&needle))
        .map(|(idx, _)| idx)
        .collect();

    let field = params.sort.field.as_str();
    rows.sort_by(|&a, &b| {
        let ord = compare_values(records[a].get(field), records[b].get(field));
        match params.sort.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
    rows.truncate(params.limit);

    trace!(
        "View: {} of {} records, filter {:?}, sort {:?}",
        rows.len(),
        records.len(),
        params.filter,
        params.sort
    );
    rows
}

/// The filtered, sorted and truncated view of `records`.
#[cfg(test)]
pub fn project<'a>(records: &'a [Record], params: &ViewParams) -> Vec<&'a Record> {
    project_indices(records, params)
        .into_iter()
        .map(|idx| &records[idx])
        .collect()
}

/// Column headers for a record set: the keys of its first record.
pub fn columns(records: &[Record]) -> Vec<String> {
    records
        .first()
        .map(|r| r.keys().map(String::from).collect())
        .unwrap_or_default()
}

pub struct ChartSpec {
    pub title: &'static str,
    pub field: &'static str,
}

pub const ID_FIELD: &str = "StudentID";

pub const CHARTS: &[ChartSpec] = &[
    ChartSpec {
        title: "DVRT Score",
        field: "DVRTID",
    },
    ChartSpec {
        title: "Fathers Prestige Score",
        field: "FathersPrestigeScore",
    },
    ChartSpec {
        title: "Education Level",
        field: "EducationID",
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct ChartBar {
    pub label: String,
    pub value: Option<f64>,
}

/// One bar per row of the view, labelled by the record id.
pub fn chart_series(rows: &[&Record], field: &str) -> Vec<ChartBar> {
    rows.iter()
        .map(|r| ChartBar {
            label: format!("ID: {}", r.cell(ID_FIELD)),
            value: r.get(field).and_then(|v| v.as_f64()),
        })
        .collect()
}

fn wrap_cell_content(c: &str) -> String {
    let needs_escaping = c.contains('"');
    let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
    let mut out = String::from(c);

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_wrapping || needs_escaping {
        out = format!("\"{out}\"");
    }
    out
}

/// A record as one CSV line in column order.
pub fn csv_row(record: &Record, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| wrap_cell_content(&record.cell(c)))
        .collect::<Vec<String>>()
        .join(",")
}
