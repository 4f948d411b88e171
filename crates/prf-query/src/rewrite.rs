//! Virtual-table rewriting and pagination.
//!
//! The PRF accident datasets are published as one CSV per year
//! (`datatran2020.csv`, `datatran2021.csv`, ...). Callers reference them as if
//! they were tables named `datatranYYYY`; this module swaps each reference for
//! a DuckDB `read_csv_auto(...)` scan of the matching file.
//!
//! # Pipeline
//!
//! 1. **Trim** -- surrounding whitespace and one trailing `;` are removed.
//! 2. **Detect** -- `datatran` followed by exactly four digits and a word
//!    boundary, case-insensitive, anywhere in the text (comments and string
//!    literals included). A match directly followed by `.csv` is the file name
//!    inside an already substituted scan and is left alone. Years are
//!    collected in order of first appearance, without duplicates.
//! 3. **Resolve** -- every year must map to an existing
//!    `<csv_dir>/datatran<year>.csv`. Resolution finishes for all years before
//!    any text is substituted, so a missing file never yields partial SQL.
//! 4. **Substitute** -- every occurrence is replaced by the scan expression.
//! 5. **Paginate** -- ` LIMIT n` and ` OFFSET n` are appended verbatim when
//!    requested. Existing clauses in the caller's SQL are not inspected; if
//!    the statement already has its own `LIMIT` DuckDB will reject the result.
//!
//! Rewriting is not idempotent with respect to pagination: running it twice
//! appends the clauses twice. Call it exactly once per request.

use crate::error::{QueryError, Result};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Prefix shared by every virtual table name and CSV file.
pub const VIRTUAL_TABLE_PREFIX: &str = "datatran";

fn virtual_table_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)datatran(\d{4})\b").expect("virtual table pattern is valid")
    })
}

fn dataset_file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^datatran(\d{4})\.csv$").expect("dataset file pattern is valid")
    })
}

/// A `datatranYYYY` reference resolved to its CSV file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualTable {
    /// Four-digit year token.
    pub year: String,
    /// Canonical (lowercase) table name, e.g. `datatran2020`.
    pub table: String,
    /// Path of the backing CSV file.
    pub path: PathBuf,
}

impl VirtualTable {
    /// Build the reference for `year` under `csv_dir` without checking the
    /// filesystem.
    pub fn new(year: &str, csv_dir: &Path) -> Self {
        let table = format!("{}{}", VIRTUAL_TABLE_PREFIX, year);
        let path = csv_dir.join(format!("{}.csv", table));
        Self {
            year: year.to_string(),
            table,
            path,
        }
    }

    /// The DuckDB table expression that scans this file.
    ///
    /// Fields are `;`-separated, the first row is a header, and malformed rows
    /// are skipped instead of aborting the scan.
    pub fn scan_expression(&self) -> String {
        let path = self.path.to_string_lossy().replace('\'', "''");
        format!(
            "read_csv_auto('{}', sep=';', header=true, ignore_errors=true)",
            path
        )
    }
}

/// Optional `LIMIT` / `OFFSET` appended to a rewritten statement.
///
/// Values are not range-checked; DuckDB decides what a negative limit means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of rows.
    pub limit: Option<i64>,
    /// Rows to skip.
    pub offset: Option<i64>,
}

impl Pagination {
    /// Pagination with both clauses set.
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self { limit, offset }
    }

    /// Append the requested clauses to `sql`.
    pub fn apply(&self, sql: &mut String) {
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
    }
}

/// SQL ready for execution plus the datasets it reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewrittenStatement {
    /// Executable SQL.
    pub sql: String,
    /// Virtual tables that were substituted, in order of first appearance.
    pub datasets: Vec<VirtualTable>,
}

/// Rewrites `datatranYYYY` references against a CSV base directory.
#[derive(Debug, Clone)]
pub struct QueryRewriter {
    csv_dir: PathBuf,
}

impl QueryRewriter {
    /// Create a rewriter resolving datasets under `csv_dir`.
    pub fn new(csv_dir: impl Into<PathBuf>) -> Self {
        Self {
            csv_dir: csv_dir.into(),
        }
    }

    /// The CSV base directory.
    pub fn csv_dir(&self) -> &Path {
        &self.csv_dir
    }

    /// Trim, resolve and substitute virtual tables (steps 1-4).
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::MissingDataset`] for the first referenced year
    /// whose CSV file does not exist. No SQL is returned in that case.
    ///
    /// # Examples
    ///
    /// ```
    /// use prf_query::rewrite::QueryRewriter;
    ///
    /// let rewriter = QueryRewriter::new("/nonexistent");
    /// let stmt = rewriter.rewrite("SELECT 1;").unwrap();
    /// assert_eq!(stmt.sql, "SELECT 1");
    /// assert!(rewriter.rewrite("SELECT * FROM datatran1999").is_err());
    /// ```
    pub fn rewrite(&self, sql: &str) -> Result<RewrittenStatement> {
        let cleaned = trim_statement(sql);

        let datasets = self
            .references(cleaned)
            .into_iter()
            .map(|year| self.resolve(&year))
            .collect::<Result<Vec<_>>>()?;

        if datasets.is_empty() {
            return Ok(RewrittenStatement {
                sql: cleaned.to_string(),
                datasets,
            });
        }

        let expressions: HashMap<&str, String> = datasets
            .iter()
            .map(|vt| (vt.year.as_str(), vt.scan_expression()))
            .collect();

        let rewritten = virtual_table_pattern().replace_all(cleaned, |caps: &Captures| {
            let whole = &caps[0];
            if is_scan_file_name(cleaned, caps) {
                return whole.to_string();
            }
            // Every other year was resolved above.
            expressions
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| whole.to_string())
        });

        Ok(RewrittenStatement {
            sql: rewritten.into_owned(),
            datasets,
        })
    }

    /// Full rewrite including pagination (steps 1-5).
    pub fn rewrite_paginated(
        &self,
        sql: &str,
        pagination: Pagination,
    ) -> Result<RewrittenStatement> {
        let mut stmt = self.rewrite(sql)?;
        pagination.apply(&mut stmt.sql);
        Ok(stmt)
    }

    /// Years referenced by `sql`, deduplicated in order of first appearance.
    pub fn references(&self, sql: &str) -> Vec<String> {
        let mut years: Vec<String> = Vec::new();
        for cap in virtual_table_pattern().captures_iter(sql) {
            if is_scan_file_name(sql, &cap) {
                continue;
            }
            let year = &cap[1];
            if !years.iter().any(|y| y == year) {
                years.push(year.to_string());
            }
        }
        years
    }

    /// Map a year to its CSV file, failing if the file is absent.
    pub fn resolve(&self, year: &str) -> Result<VirtualTable> {
        let table = VirtualTable::new(year, &self.csv_dir);
        if !table.path.is_file() {
            return Err(QueryError::missing_dataset(year, table.path));
        }
        Ok(table)
    }

    /// Datasets present in the CSV directory, sorted by year.
    ///
    /// Returns an empty list when the directory does not exist.
    pub fn list_datasets(&self) -> Result<Vec<VirtualTable>> {
        if !self.csv_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut tables = Vec::new();
        for entry in std::fs::read_dir(&self.csv_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(cap) = dataset_file_pattern().captures(name) {
                if entry.path().is_file() {
                    tables.push(VirtualTable::new(&cap[1], &self.csv_dir));
                }
            }
        }
        tables.sort_by(|a, b| a.year.cmp(&b.year));
        Ok(tables)
    }
}

/// `true` when the match is the `datatranYYYY.csv` file name of a scan
/// expression rather than a table reference.
fn is_scan_file_name(sql: &str, caps: &Captures) -> bool {
    caps.get(0).map_or(false, |m| {
        sql[m.end()..]
            .get(..4)
            .map_or(false, |ext| ext.eq_ignore_ascii_case(".csv"))
    })
}

/// Strip surrounding whitespace and a single trailing `;`.
pub fn trim_statement(sql: &str) -> &str {
    let trimmed = sql.trim();
    trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end()
}
