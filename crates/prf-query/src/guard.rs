//! Read-only statement guard.
//!
//! A coarse lexical filter that runs before any rewriting. It lowercases the
//! statement and looks for mutation keywords as plain substrings, so it also
//! refuses statements that only mention those words inside string literals or
//! identifiers (`SELECT * FROM t WHERE note = 'deleted'`). This is not a
//! parser and not a security boundary; the DuckDB connection itself is
//! opened read-only. A parser-based check is the hardening path if the
//! gateway is ever exposed to untrusted callers.

use crate::error::RejectionReason;

/// Keywords that reject a statement when found anywhere in it.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "create", "alter", "drop", "truncate",
];

/// Statement prefixes accepted as reads.
pub const READ_PREFIXES: &[&str] = &["select", "with"];

/// Validate that `sql` is a pure read.
///
/// Forbidden keywords are checked first, in [`FORBIDDEN_KEYWORDS`] order, so
/// `DROP TABLE foo` is reported as `ForbiddenOperation("drop")` rather than
/// `NotAReadStatement`.
///
/// # Examples
///
/// ```
/// use prf_query::guard::validate;
/// use prf_query::error::RejectionReason;
///
/// assert!(validate("SELECT * FROM datatran2020").is_ok());
/// assert_eq!(
///     validate("DROP TABLE foo"),
///     Err(RejectionReason::ForbiddenOperation("drop".to_string())),
/// );
/// ```
pub fn validate(sql: &str) -> Result<(), RejectionReason> {
    let lower = sql.to_lowercase();

    if let Some(token) = FORBIDDEN_KEYWORDS.iter().find(|kw| lower.contains(*kw)) {
        return Err(RejectionReason::ForbiddenOperation((*token).to_string()));
    }

    let trimmed = lower.trim();
    if !READ_PREFIXES.iter().any(|prefix| trimmed.starts_with(prefix)) {
        return Err(RejectionReason::NotAReadStatement);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forbidden(token: &str) -> Result<(), RejectionReason> {
        Err(RejectionReason::ForbiddenOperation(token.to_string()))
    }

    #[test]
    fn test_accepts_select_and_with() {
        assert!(validate("SELECT 1").is_ok());
        assert!(validate("  select * from datatran2020 where uf = 'PR'").is_ok());
        assert!(validate("WITH t AS (SELECT 1 AS x) SELECT x FROM t").is_ok());
        assert!(validate("\n\twith t as (select 1) select * from t;").is_ok());
    }

    #[test]
    fn test_rejects_every_forbidden_keyword() {
        for kw in FORBIDDEN_KEYWORDS {
            let sql = format!("{} something", kw.to_uppercase());
            assert_eq!(validate(&sql), forbidden(kw), "keyword {kw}");
        }
    }

    #[test]
    fn test_drop_table_reports_drop() {
        assert_eq!(validate("DROP TABLE foo"), forbidden("drop"));
    }

    #[test]
    fn test_keyword_inside_select_is_rejected() {
        // Substring semantics: literals and identifiers trip the filter too.
        assert_eq!(
            validate("SELECT * FROM t WHERE status = 'Deleted'"),
            forbidden("delete")
        );
        assert_eq!(
            validate("SELECT created_at FROM t"),
            forbidden("create")
        );
        assert_eq!(validate("select * from updates"), forbidden("update"));
    }

    #[test]
    fn test_first_keyword_in_list_order_wins() {
        assert_eq!(
            validate("DELETE FROM t; INSERT INTO t VALUES (1)"),
            forbidden("insert")
        );
    }

    #[test]
    fn test_rejects_non_read_statements() {
        assert_eq!(validate("PRAGMA show_tables"), Err(RejectionReason::NotAReadStatement));
        assert_eq!(validate("EXPLAIN SELECT 1"), Err(RejectionReason::NotAReadStatement));
        assert_eq!(validate("COPY t TO 'x.csv'"), Err(RejectionReason::NotAReadStatement));
        assert_eq!(validate(""), Err(RejectionReason::NotAReadStatement));
        assert_eq!(validate("   ;"), Err(RejectionReason::NotAReadStatement));
    }

    #[test]
    fn test_case_insensitive_prefix() {
        assert!(validate("SeLeCt 1").is_ok());
        assert!(validate("WiTh a AS (SELECT 1) SELECT * FROM a").is_ok());
    }
}
