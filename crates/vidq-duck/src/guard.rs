//! Read-only guard
//!
//! Query text may come from an LLM, so nothing is assumed about it. A query
//! passes only if it is one `SELECT`/`WITH` statement, carries no write or
//! session keywords, no comments, no file-reading table functions, and reads
//! only from the known tables (or its own CTEs).

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;

/// Tables a query may read
pub const ALLOWED_TABLES: [&str; 2] = ["videos", "video_snapshots"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnsafeQueryError {
    #[error("Query is empty")]
    Empty,

    #[error("Query contains write keyword: {0}")]
    WriteKeyword(String),

    #[error("Query contains multiple statements")]
    MultipleStatements,

    #[error("Query is not a SELECT statement (starts with {0})")]
    NotSelect(String),

    #[error("Query reads from unknown table: {0}")]
    UnknownTable(String),

    #[error("Query calls forbidden function: {0}")]
    ForbiddenFunction(String),

    #[error("Query contains a comment")]
    Comment,

    #[error("Query has an unterminated string literal")]
    UnterminatedLiteral,

    #[error("Query reads from a string literal")]
    LiteralSource,
}

// ============================================================================
// Regex Patterns
// ============================================================================

static STRING_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'(?:[^']|'')*'").expect("Invalid regex"));

static WRITE_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(INSERT|UPDATE|DELETE|DROP|ALTER|CREATE|TRUNCATE|ATTACH|DETACH|COPY|PRAGMA|INSTALL|LOAD|SET|RESET|GRANT|REVOKE|EXPORT|IMPORT|CALL|CHECKPOINT|VACUUM|MERGE|UPSERT)\b",
    )
    .expect("Invalid regex")
});

static FORBIDDEN_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(read_\w+|glob|getenv|sniff_csv|parquet_\w+|query|query_table|duckdb_\w+)\s*\(")
        .expect("Invalid regex")
});

// FROM inside EXTRACT(...), TRIM(...), SUBSTRING(...) and IS DISTINCT FROM
// does not introduce a table
static NON_TABLE_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\b(?:EXTRACT|TRIM|SUBSTRING)\s*\([^()]*?|\bDISTINCT\s+)\bFROM\b")
        .expect("Invalid regex")
});

static SOURCE_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:FROM|JOIN)\b").expect("Invalid regex"));

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""[^"]*"|[\w.]+|\S"#).expect("Invalid regex"));

/// Words ending a FROM list or a JOIN target
const SOURCE_LIST_END: [&str; 24] = [
    "WHERE", "GROUP", "ORDER", "LIMIT", "OFFSET", "HAVING", "UNION", "EXCEPT", "INTERSECT",
    "QUALIFY", "WINDOW", "JOIN", "ON", "USING", "LEFT", "RIGHT", "INNER", "OUTER", "FULL",
    "CROSS", "NATURAL", "ASOF", "POSITIONAL", "SELECT",
];

static CTE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\w+)\s+AS\s*\(").expect("Invalid regex"));

static AGGREGATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(COUNT|SUM|AVG|MAX|MIN)\s*\(").expect("Invalid regex"));

/// Replace string literals with a placeholder so their content is never scanned
fn scrub_literals(sql: &str) -> String {
    STRING_LITERAL.replace_all(sql, "?").into_owned()
}

/// Check a query and return it without trailing terminators
pub fn sanitize(query: &str, allowed_tables: &[String]) -> Result<String, UnsafeQueryError> {
    let sql = query
        .trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .to_string();
    if sql.is_empty() {
        return Err(UnsafeQueryError::Empty);
    }

    let scrubbed = scrub_literals(&sql);
    if scrubbed.contains('\'') {
        return Err(UnsafeQueryError::UnterminatedLiteral);
    }
    if scrubbed.contains("--") || scrubbed.contains("/*") {
        return Err(UnsafeQueryError::Comment);
    }
    if scrubbed.contains(';') {
        return Err(UnsafeQueryError::MultipleStatements);
    }

    let first = scrubbed
        .split(|c: char| c.is_whitespace() || c == '(')
        .find(|w| !w.is_empty())
        .unwrap_or_default()
        .to_uppercase();
    if first != "SELECT" && first != "WITH" {
        return Err(UnsafeQueryError::NotSelect(first));
    }

    if let Some(m) = WRITE_KEYWORD.find(&scrubbed) {
        return Err(UnsafeQueryError::WriteKeyword(m.as_str().to_uppercase()));
    }
    if let Some(caps) = FORBIDDEN_FUNCTION.captures(&scrubbed) {
        return Err(UnsafeQueryError::ForbiddenFunction(caps[1].to_lowercase()));
    }

    let ctes: HashSet<String> = if first == "WITH" {
        CTE_NAME
            .captures_iter(&scrubbed)
            .map(|caps| caps[1].to_lowercase())
            .collect()
    } else {
        HashSet::new()
    };

    let sources = NON_TABLE_FROM.replace_all(&scrubbed, "${1}_");
    for keyword in SOURCE_KEYWORD.find_iter(&sources) {
        for item in source_items(&sources[keyword.end()..]) {
            check_source(&item, allowed_tables, &ctes)?;
        }
    }

    Ok(sql)
}

/// Comma-separated items following a FROM/JOIN, each as its tokens
///
/// Parenthesised parts stay inside their item; tables read by nested
/// queries are reached through their own FROM.
fn source_items(rest: &str) -> Vec<Vec<&str>> {
    let mut items = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0usize;

    for token in TOKEN.find_iter(rest).map(|m| m.as_str()) {
        match token {
            "(" => depth += 1,
            ")" if depth == 0 => break,
            ")" => depth -= 1,
            "," if depth == 0 => {
                items.push(std::mem::take(&mut current));
                continue;
            }
            ";" => break,
            word if depth == 0
                && SOURCE_LIST_END.iter().any(|end| end.eq_ignore_ascii_case(word)) =>
            {
                break
            }
            _ => {}
        }
        current.push(token);
    }
    items.push(current);
    items.retain(|item| !item.is_empty());
    items
}

fn check_source(
    item: &[&str],
    allowed_tables: &[String],
    ctes: &HashSet<String>,
) -> Result<(), UnsafeQueryError> {
    let Some(first) = item.first() else {
        return Ok(());
    };

    match *first {
        // Subquery; its own FROM is checked separately
        "(" => return Ok(()),
        // A scrubbed literal: DuckDB would scan it as a file
        "?" => return Err(UnsafeQueryError::LiteralSource),
        _ => {}
    }

    let name = first.trim_matches('"').to_lowercase();
    if item.get(1) == Some(&"(") {
        return Err(UnsafeQueryError::ForbiddenFunction(name));
    }

    let bare = name.strip_prefix("main.").unwrap_or(&name);
    if allowed_tables.iter().any(|t| t == bare) || ctes.contains(bare) {
        Ok(())
    } else {
        Err(UnsafeQueryError::UnknownTable(name))
    }
}

/// Whether the query computes an aggregate (COUNT/SUM/AVG/MAX/MIN)
pub fn is_aggregate(sql: &str) -> bool {
    AGGREGATE.is_match(&scrub_literals(sql))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        ALLOWED_TABLES.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_accepts_plain_aggregate_and_strips_terminator() {
        let sql = sanitize("SELECT COUNT(*) FROM videos;  ", &allowed()).unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM videos");
    }

    #[test]
    fn test_accepts_subquery_on_known_tables() {
        let sql = "SELECT SUM(delta_views_count) FROM video_snapshots \
                   WHERE video_id IN (SELECT id FROM videos WHERE creator_id = 'x')";
        assert!(sanitize(sql, &allowed()).is_ok());
    }

    #[test]
    fn test_accepts_cte_and_extract() {
        let sql = "WITH daily AS (SELECT EXTRACT(day FROM created_at) AS d FROM video_snapshots) \
                   SELECT COUNT(*) FROM daily";
        assert!(sanitize(sql, &allowed()).is_ok());
    }

    #[test]
    fn test_rejects_write_keywords() {
        for sql in [
            "DELETE FROM videos",
            "DROP TABLE videos",
            "UPDATE videos SET views_count = 0",
            "INSERT INTO videos VALUES ('a')",
            "ALTER TABLE videos ADD COLUMN x INT",
        ] {
            assert!(sanitize(sql, &allowed()).is_err(), "accepted: {}", sql);
        }
        assert_eq!(
            sanitize("SELECT 1 FROM videos WHERE id IN (DELETE FROM videos)", &allowed()),
            Err(UnsafeQueryError::WriteKeyword("DELETE".to_string()))
        );
    }

    #[test]
    fn test_rejects_statement_separator() {
        assert_eq!(
            sanitize("SELECT COUNT(*) FROM videos; DROP TABLE videos", &allowed()),
            Err(UnsafeQueryError::MultipleStatements)
        );
    }

    #[test]
    fn test_keywords_inside_literals_are_ignored() {
        let sql = "SELECT COUNT(*) FROM videos WHERE creator_id = 'drop; delete'";
        assert!(sanitize(sql, &allowed()).is_ok());
    }

    #[test]
    fn test_column_names_are_not_keywords() {
        let sql = "SELECT MAX(updated_at), MIN(created_at) FROM videos";
        assert!(sanitize(sql, &allowed()).is_ok());
    }

    #[test]
    fn test_rejects_unknown_table_and_file_readers() {
        assert_eq!(
            sanitize("SELECT * FROM users", &allowed()),
            Err(UnsafeQueryError::UnknownTable("users".to_string()))
        );
        assert_eq!(
            sanitize("SELECT * FROM read_csv('/etc/passwd')", &allowed()),
            Err(UnsafeQueryError::ForbiddenFunction("read_csv".to_string()))
        );
    }

    #[test]
    fn test_rejects_file_paths_as_sources() {
        assert_eq!(
            sanitize("SELECT * FROM '/tmp/secret.csv'", &allowed()),
            Err(UnsafeQueryError::LiteralSource)
        );
        assert_eq!(
            sanitize(
                "SELECT COUNT(*) FROM videos v JOIN 'data.parquet' p ON v.id = p.id",
                &allowed()
            ),
            Err(UnsafeQueryError::LiteralSource)
        );
        assert_eq!(
            sanitize(r#"SELECT * FROM "/etc/passwd""#, &allowed()),
            Err(UnsafeQueryError::UnknownTable("/etc/passwd".to_string()))
        );
        assert_eq!(
            sanitize("SELECT * FROM range(10)", &allowed()),
            Err(UnsafeQueryError::ForbiddenFunction("range".to_string()))
        );
    }

    #[test]
    fn test_checks_every_item_of_a_from_list() {
        assert_eq!(
            sanitize("SELECT COUNT(*) FROM videos, information_schema.tables", &allowed()),
            Err(UnsafeQueryError::UnknownTable("information_schema.tables".to_string()))
        );
        assert_eq!(
            sanitize("SELECT COUNT(*) FROM videos AS v, '/tmp/x.csv'", &allowed()),
            Err(UnsafeQueryError::LiteralSource)
        );

        let sql = "SELECT COUNT(*) FROM videos v, video_snapshots s \
                   WHERE s.video_id = v.id AND v.creator_id = 'a, b'";
        assert!(sanitize(sql, &allowed()).is_ok());
    }

    #[test]
    fn test_from_inside_functions_is_not_a_source() {
        let sql = "SELECT COUNT(*) FROM videos \
                   WHERE TRIM(BOTH ' ' FROM creator_id) = 'x' AND creator_id IS DISTINCT FROM 'y'";
        assert!(sanitize(sql, &allowed()).is_ok());
    }

    #[test]
    fn test_rejects_comments_and_broken_literals() {
        assert_eq!(
            sanitize("SELECT COUNT(*) FROM videos -- hi", &allowed()),
            Err(UnsafeQueryError::Comment)
        );
        assert_eq!(
            sanitize("SELECT COUNT(*) FROM videos WHERE id = 'x", &allowed()),
            Err(UnsafeQueryError::UnterminatedLiteral)
        );
        assert_eq!(sanitize(" ; ", &allowed()), Err(UnsafeQueryError::Empty));
    }

    #[test]
    fn test_is_aggregate() {
        assert!(is_aggregate("SELECT COUNT(*) FROM videos"));
        assert!(is_aggregate("select sum (delta_views_count) from video_snapshots"));
        assert!(!is_aggregate("SELECT id FROM videos WHERE creator_id = 'count('"));
        assert!(!is_aggregate("SELECT admin FROM videos"));
    }
}
