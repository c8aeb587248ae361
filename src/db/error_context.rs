//! Rich error context for PostgreSQL failures raised while applying or
//! reverting a schema-change unit.

use sqlx::postgres::{PgDatabaseError, PgErrorPosition};

/// SQLSTATE for unique_violation
pub const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE for query_canceled (raised by statement_timeout)
pub const QUERY_CANCELED: &str = "57014";

#[derive(Debug, Clone)]
pub struct SqlErrorContext {
    pub message: String,
    /// Line in the unit body, derived from the server-reported position
    pub line_number: Option<usize>,
    pub detail: Option<String>,
    pub hint: Option<String>,
    /// PL/pgSQL or statement context reported by the server
    pub context: Option<String>,
    /// SQLSTATE, e.g. "42P01" for undefined_table
    pub code: Option<String>,
}

impl SqlErrorContext {
    pub fn from_sqlx_error(error: &sqlx::Error, sql_content: &str) -> Self {
        if let Some(db_error) = error.as_database_error()
            && let Some(pg_error) = db_error.try_downcast_ref::<PgDatabaseError>()
        {
            let line_number = pg_error
                .position()
                .map(|pos| match pos {
                    PgErrorPosition::Original(p) => p,
                    PgErrorPosition::Internal { position, .. } => position,
                })
                .map(|p| position_to_line(sql_content, p));

            return Self {
                message: pg_error.message().to_string(),
                line_number,
                detail: pg_error.detail().map(|s| s.to_string()),
                hint: pg_error.hint().map(|s| s.to_string()),
                context: pg_error.r#where().map(|s| s.to_string()),
                code: Some(pg_error.code().to_string()),
            };
        }

        Self {
            message: error.to_string(),
            line_number: None,
            detail: None,
            hint: None,
            context: None,
            code: error
                .as_database_error()
                .and_then(|e| e.code())
                .map(|c| c.to_string()),
        }
    }

    pub fn is_statement_timeout(&self) -> bool {
        self.code.as_deref() == Some(QUERY_CANCELED)
    }

    /// Format the error for display, naming the unit that failed
    pub fn format(&self, unit_label: &str, sql_content: &str) -> String {
        let mut msg = format!("SQL error in {}", unit_label);

        if let Some(line) = self.line_number {
            msg.push_str(&format!(" at line {}", line));
        }
        msg.push_str(&format!(": {}", self.message));

        if let Some(detail) = &self.detail {
            msg.push_str(&format!("\n  Detail: {}", detail));
        }
        if let Some(hint) = &self.hint {
            msg.push_str(&format!("\n  Hint: {}", hint));
        }
        if let Some(ctx) = &self.context {
            msg.push_str(&format!("\n  Context: {}", ctx));
        }

        if let Some(line) = self.line_number {
            msg.push_str(&format!("\n\n{}", format_line_context(sql_content, line)));
        }

        msg
    }
}

/// Whether a sqlx error is a unique constraint violation
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

/// Convert 1-indexed character position to line number
pub fn position_to_line(content: &str, position: usize) -> usize {
    content
        .chars()
        .take(position.saturating_sub(1))
        .filter(|c| *c == '\n')
        .count()
        + 1
}

/// Format SQL content showing context around the error line
pub fn format_line_context(content: &str, error_line: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let total_lines = lines.len();
    const CONTEXT_LINES: usize = 2;

    let error_idx = error_line.saturating_sub(1).min(total_lines);
    let start_idx = error_idx.saturating_sub(CONTEXT_LINES);
    let end_idx = (error_idx + CONTEXT_LINES + 1).min(total_lines);

    let mut result = String::new();
    for (idx, line) in lines[start_idx..end_idx].iter().enumerate() {
        let line_num = start_idx + idx + 1;
        let marker = if line_num == error_line { ">" } else { " " };
        result.push_str(&format!("  {} {:4} | {}\n", marker, line_num, line));
    }

    result
}
