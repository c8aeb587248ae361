//! Parser for schema-change unit files.
//!
//! A unit file is plain SQL. Everything before a `-- tenantry:revert` line is
//! the apply body and everything after it is the revert body. Lines starting
//! with `-- tenantry:` carry `key="value"` attributes:
//!
//! ```sql
//! -- tenantry: affects="cards" timeout="2m"
//! -- tenantry: description="Create the cards table"
//! CREATE TABLE cards (id BIGSERIAL PRIMARY KEY);
//! -- tenantry:revert
//! DROP TABLE IF EXISTS cards;
//! ```

use crate::constants::{DIRECTIVE_PREFIX, REVERT_MARKER, UNIT_FILE_EXTENSION};
use crate::module::descriptor::{SchemaChangeUnit, Scope, TransactionMode};
use anyhow::{Context, Result, anyhow};
use std::time::Duration;

/// Extract the unit id from a file name like `20240101120000_create_cards.sql`
pub fn parse_unit_filename(filename: &str) -> Option<&str> {
    let id = filename.strip_suffix(&format!(".{}", UNIT_FILE_EXTENSION))?;
    if is_valid_unit_id(id) { Some(id) } else { None }
}

/// Unit ids are non-empty and made of ASCII letters, digits, `_`, `-` and `.`
pub fn is_valid_unit_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Parse a unit file's contents into a [`SchemaChangeUnit`]
pub fn parse_unit(id: &str, scope: Scope, content: &str) -> Result<SchemaChangeUnit> {
    let mut builder = UnitBuilder::default();
    let mut apply_sql = String::new();
    let mut revert_sql: Option<String> = None;

    for (line_num, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();

        if trimmed.trim_end() == REVERT_MARKER {
            if revert_sql.is_some() {
                return Err(anyhow!(
                    "Duplicate revert marker at line {} of unit '{}'",
                    line_num + 1,
                    id
                ));
            }
            revert_sql = Some(String::new());
        } else if let Some(attributes) = trimmed.strip_prefix(DIRECTIVE_PREFIX) {
            parse_unit_attributes(attributes, &mut builder)
                .with_context(|| format!("Invalid directive at line {} of unit '{}'", line_num + 1, id))?;
        } else {
            let body = revert_sql.as_mut().unwrap_or(&mut apply_sql);
            body.push_str(line);
            body.push('\n');
        }
    }

    let apply_sql = apply_sql.trim().to_string();
    if apply_sql.is_empty() {
        return Err(anyhow!("Unit '{}' has an empty apply body", id));
    }

    Ok(SchemaChangeUnit {
        id: id.to_string(),
        scope,
        affected_entity: builder.affects,
        description: builder.description,
        mode: builder.mode.unwrap_or_default(),
        timeout: builder.timeout,
        apply_sql,
        revert_sql: revert_sql
            .map(|sql| sql.trim().to_string())
            .filter(|sql| !sql.is_empty()),
    })
}

#[derive(Default)]
struct UnitBuilder {
    affects: Option<String>,
    description: Option<String>,
    mode: Option<TransactionMode>,
    timeout: Option<Duration>,
}

fn parse_unit_attributes(line: &str, builder: &mut UnitBuilder) -> Result<()> {
    for (key, value) in parse_key_value_pairs(line.trim())? {
        match key.as_str() {
            "affects" => builder.affects = Some(value),
            "description" => builder.description = Some(value),
            "mode" => builder.mode = Some(parse_transaction_mode(&value)?),
            "timeout" => builder.timeout = Some(parse_duration(&value)?),
            _ => return Err(anyhow!("Unknown unit attribute '{}'", key)),
        }
    }

    Ok(())
}

/// Parse multiple key="value" pairs from a string
/// Supports: affects="cards" mode="non-transactional" timeout="30s"
fn parse_key_value_pairs(input: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&ch) = chars.peek() {
            if ch == '=' {
                chars.next();
                break;
            }
            if ch.is_whitespace() {
                return Err(anyhow!("Expected '=' after key '{}'", key));
            }
            key.push(ch);
            chars.next();
        }

        if key.is_empty() {
            return Err(anyhow!("Expected attribute name before '='"));
        }

        if chars.next() != Some('"') {
            return Err(anyhow!("Expected '\"' after '{}='", key));
        }

        let mut value = String::new();
        let mut found_closing_quote = false;
        for ch in chars.by_ref() {
            if ch == '"' {
                found_closing_quote = true;
                break;
            }
            value.push(ch);
        }

        if !found_closing_quote {
            return Err(anyhow!("Missing closing quote for value of '{}'", key));
        }

        pairs.push((key, value));
    }

    Ok(pairs)
}

fn parse_transaction_mode(s: &str) -> Result<TransactionMode> {
    match s.to_lowercase().as_str() {
        "transactional" => Ok(TransactionMode::Transactional),
        "non-transactional" => Ok(TransactionMode::NonTransactional),
        _ => Err(anyhow!("Unknown transaction mode: {}", s)),
    }
}

/// Parse duration strings like "30s", "5m", "2h", "500ms", "1m30s"
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let mut total = Duration::ZERO;
    let mut num_str = String::new();
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch.is_ascii_digit() {
            num_str.push(ch);
        } else if ch.is_alphabetic() {
            let is_ms = ch == 'm' && chars.peek() == Some(&'s');

            let num: u64 = num_str
                .parse()
                .with_context(|| format!("Invalid duration number: '{}'", num_str))?;

            let unit_duration = if is_ms {
                chars.next();
                Duration::from_millis(num)
            } else {
                match ch {
                    's' => Duration::from_secs(num),
                    'm' => Duration::from_secs(num * 60),
                    'h' => Duration::from_secs(num * 3600),
                    _ => return Err(anyhow!("Unknown duration unit: {}", ch)),
                }
            };

            total += unit_duration;
            num_str.clear();
        } else if !ch.is_whitespace() {
            return Err(anyhow!("Invalid character in duration: {}", ch));
        }
    }

    if !num_str.is_empty() {
        return Err(anyhow!("Duration missing unit: {}", num_str));
    }

    if total.is_zero() {
        return Err(anyhow!("Invalid duration: {}", s));
    }

    Ok(total)
}
