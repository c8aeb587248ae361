use anyhow::{Result, anyhow};

/// PostgreSQL identifier rules: letters, digits, underscores and dollar signs,
/// starting with a letter or underscore
pub fn is_valid_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }

    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

pub fn validate_sql_identifier(label: &str, name: &str) -> Result<()> {
    if is_valid_sql_identifier(name) {
        Ok(())
    } else {
        Err(anyhow!(
            "Invalid {} '{}': must contain only letters, numbers, underscores, and dollar signs, starting with letter or underscore",
            label,
            name
        ))
    }
}

/// Safely format a schema-qualified name for SQL queries
pub fn qualified_name(schema: &str, name: &str) -> Result<String> {
    validate_sql_identifier("schema name", schema)?;
    validate_sql_identifier("table name", name)?;
    Ok(format!(r#""{}"."{}""#, schema, name))
}

/// Quote a single validated identifier (e.g. a column name)
pub fn quoted(name: &str) -> Result<String> {
    validate_sql_identifier("identifier", name)?;
    Ok(format!(r#""{}""#, name))
}
