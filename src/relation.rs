// ABOUTME: Relation and Column value types addressing tables and their columns
// ABOUTME: Enforces the identifier allow-list before any name reaches SQL text

use anyhow::{bail, Result};
use std::fmt;

/// A table addressed by (logical database, schema, name).
///
/// The `db` component is a logical identifier resolved to connection
/// parameters by [`crate::config::Settings`]; `schema` and `name` address the
/// table inside that database. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub db: String,
    pub schema: String,
    pub name: String,
}

impl Relation {
    /// Build a relation, validating every part against the identifier
    /// allow-list. Identifiers end up interpolated into SQL text, so nothing
    /// unvalidated may be stored here.
    pub fn new(db: &str, schema: &str, name: &str) -> Result<Self> {
        validate_identifier(db)?;
        validate_identifier(schema)?;
        validate_identifier(name)?;
        Ok(Self {
            db: db.to_string(),
            schema: schema.to_string(),
            name: name.to_string(),
        })
    }

    /// The quoted `"schema"."name"` form used in SQL statements.
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}", self.db, self.schema, self.name)
    }
}

/// One column of a table: the name plus the declared type reported by the
/// catalog. Produced by introspection, consumed by provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: String,
}

impl Column {
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
        }
    }
}

/// Validate a PostgreSQL identifier (database, schema, table, or column name).
///
/// Identifiers cannot be bound as query parameters, so every name that is
/// interpolated into SQL text must pass this allow-list first: non-empty,
/// at most 63 bytes, first character an ASCII letter or underscore, the rest
/// ASCII alphanumeric or underscore.
pub fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.is_empty() {
        bail!("Identifier cannot be empty");
    }

    // PostgreSQL truncates identifiers at 63 bytes
    if identifier.len() > 63 {
        bail!(
            "Identifier '{}' exceeds maximum length of 63 characters (got {})",
            sanitize_for_display(identifier),
            identifier.len()
        );
    }

    let first_char = identifier.chars().next().unwrap();
    if !first_char.is_ascii_alphabetic() && first_char != '_' {
        bail!(
            "Identifier '{}' must start with a letter or underscore, not '{}'",
            sanitize_for_display(identifier),
            first_char
        );
    }

    for (i, c) in identifier.chars().enumerate() {
        if !c.is_ascii_alphanumeric() && c != '_' {
            bail!(
                "Identifier '{}' contains invalid character '{}' at position {}. \
                 Only letters, digits, and underscores are allowed",
                sanitize_for_display(identifier),
                if c.is_control() {
                    format!("\\x{:02x}", c as u32)
                } else {
                    c.to_string()
                },
                i
            );
        }
    }

    Ok(())
}

/// Quote a PostgreSQL identifier for interpolation into SQL text.
///
/// Assumes the identifier has already been validated. Escapes embedded quotes
/// and wraps the identifier in double quotes.
pub fn quote_ident(identifier: &str) -> String {
    let mut quoted = String::with_capacity(identifier.len() + 2);
    quoted.push('"');
    for ch in identifier.chars() {
        if ch == '"' {
            quoted.push('"');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// Strip control characters and limit length so a hostile identifier cannot
/// mangle error messages or logs.
fn sanitize_for_display(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| !c.is_control())
        .take(100)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_valid() {
        validate_identifier("address").unwrap();
        validate_identifier("etl_runs").unwrap();
        validate_identifier("_private").unwrap();
        validate_identifier("company_id").unwrap();
        validate_identifier("col2").unwrap();
    }

    #[test]
    fn test_validate_identifier_invalid() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("123abc").is_err());
        assert!(validate_identifier("my-table").is_err());
        assert!(validate_identifier("a b").is_err());
        assert!(validate_identifier("tab\"; DROP TABLE users; --").is_err());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("address"), "\"address\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_relation_new_validates_all_parts() {
        assert!(Relation::new("source", "public", "address").is_ok());
        assert!(Relation::new("source", "pub lic", "address").is_err());
        assert!(Relation::new("source", "public", "addr;ess").is_err());
        assert!(Relation::new("so;urce", "public", "address").is_err());
    }

    #[test]
    fn test_relation_qualified() {
        let rel = Relation::new("target", "public", "company").unwrap();
        assert_eq!(rel.qualified(), "\"public\".\"company\"");
    }

    #[test]
    fn test_relation_display() {
        let rel = Relation::new("source", "public", "address").unwrap();
        assert_eq!(rel.to_string(), "source/public.address");
    }
}
