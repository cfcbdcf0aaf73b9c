//! Dialect Registry: produces dialect-specific sampling and row-count SQL
//! behind a small trait plus a product-name-keyed factory, the same
//! trait-object-plus-factory shape used elsewhere in this crate for
//! pluggable backends. The adapter only ever builds SQL text; it never
//! executes it. Metadata-comment and foreign-key extraction SQL is not
//! part of this trait: that querying belongs to the `MetadataExtractor`
//! collaborator's own implementation, not the dialect.

use crate::error::ConfigError;

mod mysql;
mod oracle;
mod postgres;
mod sqlserver;

pub use mysql::MySqlDialect;
pub use oracle::OracleDialect;
pub use postgres::PostgresDialect;
pub use sqlserver::SqlServerDialect;

/// Operations every dialect must provide. Static dispatch would work too,
/// but a trait object lets callers hold a `Box<dyn SqlDialect>` selected at
/// runtime from the connector's reported product name. Deliberately scoped
/// to sampling/counting SQL only — building metadata-comment-enhancement or
/// foreign-key-discovery queries is the `MetadataExtractor` collaborator's
/// responsibility, not this trait's.
pub trait SqlDialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Quotes a bare identifier (table or column name) per this dialect's
    /// quoting rules. Required on every generated query — never emit an
    /// unquoted identifier.
    fn quote_identifier(&self, ident: &str) -> String;

    /// Builds a query that samples exactly `n` rows of `column` from
    /// `table`, using this dialect's random-order idiom.
    fn build_sampling_query(&self, table: &str, column: &str, n: usize) -> String;

    /// Builds a query counting all rows in `table`, used by
    /// `determineOptimalSampleSize`.
    fn build_count_query(&self, table: &str) -> String;
}

/// Recognized dialects. Selection is exact-match on the database product
/// name, falling back to substring match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    PostgreSql,
    Oracle,
    SqlServer,
}

impl Dialect {
    pub fn for_product_name(product_name: &str) -> Result<Dialect, ConfigError> {
        let normalized = product_name.trim();
        let exact = match normalized {
            "MySQL" => Some(Dialect::MySql),
            "PostgreSQL" => Some(Dialect::PostgreSql),
            "Oracle" => Some(Dialect::Oracle),
            "Microsoft SQL Server" => Some(Dialect::SqlServer),
            _ => None,
        };
        if let Some(dialect) = exact {
            return Ok(dialect);
        }

        let lower = normalized.to_lowercase();
        if lower.contains("mysql") || lower.contains("mariadb") {
            return Ok(Dialect::MySql);
        }
        if lower.contains("postgres") {
            return Ok(Dialect::PostgreSql);
        }
        if lower.contains("oracle") {
            return Ok(Dialect::Oracle);
        }
        if lower.contains("sql server") || lower.contains("sqlserver") || lower.contains("mssql") {
            return Ok(Dialect::SqlServer);
        }
        Err(ConfigError::UnsupportedDialect(product_name.to_string()))
    }

    pub fn registry(self) -> Box<dyn SqlDialect> {
        match self {
            Dialect::MySql => Box::new(MySqlDialect),
            Dialect::PostgreSql => Box::new(PostgresDialect),
            Dialect::Oracle => Box::new(OracleDialect),
            Dialect::SqlServer => Box::new(SqlServerDialect),
        }
    }
}
