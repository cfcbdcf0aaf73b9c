use super::SqlDialect;

pub struct SqlServerDialect;

impl SqlDialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "SQLServer"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn build_sampling_query(&self, table: &str, column: &str, n: usize) -> String {
        format!(
            "SELECT TOP ({}) {} FROM {} ORDER BY NEWID()",
            n,
            self.quote_identifier(column),
            self.quote_identifier(table)
        )
    }

    fn build_count_query(&self, table: &str) -> String {
        format!("SELECT COUNT(*) FROM {}", self.quote_identifier(table))
    }
}
