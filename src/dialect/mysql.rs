use super::SqlDialect;

pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "MySQL"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn build_sampling_query(&self, table: &str, column: &str, n: usize) -> String {
        format!(
            "SELECT {} FROM {} ORDER BY RAND() LIMIT {}",
            self.quote_identifier(column),
            self.quote_identifier(table),
            n
        )
    }

    fn build_count_query(&self, table: &str) -> String {
        format!("SELECT COUNT(*) FROM {}", self.quote_identifier(table))
    }
}
