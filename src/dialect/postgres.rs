use super::SqlDialect;

pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn build_sampling_query(&self, table: &str, column: &str, n: usize) -> String {
        format!(
            "SELECT {} FROM {} ORDER BY RANDOM() LIMIT {}",
            self.quote_identifier(column),
            self.quote_identifier(table),
            n
        )
    }

    fn build_count_query(&self, table: &str) -> String {
        format!("SELECT COUNT(*) FROM {}", self.quote_identifier(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_query_uses_double_quote_quoting_and_random_order() {
        let sql = PostgresDialect.build_sampling_query("users", "email", 50);
        assert_eq!(sql, "SELECT \"email\" FROM \"users\" ORDER BY RANDOM() LIMIT 50");
    }
}
