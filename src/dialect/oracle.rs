use super::SqlDialect;

pub struct OracleDialect;

impl SqlDialect for OracleDialect {
    fn name(&self) -> &'static str {
        "Oracle"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn build_sampling_query(&self, table: &str, column: &str, n: usize) -> String {
        let column = self.quote_identifier(column);
        let table = self.quote_identifier(table);
        format!(
            "SELECT {column} FROM (SELECT {column} FROM {table} ORDER BY dbms_random.value) WHERE rownum <= {n}"
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
    fn sampling_query_uses_rownum_over_dbms_random_subquery() {
        let sql = OracleDialect.build_sampling_query("users", "email", 50);
        assert_eq!(
            sql,
            "SELECT \"email\" FROM (SELECT \"email\" FROM \"users\" ORDER BY dbms_random.value) WHERE rownum <= 50"
        );
    }
}
