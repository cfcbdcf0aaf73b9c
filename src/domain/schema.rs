//! Schema graph: Schema -> Table -> Column, with Relationships stored in a
//! flat arena and referenced by id from both endpoints.
//!
//! This avoids the bidirectional-ownership cycle a naive `Table { imported:
//! Vec<Relationship> }` / `Table { exported: Vec<Relationship> }` design
//! would need: a `Relationship` is created once, pushed into
//! `Schema::relationships`, and each `Table` exposes `imported()`/
//! `exported()` as filtered views over that arena.

use serde::{Deserialize, Serialize};

/// Stable id for a table within one scan's schema graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(pub u64);

/// Stable id for a column within one scan's schema graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnId(pub u64);

/// Stable id for a relationship within one scan's schema graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub table_id: TableId,
    pub name: String,
    pub jdbc_type: i32,
    pub db_type_name: String,
    pub comments: Option<String>,
    pub size: Option<i64>,
    pub nullable: bool,
    pub primary_key: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub id: TableId,
    pub name: String,
    pub remarks: Option<String>,
    pub columns: Vec<ColumnId>,
}

/// Fixed convention: `source` is the PK side, `target` is the FK side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub source_table: TableId,
    pub source_column: ColumnId,
    pub target_table: TableId,
    pub target_column: ColumnId,
    pub constraint_name: String,
    pub update_rule: Option<String>,
    pub delete_rule: Option<String>,
}

/// A scan's fully-populated schema graph, handed to the orchestrator by the
/// (out-of-scope) metadata extraction collaborator. Unique by
/// `(catalog, name)` within a scan; owned exclusively by the orchestrator
/// for the scan's duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub catalog: Option<String>,
    pub name: String,
    pub database_product_name: String,
    tables: Vec<Table>,
    columns: Vec<Column>,
    relationships: Vec<Relationship>,
}

impl Schema {
    pub fn new(name: impl Into<String>, database_product_name: impl Into<String>) -> Self {
        Self {
            catalog: None,
            name: name.into(),
            database_product_name: database_product_name.into(),
            tables: Vec::new(),
            columns: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn add_table(&mut self, mut table: Table) -> TableId {
        let id = TableId(self.tables.len() as u64);
        table.id = id;
        self.tables.push(table);
        id
    }

    pub fn add_column(&mut self, mut column: Column) -> ColumnId {
        let id = ColumnId(self.columns.len() as u64);
        column.id = id;
        let table_id = column.table_id;
        self.columns.push(column);
        if let Some(table) = self.tables.iter_mut().find(|t| t.id == table_id) {
            table.columns.push(id);
        }
        id
    }

    pub fn add_relationship(&mut self, mut relationship: Relationship) -> RelationshipId {
        let id = RelationshipId(self.relationships.len() as u64);
        relationship.id = id;
        self.relationships.push(relationship);
        id
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn table(&self, id: TableId) -> Option<&Table> {
        self.tables.get(id.0 as usize)
    }

    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.get(id.0 as usize)
    }

    /// Relationships where this table is the PK (source) side.
    pub fn exported(&self, table_id: TableId) -> Vec<&Relationship> {
        self.relationships.iter().filter(|r| r.source_table == table_id).collect()
    }

    /// Relationships where this table is the FK (target) side.
    pub fn imported(&self, table_id: TableId) -> Vec<&Relationship> {
        self.relationships.iter().filter(|r| r.target_table == table_id).collect()
    }

    pub fn columns_of(&self, table_id: TableId) -> Vec<&Column> {
        self.table(table_id)
            .map(|t| t.columns.iter().filter_map(|cid| self.column(*cid)).collect())
            .unwrap_or_default()
    }

    pub fn qualified_column_name(&self, column_id: ColumnId) -> String {
        let column = match self.column(column_id) {
            Some(c) => c,
            None => return format!("<unknown column {:?}>", column_id),
        };
        let table = self.table(column.table_id);
        match table {
            Some(t) => format!("{}.{}", t.name, column.name),
            None => column.name.clone(),
        }
    }
}
