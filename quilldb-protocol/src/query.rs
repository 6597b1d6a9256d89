//! Query message types.
//!
//! A query is a pipeline tree: each operation record that reads from
//! somewhere embeds its `source` operation, down to a `database` or `table`
//! leaf. The top-level [`Query`] additionally carries the optional cursor
//! position and execution options.

use crate::datum::Datum;
use serde::{Deserialize, Serialize};

/// Cursor position for paginated queries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorSpec {
    /// Key to resume after; absent on the first page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_key: Option<String>,
    /// Requested page size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
}

/// Execution options for a query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain: Option<bool>,
}

/// Comparison operators usable inside predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A predicate/value expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Expression {
    /// A literal wire value.
    Literal { value: Datum },
    /// A reference to a document field.
    Field { name: String },
    /// A binary comparison between two sub-expressions.
    Cmp {
        op: ComparisonOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    And { operands: Vec<Expression> },
    Or { operands: Vec<Expression> },
    Not { operand: Box<Expression> },
}

/// One operation record in the pipeline tree.
///
/// Externally tagged on the wire, so a filter over a table in a database
/// serializes as
/// `{"filter":{"source":{"table":{"source":{"database":{"name":…}},"name":…}},"predicate":…}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryOp {
    Database {
        name: String,
    },
    DatabaseCreate {
        name: String,
    },
    DatabaseDrop {
        name: String,
    },
    DatabaseList {},
    Table {
        source: Box<QueryOp>,
        name: String,
    },
    TableCreate {
        source: Box<QueryOp>,
        name: String,
    },
    TableDrop {
        source: Box<QueryOp>,
        name: String,
    },
    TableList {
        source: Box<QueryOp>,
    },
    Get {
        source: Box<QueryOp>,
        key: Datum,
    },
    GetAll {
        source: Box<QueryOp>,
        keys: Vec<Datum>,
    },
    Filter {
        source: Box<QueryOp>,
        predicate: Expression,
    },
    OrderBy {
        source: Box<QueryOp>,
        field: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        descending: bool,
    },
    Limit {
        source: Box<QueryOp>,
        count: u64,
    },
    Skip {
        source: Box<QueryOp>,
        count: u64,
    },
    Count {
        source: Box<QueryOp>,
    },
    Insert {
        source: Box<QueryOp>,
        documents: Vec<Datum>,
    },
    Update {
        source: Box<QueryOp>,
        patch: Datum,
    },
    Delete {
        source: Box<QueryOp>,
    },
    Expression {
        expr: Expression,
    },
    Subquery {
        query: Box<Query>,
    },
}

impl QueryOp {
    /// Returns the nested source operation, if this record has one.
    pub fn source(&self) -> Option<&QueryOp> {
        match self {
            QueryOp::Table { source, .. }
            | QueryOp::TableCreate { source, .. }
            | QueryOp::TableDrop { source, .. }
            | QueryOp::TableList { source }
            | QueryOp::Get { source, .. }
            | QueryOp::GetAll { source, .. }
            | QueryOp::Filter { source, .. }
            | QueryOp::OrderBy { source, .. }
            | QueryOp::Limit { source, .. }
            | QueryOp::Skip { source, .. }
            | QueryOp::Count { source }
            | QueryOp::Insert { source, .. }
            | QueryOp::Update { source, .. }
            | QueryOp::Delete { source } => Some(source),
            _ => None,
        }
    }

    /// Returns a copy of this record with its source replaced.
    ///
    /// Records without a source are returned unchanged.
    pub fn with_source(&self, new_source: QueryOp) -> QueryOp {
        let source = Box::new(new_source);
        match self.clone() {
            QueryOp::Table { name, .. } => QueryOp::Table { source, name },
            QueryOp::TableCreate { name, .. } => QueryOp::TableCreate { source, name },
            QueryOp::TableDrop { name, .. } => QueryOp::TableDrop { source, name },
            QueryOp::TableList { .. } => QueryOp::TableList { source },
            QueryOp::Get { key, .. } => QueryOp::Get { source, key },
            QueryOp::GetAll { keys, .. } => QueryOp::GetAll { source, keys },
            QueryOp::Filter { predicate, .. } => QueryOp::Filter { source, predicate },
            QueryOp::OrderBy {
                field, descending, ..
            } => QueryOp::OrderBy {
                source,
                field,
                descending,
            },
            QueryOp::Limit { count, .. } => QueryOp::Limit { source, count },
            QueryOp::Skip { count, .. } => QueryOp::Skip { source, count },
            QueryOp::Count { .. } => QueryOp::Count { source },
            QueryOp::Insert { documents, .. } => QueryOp::Insert { source, documents },
            QueryOp::Update { patch, .. } => QueryOp::Update { source, patch },
            QueryOp::Delete { .. } => QueryOp::Delete { source },
            other => other,
        }
    }
}

/// A complete query message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(flatten)]
    pub op: QueryOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<QueryOptions>,
}

impl Query {
    pub fn new(op: QueryOp) -> Self {
        Self {
            op,
            cursor: None,
            options: None,
        }
    }

    pub fn with_cursor(mut self, cursor: CursorSpec) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = Some(options);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users_table() -> QueryOp {
        QueryOp::Table {
            source: Box::new(QueryOp::Database {
                name: "mydb".to_string(),
            }),
            name: "users".to_string(),
        }
    }

    #[test]
    fn test_filter_wire_shape() {
        let query = Query::new(QueryOp::Filter {
            source: Box::new(users_table()),
            predicate: Expression::Cmp {
                op: ComparisonOp::Ge,
                left: Box::new(Expression::Field {
                    name: "age".to_string(),
                }),
                right: Box::new(Expression::Literal {
                    value: Datum::Int(21),
                }),
            },
        });

        let wire = serde_json::to_value(&query).unwrap();
        assert_eq!(
            wire,
            json!({
                "filter": {
                    "source": {
                        "table": {
                            "source": { "database": { "name": "mydb" } },
                            "name": "users"
                        }
                    },
                    "predicate": {
                        "cmp": {
                            "op": "ge",
                            "left": { "field": { "name": "age" } },
                            "right": { "literal": { "value": { "int": "21" } } }
                        }
                    }
                }
            })
        );

        let back: Query = serde_json::from_value(wire).unwrap();
        assert_eq!(back, query);
    }

    #[test]
    fn test_top_level_modifiers() {
        let query = Query::new(users_table())
            .with_cursor(CursorSpec {
                start_key: Some("k9".to_string()),
                batch_size: Some(50),
            })
            .with_options(QueryOptions {
                timeout_ms: Some(1000),
                explain: None,
            });

        let wire = serde_json::to_value(&query).unwrap();
        assert_eq!(wire["cursor"], json!({ "startKey": "k9", "batchSize": 50 }));
        assert_eq!(wire["options"], json!({ "timeoutMs": 1000 }));

        let back: Query = serde_json::from_value(wire).unwrap();
        assert_eq!(back, query);
    }

    #[test]
    fn test_with_source_replaces_only_source() {
        let limit = QueryOp::Limit {
            source: Box::new(users_table()),
            count: 10,
        };
        let replaced = limit.with_source(QueryOp::Database {
            name: "other".to_string(),
        });

        match replaced {
            QueryOp::Limit { source, count } => {
                assert_eq!(count, 10);
                assert_eq!(
                    *source,
                    QueryOp::Database {
                        name: "other".to_string()
                    }
                );
            }
            other => panic!("expected limit, got {other:?}"),
        }
    }

    #[test]
    fn test_source_of_leaf_is_none() {
        assert!(QueryOp::Database {
            name: "d".to_string()
        }
        .source()
        .is_none());
        assert!(QueryOp::DatabaseList {}.source().is_none());
        assert!(users_table().source().is_some());
    }
}
