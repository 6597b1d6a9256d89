//! Response message types.
//!
//! A response carries exactly one of: a server error, a query result, a
//! pong, a query plan, or an auth result. The query result is itself a
//! union keyed by operation kind; each variant decodes to either a scalar
//! record or a paginated page of items.

use crate::datum::Datum;
use crate::query::CursorSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server-reported error details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: i32,
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

/// Response metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
}

/// One page of a paginated result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPage {
    #[serde(default)]
    pub items: Vec<Datum>,
    /// Continuation position; absent means no more pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorSpec>,
}

/// A single optional document (get).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Datum>,
}

/// A count record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountResult {
    #[serde(default)]
    pub count: u64,
}

/// Mutation statistics attached to write receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteStats {
    #[serde(default)]
    pub inserted_count: u64,
    #[serde(default)]
    pub updated_count: u64,
    #[serde(default)]
    pub deleted_count: u64,
}

/// Receipt for insert/update/delete.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteReceipt {
    /// Inserted documents (with server-assigned keys), when applicable.
    #[serde(default)]
    pub inserted: Vec<Datum>,
    #[serde(default)]
    pub stats: WriteStats,
}

/// A list of names (tableList, databaseList).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameList {
    #[serde(default)]
    pub names: Vec<String>,
}

/// Acknowledgement for create/drop operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    #[serde(default)]
    pub ok: bool,
}

/// A scalar expression result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueResult {
    #[serde(default)]
    pub value: Datum,
}

/// Query result union, keyed by the operation kind that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryResultPayload {
    Table(CursorPage),
    GetAll(CursorPage),
    Filter(CursorPage),
    OrderBy(CursorPage),
    Limit(CursorPage),
    Skip(CursorPage),
    Subquery(CursorPage),
    Get(DocumentResult),
    Count(CountResult),
    Insert(WriteReceipt),
    Update(WriteReceipt),
    Delete(WriteReceipt),
    TableList(NameList),
    DatabaseList(NameList),
    TableCreate(Ack),
    TableDrop(Ack),
    DatabaseCreate(Ack),
    DatabaseDrop(Ack),
    Expression(ValueResult),
}

impl QueryResultPayload {
    /// Whether this variant carries a paginated page.
    pub fn is_paginated(&self) -> bool {
        matches!(
            self,
            QueryResultPayload::Table(_)
                | QueryResultPayload::GetAll(_)
                | QueryResultPayload::Filter(_)
                | QueryResultPayload::OrderBy(_)
                | QueryResultPayload::Limit(_)
                | QueryResultPayload::Skip(_)
                | QueryResultPayload::Subquery(_)
        )
    }
}

/// The populated variant of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponsePayload {
    Error(ErrorInfo),
    Result(QueryResultPayload),
    Pong {},
    /// Query plan, relayed opaquely.
    Plan(Value),
    /// Authentication result, relayed opaquely.
    Auth(Value),
}

/// A complete response message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(flatten)]
    pub payload: ResponsePayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}

impl Response {
    pub fn result(payload: QueryResultPayload) -> Self {
        Self {
            payload: ResponsePayload::Result(payload),
            metadata: None,
        }
    }

    pub fn error(info: ErrorInfo) -> Self {
        Self {
            payload: ResponsePayload::Error(info),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: ResponseMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_paginated_result_wire_shape() {
        let wire = json!({
            "result": {
                "filter": {
                    "items": [ { "int": "1" }, { "int": "2" } ],
                    "cursor": { "startKey": "k2", "batchSize": 2 }
                }
            },
            "metadata": { "queryId": "query-1-0", "serverVersion": "0.4.1" }
        });

        let response: Response = serde_json::from_value(wire).unwrap();
        match &response.payload {
            ResponsePayload::Result(payload) => {
                assert!(payload.is_paginated());
                match payload {
                    QueryResultPayload::Filter(page) => {
                        assert_eq!(page.items, vec![Datum::Int(1), Datum::Int(2)]);
                        assert_eq!(page.cursor.as_ref().unwrap().start_key.as_deref(), Some("k2"));
                    }
                    other => panic!("expected filter page, got {other:?}"),
                }
            }
            other => panic!("expected result, got {other:?}"),
        }
        assert_eq!(
            response.metadata.unwrap().query_id.as_deref(),
            Some("query-1-0")
        );
    }

    #[test]
    fn test_scalar_results_are_not_paginated() {
        let count: Response =
            serde_json::from_value(json!({ "result": { "count": { "count": 7 } } })).unwrap();
        match count.payload {
            ResponsePayload::Result(p) => {
                assert!(!p.is_paginated());
                assert_eq!(p, QueryResultPayload::Count(CountResult { count: 7 }));
            }
            other => panic!("expected result, got {other:?}"),
        }
    }

    #[test]
    fn test_error_info_optional_fields() {
        let info: ErrorInfo =
            serde_json::from_value(json!({ "code": 4100, "type": "QueryError" })).unwrap();
        assert_eq!(info.code, 4100);
        assert_eq!(info.error_type, "QueryError");
        assert!(info.message.is_none());
        assert!(info.line.is_none());

        let full: ErrorInfo = serde_json::from_value(json!({
            "code": 4100, "type": "QueryError", "message": "bad predicate",
            "line": 1, "column": 12
        }))
        .unwrap();
        assert_eq!(full.message.as_deref(), Some("bad predicate"));
        assert_eq!(full.column, Some(12));
    }

    #[test]
    fn test_write_receipt_defaults() {
        let receipt: WriteReceipt = serde_json::from_value(json!({
            "inserted": [ { "object": { "id": { "string": "123" } } } ]
        }))
        .unwrap();
        assert_eq!(receipt.inserted.len(), 1);
        assert_eq!(receipt.stats.inserted_count, 0);
    }

    #[test]
    fn test_pong_roundtrip() {
        let response = Response {
            payload: ResponsePayload::Pong {},
            metadata: None,
        };
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire, json!({ "pong": {} }));

        let back: Response = serde_json::from_value(wire).unwrap();
        assert_eq!(back, response);
    }
}
