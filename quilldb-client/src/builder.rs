//! Context-restricted query builder.
//!
//! Each chaining context is its own wrapper type exposing only the
//! operations legal there, so an illegal chain (say, `filter` on a bare
//! database) fails to compile rather than at runtime. Every method builds a
//! new term with the receiver as the first argument; nothing is mutated.
//!
//! ```no_run
//! use quilldb_client::builder::{field, r};
//!
//! let adults = r().db("mydb").table("users").filter(field("age").ge(21));
//! ```

use crate::client::Client;
use crate::connection::WriteOutcome;
use crate::error::ClientError;
use crate::result::QueryResult;
use crate::term::{normalize_operand, OperationTag, Term, TermArg};
use quilldb_protocol::DEFAULT_DATABASE;
use serde_json::Value;

/// The root context: databases and bare expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Root;

/// Entry point of the query DSL.
pub fn r() -> Root {
    Root
}

/// A document-field reference, usable inside predicates.
pub fn field(name: &str) -> ExprTerm {
    ExprTerm {
        term: Term::new(OperationTag::Field, vec![TermArg::Value(Value::from(name))]),
    }
}

impl Root {
    pub fn db(&self, name: &str) -> DatabaseTerm {
        DatabaseTerm {
            term: Term::new(
                OperationTag::Database,
                vec![TermArg::Value(Value::from(name))],
            ),
        }
    }

    /// Selects a table in the default database.
    pub fn table(&self, name: &str) -> TableTerm {
        self.db(DEFAULT_DATABASE).table(name)
    }

    pub fn db_create(&self, name: &str) -> AckTerm {
        AckTerm {
            term: Term::new(
                OperationTag::DatabaseCreate,
                vec![TermArg::Value(Value::from(name))],
            ),
        }
    }

    pub fn db_drop(&self, name: &str) -> AckTerm {
        AckTerm {
            term: Term::new(
                OperationTag::DatabaseDrop,
                vec![TermArg::Value(Value::from(name))],
            ),
        }
    }

    pub fn db_list(&self) -> NameListTerm {
        NameListTerm {
            term: Term::new(OperationTag::DatabaseList, vec![]),
        }
    }

    /// Lifts a literal value into the expression context.
    pub fn expr(&self, value: impl Into<Value>) -> ExprTerm {
        ExprTerm {
            term: normalize_operand(value.into()),
        }
    }
}

/// The database context: tables and table management.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseTerm {
    term: Term,
}

impl DatabaseTerm {
    pub fn term(&self) -> &Term {
        &self.term
    }

    pub fn table(&self, name: &str) -> TableTerm {
        TableTerm {
            term: Term::new(
                OperationTag::Table,
                vec![
                    TermArg::Term(self.term.clone()),
                    TermArg::Value(Value::from(name)),
                ],
            ),
        }
    }

    pub fn table_create(&self, name: &str) -> AckTerm {
        AckTerm {
            term: Term::new(
                OperationTag::TableCreate,
                vec![
                    TermArg::Term(self.term.clone()),
                    TermArg::Value(Value::from(name)),
                ],
            ),
        }
    }

    pub fn table_drop(&self, name: &str) -> AckTerm {
        AckTerm {
            term: Term::new(
                OperationTag::TableDrop,
                vec![
                    TermArg::Term(self.term.clone()),
                    TermArg::Value(Value::from(name)),
                ],
            ),
        }
    }

    pub fn table_list(&self) -> NameListTerm {
        NameListTerm {
            term: Term::new(OperationTag::TableList, vec![TermArg::Term(self.term.clone())]),
        }
    }
}

macro_rules! selection_ops {
    () => {
        pub fn filter(&self, predicate: ExprTerm) -> Selection {
            Selection {
                term: Term::new(
                    OperationTag::Filter,
                    vec![
                        TermArg::Term(self.term.clone()),
                        TermArg::Term(predicate.term),
                    ],
                ),
            }
        }

        pub fn order_by(&self, field: &str) -> Selection {
            Selection {
                term: Term::new(
                    OperationTag::OrderBy,
                    vec![
                        TermArg::Term(self.term.clone()),
                        TermArg::Value(Value::from(field)),
                    ],
                ),
            }
        }

        pub fn limit(&self, count: u64) -> Selection {
            Selection {
                term: Term::new(
                    OperationTag::Limit,
                    vec![
                        TermArg::Term(self.term.clone()),
                        TermArg::Value(Value::from(count)),
                    ],
                ),
            }
        }

        pub fn skip(&self, count: u64) -> Selection {
            Selection {
                term: Term::new(
                    OperationTag::Skip,
                    vec![
                        TermArg::Term(self.term.clone()),
                        TermArg::Value(Value::from(count)),
                    ],
                ),
            }
        }

        pub fn count(&self) -> CountTerm {
            CountTerm {
                term: Term::new(OperationTag::Count, vec![TermArg::Term(self.term.clone())]),
            }
        }

        pub fn update(&self, patch: Value) -> WriteTerm {
            WriteTerm {
                term: Term::new(
                    OperationTag::Update,
                    vec![TermArg::Term(self.term.clone()), TermArg::Value(patch)],
                ),
            }
        }

        pub fn delete(&self) -> WriteTerm {
            WriteTerm {
                term: Term::new(OperationTag::Delete, vec![TermArg::Term(self.term.clone())]),
            }
        }

        /// Requests a specific page size for streamed results.
        pub fn batch_size(&self, size: u32) -> Self {
            Self {
                term: self.term.with_option("batchSize", size),
            }
        }

        /// Caps server-side execution time for this query.
        pub fn timeout_ms(&self, ms: u64) -> Self {
            Self {
                term: self.term.with_option("timeoutMs", ms),
            }
        }

        /// Asks the server for an execution plan instead of results.
        pub fn explain(&self) -> Self {
            Self {
                term: self.term.with_option("explain", true),
            }
        }

        /// Streams the selection's documents.
        pub async fn run(&self, client: &Client) -> Result<QueryResult, ClientError> {
            client.run(&self.term).await
        }
    };
}

/// The table context: point lookups, writes, and the selection operations.
#[derive(Debug, Clone, PartialEq)]
pub struct TableTerm {
    term: Term,
}

impl TableTerm {
    pub fn term(&self) -> &Term {
        &self.term
    }

    pub fn get(&self, key: impl Into<Value>) -> GetTerm {
        GetTerm {
            term: Term::new(
                OperationTag::Get,
                vec![
                    TermArg::Term(self.term.clone()),
                    TermArg::Value(key.into()),
                ],
            ),
        }
    }

    pub fn get_all(&self, keys: Vec<Value>) -> Selection {
        Selection {
            term: Term::new(
                OperationTag::GetAll,
                vec![
                    TermArg::Term(self.term.clone()),
                    TermArg::List(keys.into_iter().map(TermArg::Value).collect()),
                ],
            ),
        }
    }

    pub fn insert(&self, documents: Vec<Value>) -> WriteTerm {
        WriteTerm {
            term: Term::new(
                OperationTag::Insert,
                vec![
                    TermArg::Term(self.term.clone()),
                    TermArg::List(documents.into_iter().map(TermArg::Value).collect()),
                ],
            ),
        }
    }

    selection_ops!();
}

/// The query context: a chainable selection over documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    term: Term,
}

impl Selection {
    pub fn term(&self) -> &Term {
        &self.term
    }

    selection_ops!();
}

/// The expression context: field references, comparisons, and logic.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprTerm {
    term: Term,
}

/// Anything usable as a comparison operand: another expression, or a
/// literal that gets classified into a datum or expr term.
pub trait IntoOperand {
    fn into_operand(self) -> Term;
}

impl IntoOperand for ExprTerm {
    fn into_operand(self) -> Term {
        self.term
    }
}

impl IntoOperand for &ExprTerm {
    fn into_operand(self) -> Term {
        self.term.clone()
    }
}

macro_rules! literal_operand {
    ($($ty:ty),+) => {
        $(impl IntoOperand for $ty {
            fn into_operand(self) -> Term {
                normalize_operand(Value::from(self))
            }
        })+
    };
}

literal_operand!(bool, i32, i64, u32, u64, f64, &str, String, Value);

impl ExprTerm {
    pub fn term(&self) -> &Term {
        &self.term
    }

    fn cmp(&self, op: OperationTag, other: impl IntoOperand) -> ExprTerm {
        ExprTerm {
            term: Term::new(
                op,
                vec![
                    TermArg::Term(self.term.clone()),
                    TermArg::Term(other.into_operand()),
                ],
            ),
        }
    }

    pub fn eq(&self, other: impl IntoOperand) -> ExprTerm {
        self.cmp(OperationTag::Eq, other)
    }

    pub fn ne(&self, other: impl IntoOperand) -> ExprTerm {
        self.cmp(OperationTag::Ne, other)
    }

    pub fn lt(&self, other: impl IntoOperand) -> ExprTerm {
        self.cmp(OperationTag::Lt, other)
    }

    pub fn le(&self, other: impl IntoOperand) -> ExprTerm {
        self.cmp(OperationTag::Le, other)
    }

    pub fn gt(&self, other: impl IntoOperand) -> ExprTerm {
        self.cmp(OperationTag::Gt, other)
    }

    pub fn ge(&self, other: impl IntoOperand) -> ExprTerm {
        self.cmp(OperationTag::Ge, other)
    }

    pub fn and(&self, other: impl IntoOperand) -> ExprTerm {
        ExprTerm {
            term: Term::new(
                OperationTag::And,
                vec![
                    TermArg::Term(self.term.clone()),
                    TermArg::Term(other.into_operand()),
                ],
            ),
        }
    }

    pub fn or(&self, other: impl IntoOperand) -> ExprTerm {
        ExprTerm {
            term: Term::new(
                OperationTag::Or,
                vec![
                    TermArg::Term(self.term.clone()),
                    TermArg::Term(other.into_operand()),
                ],
            ),
        }
    }

    pub fn not(&self) -> ExprTerm {
        ExprTerm {
            term: Term::new(OperationTag::Not, vec![TermArg::Term(self.term.clone())]),
        }
    }

    /// Evaluates the expression server-side.
    pub async fn run(&self, client: &Client) -> Result<Value, ClientError> {
        client.run_value(&self.term).await
    }
}

/// A point lookup, runnable to an optional document.
#[derive(Debug, Clone, PartialEq)]
pub struct GetTerm {
    term: Term,
}

impl GetTerm {
    pub fn term(&self) -> &Term {
        &self.term
    }

    pub async fn run(&self, client: &Client) -> Result<Option<Value>, ClientError> {
        client.run_document(&self.term).await
    }
}

/// A count, runnable to a number.
#[derive(Debug, Clone, PartialEq)]
pub struct CountTerm {
    term: Term,
}

impl CountTerm {
    pub fn term(&self) -> &Term {
        &self.term
    }

    pub async fn run(&self, client: &Client) -> Result<u64, ClientError> {
        client.run_count(&self.term).await
    }
}

/// A write (insert/update/delete), runnable to a receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteTerm {
    term: Term,
}

impl WriteTerm {
    pub fn term(&self) -> &Term {
        &self.term
    }

    pub async fn run(&self, client: &Client) -> Result<WriteOutcome, ClientError> {
        client.run_write(&self.term).await
    }

    /// Runs the write through the unified result facade (one-shot result
    /// whose value is the inserted array).
    pub async fn run_result(&self, client: &Client) -> Result<QueryResult, ClientError> {
        client.run(&self.term).await
    }
}

/// A create/drop acknowledgement, runnable to a boolean.
#[derive(Debug, Clone, PartialEq)]
pub struct AckTerm {
    term: Term,
}

impl AckTerm {
    pub fn term(&self) -> &Term {
        &self.term
    }

    pub async fn run(&self, client: &Client) -> Result<bool, ClientError> {
        client.run_ack(&self.term).await
    }
}

/// A name listing, runnable to a vector of names.
#[derive(Debug, Clone, PartialEq)]
pub struct NameListTerm {
    term: Term,
}

impl NameListTerm {
    pub fn term(&self) -> &Term {
        &self.term
    }

    pub async fn run(&self, client: &Client) -> Result<Vec<String>, ClientError> {
        client.run_names(&self.term).await
    }
}
