//! Immutable query AST terms.
//!
//! A [`Term`] is one operation node: an operation tag, an ordered argument
//! list (the receiver term first, then operands), and an options map. Terms
//! are pure values; every chaining call builds a new term and never mutates
//! the receiver, so a term's serialized form is a function of its fields and
//! can be re-encoded idempotently during cursor continuation.
//!
//! [`compile`] lowers a term tree to the wire [`Query`] message.

use crate::error::ClientError;
use quilldb_protocol::{
    ComparisonOp, CursorSpec, Datum, Expression, Query, QueryOp, QueryOptions,
};
use serde_json::Value;
use std::collections::BTreeMap;

/// Operation tags for query terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationTag {
    Database,
    DatabaseCreate,
    DatabaseDrop,
    DatabaseList,
    Table,
    TableCreate,
    TableDrop,
    TableList,
    Get,
    GetAll,
    Filter,
    OrderBy,
    Limit,
    Skip,
    Count,
    Insert,
    Update,
    Delete,
    // Expression terms
    Datum,
    Expr,
    Field,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
}

impl OperationTag {
    pub fn name(&self) -> &'static str {
        match self {
            OperationTag::Database => "database",
            OperationTag::DatabaseCreate => "databaseCreate",
            OperationTag::DatabaseDrop => "databaseDrop",
            OperationTag::DatabaseList => "databaseList",
            OperationTag::Table => "table",
            OperationTag::TableCreate => "tableCreate",
            OperationTag::TableDrop => "tableDrop",
            OperationTag::TableList => "tableList",
            OperationTag::Get => "get",
            OperationTag::GetAll => "getAll",
            OperationTag::Filter => "filter",
            OperationTag::OrderBy => "orderBy",
            OperationTag::Limit => "limit",
            OperationTag::Skip => "skip",
            OperationTag::Count => "count",
            OperationTag::Insert => "insert",
            OperationTag::Update => "update",
            OperationTag::Delete => "delete",
            OperationTag::Datum => "datum",
            OperationTag::Expr => "expr",
            OperationTag::Field => "field",
            OperationTag::Eq => "eq",
            OperationTag::Ne => "ne",
            OperationTag::Lt => "lt",
            OperationTag::Le => "le",
            OperationTag::Gt => "gt",
            OperationTag::Ge => "ge",
            OperationTag::And => "and",
            OperationTag::Or => "or",
            OperationTag::Not => "not",
        }
    }
}

/// One argument of a term: a literal scalar, a nested term, or a sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum TermArg {
    Value(Value),
    Term(Term),
    List(Vec<TermArg>),
}

impl TermArg {
    fn to_ast(&self) -> Value {
        match self {
            TermArg::Value(v) => v.clone(),
            TermArg::Term(t) => t.to_ast(),
            TermArg::List(items) => Value::Array(items.iter().map(TermArg::to_ast).collect()),
        }
    }
}

/// An immutable query AST node.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    op: OperationTag,
    args: Vec<TermArg>,
    options: BTreeMap<String, Value>,
}

impl Term {
    pub fn new(op: OperationTag, args: Vec<TermArg>) -> Self {
        Self {
            op,
            args,
            options: BTreeMap::new(),
        }
    }

    /// Returns a new term with one extra option set.
    pub fn with_option(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut term = self.clone();
        term.options.insert(key.into(), value.into());
        term
    }

    pub fn op(&self) -> OperationTag {
        self.op
    }

    /// Resolves the term to its AST form: `[op, args, options?]`.
    ///
    /// Nested terms resolve recursively; scalar args pass through unchanged.
    pub fn to_ast(&self) -> Value {
        let args: Vec<Value> = self.args.iter().map(TermArg::to_ast).collect();
        let mut ast = vec![Value::String(self.op.name().to_string()), Value::Array(args)];
        if !self.options.is_empty() {
            ast.push(Value::Object(
                self.options
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ));
        }
        Value::Array(ast)
    }

    fn arg(&self, index: usize) -> Result<&TermArg, ClientError> {
        self.args.get(index).ok_or_else(|| {
            ClientError::InvalidQuery(format!(
                "{}: missing argument {index}",
                self.op.name()
            ))
        })
    }

    fn term_arg(&self, index: usize) -> Result<&Term, ClientError> {
        match self.arg(index)? {
            TermArg::Term(t) => Ok(t),
            _ => Err(ClientError::InvalidQuery(format!(
                "{}: argument {index} must be a term",
                self.op.name()
            ))),
        }
    }

    fn value_arg(&self, index: usize) -> Result<&Value, ClientError> {
        match self.arg(index)? {
            TermArg::Value(v) => Ok(v),
            _ => Err(ClientError::InvalidQuery(format!(
                "{}: argument {index} must be a literal",
                self.op.name()
            ))),
        }
    }

    fn string_arg(&self, index: usize) -> Result<String, ClientError> {
        self.value_arg(index)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                ClientError::InvalidQuery(format!(
                    "{}: argument {index} must be a string",
                    self.op.name()
                ))
            })
    }

    fn count_arg(&self, index: usize) -> Result<u64, ClientError> {
        self.value_arg(index)?.as_u64().ok_or_else(|| {
            ClientError::InvalidQuery(format!(
                "{}: argument {index} must be a non-negative integer",
                self.op.name()
            ))
        })
    }

    fn list_arg(&self, index: usize) -> Result<&[TermArg], ClientError> {
        match self.arg(index)? {
            TermArg::List(items) => Ok(items),
            _ => Err(ClientError::InvalidQuery(format!(
                "{}: argument {index} must be a sequence",
                self.op.name()
            ))),
        }
    }
}

/// Classifies an operand of a comparison/logical term.
///
/// `null` and primitives become a datum literal term; any other object or
/// array becomes a generic expr literal term. The boolean arm comes before
/// the composite arm so booleans are never folded into the object case.
pub fn normalize_operand(value: Value) -> Term {
    match &value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            Term::new(OperationTag::Datum, vec![TermArg::Value(value)])
        }
        Value::Array(_) | Value::Object(_) => {
            Term::new(OperationTag::Expr, vec![TermArg::Value(value)])
        }
    }
}

/// Lowers a term tree to a wire query.
///
/// The top-level term's options map becomes the query's execution options.
pub fn compile(term: &Term) -> Result<Query, ClientError> {
    let mut query = Query::new(compile_op(term)?);

    let timeout_ms = term.options.get("timeoutMs").and_then(Value::as_u64);
    let explain = term.options.get("explain").and_then(Value::as_bool);
    if timeout_ms.is_some() || explain.is_some() {
        query = query.with_options(QueryOptions {
            timeout_ms,
            explain,
        });
    }
    if let Some(batch_size) = term.options.get("batchSize").and_then(Value::as_u64) {
        query = query.with_cursor(CursorSpec {
            start_key: None,
            batch_size: Some(batch_size as u32),
        });
    }
    Ok(query)
}

fn source_of(term: &Term, index: usize) -> Result<Box<QueryOp>, ClientError> {
    Ok(Box::new(compile_op(term.term_arg(index)?)?))
}

fn compile_op(term: &Term) -> Result<QueryOp, ClientError> {
    let op = match term.op {
        OperationTag::Database => QueryOp::Database {
            name: term.string_arg(0)?,
        },
        OperationTag::DatabaseCreate => QueryOp::DatabaseCreate {
            name: term.string_arg(0)?,
        },
        OperationTag::DatabaseDrop => QueryOp::DatabaseDrop {
            name: term.string_arg(0)?,
        },
        OperationTag::DatabaseList => QueryOp::DatabaseList {},
        OperationTag::Table => QueryOp::Table {
            source: source_of(term, 0)?,
            name: term.string_arg(1)?,
        },
        OperationTag::TableCreate => QueryOp::TableCreate {
            source: source_of(term, 0)?,
            name: term.string_arg(1)?,
        },
        OperationTag::TableDrop => QueryOp::TableDrop {
            source: source_of(term, 0)?,
            name: term.string_arg(1)?,
        },
        OperationTag::TableList => QueryOp::TableList {
            source: source_of(term, 0)?,
        },
        OperationTag::Get => QueryOp::Get {
            source: source_of(term, 0)?,
            key: Datum::from_json(term.value_arg(1)?),
        },
        OperationTag::GetAll => QueryOp::GetAll {
            source: source_of(term, 0)?,
            keys: term
                .list_arg(1)?
                .iter()
                .map(|arg| match arg {
                    TermArg::Value(v) => Ok(Datum::from_json(v)),
                    _ => Err(ClientError::InvalidQuery(
                        "getAll: keys must be literals".to_string(),
                    )),
                })
                .collect::<Result<_, _>>()?,
        },
        OperationTag::Filter => QueryOp::Filter {
            source: source_of(term, 0)?,
            predicate: compile_expr(term.term_arg(1)?)?,
        },
        OperationTag::OrderBy => QueryOp::OrderBy {
            source: source_of(term, 0)?,
            field: term.string_arg(1)?,
            descending: term
                .options
                .get("descending")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        },
        OperationTag::Limit => QueryOp::Limit {
            source: source_of(term, 0)?,
            count: term.count_arg(1)?,
        },
        OperationTag::Skip => QueryOp::Skip {
            source: source_of(term, 0)?,
            count: term.count_arg(1)?,
        },
        OperationTag::Count => QueryOp::Count {
            source: source_of(term, 0)?,
        },
        OperationTag::Insert => QueryOp::Insert {
            source: source_of(term, 0)?,
            documents: term
                .list_arg(1)?
                .iter()
                .map(|arg| match arg {
                    TermArg::Value(v) => Ok(Datum::from_json(v)),
                    _ => Err(ClientError::InvalidQuery(
                        "insert: documents must be literals".to_string(),
                    )),
                })
                .collect::<Result<_, _>>()?,
        },
        OperationTag::Update => QueryOp::Update {
            source: source_of(term, 0)?,
            patch: Datum::from_json(term.value_arg(1)?),
        },
        OperationTag::Delete => QueryOp::Delete {
            source: source_of(term, 0)?,
        },
        OperationTag::Datum
        | OperationTag::Expr
        | OperationTag::Field
        | OperationTag::Eq
        | OperationTag::Ne
        | OperationTag::Lt
        | OperationTag::Le
        | OperationTag::Gt
        | OperationTag::Ge
        | OperationTag::And
        | OperationTag::Or
        | OperationTag::Not => QueryOp::Expression {
            expr: compile_expr(term)?,
        },
    };
    Ok(op)
}

fn comparison(term: &Term, op: ComparisonOp) -> Result<Expression, ClientError> {
    Ok(Expression::Cmp {
        op,
        left: Box::new(compile_expr(term.term_arg(0)?)?),
        right: Box::new(compile_expr(term.term_arg(1)?)?),
    })
}

fn operand_list(term: &Term) -> Result<Vec<Expression>, ClientError> {
    term.args
        .iter()
        .map(|arg| match arg {
            TermArg::Term(t) => compile_expr(t),
            _ => Err(ClientError::InvalidQuery(format!(
                "{}: operands must be terms",
                term.op.name()
            ))),
        })
        .collect()
}

fn compile_expr(term: &Term) -> Result<Expression, ClientError> {
    let expr = match term.op {
        OperationTag::Datum | OperationTag::Expr => Expression::Literal {
            value: Datum::from_json(term.value_arg(0)?),
        },
        OperationTag::Field => Expression::Field {
            name: term.string_arg(0)?,
        },
        OperationTag::Eq => comparison(term, ComparisonOp::Eq)?,
        OperationTag::Ne => comparison(term, ComparisonOp::Ne)?,
        OperationTag::Lt => comparison(term, ComparisonOp::Lt)?,
        OperationTag::Le => comparison(term, ComparisonOp::Le)?,
        OperationTag::Gt => comparison(term, ComparisonOp::Gt)?,
        OperationTag::Ge => comparison(term, ComparisonOp::Ge)?,
        OperationTag::And => Expression::And {
            operands: operand_list(term)?,
        },
        OperationTag::Or => Expression::Or {
            operands: operand_list(term)?,
        },
        OperationTag::Not => Expression::Not {
            operand: Box::new(compile_expr(term.term_arg(0)?)?),
        },
        other => {
            return Err(ClientError::InvalidQuery(format!(
                "{}: not an expression term",
                other.name()
            )))
        }
    };
    Ok(expr)
}
