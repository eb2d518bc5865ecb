//! Row formula language: numeric normalization, parsing and evaluation.
//!
//! Formulas are parsed into an [`Expr`] tree and interpreted against a read-only view of one
//! [`atelier_model::Row`]. There is no code generation and no access to anything but the row and
//! the named parameters of the [`EvalContext`].

mod coercion;
mod engine;
mod parser;
mod value;

pub use crate::coercion::{normalize, normalize_key, normalize_number, normalize_str};
pub use crate::engine::{evaluate, try_evaluate, EvalContext, Formula, FormulaError, FormulaResult};
pub use crate::parser::{parse, BinaryOp, Expr, UnaryOp};
pub use crate::value::Value;
