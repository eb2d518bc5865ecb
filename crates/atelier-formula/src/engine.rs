//! Tree-walking evaluation of row formulas.
//!
//! Evaluation only reads: the row's own fields and the named parameters of the [`EvalContext`].
//! [`try_evaluate`] reports failures; [`evaluate`] is the grid-facing variant that turns any
//! failure into `0`.

use crate::coercion::normalize_key;
use crate::parser::{BinaryOp, Expr, UnaryOp};
use crate::value::Value;
use atelier_model::{FieldValue, Row};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

pub type FormulaResult<T> = Result<T, FormulaError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("{function} expects {expected} arguments, got {actual}")]
    Arity {
        function: String,
        expected: &'static str,
        actual: usize,
    },
}

/// Read-only context of one evaluation.
#[derive(Clone, Copy, Debug, Default)]
pub struct EvalContext<'a> {
    params: Option<&'a HashMap<String, f64>>,
}

impl<'a> EvalContext<'a> {
    pub fn new(params: &'a HashMap<String, f64>) -> Self {
        Self {
            params: Some(params),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// `PARAM.<name>`; unknown parameters read as `0`.
    fn param(&self, name: &str) -> f64 {
        self.params
            .and_then(|params| params.get(name))
            .copied()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }
}

/// A parsed formula, reusable across rows.
#[derive(Clone, Debug, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> FormulaResult<Self> {
        Ok(Self {
            source: source.to_string(),
            expr: crate::parser::parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Names of the fields this formula reads. Braced references are returned as written, bare
    /// identifiers in their normalized-key form.
    pub fn references(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.expr.visit_references(&mut |name| {
            out.insert(name);
        });
        out
    }

    /// Evaluate against `row` and shape the result (finite number, verbatim text, or empty).
    pub fn evaluate(&self, row: &Row, ctx: &EvalContext<'_>) -> FormulaResult<Value> {
        let interpreter = Interpreter { row, ctx };
        Ok(interpreter.eval(&self.expr)?.finish())
    }
}

/// Parse and evaluate `source` against `row`, reporting failures.
pub fn try_evaluate(source: &str, row: &Row, ctx: &EvalContext<'_>) -> FormulaResult<Value> {
    Formula::parse(source)?.evaluate(row, ctx)
}

/// Parse and evaluate `source` against `row`. Never fails: any error evaluates to `0`.
pub fn evaluate(source: &str, row: &Row, ctx: &EvalContext<'_>) -> Value {
    match try_evaluate(source, row, ctx) {
        Ok(value) => value,
        Err(err) => {
            log::debug!("formula {source:?} on row {} evaluated to 0: {err}", row.id);
            Value::Number(0.0)
        }
    }
}

struct Interpreter<'r, 'c> {
    row: &'r Row,
    ctx: &'c EvalContext<'c>,
}

impl Interpreter<'_, '_> {
    fn eval(&self, expr: &Expr) -> FormulaResult<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Text(s) => Ok(Value::Text(s.clone())),
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),
            Expr::Field(name) => Ok(self
                .row
                .get(name)
                .or_else(|| lookup_normalized(self.row, &normalize_key(name)))
                .map_or(Value::Empty, Value::from_field)),
            Expr::Identifier(name) => lookup_normalized(self.row, name)
                .map(Value::from_field)
                .ok_or_else(|| FormulaError::UnknownIdentifier(name.clone())),
            Expr::Param(name) => Ok(Value::Number(self.ctx.param(name))),
            Expr::UnaryOp { op, expr } => {
                let value = self.eval(expr)?;
                Ok(match op {
                    UnaryOp::Negate => Value::Number(-value.coerce_number()),
                    UnaryOp::Plus => Value::Number(value.coerce_number()),
                    UnaryOp::Not => Value::Boolean(!value.truthy()),
                })
            }
            Expr::BinaryOp {
                op: BinaryOp::And,
                left,
                right,
            } => {
                // Short-circuit, returning the deciding operand.
                let left = self.eval(left)?;
                if !left.truthy() {
                    return Ok(left);
                }
                self.eval(right)
            }
            Expr::BinaryOp {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                let left = self.eval(left)?;
                if left.truthy() {
                    return Ok(left);
                }
                self.eval(right)
            }
            Expr::BinaryOp { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(eval_binary(*op, &left, &right))
            }
            Expr::Call { name, args } => self.eval_call(name, args),
        }
    }

    fn eval_numbers(&self, args: &[Expr]) -> FormulaResult<Vec<f64>> {
        args.iter()
            .map(|arg| Ok(self.eval(arg)?.normalized()))
            .collect()
    }

    fn eval_call(&self, name: &str, args: &[Expr]) -> FormulaResult<Value> {
        let upper = name.to_ascii_uppercase();
        match upper.as_str() {
            "IF" => {
                check_arity(&upper, args, 2, 3, "2 or 3")?;
                if self.eval(&args[0])?.truthy() {
                    self.eval(&args[1])
                } else if let Some(otherwise) = args.get(2) {
                    self.eval(otherwise)
                } else {
                    Ok(Value::Empty)
                }
            }
            "NVL" => {
                check_arity(&upper, args, 1, 2, "1 or 2")?;
                let value = self.eval(&args[0])?;
                if value.is_empty() {
                    match args.get(1) {
                        Some(default) => Ok(Value::Number(self.eval(default)?.normalized())),
                        None => Ok(Value::Number(0.0)),
                    }
                } else {
                    Ok(Value::Number(value.normalized()))
                }
            }
            "ROUND" | "ROUNDUP" => {
                check_arity(&upper, args, 1, 2, "1 or 2")?;
                let nums = self.eval_numbers(args)?;
                let digits = nums.get(1).copied().unwrap_or(0.0).trunc() as i32;
                let mode = if upper == "ROUND" {
                    RoundMode::Nearest
                } else {
                    RoundMode::Ceiling
                };
                Ok(Value::Number(round_with_mode(nums[0], digits, mode)))
            }
            "CEIL" | "FLOOR" | "ABS" => {
                check_arity(&upper, args, 1, 1, "1")?;
                let n = self.eval(&args[0])?.normalized();
                Ok(Value::Number(match upper.as_str() {
                    "CEIL" => round_with_mode(n, 0, RoundMode::Ceiling),
                    "FLOOR" => n.floor(),
                    _ => n.abs(),
                }))
            }
            "MIN" | "MAX" => {
                check_arity(&upper, args, 1, usize::MAX, "at least 1")?;
                let nums = self.eval_numbers(args)?;
                let folded = if upper == "MIN" {
                    nums.into_iter().fold(f64::INFINITY, f64::min)
                } else {
                    nums.into_iter().fold(f64::NEG_INFINITY, f64::max)
                };
                Ok(Value::Number(folded))
            }
            "AND" | "OR" => {
                check_arity(&upper, args, 1, usize::MAX, "at least 1")?;
                let want = upper == "OR";
                for arg in args {
                    if self.eval(arg)?.truthy() == want {
                        return Ok(Value::Boolean(want));
                    }
                }
                Ok(Value::Boolean(!want))
            }
            "NOT" => {
                check_arity(&upper, args, 1, 1, "1")?;
                Ok(Value::Boolean(!self.eval(&args[0])?.truthy()))
            }
            _ => Err(FormulaError::UnknownFunction(name.to_string())),
        }
    }
}

fn check_arity(
    function: &str,
    args: &[Expr],
    min: usize,
    max: usize,
    expected: &'static str,
) -> FormulaResult<()> {
    if args.len() < min || args.len() > max {
        return Err(FormulaError::Arity {
            function: function.to_string(),
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

/// Row field whose normalized key equals `ident`.
fn lookup_normalized<'r>(row: &'r Row, ident: &str) -> Option<&'r FieldValue> {
    if let Some(value) = row.get(ident) {
        if normalize_key(ident) == ident {
            return Some(value);
        }
    }
    row.fields()
        .find(|(key, _)| normalize_key(key) == ident)
        .map(|(_, value)| value)
}

fn eval_binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide => {
            let l = left.coerce_number();
            let r = right.coerce_number();
            Value::Number(match op {
                BinaryOp::Add => l + r,
                BinaryOp::Subtract => l - r,
                BinaryOp::Multiply => l * r,
                // x / 0 is non-finite and ends up as an empty result.
                _ => l / r,
            })
        }
        _ => {
            let ordering = compare_values(left, right);
            Value::Boolean(match op {
                BinaryOp::Equals => ordering == Some(Ordering::Equal),
                BinaryOp::NotEquals => ordering != Some(Ordering::Equal),
                BinaryOp::Less => ordering == Some(Ordering::Less),
                BinaryOp::LessEquals => {
                    matches!(ordering, Some(Ordering::Less | Ordering::Equal))
                }
                BinaryOp::Greater => ordering == Some(Ordering::Greater),
                _ => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            })
        }
    }
}

/// Text compares with text, everything else numerically. `None` when incomparable (`NaN`).
fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Text(l), Value::Text(r)) => Some(l.cmp(r)),
        (Value::Empty, Value::Text(r)) => Some("".cmp(r.as_str())),
        (Value::Text(l), Value::Empty) => Some(l.as_str().cmp("")),
        _ => left.coerce_number().partial_cmp(&right.coerce_number()),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RoundMode {
    /// Halves go up: 2.5 -> 3, -2.5 -> -2.
    Nearest,
    Ceiling,
}

fn round_with_mode(n: f64, digits: i32, mode: RoundMode) -> f64 {
    let factor = 10f64.powi(digits.saturating_abs());
    if !factor.is_finite() || factor == 0.0 {
        return n;
    }

    let scaled = if digits >= 0 { n * factor } else { n / factor };
    let rounded = match mode {
        RoundMode::Nearest => (scaled + 0.5).floor(),
        RoundMode::Ceiling => {
            // Absorb binary noise so 2.3 * 100 (= 229.99999999999997) does not ceil to 231.
            let nearest = scaled.round();
            if (scaled - nearest).abs() < 1e-9 {
                nearest
            } else {
                scaled.ceil()
            }
        }
    };
    if digits >= 0 {
        rounded / factor
    } else {
        rounded * factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row() -> Row {
        Row::new("r1")
            .with("largeur", 120.0)
            .with("hauteur", "250")
            .with("Ampleur Rideau", "2,5")
            .with("produit", "Rideau")
            .with("double", true)
            .with("vide", "")
    }

    fn eval(src: &str) -> Value {
        evaluate(src, &row(), &EvalContext::empty())
    }

    #[test]
    fn arithmetic_over_fields() {
        assert_eq!(eval("largeur + 10"), Value::Number(130.0));
        assert_eq!(eval("={largeur} * 2 - hauteur / 5"), Value::Number(190.0));
        assert_eq!(eval("-largeur"), Value::Number(-120.0));
    }

    #[test]
    fn bare_identifiers_match_normalized_keys() {
        assert_eq!(eval("ampleur_rideau * 2"), Value::Number(5.0));
        assert_eq!(eval("{Ampleur Rideau} * 2"), Value::Number(5.0));
    }

    #[test]
    fn unknown_identifier_is_an_error_but_braced_missing_field_is_empty() {
        let err = try_evaluate("largeur + inconnu", &row(), &EvalContext::empty()).unwrap_err();
        assert_eq!(err, FormulaError::UnknownIdentifier("inconnu".into()));
        assert_eq!(eval("largeur + inconnu"), Value::Number(0.0));
        assert_eq!(eval("largeur + {inconnu}"), Value::Number(120.0));
    }

    #[test]
    fn text_fields_read_as_numbers() {
        // "Rideau" has no digits.
        assert_eq!(eval("produit + 1"), Value::Number(1.0));
    }

    #[test]
    fn text_results_are_returned_verbatim() {
        assert_eq!(eval(r#"IF(largeur > 100, "Paire", "Unité")"#), Value::from("Paire"));
        assert_eq!(eval(r#"IF(double, "Oui", "Non")"#), Value::from("Oui"));
        assert_eq!(eval(r#""42""#), Value::Number(42.0));
    }

    #[test]
    fn if_without_else_is_empty() {
        assert_eq!(eval("IF(largeur < 100, 1)"), Value::Empty);
    }

    #[test]
    fn nvl_defaults_blank_values() {
        assert_eq!(eval("NVL(vide, 7)"), Value::Number(7.0));
        assert_eq!(eval("NVL({absent}, 3)"), Value::Number(3.0));
        assert_eq!(eval("NVL({absent})"), Value::Number(0.0));
        assert_eq!(eval("NVL(largeur, 7)"), Value::Number(120.0));
    }

    #[test]
    fn rounding_functions() {
        assert_eq!(eval("ROUND(2.346, 2)"), Value::Number(2.35));
        assert_eq!(eval("ROUND(2.5)"), Value::Number(3.0));
        assert_eq!(eval("ROUND(-2.5)"), Value::Number(-2.0));
        assert_eq!(eval("ROUND(-2.51)"), Value::Number(-3.0));
        assert_eq!(eval("ROUNDUP(2.01)"), Value::Number(3.0));
        assert_eq!(eval("ROUNDUP(2.3, 2)"), Value::Number(2.3));
        assert_eq!(eval("roundup(4)"), Value::Number(4.0));
        assert_eq!(eval("CEIL(1.2)"), Value::Number(2.0));
        // Both ceilings absorb float noise the same way.
        assert_eq!(eval("CEIL(0.1 * 3 * 10)"), Value::Number(3.0));
        assert_eq!(eval("CEIL(0.1 * 3 * 10)"), eval("ROUNDUP(0.1 * 3 * 10)"));
        assert_eq!(eval("FLOOR(1.8)"), Value::Number(1.0));
        assert_eq!(eval("ABS(-4)"), Value::Number(4.0));
    }

    #[test]
    fn min_max_normalize_arguments() {
        assert_eq!(eval(r#"MAX(1, "3,5", largeur)"#), Value::Number(120.0));
        assert_eq!(eval(r#"MIN(1, "3,5", vide)"#), Value::Number(0.0));
        assert_eq!(eval("MAX()"), Value::Number(0.0));
    }

    #[test]
    fn logical_operators_short_circuit() {
        assert_eq!(eval("vide || 5"), Value::Number(5.0));
        assert_eq!(eval("0 && inconnu"), Value::Number(0.0));
        assert_eq!(eval("AND(largeur > 100, double)"), Value::Number(1.0));
        assert_eq!(eval("OR(largeur > 500, !double)"), Value::Number(0.0));
        assert_eq!(eval("NOT(vide)"), Value::Number(1.0));
    }

    #[test]
    fn comparisons() {
        assert_eq!(eval("largeur = 120"), Value::Number(1.0));
        assert_eq!(eval("largeur <> 120"), Value::Number(0.0));
        assert_eq!(eval(r#""b" > "a""#), Value::Number(1.0));
        assert_eq!(eval(r#"vide = """#), Value::Number(1.0));
    }

    #[test]
    fn division_by_zero_is_empty() {
        assert_eq!(eval("largeur / 0"), Value::Empty);
    }

    #[test]
    fn params_read_as_numbers() {
        let params = HashMap::from([("coef".to_string(), 1.5)]);
        let ctx = EvalContext::new(&params);
        assert_eq!(
            evaluate("largeur * PARAM.coef", &row(), &ctx),
            Value::Number(180.0)
        );
        assert_eq!(
            evaluate("largeur + PARAM.absent", &row(), &ctx),
            Value::Number(120.0)
        );
    }

    #[test]
    fn errors_never_escape_evaluate() {
        assert_eq!(eval("this is not valid + {{{"), Value::Number(0.0));
        assert_eq!(eval("FOO(1)"), Value::Number(0.0));
        assert_eq!(eval("IF(1)"), Value::Number(0.0));
        assert!(matches!(
            try_evaluate("IF(1)", &row(), &EvalContext::empty()),
            Err(FormulaError::Arity { .. })
        ));
    }

    #[test]
    fn references_lists_braced_and_bare_names() {
        let formula = Formula::parse(r#"IF({ml tissu} > 0, largeur * PARAM.k, "hauteur")"#).unwrap();
        let refs: Vec<&str> = formula.references().into_iter().collect();
        assert_eq!(refs, vec!["largeur", "ml tissu"]);
    }
}
