//! Data-driven style expressions.
//!
//! A typed subset of the MapLibre expression language: enough to express
//! building paint (`match` on type, `case` on `has`, `feature-state`) and the
//! legacy `["==", "$type", "Polygon"]` layer filter. Expressions serialize to
//! and from the JSON array form used in style documents.

use std::fmt;

use scene::components::{AttributeValue, Attributes};
use scene::feature_state::FeatureState;
use serde_json::{Value as Json, json};

pub type Value = AttributeValue;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum GeometryType {
    Point,
    LineString,
    #[default]
    Polygon,
}

impl GeometryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::LineString => "LineString",
            GeometryType::Polygon => "Polygon",
        }
    }
}

/// Everything an expression may read about the feature being styled.
#[derive(Debug, Copy, Clone)]
pub struct EvalContext<'a> {
    pub attributes: &'a Attributes,
    pub state: FeatureState,
    pub geometry_type: GeometryType,
}

impl<'a> EvalContext<'a> {
    pub fn new(attributes: &'a Attributes) -> Self {
        Self {
            attributes,
            state: FeatureState::default(),
            geometry_type: GeometryType::Polygon,
        }
    }

    pub fn with_state(mut self, state: FeatureState) -> Self {
        self.state = state;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    Get(String),
    Has(String),
    FeatureState(String),
    /// `["boolean", input, fallback]`: `input` if it is a boolean, else `fallback`.
    Boolean(Box<Expression>, bool),
    Match {
        input: Box<Expression>,
        arms: Vec<(Value, Expression)>,
        fallback: Box<Expression>,
    },
    Case {
        branches: Vec<(Expression, Expression)>,
        fallback: Box<Expression>,
    },
    Mul(Vec<Expression>),
    Coalesce(Vec<Expression>),
    GeometryTypeEq(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionError {
    UnknownOperator(String),
    Arity { op: &'static str, got: usize },
    Invalid(String),
}

impl fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionError::UnknownOperator(op) => write!(f, "unknown expression operator: {op}"),
            ExpressionError::Arity { op, got } => {
                write!(f, "wrong number of arguments for {op}: got {got}")
            }
            ExpressionError::Invalid(msg) => write!(f, "invalid expression: {msg}"),
        }
    }
}

impl std::error::Error for ExpressionError {}

impl Expression {
    pub fn literal(v: impl Into<Value>) -> Self {
        Expression::Literal(v.into())
    }

    pub fn get(key: impl Into<String>) -> Self {
        Expression::Get(key.into())
    }

    pub fn has(key: impl Into<String>) -> Self {
        Expression::Has(key.into())
    }

    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Value {
        match self {
            Expression::Literal(v) => v.clone(),
            Expression::Get(key) => ctx.attributes.get(key).cloned().unwrap_or(Value::Null),
            Expression::Has(key) => Value::Bool(ctx.attributes.has(key)),
            Expression::FeatureState(key) => match key.as_str() {
                "selected" => Value::Bool(ctx.state.selected),
                _ => Value::Null,
            },
            Expression::Boolean(input, fallback) => match input.evaluate(ctx) {
                Value::Bool(b) => Value::Bool(b),
                _ => Value::Bool(*fallback),
            },
            Expression::Match {
                input,
                arms,
                fallback,
            } => {
                let v = input.evaluate(ctx);
                arms.iter()
                    .find(|(label, _)| *label == v)
                    .map(|(_, out)| out.evaluate(ctx))
                    .unwrap_or_else(|| fallback.evaluate(ctx))
            }
            Expression::Case { branches, fallback } => branches
                .iter()
                .find(|(cond, _)| cond.evaluate(ctx) == Value::Bool(true))
                .map(|(_, out)| out.evaluate(ctx))
                .unwrap_or_else(|| fallback.evaluate(ctx)),
            Expression::Mul(args) => {
                let mut product = 1.0;
                for arg in args {
                    match arg.evaluate(ctx).as_f64() {
                        Some(n) => product *= n,
                        None => return Value::Null,
                    }
                }
                Value::Number(product)
            }
            Expression::Coalesce(args) => args
                .iter()
                .map(|a| a.evaluate(ctx))
                .find(|v| *v != Value::Null)
                .unwrap_or(Value::Null),
            Expression::GeometryTypeEq(t) => Value::Bool(ctx.geometry_type.as_str() == t),
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Expression::Literal(v) => literal_to_json(v),
            Expression::Get(key) => json!(["get", key]),
            Expression::Has(key) => json!(["has", key]),
            Expression::FeatureState(key) => json!(["feature-state", key]),
            Expression::Boolean(input, fallback) => json!(["boolean", input.to_json(), fallback]),
            Expression::Match {
                input,
                arms,
                fallback,
            } => {
                let mut out = vec![json!("match"), input.to_json()];
                for (label, value) in arms {
                    out.push(literal_to_json(label));
                    out.push(value.to_json());
                }
                out.push(fallback.to_json());
                Json::Array(out)
            }
            Expression::Case { branches, fallback } => {
                let mut out = vec![json!("case")];
                for (cond, value) in branches {
                    out.push(cond.to_json());
                    out.push(value.to_json());
                }
                out.push(fallback.to_json());
                Json::Array(out)
            }
            Expression::Mul(args) => operator_json("*", args),
            Expression::Coalesce(args) => operator_json("coalesce", args),
            Expression::GeometryTypeEq(t) => json!(["==", "$type", t]),
        }
    }

    pub fn from_json(value: &Json) -> Result<Self, ExpressionError> {
        let items = match value {
            Json::Array(items) => items,
            Json::Object(_) => {
                return Err(ExpressionError::Invalid("objects are not expressions".into()));
            }
            other => return Ok(Expression::Literal(json_to_literal(other)?)),
        };
        let Some(op) = items.first().and_then(Json::as_str) else {
            return Err(ExpressionError::Invalid("expression must start with an operator".into()));
        };
        let args = &items[1..];

        match op {
            "literal" => match args {
                [v] => Ok(Expression::Literal(json_to_literal(v)?)),
                _ => Err(ExpressionError::Arity { op: "literal", got: args.len() }),
            },
            "get" => Ok(Expression::Get(single_key("get", args)?)),
            "has" => Ok(Expression::Has(single_key("has", args)?)),
            "feature-state" => Ok(Expression::FeatureState(single_key("feature-state", args)?)),
            "boolean" => match args {
                [input, Json::Bool(fallback)] => {
                    Ok(Expression::Boolean(Box::new(Self::from_json(input)?), *fallback))
                }
                [input] => Ok(Expression::Boolean(Box::new(Self::from_json(input)?), false)),
                _ => Err(ExpressionError::Arity { op: "boolean", got: args.len() }),
            },
            "match" => {
                // input, (label, output)*, fallback
                if args.len() < 4 || args.len() % 2 != 0 {
                    return Err(ExpressionError::Arity { op: "match", got: args.len() });
                }
                let input = Box::new(Self::from_json(&args[0])?);
                let fallback = Box::new(Self::from_json(&args[args.len() - 1])?);
                let arms = args[1..args.len() - 1]
                    .chunks(2)
                    .map(|pair| -> Result<_, ExpressionError> {
                        Ok((json_to_literal(&pair[0])?, Self::from_json(&pair[1])?))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expression::Match {
                    input,
                    arms,
                    fallback,
                })
            }
            "case" => {
                if args.len() < 3 || args.len() % 2 == 0 {
                    return Err(ExpressionError::Arity { op: "case", got: args.len() });
                }
                let fallback = Box::new(Self::from_json(&args[args.len() - 1])?);
                let branches = args[..args.len() - 1]
                    .chunks(2)
                    .map(|pair| -> Result<_, ExpressionError> {
                        Ok((Self::from_json(&pair[0])?, Self::from_json(&pair[1])?))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expression::Case { branches, fallback })
            }
            "*" => Ok(Expression::Mul(parse_args("*", args)?)),
            "coalesce" => Ok(Expression::Coalesce(parse_args("coalesce", args)?)),
            "==" => match args {
                [Json::String(lhs), Json::String(t)] if lhs == "$type" => {
                    Ok(Expression::GeometryTypeEq(t.clone()))
                }
                _ => Err(ExpressionError::Invalid("only [\"==\", \"$type\", <type>] is supported".into())),
            },
            other => Err(ExpressionError::UnknownOperator(other.to_string())),
        }
    }
}

fn operator_json(op: &str, args: &[Expression]) -> Json {
    let mut out = vec![json!(op)];
    out.extend(args.iter().map(Expression::to_json));
    Json::Array(out)
}

fn parse_args(op: &'static str, args: &[Json]) -> Result<Vec<Expression>, ExpressionError> {
    if args.is_empty() {
        return Err(ExpressionError::Arity { op, got: 0 });
    }
    args.iter().map(Expression::from_json).collect()
}

fn single_key(op: &'static str, args: &[Json]) -> Result<String, ExpressionError> {
    match args {
        [Json::String(key)] => Ok(key.clone()),
        [_] => Err(ExpressionError::Invalid(format!("{op} expects a string key"))),
        _ => Err(ExpressionError::Arity { op, got: args.len() }),
    }
}

fn literal_to_json(v: &Value) -> Json {
    match v {
        Value::Null => Json::Null,
        Value::Bool(b) => json!(b),
        Value::String(s) => json!(s),
        Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => json!(*n as i64),
        Value::Number(n) => json!(n),
    }
}

fn json_to_literal(v: &Json) -> Result<Value, ExpressionError> {
    match v {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => n
            .as_f64()
            .map(Value::Number)
            .ok_or_else(|| ExpressionError::Invalid(format!("number out of range: {n}"))),
        Json::String(s) => Ok(Value::String(s.clone())),
        Json::Array(_) | Json::Object(_) => {
            Err(ExpressionError::Invalid("expected a literal value".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EvalContext, Expression, ExpressionError, GeometryType, Value};
    use pretty_assertions::assert_eq;
    use scene::components::Attributes;
    use scene::feature_state::FeatureState;
    use serde_json::json;

    fn height_expr() -> Expression {
        Expression::Case {
            branches: vec![
                (Expression::has("height"), Expression::get("height")),
                (
                    Expression::has("levels"),
                    Expression::Mul(vec![Expression::get("levels"), Expression::literal(3.0)]),
                ),
            ],
            fallback: Box::new(Expression::literal(15.0)),
        }
    }

    fn eval(expr: &Expression, attrs: &Attributes) -> Value {
        expr.evaluate(&EvalContext::new(attrs))
    }

    #[test]
    fn case_height_rules() {
        let expr = height_expr();
        let tall: Attributes = [("height", 42.0)].into_iter().collect();
        let levels: Attributes = [("levels", 3.0)].into_iter().collect();
        assert_eq!(eval(&expr, &tall), Value::Number(42.0));
        assert_eq!(eval(&expr, &levels), Value::Number(9.0));
        assert_eq!(eval(&expr, &Attributes::new()), Value::Number(15.0));
    }

    #[test]
    fn match_falls_back() {
        let expr = Expression::Match {
            input: Box::new(Expression::get("type")),
            arms: vec![(Value::from("office"), Expression::literal("#998b7d"))],
            fallback: Box::new(Expression::literal("#a1907f")),
        };
        let office: Attributes = [("type", "office")].into_iter().collect();
        let church: Attributes = [("type", "church")].into_iter().collect();
        assert_eq!(eval(&expr, &office), Value::from("#998b7d"));
        assert_eq!(eval(&expr, &church), Value::from("#a1907f"));
        assert_eq!(eval(&expr, &Attributes::new()), Value::from("#a1907f"));
    }

    #[test]
    fn feature_state_and_geometry_type() {
        let attrs = Attributes::new();
        let selected = Expression::Boolean(Box::new(Expression::FeatureState("selected".into())), false);
        let ctx = EvalContext::new(&attrs);
        assert_eq!(selected.evaluate(&ctx), Value::Bool(false));
        let ctx = ctx.with_state(FeatureState { selected: true });
        assert_eq!(selected.evaluate(&ctx), Value::Bool(true));

        let filter = Expression::GeometryTypeEq("Polygon".into());
        assert_eq!(filter.evaluate(&ctx), Value::Bool(true));
        let line = EvalContext {
            geometry_type: GeometryType::LineString,
            ..ctx
        };
        assert_eq!(filter.evaluate(&line), Value::Bool(false));
    }

    #[test]
    fn coalesce_skips_nulls() {
        let expr = Expression::Coalesce(vec![Expression::get("name"), Expression::literal("unnamed")]);
        assert_eq!(eval(&expr, &Attributes::new()), Value::from("unnamed"));
    }

    #[test]
    fn json_form_matches_style_syntax() {
        assert_eq!(
            height_expr().to_json(),
            json!(["case", ["has", "height"], ["get", "height"], ["has", "levels"], ["*", ["get", "levels"], 3], 15])
        );
        assert_eq!(Expression::GeometryTypeEq("Polygon".into()).to_json(), json!(["==", "$type", "Polygon"]));
    }

    #[test]
    fn parses_what_it_writes() {
        let expr = height_expr();
        assert_eq!(Expression::from_json(&expr.to_json()), Ok(expr));
    }

    #[test]
    fn rejects_unknown_operators() {
        assert_eq!(
            Expression::from_json(&json!(["interpolate", ["linear"], ["zoom"], 0, 1])),
            Err(ExpressionError::UnknownOperator("interpolate".into()))
        );
        assert_eq!(
            Expression::from_json(&json!(["get"])),
            Err(ExpressionError::Arity { op: "get", got: 0 })
        );
        assert!(Expression::from_json(&json!({"a": 1})).is_err());
    }
}
