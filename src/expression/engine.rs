use crate::ast::{BinaryOp, Expr, Program, Statement, UnaryOp, Value};
use crate::error::EvaluationError;
use crate::evaluator::ops::{clamp, lerp, min_max};
use ahash::AHashMap;
use std::fmt;

/// The variable bindings an expression program runs against.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    variables: AHashMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }
}

/// Runs every statement in order against `scope`. Assignments write back
/// into the scope; the value of the last statement is returned.
pub fn run(program: &Program, scope: &mut Scope) -> Result<Option<Value>, EvaluationError> {
    let mut last = None;
    for statement in &program.statements {
        let value = match statement {
            Statement::Assign { target, value } => {
                let value = evaluate(value, scope)?;
                scope.set(target.clone(), value.clone());
                value
            }
            Statement::Expr(expr) => evaluate(expr, scope)?,
        };
        last = Some(value);
    }
    Ok(last)
}

fn evaluate(expr: &Expr, scope: &Scope) -> Result<Value, EvaluationError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Constant(c) => Ok(Value::Number(c.value())),
        Expr::Identifier(name) => scope
            .get(name)
            .cloned()
            .ok_or_else(|| EvaluationError::InputNotFound(name.clone())),
        Expr::Unary(UnaryOp::Plus, operand) => evaluate(operand, scope),
        Expr::Unary(UnaryOp::Negate, operand) => {
            map_numeric(evaluate(operand, scope)?, "-", &|n: f64| -n)
        }
        Expr::Binary(op, l, r) => binary(*op, evaluate(l, scope)?, evaluate(r, scope)?),
        Expr::Call { function, args } => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            call(function, args)
        }
        Expr::Object(fields) => Ok(Value::Object(
            fields
                .iter()
                .map(|(key, value)| evaluate(value, scope).map(|v| (key.clone(), v)))
                .collect::<Result<_, EvaluationError>>()?,
        )),
        Expr::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|item| evaluate(item, scope))
                .collect::<Result<_, _>>()?,
        )),
        Expr::Member { object, field } => member(evaluate(object, scope)?, field),
    }
}

fn type_mismatch(op: &str, expected: &str, found: Value) -> EvaluationError {
    EvaluationError::TypeMismatch {
        operation: op.to_string(),
        expected: expected.to_string(),
        found,
    }
}

fn apply(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => a / b,
        BinaryOp::Modulo => a % b,
        BinaryOp::Power => a.powf(b),
    }
}

/// Arithmetic over numbers, broadcasting over vectors and numeric arrays.
fn binary(op: BinaryOp, l: Value, r: Value) -> Result<Value, EvaluationError> {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(apply(op, a, b))),
        (Value::Vector2([ax, ay]), Value::Vector2([bx, by])) => {
            Ok(Value::Vector2([apply(op, ax, bx), apply(op, ay, by)]))
        }
        (Value::Vector2([x, y]), Value::Number(n)) => {
            Ok(Value::Vector2([apply(op, x, n), apply(op, y, n)]))
        }
        (Value::Number(n), Value::Vector2([x, y])) => {
            Ok(Value::Vector2([apply(op, n, x), apply(op, n, y)]))
        }
        (Value::Array(a), Value::Array(b)) if a.len() == b.len() => Ok(Value::Array(
            a.into_iter()
                .zip(b)
                .map(|(x, y)| binary(op, x, y))
                .collect::<Result<_, _>>()?,
        )),
        (Value::Array(a), n @ Value::Number(_)) => Ok(Value::Array(
            a.into_iter()
                .map(|x| binary(op, x, n.clone()))
                .collect::<Result<_, _>>()?,
        )),
        (n @ Value::Number(_), Value::Array(b)) => Ok(Value::Array(
            b.into_iter()
                .map(|y| binary(op, n.clone(), y))
                .collect::<Result<_, _>>()?,
        )),
        (l, r) => {
            let found = match l {
                Value::Number(_) | Value::Vector2(_) | Value::Array(_) => r,
                other => other,
            };
            Err(type_mismatch(op.symbol(), "Number or Vector2", found))
        }
    }
}

fn map_numeric(value: Value, op: &str, f: &dyn Fn(f64) -> f64) -> Result<Value, EvaluationError> {
    match value {
        Value::Number(n) => Ok(Value::Number(f(n))),
        Value::Vector2([x, y]) => Ok(Value::Vector2([f(x), f(y)])),
        Value::Array(items) => Ok(Value::Array(
            items
                .into_iter()
                .map(|item| map_numeric(item, op, f))
                .collect::<Result<_, _>>()?,
        )),
        other => Err(type_mismatch(op, "Number or Vector2", other)),
    }
}

fn member(value: Value, field: &str) -> Result<Value, EvaluationError> {
    let op = format!(".{}", field);
    let component = |components: &[f64], names: &[&str]| {
        names
            .iter()
            .position(|n| *n == field)
            .map(|i| Value::Number(components[i]))
    };
    let found = match &value {
        Value::Object(fields) => return Ok(fields.get(field).cloned().unwrap_or(Value::Null)),
        Value::Vector2(v) => component(v, &["x", "y"]),
        Value::Rect(r) => component(r, &["x", "y", "width", "height"]),
        Value::Color(c) => component(c, &["r", "g", "b", "a"]),
        _ => None,
    };
    found.ok_or_else(|| type_mismatch(&op, "a value with that member", value))
}

/// How many arguments a builtin function takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "{}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// The signature of a builtin, or `None` when no builtin has that name.
pub fn builtin_arity(function: &str) -> Option<Arity> {
    match function {
        "sin" | "cos" | "tan" | "asin" | "acos" | "atan" | "sqrt" | "abs" | "floor" | "ceil"
        | "round" | "exp" | "log" | "fract" | "sign" => Some(Arity::Exactly(1)),
        "atan2" | "pow" | "vec2" => Some(Arity::Exactly(2)),
        "clamp" | "lerp" => Some(Arity::Exactly(3)),
        "min" | "max" => Some(Arity::AtLeast(1)),
        _ => None,
    }
}

/// Checks a call site against the builtin table, for the parser.
pub(super) fn check_call(function: &str, count: usize) -> Result<(), String> {
    let arity =
        builtin_arity(function).ok_or_else(|| format!("Unknown function '{}'", function))?;
    if arity.accepts(count) {
        return Ok(());
    }
    let plural = if arity == Arity::Exactly(1) { "" } else { "s" };
    Err(format!(
        "Function '{}' expects {} argument{}, found {}",
        function, arity, plural, count
    ))
}

fn number_arg(function: &str, value: &Value) -> Result<f64, EvaluationError> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(type_mismatch(function, "Number", other.clone())),
    }
}

fn call(function: &str, mut args: Vec<Value>) -> Result<Value, EvaluationError> {
    let arity = builtin_arity(function)
        .ok_or_else(|| EvaluationError::UnknownFunction(function.to_string()))?;
    if !arity.accepts(args.len()) {
        return Err(EvaluationError::ArityMismatch {
            function: function.to_string(),
            expected: arity.to_string(),
            found: args.len(),
        });
    }

    let unary: Option<fn(f64) -> f64> = match function {
        "sin" => Some(f64::sin),
        "cos" => Some(f64::cos),
        "tan" => Some(f64::tan),
        "asin" => Some(f64::asin),
        "acos" => Some(f64::acos),
        "atan" => Some(f64::atan),
        "sqrt" => Some(f64::sqrt),
        "abs" => Some(f64::abs),
        "floor" => Some(f64::floor),
        "ceil" => Some(f64::ceil),
        "round" => Some(f64::round),
        "exp" => Some(f64::exp),
        "log" => Some(f64::ln),
        "fract" => Some(f64::fract),
        "sign" => Some(|n: f64| if n == 0.0 || n.is_nan() { n } else { n.signum() }),
        _ => None,
    };
    if let Some(f) = unary {
        return map_numeric(args.remove(0), function, &f);
    }

    match function {
        "atan2" | "pow" => {
            let a = number_arg(function, &args[0])?;
            let b = number_arg(function, &args[1])?;
            Ok(Value::Number(if function == "atan2" {
                a.atan2(b)
            } else {
                a.powf(b)
            }))
        }
        "min" | "max" => {
            let numbers = args
                .iter()
                .map(|a| number_arg(function, a))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Number(min_max(&numbers, function == "max")))
        }
        "clamp" => {
            let min = number_arg(function, &args[1])?;
            let max = number_arg(function, &args[2])?;
            map_numeric(args.remove(0), function, &|v: f64| clamp(v, min, max))
        }
        "lerp" => {
            let t = number_arg(function, &args[2])?;
            match (&args[0], &args[1]) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(lerp(*a, *b, t))),
                _ => {
                    let b = args.remove(1);
                    let a = args.remove(0);
                    let delta = binary(BinaryOp::Subtract, b, a.clone())?;
                    let scaled = binary(BinaryOp::Multiply, delta, Value::Number(t))?;
                    binary(BinaryOp::Add, a, scaled)
                }
            }
        }
        "vec2" => {
            Ok(Value::Vector2([
                number_arg(function, &args[0])?,
                number_arg(function, &args[1])?,
            ]))
        }
        _ => Err(EvaluationError::UnknownFunction(function.to_string())),
    }
}
