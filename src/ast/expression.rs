use std::fmt;

/// Named constants of the expression language. They are never variable
/// references and cannot be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
    Pi,
    Tau,
    E,
}

impl Constant {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pi" => Some(Constant::Pi),
            "tau" => Some(Constant::Tau),
            "e" => Some(Constant::E),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Constant::Pi => "pi",
            Constant::Tau => "tau",
            Constant::E => "e",
        }
    }

    pub fn value(self) -> f64 {
        match self {
            Constant::Pi => std::f64::consts::PI,
            Constant::Tau => std::f64::consts::TAU,
            Constant::E => std::f64::consts::E,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Power => "^",
        }
    }

    /// Binding power as `(left, right)`; `^` is right-associative.
    pub(crate) fn binding_power(self) -> (u8, u8) {
        match self {
            BinaryOp::Add | BinaryOp::Subtract => (1, 2),
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => (3, 4),
            BinaryOp::Power => (8, 7),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    Plus,
}

/// An expression of the embedded expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Constant(Constant),
    Identifier(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call { function: String, args: Vec<Expr> },
    Object(Vec<(String, Expr)>),
    Array(Vec<Expr>),
    Member { object: Box<Expr>, field: String },
}

impl Expr {
    /// Pushes every variable this expression reads, in source order and with
    /// repeats. Function names and object/member keys are not variables.
    pub fn collect_identifiers(&self, names: &mut Vec<String>) {
        match self {
            Expr::Identifier(name) => names.push(name.clone()),
            Expr::Unary(_, operand) => operand.collect_identifiers(names),
            Expr::Binary(_, l, r) => {
                l.collect_identifiers(names);
                r.collect_identifiers(names);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_identifiers(names);
                }
            }
            Expr::Object(fields) => {
                for (_, value) in fields {
                    value.collect_identifiers(names);
                }
            }
            Expr::Array(items) => {
                for item in items {
                    item.collect_identifiers(names);
                }
            }
            Expr::Member { object, .. } => object.collect_identifiers(names),
            Expr::Number(_) | Expr::Constant(_) => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assign { target: String, value: Expr },
    Expr(Expr),
}

/// A parsed expression source: an ordered list of statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

fn fmt_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Constant(c) => write!(f, "{}", c.name()),
            Expr::Identifier(name) => write!(f, "{}", name),
            Expr::Unary(UnaryOp::Negate, operand) => write!(f, "-{}", operand),
            Expr::Unary(UnaryOp::Plus, operand) => write!(f, "+{}", operand),
            Expr::Binary(op, l, r) => write!(f, "({} {} {})", l, op.symbol(), r),
            Expr::Call { function, args } => {
                write!(f, "{}(", function)?;
                fmt_list(f, args)?;
                write!(f, ")")
            }
            Expr::Object(fields) => {
                write!(f, "{{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", key, value)?;
                }
                write!(f, " }}")
            }
            Expr::Array(items) => {
                write!(f, "[")?;
                fmt_list(f, items)?;
                write!(f, "]")
            }
            Expr::Member { object, field } => write!(f, "{}.{}", object, field),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            match statement {
                Statement::Assign { target, value } => writeln!(f, "{} = {};", target, value)?,
                Statement::Expr(expr) => writeln!(f, "{};", expr)?,
            }
        }
        Ok(())
    }
}
