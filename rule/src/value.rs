use std::{
    fmt,
    future::Future,
    path::PathBuf,
    pin::Pin,
    rc::Rc,
};

use futures::future::Shared;

/// What a task's promise eventually resolves to. Never anything but these two shapes: see
/// invariant "A task's promise resolves to a list of absolute paths on success and to a Cancel
/// marker on failure or upstream cancellation -- never to anything else."
#[derive(Debug, Clone)]
pub enum Outcome {
    Outputs(Rc<Vec<PathBuf>>),
    Cancelled,
}

impl Outcome {
    pub fn outputs(&self) -> Option<&[PathBuf]> {
        match self {
            Outcome::Outputs(paths) => Some(paths),
            Outcome::Cancelled => None,
        }
    }
}

pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// A task's promise. Cloneable so every dependent can await the same completed future.
pub type TaskHandle = Shared<LocalBoxFuture<'static, Outcome>>;

#[derive(Debug, thiserror::Error)]
pub enum ExprError {
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("'{0}' is not callable")]
    NotCallable(String),
    #[error("wrong number of arguments to '{0}'")]
    Arity(String),
    #[error("index {0} out of range")]
    IndexOutOfRange(usize),
    #[error("value is not indexable")]
    NotIndexable,
    #[error("{0}")]
    Other(String),
}

pub type HelperFn = Rc<dyn Fn(&[Value]) -> Result<Value, ExprError>>;

pub type CommandError = Rc<dyn std::error::Error>;

/// A user-supplied command function (PURPOSE & SCOPE: "...or invokes a user-supplied function").
/// Takes the fully-resolved task rule and returns its result, possibly asynchronously.
pub type CommandFn = Rc<dyn Fn(Rc<crate::Rule>) -> LocalBoxFuture<'static, Result<Value, CommandError>>>;

/// The set of shapes a Rule attribute can take (DATA MODEL, "Rule values may be...").
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Path(PathBuf),
    List(Vec<Value>),
    /// A helper bound into the expression mini-language (`len`, `glob`, `swap_ext`, `run_cmd`,
    /// `color`) -- evaluated synchronously while resolving a `{...}` span.
    Helper(HelperFn),
    /// A user-supplied command function, the callable form of `command`.
    Command(CommandFn),
    /// An unresolved task promise; awaited during expansion/flattening.
    Task(TaskHandle),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Path(p) => write!(f, "Path({p:?})"),
            Value::List(l) => write!(f, "List({l:?})"),
            Value::Helper(_) => write!(f, "Helper(<fn>)"),
            Value::Command(_) => write!(f, "Command(<fn>)"),
            Value::Task(_) => write!(f, "Task(<promise>)"),
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn string<S: Into<String>>(s: S) -> Value {
        Value::String(s.into())
    }

    pub fn list(values: impl IntoIterator<Item = Value>) -> Value {
        Value::List(values.into_iter().collect())
    }

    /// Whether this value should NOT be flattened out of a containing list (DESIGN NOTES /
    /// `is_atom`): strings and non-iterable leaves are atoms, lists are not.
    pub fn is_atom(&self) -> bool {
        !matches!(self, Value::List(_))
    }

    /// Canonical stringification for non-string, non-list leaves ("A non-string non-list becomes
    /// its canonical string form").
    pub fn to_plain_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Value::String(s) => s.clone(),
            Value::Path(p) => p.display().to_string(),
            Value::List(_) => unreachable!("lists are flattened before stringification"),
            Value::Helper(_) => "<function>".to_string(),
            Value::Command(_) => "<function>".to_string(),
            Value::Task(_) => "<task>".to_string(),
        }
    }
}

pub fn flatten(elements: Vec<Value>) -> Vec<Value> {
    let mut out = Vec::new();
    for element in elements {
        match element {
            Value::List(inner) => out.extend(flatten(inner)),
            other => out.push(other),
        }
    }
    out
}
