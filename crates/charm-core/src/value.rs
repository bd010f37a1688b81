//! The runtime [`Value`] type shared by the tree-walk interpreter and the VM.

use std::fmt;
use std::rc::Rc;

use crate::ast::Stmt;
use crate::error::RuntimeError;
use crate::intern::StringRef;

/// A callable function value: parameter names plus a shared handle to its
/// body. `Rc` lets every `Value::Function` created from the same
/// declaration point at the same `Stmt` without re-walking or cloning the
/// AST on each call.
#[derive(Clone)]
pub struct FunctionValue {
    pub name: StringRef,
    pub params: Vec<StringRef>,
    pub body: Rc<Stmt>,
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name.as_str())
    }
}

pub type NativeFn = fn(&[Value]) -> Result<Value, RuntimeError>;

#[derive(Clone, Copy)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: Option<usize>,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native {}>", self.name)
    }
}

/// A runtime value.
///
/// `Cell(StringRef)` is the only heap-object variant today; adding more
/// subtypes later means widening this variant, not adding new top-level
/// `Value` cases for them (mirrors the reference's `Object` tagging inside a
/// single heap-cell kind).
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Number(f64),
    Bool(bool),
    Cell(StringRef),
    Function(Rc<FunctionValue>),
    Native(NativeFunction),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::Cell(_) => "string",
            Value::Function(_) => "function",
            Value::Native(_) => "function",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Value equality used by `EQUAL`/`!=`: same-type comparison only.
    /// Cross-type comparisons are not an error, they are simply never equal.
    pub fn values_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Cell(a), Value::Cell(b)) => a.as_str() == b.as_str(),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    /// Textual form used by the built-in `print`: numbers with six decimal
    /// places (matching the reference's `%f`), booleans as `true`/`false`,
    /// nil as `<NIL>`, strings as their raw bytes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "<NIL>"),
            Value::Number(n) => write!(f, "{n:.6}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Cell(s) => write!(f, "{}", s.as_str()),
            Value::Function(func) => write!(f, "<function {}>", func.name.as_str()),
            Value::Native(native) => write!(f, "<native {}>", native.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_display_matches_c_printf_default() {
        assert_eq!(Value::Number(7.0).to_string(), "7.000000");
    }

    #[test]
    fn nil_display() {
        assert_eq!(Value::Nil.to_string(), "<NIL>");
    }

    #[test]
    fn cross_type_equality_is_false_not_an_error() {
        assert!(!Value::Number(0.0).values_equal(&Value::Bool(false)));
    }
}
