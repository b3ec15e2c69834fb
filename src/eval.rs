use std::fmt::Display;

use log::trace;
use miette::{Diagnostic, Error};
use thiserror::Error;

use crate::{
    ast::{BinopKind, Node},
    builtins,
    value::Value,
};

#[derive(Error, Debug, Diagnostic)]
#[error("stack underflow: {name} expected {expected} arguments but got {got} at {col}:{row}")]
pub struct StackUnderflow {
    pub name: String,
    pub expected: usize,
    pub got: usize,
    pub col: usize,
    pub row: usize,
}

#[derive(Error, Debug, Diagnostic)]
#[error("unexpected type: {message} at {col}:{row}")]
pub struct UnexpectedType {
    pub message: String,
    pub col: usize,
    pub row: usize,
}

#[derive(Error, Debug, Diagnostic)]
#[error("empty option: unwrap expected option to have a value but got none at {col}:{row}")]
pub struct EmptyOption {
    pub col: usize,
    pub row: usize,
}

#[derive(Error, Debug, Diagnostic)]
#[error("unimplemented: {what} at {col}:{row}")]
pub struct Unimplemented {
    pub what: String,
    pub col: usize,
    pub row: usize,
}

/// The stack machine. One growable value stack is the only mutable state;
/// the program is walked front to back with no backtracking.
#[derive(Default)]
pub struct Executor<'a> {
    stack: Vec<Value<'a>>,
}

impl<'a> Executor<'a> {
    pub fn new() -> Self {
        Executor { stack: Vec::new() }
    }

    pub fn with_stack(stack: Vec<Value<'a>>) -> Self {
        Executor { stack }
    }

    pub fn execute(&mut self, program: &'a [Node<'a>]) -> Result<(), Error> {
        for node in program {
            eval(&mut self.stack, node)?;
        }
        Ok(())
    }

    pub fn stack(&self) -> &[Value<'a>] {
        &self.stack
    }

    pub fn into_stack(self) -> Vec<Value<'a>> {
        self.stack
    }
}

impl Display for Executor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, value) in self.stack.iter().rev().enumerate() {
            writeln!(f, "{index}: {value}")?;
        }
        Ok(())
    }
}

/// Evaluates one node against the given stack. Higher-order builtins
/// re-enter this for each closure application, always on a fresh stack.
pub fn eval<'a>(stack: &mut Vec<Value<'a>>, node: &'a Node<'a>) -> Result<(), Error> {
    trace!("eval {node}");
    match node {
        Node::Number { value, .. } => stack.push(Value::Number(*value)),
        Node::Boolean { value, .. } => stack.push(Value::Boolean(*value)),
        Node::String { value, .. } => stack.push(Value::String((*value).to_string())),
        Node::Fn { program, .. } => stack.push(Value::Fn(program)),
        Node::Ident { name, col, row } => {
            return Err(Unimplemented {
                what: format!("evaluation of Ident({name})"),
                col: *col,
                row: *row,
            }
            .into());
        }
        Node::Table { col, row, .. } => {
            return Err(Unimplemented {
                what: "evaluation of table literals".to_string(),
                col: *col,
                row: *row,
            }
            .into());
        }
        Node::FnCall { name, col, row } => return execute_fn_call(stack, name, *col, *row),
        Node::Binop { kind, col, row } => return execute_binop(stack, *kind, *col, *row),
    }
    Ok(())
}

fn execute_binop<'a>(
    stack: &mut Vec<Value<'a>>,
    kind: BinopKind,
    col: usize,
    row: usize,
) -> Result<(), Error> {
    if stack.len() < 2 {
        return Err(StackUnderflow {
            name: format!("Binop({kind})"),
            expected: 2,
            got: stack.len(),
            col,
            row,
        }
        .into());
    }

    let Value::Number(rhs) = &stack[stack.len() - 1] else {
        return Err(UnexpectedType {
            message: format!(
                "Binop({kind}) expected a number but got '{}'",
                stack[stack.len() - 1]
            ),
            col,
            row,
        }
        .into());
    };
    let rhs = *rhs;

    let Value::Number(lhs) = &stack[stack.len() - 2] else {
        return Err(UnexpectedType {
            message: format!(
                "Binop({kind}) expected a number but got '{}'",
                stack[stack.len() - 2]
            ),
            col,
            row,
        }
        .into());
    };
    let lhs = *lhs;

    let result = match kind {
        BinopKind::Addition => Value::Number(lhs + rhs),
        BinopKind::Subtraction => Value::Number(lhs - rhs),
        BinopKind::Multiplication => Value::Number(lhs * rhs),
        BinopKind::Division => Value::Number(lhs / rhs),
        BinopKind::LessThan => Value::Boolean(lhs < rhs),
        BinopKind::LessThanEqual => Value::Boolean(lhs <= rhs),
        BinopKind::GreaterThan => Value::Boolean(lhs > rhs),
        BinopKind::GreaterThanEqual => Value::Boolean(lhs >= rhs),
        BinopKind::Equal => Value::Boolean(lhs == rhs),
        BinopKind::NotEqual => Value::Boolean(lhs != rhs),
        // parsed but with no defined evaluation; checked before any pop so
        // a failing program observes an unchanged stack
        BinopKind::And | BinopKind::Or | BinopKind::Not => {
            return Err(Unimplemented {
                what: format!("Binop({kind})"),
                col,
                row,
            }
            .into());
        }
    };

    stack.truncate(stack.len() - 2);
    stack.push(result);
    Ok(())
}

fn execute_fn_call<'a>(
    stack: &mut Vec<Value<'a>>,
    name: &str,
    col: usize,
    row: usize,
) -> Result<(), Error> {
    let Some(builtin) = builtins::lookup(name) else {
        return Err(Unimplemented {
            what: format!("fn '{name}'"),
            col,
            row,
        }
        .into());
    };

    if stack.len() < builtin.arity {
        return Err(StackUnderflow {
            name: name.to_string(),
            expected: builtin.arity,
            got: stack.len(),
            col,
            row,
        }
        .into());
    }

    trace!("calling builtin {name}");
    (builtin.run)(stack, col, row)
}
