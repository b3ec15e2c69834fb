use miette::Error;

use crate::{
    ast::Node,
    eval::{EmptyOption, UnexpectedType, eval},
    value::{Table, Value},
};

/// One entry of the builtin registry. The registry is the single source of
/// truth for both the parser's name membership test and the executor's
/// dispatch, so the two cannot drift. `arity` is checked by the dispatcher
/// before `run` is entered; `run` must not mutate the stack before its own
/// operand-type checks have passed.
pub struct Builtin {
    pub name: &'static str,
    pub arity: usize,
    pub run: for<'a> fn(&mut Vec<Value<'a>>, usize, usize) -> Result<(), Error>,
}

pub static BUILTINS: &[Builtin] = &[
    Builtin { name: "status", arity: 0, run: status },
    Builtin { name: "split", arity: 2, run: split },
    Builtin { name: "chars", arity: 1, run: chars },
    Builtin { name: "to_int", arity: 1, run: to_int },
    Builtin { name: "map", arity: 2, run: map },
    Builtin { name: "filter", arity: 2, run: filter },
    Builtin { name: "is_some", arity: 1, run: is_some },
    Builtin { name: "unwrap", arity: 1, run: unwrap },
    Builtin { name: "first", arity: 1, run: first },
    Builtin { name: "last", arity: 1, run: last },
    Builtin { name: "swap", arity: 2, run: swap },
    Builtin { name: "drop", arity: 1, run: drop },
    Builtin { name: "reduce", arity: 3, run: reduce },
];

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|builtin| builtin.name == name)
}

pub fn is_builtin(name: &str) -> bool {
    lookup(name).is_some()
}

/// Runs a captured program against a fresh stack seeded with the given
/// values and hands back the resulting top of stack. Closures capture no
/// environment, so the seed is everything an application can see.
fn apply<'a>(
    program: &'a [Node<'a>],
    seed: Vec<Value<'a>>,
    name: &str,
    col: usize,
    row: usize,
) -> Result<Value<'a>, Error> {
    let mut stack = seed;
    for node in program {
        eval(&mut stack, node)?;
    }
    let Some(result) = stack.pop() else {
        return Err(UnexpectedType {
            message: format!("{name} expected function to return at least 1 value but got 0"),
            col,
            row,
        }
        .into());
    };
    Ok(result)
}

fn status<'a>(stack: &mut Vec<Value<'a>>, _col: usize, _row: usize) -> Result<(), Error> {
    eprintln!("Stack:");
    for (index, value) in stack.iter().rev().enumerate() {
        eprintln!("{index}: {value}");
    }
    Ok(())
}

fn split<'a>(stack: &mut Vec<Value<'a>>, col: usize, row: usize) -> Result<(), Error> {
    let Value::String(delimiter) = &stack[stack.len() - 1] else {
        return Err(UnexpectedType {
            message: format!(
                "split expected second argument to be the string delimiter but got '{}'",
                stack[stack.len() - 1]
            ),
            col,
            row,
        }
        .into());
    };
    let Value::String(subject) = &stack[stack.len() - 2] else {
        return Err(UnexpectedType {
            message: format!(
                "split expected first argument to be a string but got '{}'",
                stack[stack.len() - 2]
            ),
            col,
            row,
        }
        .into());
    };

    // an empty delimiter splits into code points rather than the empty
    // leading/trailing matches str::split would produce
    let parts: Vec<Value<'a>> = if delimiter.is_empty() {
        subject
            .chars()
            .map(|c| Value::String(c.to_string()))
            .collect()
    } else {
        subject
            .split(delimiter.as_str())
            .map(|part| Value::String(part.to_string()))
            .collect()
    };

    stack.truncate(stack.len() - 2);
    stack.push(Value::Table(Table::Array(parts)));
    Ok(())
}

fn chars<'a>(stack: &mut Vec<Value<'a>>, col: usize, row: usize) -> Result<(), Error> {
    let Value::String(subject) = &stack[stack.len() - 1] else {
        return Err(UnexpectedType {
            message: format!(
                "chars expected first argument to be a string but got '{}'",
                stack[stack.len() - 1]
            ),
            col,
            row,
        }
        .into());
    };

    let table = Table::Array(
        subject
            .chars()
            .map(|c| Value::String(c.to_string()))
            .collect(),
    );

    stack.pop();
    stack.push(Value::Table(table));
    Ok(())
}

fn to_int<'a>(stack: &mut Vec<Value<'a>>, col: usize, row: usize) -> Result<(), Error> {
    let Value::String(subject) = &stack[stack.len() - 1] else {
        return Err(UnexpectedType {
            message: format!(
                "to_int expected first argument to be a string but got '{}'",
                stack[stack.len() - 1]
            ),
            col,
            row,
        }
        .into());
    };

    let option = match subject.parse::<f64>() {
        Ok(number) => Value::Option(Some(Box::new(Value::Number(number)))),
        Err(_) => Value::Option(None),
    };

    stack.pop();
    stack.push(option);
    Ok(())
}

fn map<'a>(stack: &mut Vec<Value<'a>>, col: usize, row: usize) -> Result<(), Error> {
    let program = match &stack[stack.len() - 1] {
        Value::Fn(program) => *program,
        _ => {
            return Err(UnexpectedType {
                message: "map expected second argument to be a function".to_string(),
                col,
                row,
            }
            .into());
        }
    };
    let table = match &stack[stack.len() - 2] {
        Value::Table(table) => table.clone(),
        _ => {
            return Err(UnexpectedType {
                message: "map expected first argument to be a table".to_string(),
                col,
                row,
            }
            .into());
        }
    };
    stack.truncate(stack.len() - 2);

    let result = match table {
        Table::Array(items) => {
            let mut mapped = Vec::with_capacity(items.len());
            for item in items {
                mapped.push(apply(program, vec![item], "map", col, row)?);
            }
            Table::Array(mapped)
        }
        Table::Map(entries) => {
            let mut mapped = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let result = apply(program, vec![value], "map", col, row)?;
                mapped.push((key, result));
            }
            Table::Map(mapped)
        }
    };

    stack.push(Value::Table(result));
    Ok(())
}

fn filter<'a>(stack: &mut Vec<Value<'a>>, col: usize, row: usize) -> Result<(), Error> {
    let program = match &stack[stack.len() - 1] {
        Value::Fn(program) => *program,
        _ => {
            return Err(UnexpectedType {
                message: "filter expected second argument to be a function".to_string(),
                col,
                row,
            }
            .into());
        }
    };
    let table = match &stack[stack.len() - 2] {
        Value::Table(table) => table.clone(),
        _ => {
            return Err(UnexpectedType {
                message: "filter expected first argument to be a table".to_string(),
                col,
                row,
            }
            .into());
        }
    };
    stack.truncate(stack.len() - 2);

    let result = match table {
        Table::Array(items) => {
            let mut kept = Vec::with_capacity(items.len());
            for item in items {
                match apply(program, vec![item.clone()], "filter", col, row)? {
                    Value::Boolean(true) => kept.push(item),
                    Value::Boolean(false) => {}
                    other => {
                        return Err(UnexpectedType {
                            message: format!(
                                "filter expected function to return boolean but got '{other}'"
                            ),
                            col,
                            row,
                        }
                        .into());
                    }
                }
            }
            Table::Array(kept)
        }
        Table::Map(entries) => {
            let mut kept = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                match apply(program, vec![value.clone()], "filter", col, row)? {
                    Value::Boolean(true) => kept.push((key, value)),
                    Value::Boolean(false) => {}
                    other => {
                        return Err(UnexpectedType {
                            message: format!(
                                "filter expected function to return boolean but got '{other}'"
                            ),
                            col,
                            row,
                        }
                        .into());
                    }
                }
            }
            Table::Map(kept)
        }
    };

    stack.push(Value::Table(result));
    Ok(())
}

fn reduce<'a>(stack: &mut Vec<Value<'a>>, col: usize, row: usize) -> Result<(), Error> {
    let program = match &stack[stack.len() - 1] {
        Value::Fn(program) => *program,
        _ => {
            return Err(UnexpectedType {
                message: "reduce expected first argument to be a function".to_string(),
                col,
                row,
            }
            .into());
        }
    };
    let table = match &stack[stack.len() - 3] {
        Value::Table(table) => table.clone(),
        _ => {
            return Err(UnexpectedType {
                message: "reduce expected third argument to be a table".to_string(),
                col,
                row,
            }
            .into());
        }
    };
    // the accumulator between the function and the table may be any value
    let mut acc = stack[stack.len() - 2].clone();
    stack.truncate(stack.len() - 3);

    match table {
        Table::Array(items) => {
            for item in items {
                acc = apply(program, vec![acc, item], "reduce", col, row)?;
            }
        }
        Table::Map(entries) => {
            for (_, value) in entries {
                acc = apply(program, vec![acc, value], "reduce", col, row)?;
            }
        }
    }

    stack.push(acc);
    Ok(())
}

fn is_some<'a>(stack: &mut Vec<Value<'a>>, col: usize, row: usize) -> Result<(), Error> {
    let Value::Option(option) = &stack[stack.len() - 1] else {
        return Err(UnexpectedType {
            message: format!(
                "is_some expected first argument to be an option but got '{}'",
                stack[stack.len() - 1]
            ),
            col,
            row,
        }
        .into());
    };

    let result = Value::Boolean(option.is_some());
    stack.pop();
    stack.push(result);
    Ok(())
}

fn unwrap<'a>(stack: &mut Vec<Value<'a>>, col: usize, row: usize) -> Result<(), Error> {
    let value = match &stack[stack.len() - 1] {
        Value::Option(Some(value)) => (**value).clone(),
        Value::Option(None) => return Err(EmptyOption { col, row }.into()),
        other => {
            return Err(UnexpectedType {
                message: format!(
                    "unwrap expected first argument to be an option but got '{other}'"
                ),
                col,
                row,
            }
            .into());
        }
    };

    stack.pop();
    stack.push(value);
    Ok(())
}

// first and last read the table without removing it; the element lands on
// top of the table that produced it
fn first<'a>(stack: &mut Vec<Value<'a>>, col: usize, row: usize) -> Result<(), Error> {
    let Value::Table(table) = &stack[stack.len() - 1] else {
        return Err(UnexpectedType {
            message: format!(
                "first expected first argument to be a table but got '{}'",
                stack[stack.len() - 1]
            ),
            col,
            row,
        }
        .into());
    };

    let element = match table {
        Table::Array(items) => match items.first() {
            Some(element) => element.clone(),
            None => {
                return Err(UnexpectedType {
                    message: "first expected table to have at least 1 element but got 0"
                        .to_string(),
                    col,
                    row,
                }
                .into());
            }
        },
        Table::Map(_) => {
            return Err(UnexpectedType {
                message: "first expected an array-shaped table".to_string(),
                col,
                row,
            }
            .into());
        }
    };

    stack.push(element);
    Ok(())
}

fn last<'a>(stack: &mut Vec<Value<'a>>, col: usize, row: usize) -> Result<(), Error> {
    let Value::Table(table) = &stack[stack.len() - 1] else {
        return Err(UnexpectedType {
            message: format!(
                "last expected first argument to be a table but got '{}'",
                stack[stack.len() - 1]
            ),
            col,
            row,
        }
        .into());
    };

    let element = match table {
        Table::Array(items) => match items.last() {
            Some(element) => element.clone(),
            None => {
                return Err(UnexpectedType {
                    message: "last expected table to have at least 1 element but got 0"
                        .to_string(),
                    col,
                    row,
                }
                .into());
            }
        },
        Table::Map(_) => {
            return Err(UnexpectedType {
                message: "last expected an array-shaped table".to_string(),
                col,
                row,
            }
            .into());
        }
    };

    stack.push(element);
    Ok(())
}

fn swap<'a>(stack: &mut Vec<Value<'a>>, _col: usize, _row: usize) -> Result<(), Error> {
    let len = stack.len();
    stack.swap(len - 1, len - 2);
    Ok(())
}

fn drop<'a>(stack: &mut Vec<Value<'a>>, _col: usize, _row: usize) -> Result<(), Error> {
    stack.pop();
    Ok(())
}
