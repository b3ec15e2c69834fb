use std::fmt::Display;

use miette::Diagnostic;
use thiserror::Error;

use crate::ast::Node;

#[derive(Error, Debug, Diagnostic)]
#[error("unexpected type: '{key}' cannot be used as a table key")]
#[diagnostic(help("table keys are limited to numbers, booleans and strings"))]
pub struct InvalidKey {
    pub key: String,
}

/// A value produced by evaluation. `Fn` borrows the captured program from
/// the AST rather than copying it; no environment is captured.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Number(f64),
    Boolean(bool),
    String(String),
    Table(Table<'a>),
    Fn(&'a [Node<'a>]),
    Option(Option<Box<Value<'a>>>),
}

/// The composite value: exactly array-shaped or map-shaped, never both.
/// The map shape keeps its entries in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub enum Table<'a> {
    Array(Vec<Value<'a>>),
    Map(Vec<(Value<'a>, Value<'a>)>),
}

impl<'a> Value<'a> {
    /// Only numbers, booleans and strings have well-defined key equality.
    pub fn is_key_kind(&self) -> bool {
        matches!(
            self,
            Value::Number(_) | Value::Boolean(_) | Value::String(_)
        )
    }
}

impl<'a> Table<'a> {
    /// Builds a map-shaped table, rejecting composite or closure keys.
    /// A repeated key overwrites the earlier entry in place.
    pub fn map_from(
        entries: impl IntoIterator<Item = (Value<'a>, Value<'a>)>,
    ) -> Result<Self, InvalidKey> {
        let mut map: Vec<(Value<'a>, Value<'a>)> = Vec::new();
        for (key, value) in entries {
            if !key.is_key_kind() {
                return Err(InvalidKey {
                    key: key.to_string(),
                });
            }
            match map.iter_mut().find(|(existing, _)| *existing == key) {
                Some(entry) => entry.1 = value,
                None => map.push((key, value)),
            }
        }
        Ok(Table::Map(map))
    }

    pub fn get(&self, key: &Value<'a>) -> Option<&Value<'a>> {
        match self {
            Table::Array(_) => None,
            Table::Map(entries) => entries
                .iter()
                .find(|(existing, _)| existing == key)
                .map(|(_, value)| value),
        }
    }
}

impl Display for Value<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n:.6}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Table(table) => write!(f, "{table}"),
            Value::Fn(program) => {
                let nodes = program
                    .iter()
                    .map(Node::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "({nodes})")
            }
            Value::Option(Some(value)) => write!(f, "Some({value})"),
            Value::Option(None) => write!(f, "None"),
        }
    }
}

impl Display for Table<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let items = match self {
            Table::Array(items) => items.iter().map(Value::to_string).collect::<Vec<_>>(),
            Table::Map(entries) => entries
                .iter()
                .map(|(key, value)| format!("{key}: {value}"))
                .collect::<Vec<_>>(),
        };
        write!(f, "{{ {} }}", items.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_render_canonically() {
        assert_eq!(Value::Number(136.0).to_string(), "136.000000");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(Value::String("hi".to_string()).to_string(), "\"hi\"");
        assert_eq!(
            Value::Option(Some(Box::new(Value::Number(5.0)))).to_string(),
            "Some(5.000000)"
        );
        assert_eq!(Value::Option(None).to_string(), "None");
    }

    #[test]
    fn tables_render_their_shape() {
        let array = Value::Table(Table::Array(vec![
            Value::String("a".to_string()),
            Value::Number(2.0),
        ]));
        assert_eq!(array.to_string(), "{ \"a\", 2.000000 }");

        let map = Table::map_from([(
            Value::String("k".to_string()),
            Value::Boolean(false),
        )])
        .unwrap();
        assert_eq!(Value::Table(map).to_string(), "{ \"k\": false }");
    }

    #[test]
    fn map_keys_are_restricted_to_primitive_kinds() {
        let err = Table::map_from([(
            Value::Table(Table::Array(Vec::new())),
            Value::Number(1.0),
        )])
        .expect_err("a table is not a valid key");
        assert_eq!(err.key, "{  }");

        assert!(Table::map_from([(Value::Number(1.0), Value::Number(2.0))]).is_ok());
    }

    #[test]
    fn repeated_map_keys_overwrite_in_place() {
        let table = Table::map_from([
            (Value::String("a".to_string()), Value::Number(1.0)),
            (Value::String("b".to_string()), Value::Number(2.0)),
            (Value::String("a".to_string()), Value::Number(3.0)),
        ])
        .unwrap();
        assert_eq!(
            table.get(&Value::String("a".to_string())),
            Some(&Value::Number(3.0))
        );
        let Table::Map(entries) = &table else {
            panic!("expected a map shape");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, Value::String("a".to_string()));
    }
}
