pub mod ast;
pub mod builtins;
pub mod eval;
pub mod lex;
pub mod parse;
pub mod value;

pub use eval::Executor;
pub use lex::Lexer;
pub use parse::Parser;
pub use value::Value;

use log::trace;
use miette::Error;

/// Runs a whole program. The parameters seed the initial stack as strings,
/// first parameter deepest; the result is the rendered final stack,
/// top-to-bottom.
pub fn run(source: &str, parameters: &[String]) -> Result<String, Error> {
    trace!("lexing {source}");
    let lexer = Lexer::new(source);
    trace!("parsing");
    let program = Parser::new(lexer)?.parse()?;
    trace!("executing {} nodes", program.len());
    let stack = parameters
        .iter()
        .map(|parameter| Value::String(parameter.clone()))
        .collect();
    let mut executor = Executor::with_stack(stack);
    executor.execute(&program)?;
    Ok(executor.to_string())
}
