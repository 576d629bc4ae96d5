//! LALR(1) table construction for GLR parsing.
//!
//! Conflicts that precedence and associativity cannot settle are kept in the
//! ACTION table: a cell may hold several actions, and the runtime explores
//! them by forking parse stacks.

use grammar::LoweredGrammar;
use thiserror::Error;

pub use builder::tables::{Action, Conflict, ConflictKind, ParseTables};

mod augment;
mod first;
mod builder;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TableError {
  #[error("grammar has no nonterminals")]
  NoStartSymbol,
  #[error("too many states: {0}")]
  TooManyStates(usize),
}

/// Upper bound on the number of states, so that states fit in a `u16`.
pub const MAX_STATES: usize = u16::MAX as usize - 1;

pub fn build(grammar: &LoweredGrammar) -> Result<ParseTables, TableError> {
  let augmented = augment::augment(grammar)?;
  let mut builder = builder::Builder::new(&augmented);
  builder::states::gen_states(&mut builder);
  if builder.states.len() > MAX_STATES {
    return Err(TableError::TooManyStates(builder.states.len()));
  }
  Ok(builder::tables::gen_tables(&builder))
}
