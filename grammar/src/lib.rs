//! Grammar model, lowering and lexical automaton construction.
//!
//! A grammar is described with the typed [`rule`] combinators and a
//! [`GrammarBuilder`]. [`Grammar::lower`] flattens the rule trees into plain
//! productions and compiles every token pattern into one [`Lexer`] automaton.

use fnv::FnvBuildHasher;
use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

pub mod rule;
pub mod regex;
pub mod lexer;
mod grammar;

pub use self::grammar::*;
pub use self::rule::{Rule, Assoc};
pub use lexer::*;

pub type Map<K, V> = IndexMap<K, V, FnvBuildHasher>;
pub type Set<K> = IndexSet<K, FnvBuildHasher>;
pub type HashMap<K, V> = fnv::FnvHashMap<K, V>;
pub type HashSet<K> = fnv::FnvHashSet<K>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GrammarError {
  #[error("grammar has no rules")]
  NoRules,
  #[error("name not found: {0}")]
  NameNotFound(String),
  #[error("name conflict: {0} is declared more than once")]
  NameConflict(String),
  #[error("invalid pattern for {name}: {error}")]
  Regex {
    name: String,
    error: regex::RegexError,
  },
  #[error("alias must wrap exactly one symbol in rule {0}")]
  InvalidAlias(String),
  #[error("lexical rule {0} may only contain patterns and strings")]
  InvalidToken(String),
}
