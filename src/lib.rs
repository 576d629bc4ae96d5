//! Incremental GLR parsing into concrete syntax trees.
//!
//! A grammar is written with [`GrammarBuilder`] and the [`rule`]
//! combinators, compiled into an artifact with [`compile`] and loaded as a
//! [`Language`]. A [`Parser`] turns text into a [`Tree`] that covers every
//! byte of the input, errors included, and re-parses edited text reusing
//! the unchanged parts of the previous tree. [`Query`] finds nodes by
//! pattern.
//!
//! [`twig`] provides the grammar of the Shopware Twig template dialect.

use fnv::FnvBuildHasher;
use indexmap::{IndexMap, IndexSet};

pub mod error;
pub mod language;
pub mod length;
pub mod node;
pub mod parser;
pub mod query;
pub mod scanner;
pub mod tree;
pub mod twig;
mod lexer;
mod subtree;

pub use grammar::{rule, GrammarBuilder};
pub use self::error::{CompileError, LoadError, SyntaxError, SyntaxErrorKind};
pub use self::language::{compile, Language, Symbol, ABI_VERSION, MIN_COMPATIBLE_ABI_VERSION};
pub use self::length::Point;
pub use self::node::{Node, TreeCursor};
pub use self::parser::{EngineState, ParseOptions, ParseOutcome, Parser};
pub use self::query::{Query, QueryCapture, QueryCursor, QueryError, QueryMatch};
pub use self::scanner::{ExternalScanner, ScanCursor, ScannerState};
pub use self::tree::{InputEdit, Range, Tree};

pub type Map<K, V> = IndexMap<K, V, FnvBuildHasher>;
pub type Set<K> = IndexSet<K, FnvBuildHasher>;
pub type HashMap<K, V> = fnv::FnvHashMap<K, V>;
pub type HashSet<K> = fnv::FnvHashSet<K>;
