//! Compiled grammar artifacts.
//!
//! An artifact is the magic bytes `TWSL`, a little-endian `u32` ABI version
//! and a bincode-encoded [`LanguageData`]. The version is checked before the
//! body is decoded, so an artifact from an incompatible toolchain is
//! rejected without being interpreted.

use std::fmt;
use std::sync::Arc;
use grammar::{GrammarBuilder, LoweredGrammar, NonterminalKind, TokenKind};
use lr::{Action, ParseTables};
use serde::{Serialize, Deserialize};
use smallvec::SmallVec;
use tracing::{debug, info};
use crate::error::{CompileError, LoadError};
use crate::scanner::ExternalScanner;

pub type Symbol = u16;
pub type StateId = u16;

/// End of input.
pub const END: Symbol = 0;
/// Nodes and leaves covering text that could not be parsed.
pub const ERROR: Symbol = u16::MAX;

pub const ABI_VERSION: u32 = 2;
pub const MIN_COMPATIBLE_ABI_VERSION: u32 = 2;

const MAGIC: &[u8; 4] = b"TWSL";
const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
  End,
  Token,
  External,
  /// whitespace and the like, never part of the tree.
  Skip,
  Nonterminal,
  /// helper nonterminals introduced for repetitions.
  Auxiliary,
  Alias,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
  pub name: String,
  pub named: bool,
  pub visible: bool,
  pub kind: SymbolKind,
  /// may appear between any two tokens.
  pub extra: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseAction {
  Shift(StateId),
  Reduce {
    symbol: Symbol,
    child_count: u16,
    production: u32,
    dynamic_precedence: i32,
  },
  Accept,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionInfo {
  pub lhs: Symbol,
  pub child_count: u16,
  /// alias symbol per child position, empty if the production has none.
  pub aliases: Vec<Option<Symbol>>,
  pub dynamic_precedence: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageData {
  pub name: String,
  pub symbols: Vec<SymbolInfo>,
  /// grammar tokens plus [`END`].
  pub token_count: usize,
  /// user and auxiliary nonterminals.
  pub nonterminal_count: usize,
  /// symbols of the external tokens, in declaration order.
  pub external_tokens: Vec<Symbol>,
  pub productions: Vec<ProductionInfo>,
  pub state_count: usize,
  /// `actions[state * token_count + symbol]`, empty cells are errors.
  pub actions: Vec<SmallVec<[ParseAction; 1]>>,
  /// `gotos[state * nonterminal_count + symbol - token_count]`
  pub gotos: Vec<Option<StateId>>,
  pub lexer: grammar::Lexer,
  /// per token symbol, whether it may be lexed in a state that cannot use
  /// it: strings, extras, the word token and tokens that can start a
  /// document.
  pub recovery_tokens: Vec<bool>,
  pub word_token: Option<Symbol>,
  pub start_symbol: Symbol,
}

/// Compiles a grammar into a loadable artifact.
pub fn compile(builder: &GrammarBuilder) -> Result<Vec<u8>, CompileError> {
  LanguageData::generate(builder)?.to_bytes()
}

impl LanguageData {
  pub fn generate(builder: &GrammarBuilder) -> Result<Self, CompileError> {
    let grammar = builder.build()?.lower()?;
    let tables = lr::build(&grammar)?;
    info!(
      grammar = %grammar.name,
      states = tables.num_states,
      conflicts = tables.conflicts.len(),
      "generated parse tables"
    );
    for conflict in &tables.conflicts {
      debug!(state = conflict.state, token = %grammar.tokens[conflict.token.index()].name, "kept conflict");
    }
    Self::from_tables(&grammar, &tables)
  }

  fn from_tables(grammar: &LoweredGrammar, tables: &ParseTables) -> Result<Self, CompileError> {
    let token_count = grammar.tokens.len() + 1;
    let nonterminal_count = grammar.nts.len();
    let total = token_count + nonterminal_count + grammar.aliases.len();
    if total >= ERROR as usize {
      return Err(CompileError::TooManySymbols(total));
    }

    let token_symbol = |index: usize| -> Symbol {
      if index == tables.eof.index() { END } else { (index + 1) as Symbol }
    };
    let nt_symbol = |index: usize| (token_count + index) as Symbol;
    let alias_symbol = |index: usize| (token_count + nonterminal_count + index) as Symbol;

    let mut symbols = Vec::with_capacity(total);
    symbols.push(SymbolInfo {
      name: "end".to_owned(),
      named: false,
      visible: false,
      kind: SymbolKind::End,
      extra: false,
    });
    let mut external_tokens = vec![];
    for (i, token) in grammar.tokens.iter().enumerate() {
      let kind = match (token.kind, &token.regex) {
        (TokenKind::Skip, _) => SymbolKind::Skip,
        (_, None) => {
          external_tokens.push(token_symbol(i));
          SymbolKind::External
        }
        _ => SymbolKind::Token,
      };
      symbols.push(SymbolInfo {
        name: token.name.clone(),
        named: token.named,
        visible: token.visible,
        kind,
        extra: token.kind == TokenKind::Extra,
      });
    }
    for nt in &grammar.nts {
      symbols.push(SymbolInfo {
        name: nt.name.clone(),
        named: true,
        visible: nt.visible,
        kind: match nt.kind {
          NonterminalKind::User => SymbolKind::Nonterminal,
          NonterminalKind::Repetition => SymbolKind::Auxiliary,
        },
        extra: false,
      });
    }
    for alias in &grammar.aliases {
      symbols.push(SymbolInfo {
        name: alias.name.clone(),
        named: alias.named,
        visible: true,
        kind: SymbolKind::Alias,
        extra: false,
      });
    }

    let productions = grammar.prods.iter()
      .map(|prod| ProductionInfo {
        lhs: nt_symbol(prod.nt.index()),
        child_count: prod.symbols.len() as u16,
        aliases: if prod.aliases.iter().any(Option::is_some) {
          prod.aliases.iter().map(|a| a.map(alias_symbol)).collect()
        } else {
          vec![]
        },
        dynamic_precedence: prod.dynamic_prec,
      })
      .collect::<Vec<_>>();

    let mut actions = vec![SmallVec::new(); tables.num_states * token_count];
    for state in 0..tables.num_states {
      for token in 0..tables.num_tokens {
        let cell = &tables.action[state * tables.num_tokens + token];
        let converted = cell.iter()
          .map(|action| match *action {
            Action::Shift(next) => ParseAction::Shift(next as StateId),
            Action::Reduce(prod) => {
              let info = &productions[prod];
              ParseAction::Reduce {
                symbol: info.lhs,
                child_count: info.child_count,
                production: prod as u32,
                dynamic_precedence: info.dynamic_precedence,
              }
            }
            Action::Accept => ParseAction::Accept,
          })
          .collect();
        actions[state * token_count + token_symbol(token) as usize] = converted;
      }
    }

    let gotos = tables.goto.iter()
      .map(|next| next.map(|s| s as StateId))
      .collect();

    let word_token = grammar.word_token.map(|t| token_symbol(t.index()));
    let recovery_tokens = (0..token_count)
      .map(|symbol| {
        let info = &symbols[symbol];
        info.kind == SymbolKind::Token && (
          info.extra
            || word_token == Some(symbol as Symbol)
            || grammar.tokens[symbol - 1].literal.is_some()
            || !actions[symbol].is_empty()
        )
      })
      .collect();

    Ok(LanguageData {
      name: grammar.name.clone(),
      symbols,
      token_count,
      nonterminal_count,
      external_tokens,
      productions,
      state_count: tables.num_states,
      actions,
      gotos,
      lexer: grammar.lexer.clone(),
      recovery_tokens,
      word_token,
      start_symbol: nt_symbol(0),
    })
  }

  pub fn to_bytes(&self) -> Result<Vec<u8>, CompileError> {
    let mut bytes = MAGIC.to_vec();
    bytes.extend_from_slice(&ABI_VERSION.to_le_bytes());
    bincode::serialize_into(&mut bytes, self)
      .map_err(|e| CompileError::Encode(e.to_string()))?;
    Ok(bytes)
  }

  /// Validates every table index, so that a loaded language never panics
  /// on lookup.
  fn check(&self) -> Result<(), String> {
    let token_count = self.token_count;
    let nonterminal_count = self.nonterminal_count;
    let is_nonterminal = |symbol: Symbol| {
      (token_count..token_count + nonterminal_count).contains(&(symbol as usize))
    };

    if token_count == 0 || self.state_count == 0 || self.state_count > StateId::MAX as usize {
      return Err("empty or oversized tables".to_owned());
    }
    if self.symbols.len() < token_count + nonterminal_count || self.symbols.len() >= ERROR as usize {
      return Err("symbol table size mismatch".to_owned());
    }
    if self.actions.len() != self.state_count * token_count {
      return Err("action table size mismatch".to_owned());
    }
    if self.gotos.len() != self.state_count * nonterminal_count {
      return Err("goto table size mismatch".to_owned());
    }
    if self.recovery_tokens.len() != token_count {
      return Err("recovery token table size mismatch".to_owned());
    }

    for action in self.actions.iter().flatten() {
      match *action {
        ParseAction::Shift(next) if next as usize >= self.state_count => {
          return Err(format!("shift to unknown state {}", next));
        }
        ParseAction::Reduce { symbol, production, .. } => {
          let lhs = self.productions.get(production as usize).map(|p| p.lhs);
          if lhs != Some(symbol) {
            return Err(format!("reduce by unknown production {}", production));
          }
        }
        _ => {}
      }
    }
    if let Some(next) = self.gotos.iter().flatten().find(|&&next| next as usize >= self.state_count) {
      return Err(format!("goto to unknown state {}", next));
    }

    for (i, production) in self.productions.iter().enumerate() {
      let bad_alias = production.aliases.iter()
        .flatten()
        .any(|&alias| alias as usize >= self.symbols.len());
      if !is_nonterminal(production.lhs) || bad_alias {
        return Err(format!("production {} has unknown symbols", i));
      }
    }

    let is_external = |&symbol: &Symbol| {
      self.symbols.get(symbol as usize).map_or(false, |s| s.kind == SymbolKind::External)
    };
    if !self.external_tokens.iter().all(is_external) {
      return Err("external token is not an external symbol".to_owned());
    }
    if self.word_token.map_or(false, |word| word == END || word as usize >= token_count) {
      return Err("word token out of range".to_owned());
    }
    if !is_nonterminal(self.start_symbol) {
      return Err("start symbol is not a nonterminal".to_owned());
    }

    let lexer = &self.lexer;
    if lexer.reachable.len() != lexer.dfa.num_states() {
      return Err("lexer table size mismatch".to_owned());
    }
    if lexer.reachable.iter().flatten().any(|token| token.index() + 1 >= token_count) {
      return Err("lexer accepts an unknown token".to_owned());
    }
    Ok(())
  }
}

/// A loaded grammar, cheap to clone and shareable between threads.
#[derive(Clone)]
pub struct Language(Arc<LanguageInner>);

struct LanguageInner {
  data: LanguageData,
  scanner: Option<Arc<dyn ExternalScanner>>,
}

impl Language {
  pub fn from_bytes(
    bytes: &[u8],
    scanner: Option<Arc<dyn ExternalScanner>>,
  ) -> Result<Self, LoadError> {
    if bytes.len() < HEADER_LEN {
      return Err(LoadError::Malformed("truncated header".to_owned()));
    }
    if &bytes[..4] != MAGIC {
      return Err(LoadError::BadMagic);
    }
    let mut version = [0; 4];
    version.copy_from_slice(&bytes[4..HEADER_LEN]);
    let version = u32::from_le_bytes(version);
    if version < MIN_COMPATIBLE_ABI_VERSION || version > ABI_VERSION {
      return Err(LoadError::IncompatibleGrammarVersion {
        found: version,
        min_supported: MIN_COMPATIBLE_ABI_VERSION,
        supported: ABI_VERSION,
      });
    }

    let data: LanguageData = bincode::deserialize(&bytes[HEADER_LEN..])
      .map_err(|e| LoadError::Malformed(e.to_string()))?;
    data.check().map_err(LoadError::Malformed)?;
    if !data.external_tokens.is_empty() && scanner.is_none() {
      return Err(LoadError::MissingExternalScanner(data.name));
    }

    Ok(Language(Arc::new(LanguageInner { data, scanner })))
  }

  /// Compiles and loads a grammar in one step.
  pub fn compile(
    builder: &GrammarBuilder,
    scanner: Option<Arc<dyn ExternalScanner>>,
  ) -> Result<Self, LoadError> {
    let bytes = compile(builder)?;
    Self::from_bytes(&bytes, scanner)
  }

  pub fn name(&self) -> &str {
    &self.0.data.name
  }

  pub fn symbol_count(&self) -> usize {
    self.0.data.symbols.len()
  }

  pub fn symbol_name(&self, symbol: Symbol) -> &str {
    if symbol == ERROR {
      "ERROR"
    } else {
      &self.0.data.symbols[symbol as usize].name
    }
  }

  pub fn symbol_is_named(&self, symbol: Symbol) -> bool {
    symbol == ERROR || self.0.data.symbols[symbol as usize].named
  }

  pub fn symbol_is_visible(&self, symbol: Symbol) -> bool {
    symbol == ERROR || self.0.data.symbols[symbol as usize].visible
  }

  pub fn symbol_is_extra(&self, symbol: Symbol) -> bool {
    symbol != ERROR && self.0.data.symbols[symbol as usize].extra
  }

  /// Whether some visible symbol has this name.
  pub fn has_kind(&self, name: &str, named: bool) -> bool {
    (name == "ERROR" && named)
      || self.0.data.symbols.iter().any(|s| s.visible && s.named == named && s.name == name)
  }

  pub fn state_count(&self) -> usize {
    self.0.data.state_count
  }

  pub(crate) fn data(&self) -> &LanguageData {
    &self.0.data
  }

  pub(crate) fn scanner(&self) -> Option<&dyn ExternalScanner> {
    self.0.scanner.as_deref()
  }

  pub(crate) fn is_recovery_token(&self, symbol: Symbol) -> bool {
    self.0.data.recovery_tokens.get(symbol as usize).copied().unwrap_or(false)
  }

  pub(crate) fn is_token(&self, symbol: Symbol) -> bool {
    symbol != ERROR && (symbol as usize) < self.0.data.token_count
  }

  pub(crate) fn actions(&self, state: StateId, symbol: Symbol) -> &[ParseAction] {
    let data = &self.0.data;
    if symbol == ERROR {
      return &[];
    }
    &data.actions[state as usize * data.token_count + symbol as usize]
  }

  pub(crate) fn goto(&self, state: StateId, symbol: Symbol) -> Option<StateId> {
    let data = &self.0.data;
    let nt = (symbol as usize).checked_sub(data.token_count)?;
    if nt >= data.nonterminal_count {
      return None;
    }
    data.gotos[state as usize * data.nonterminal_count + nt]
  }

  pub(crate) fn production(&self, index: u32) -> &ProductionInfo {
    &self.0.data.productions[index as usize]
  }
}

impl PartialEq for Language {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }
}

impl fmt::Debug for Language {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("Language")
      .field("name", &self.0.data.name)
      .field("symbols", &self.0.data.symbols.len())
      .field("states", &self.0.data.state_count)
      .field("external_scanner", &self.0.scanner.is_some())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use grammar::rule::*;

  fn output_grammar() -> GrammarBuilder {
    let mut builder = GrammarBuilder::new("output");
    builder
      .rule("source", repeat(sym("output-statement")))
      .rule("output-statement", seq(vec![string("{{"), sym("identifier"), string("}}")]))
      .rule("identifier", pattern("[a-z]+"))
      .extra(pattern(r"\s"));
    builder
  }

  #[test]
  fn symbols_are_numbered() {
    let language = Language::compile(&output_grammar(), None).unwrap();
    assert_eq!(language.symbol_name(END), "end");
    assert_eq!(language.symbol_name(1), "identifier");
    assert_eq!(language.symbol_name(2), "{{");
    assert!(!language.symbol_is_named(2));
    assert_eq!(language.symbol_name(ERROR), "ERROR");
    let data = language.data();
    assert_eq!(data.token_count, 5);
    assert_eq!(language.symbol_name(data.start_symbol), "source");
    assert!(language.has_kind("output-statement", true));
    assert!(!language.has_kind("source_repeat1", true));
    assert!(language.has_kind("}}", false));
  }

  #[test]
  fn rejects_incompatible_version() {
    let mut bytes = compile(&output_grammar()).unwrap();
    bytes[4..8].copy_from_slice(&(ABI_VERSION + 1).to_le_bytes());
    let err = Language::from_bytes(&bytes, None).unwrap_err();
    assert_eq!(err, LoadError::IncompatibleGrammarVersion {
      found: ABI_VERSION + 1,
      min_supported: MIN_COMPATIBLE_ABI_VERSION,
      supported: ABI_VERSION,
    });
  }

  #[test]
  fn rejects_malformed_artifacts() {
    let bytes = compile(&output_grammar()).unwrap();
    assert_eq!(Language::from_bytes(b"TWS", None).unwrap_err(),
      LoadError::Malformed("truncated header".to_owned()));
    let mut bad_magic = bytes.clone();
    bad_magic[0] = b'X';
    assert_eq!(Language::from_bytes(&bad_magic, None).unwrap_err(), LoadError::BadMagic);
    let truncated = &bytes[..bytes.len() / 2];
    assert!(matches!(Language::from_bytes(truncated, None), Err(LoadError::Malformed(_))));
  }

  #[test]
  fn rejects_out_of_range_indices() {
    let reload = |data: &LanguageData| Language::from_bytes(&data.to_bytes().unwrap(), None);
    let data = LanguageData::generate(&output_grammar()).unwrap();
    assert!(reload(&data).is_ok());

    let mut bad_shift = data.clone();
    let cell = bad_shift.actions.iter_mut().find(|cell| !cell.is_empty()).unwrap();
    cell[0] = ParseAction::Shift(data.state_count as StateId);
    assert_eq!(reload(&bad_shift).unwrap_err(),
      LoadError::Malformed(format!("shift to unknown state {}", data.state_count)));

    let mut bad_goto = data.clone();
    bad_goto.gotos[0] = Some(StateId::MAX);
    assert!(matches!(reload(&bad_goto), Err(LoadError::Malformed(m)) if m.starts_with("goto")));

    let mut bad_reduce = data.clone();
    let reduce = bad_reduce.actions.iter_mut().flatten()
      .find_map(|action| match action {
        ParseAction::Reduce { production, .. } => Some(production),
        _ => None,
      })
      .unwrap();
    *reduce = data.productions.len() as u32;
    assert!(matches!(reload(&bad_reduce), Err(LoadError::Malformed(m)) if m.starts_with("reduce")));

    let mut bad_start = data.clone();
    bad_start.start_symbol = 1;
    assert_eq!(reload(&bad_start).unwrap_err(),
      LoadError::Malformed("start symbol is not a nonterminal".to_owned()));

    let mut bad_external = data.clone();
    bad_external.external_tokens.push(data.symbols.len() as Symbol);
    assert!(matches!(reload(&bad_external), Err(LoadError::Malformed(_))));
  }

  #[test]
  fn recovery_tokens() {
    let language = Language::compile(&output_grammar(), None).unwrap();
    // identifier only follows `{{`
    assert!(!language.is_recovery_token(1));
    assert!(language.is_recovery_token(2));
    assert!(language.is_recovery_token(3));
    assert!(!language.is_recovery_token(END));
    assert!(!language.is_recovery_token(ERROR));
  }

  #[test]
  fn externals_need_a_scanner() {
    let mut builder = output_grammar();
    builder.external("raw");
    let bytes = compile(&builder).unwrap();
    assert_eq!(
      Language::from_bytes(&bytes, None).unwrap_err(),
      LoadError::MissingExternalScanner("output".to_owned())
    );
  }
}
