use std::ops::Range;
use itertools::Itertools;
use crate::rule::{Assoc, Rule};
use crate::lexer::{Lexer, LexicalToken, TokenId};
use crate::{Grammar, GrammarError, HashMap, Set, TokenDef};

#[derive(Debug)]
pub struct LoweredGrammar {
  pub name: String,
  /// productions grouped by nonterminal, see [`LoweredNonterminal::range`].
  pub prods: Vec<Production>,
  /// user nonterminals in declaration order followed by auxiliary ones. The
  /// first one is the start symbol.
  pub nts: Vec<LoweredNonterminal>,
  pub tokens: Vec<TokenDef>,
  pub aliases: Vec<AliasDef>,
  pub lexer: Lexer,
  pub word_token: Option<TokenId>,
}

#[derive(Debug)]
pub struct LoweredNonterminal {
  pub name: String,
  pub visible: bool,
  pub kind: NonterminalKind,
  pub range: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonterminalKind {
  User,
  Repetition,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AliasDef {
  pub name: String,
  pub named: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Production {
  pub nt: NonterminalId,
  pub symbols: Vec<Symbol>,
  /// alias index per symbol.
  pub aliases: Vec<Option<usize>>,
  pub prec: i32,
  pub assoc: Option<Assoc>,
  pub dynamic_prec: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
  Nonterminal(NonterminalId),
  Token(TokenId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NonterminalId(u32);

impl NonterminalId {
  pub fn new(id: u32) -> Self {
    NonterminalId(id)
  }

  pub fn id(&self) -> u32 {
    self.0
  }

  pub fn index(&self) -> usize {
    self.0 as usize
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
struct Alternative {
  symbols: Vec<Symbol>,
  aliases: Vec<Option<usize>>,
  prec: Option<(i32, Option<Assoc>)>,
  dynamic_prec: i32,
}

impl Alternative {
  fn single(symbol: Symbol) -> Self {
    Alternative {
      symbols: vec![symbol],
      aliases: vec![None],
      ..Alternative::default()
    }
  }

  fn concat(mut self, other: Alternative) -> Self {
    self.symbols.extend(other.symbols);
    self.aliases.extend(other.aliases);
    self.prec = self.prec.or(other.prec);
    self.dynamic_prec += other.dynamic_prec;
    self
  }
}

struct Lowering<'g> {
  grammar: &'g Grammar,
  names: HashMap<&'g str, Symbol>,
  aliases: Set<AliasDef>,
  aux: Vec<(String, Vec<Alternative>)>,
  current: &'g str,
  repeat_count: usize,
}

pub(super) fn lower(grammar: &Grammar) -> Result<LoweredGrammar, GrammarError> {
  let mut names = HashMap::default();
  for (i, token) in grammar.tokens.iter().enumerate() {
    if token.named || token.regex.is_none() {
      names.insert(token.name.as_str(), Symbol::Token(TokenId(i as u32)));
    }
  }
  for (i, nt) in grammar.nts.iter().enumerate() {
    names.insert(nt.name.as_str(), Symbol::Nonterminal(NonterminalId(i as u32)));
  }

  let mut lowering = Lowering {
    grammar,
    names,
    aliases: Set::default(),
    aux: vec![],
    current: "",
    repeat_count: 0,
  };

  let mut user_alts = vec![];
  for nt in &grammar.nts {
    lowering.current = &nt.name;
    lowering.repeat_count = 0;
    user_alts.push(lowering.expand(&nt.rule)?);
  }

  let mut prods = vec![];
  let mut nts = vec![];
  let user = grammar.nts.iter()
    .zip(user_alts)
    .map(|(nt, alts)| (nt.name.clone(), nt.visible, NonterminalKind::User, alts));
  let aux = lowering.aux
    .into_iter()
    .map(|(name, alts)| (name, false, NonterminalKind::Repetition, alts));

  for (i, (name, visible, kind, alts)) in user.chain(aux).enumerate() {
    let start = prods.len();
    for alt in alts.into_iter().unique() {
      let (prec, assoc) = alt.prec.unwrap_or((0, None));
      prods.push(Production {
        nt: NonterminalId(i as u32),
        symbols: alt.symbols,
        aliases: alt.aliases,
        prec,
        assoc,
        dynamic_prec: alt.dynamic_prec,
      });
    }
    nts.push(LoweredNonterminal {
      name,
      visible,
      kind,
      range: start..prods.len(),
    });
  }

  let lexical_tokens = grammar.tokens.iter()
    .enumerate()
    .filter_map(|(i, token)| {
      token.regex.as_ref().map(|regex| LexicalToken {
        id: TokenId(i as u32),
        regex,
        precedence: token.precedence,
        literal: token.literal.is_some(),
      })
    })
    .collect::<Vec<_>>();

  Ok(LoweredGrammar {
    name: grammar.name.clone(),
    prods,
    nts,
    tokens: grammar.tokens.clone(),
    aliases: lowering.aliases.into_iter().collect(),
    lexer: Lexer::new(&lexical_tokens),
    word_token: grammar.word_token,
  })
}

impl<'g> Lowering<'g> {
  fn expand(&mut self, rule: &'g Rule) -> Result<Vec<Alternative>, GrammarError> {
    Ok(match rule {
      Rule::Blank => vec![Alternative::default()],

      Rule::Symbol(name) => {
        let symbol = self.names.get(name.as_str())
          .copied()
          .ok_or_else(|| GrammarError::NameNotFound(name.clone()))?;
        vec![Alternative::single(symbol)]
      }

      Rule::String(text) => {
        let ix = self.grammar.tokens.iter()
          .position(|t| !t.named && t.literal.as_deref() == Some(text.as_str()))
          .ok_or_else(|| GrammarError::NameNotFound(text.clone()))?;
        vec![Alternative::single(Symbol::Token(TokenId(ix as u32)))]
      }

      Rule::Pattern(source) => {
        let ix = self.grammar.tokens.iter()
          .position(|t| {
            !t.named && t.literal.is_none() && t.regex.is_some() && &t.name == source
          })
          .ok_or_else(|| GrammarError::NameNotFound(source.clone()))?;
        vec![Alternative::single(Symbol::Token(TokenId(ix as u32)))]
      }

      Rule::Seq(rules) => {
        let mut result = vec![Alternative::default()];
        for rule in rules {
          let alts = self.expand(rule)?;
          result = result.into_iter()
            .cartesian_product(alts)
            .map(|(a, b)| a.concat(b))
            .collect();
        }
        result
      }

      Rule::Choice(rules) => {
        let mut result = vec![];
        for rule in rules {
          result.extend(self.expand(rule)?);
        }
        result
      }

      Rule::Optional(rule) => {
        let mut result = vec![Alternative::default()];
        result.extend(self.expand(rule)?);
        result
      }

      Rule::Repeat(rule) => {
        let mut result = vec![Alternative::default()];
        result.push(self.repetition(rule)?);
        result
      }

      Rule::Repeat1(rule) => vec![self.repetition(rule)?],

      Rule::Prec { level, assoc, rule } => {
        let mut alts = self.expand(rule)?;
        for alt in &mut alts {
          if alt.prec.is_none() {
            alt.prec = Some((*level, *assoc));
          }
        }
        alts
      }

      Rule::DynamicPrec { level, rule } => {
        let mut alts = self.expand(rule)?;
        for alt in &mut alts {
          if alt.dynamic_prec == 0 {
            alt.dynamic_prec = *level;
          }
        }
        alts
      }

      Rule::Alias { rule, name, named } => {
        let (alias, _) = self.aliases.insert_full(AliasDef {
          name: name.clone(),
          named: *named,
        });
        let mut alts = self.expand(rule)?;
        for alt in &mut alts {
          if alt.symbols.len() != 1 {
            return Err(GrammarError::InvalidAlias(self.current.to_owned()));
          }
          alt.aliases[0] = Some(alias);
        }
        alts
      }

      Rule::Token(_) => return Err(GrammarError::InvalidToken(self.current.to_owned())),
    })
  }

  /// `R → x | R x`
  fn repetition(&mut self, rule: &'g Rule) -> Result<Alternative, GrammarError> {
    self.repeat_count += 1;
    let name = format!("{}_repeat{}", self.current, self.repeat_count);
    let ix = self.aux.len();
    self.aux.push((name, vec![]));
    let nt = Symbol::Nonterminal(NonterminalId((self.grammar.nts.len() + ix) as u32));

    let items = self.expand(rule)?;
    let mut alts = items.clone();
    alts.extend(items.into_iter().map(|item| Alternative::single(nt).concat(item)));
    self.aux[ix].1 = alts;

    Ok(Alternative::single(nt))
  }
}
