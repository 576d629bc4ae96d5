use std::ops::Range;
use grammar::{LoweredGrammar, NonterminalId, Production, Symbol, TokenId};
use crate::TableError;

/// The grammar with `S' → S $` appended, where `$` is a new token following
/// every grammar token.
pub struct AugmentedGrammar<'a> {
  pub grammar: &'a LoweredGrammar,
  pub prods: Vec<Production>,
  pub nt_ranges: Vec<Range<usize>>,
  pub eof: TokenId,
  pub start_prod: usize,
}

impl<'a> AugmentedGrammar<'a> {
  pub fn num_tokens(&self) -> usize {
    self.eof.index() + 1
  }

  pub fn num_nts(&self) -> usize {
    self.nt_ranges.len()
  }
}

pub fn augment(grammar: &LoweredGrammar) -> Result<AugmentedGrammar, TableError> {
  if grammar.nts.is_empty() {
    return Err(TableError::NoStartSymbol);
  }

  let eof = TokenId::new(grammar.tokens.len() as u32);
  let start_nt = NonterminalId::new(grammar.nts.len() as u32);

  let mut prods = grammar.prods.clone();
  let mut nt_ranges = grammar.nts.iter()
    .map(|nt| nt.range.clone())
    .collect::<Vec<_>>();

  let start_prod = prods.len();
  prods.push(Production {
    nt: start_nt,
    symbols: vec![
      Symbol::Nonterminal(NonterminalId::new(0)),
      Symbol::Token(eof),
    ],
    aliases: vec![None, None],
    prec: 0,
    assoc: None,
    dynamic_prec: 0,
  });
  nt_ranges.push(start_prod..prods.len());

  Ok(AugmentedGrammar {
    grammar,
    prods,
    nt_ranges,
    eof,
    start_prod,
  })
}
