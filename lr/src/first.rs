//! compute FIRST and NULLABLE sets.

use bit_set::BitSet;
use grammar::Symbol;
use crate::augment::AugmentedGrammar;

#[derive(Debug, Clone)]
pub struct FirstAndNullable {
  /// FIRST set of each nonterminal, as token indices.
  pub first: Vec<BitSet>,
  pub nullable: BitSet,
}

pub fn compute(grammar: &AugmentedGrammar) -> FirstAndNullable {
  let nullable = compute_nullable(grammar);
  let first = compute_first(grammar, &nullable);

  FirstAndNullable {
    first,
    nullable,
  }
}

fn compute_nullable(grammar: &AugmentedGrammar) -> BitSet {
  let mut nullable = BitSet::new();

  loop {
    let mut changed = false;
    for prod in &grammar.prods {
      if nullable.contains(prod.nt.index()) {
        continue;
      }
      let prod_nullable = prod.symbols.iter().all(|sym| match sym {
        Symbol::Token(_) => false,
        Symbol::Nonterminal(nt) => nullable.contains(nt.index()),
      });
      if prod_nullable {
        nullable.insert(prod.nt.index());
        changed = true;
      }
    }
    if !changed {
      break;
    }
  }

  nullable
}

fn compute_first(grammar: &AugmentedGrammar, nullable: &BitSet) -> Vec<BitSet> {
  let mut first = vec![BitSet::new(); grammar.num_nts()];

  loop {
    let mut changed = false;
    for prod in &grammar.prods {
      let mut prod_first = BitSet::new();
      for sym in &prod.symbols {
        match sym {
          Symbol::Token(token) => {
            prod_first.insert(token.index());
            break;
          }
          Symbol::Nonterminal(nt) => {
            prod_first.union_with(&first[nt.index()]);
            if !nullable.contains(nt.index()) {
              break;
            }
          }
        }
      }

      let nt_first = &mut first[prod.nt.index()];
      if !prod_first.is_subset(nt_first) {
        nt_first.union_with(&prod_first);
        changed = true;
      }
    }
    if !changed {
      break;
    }
  }

  first
}

/// FIRST of `symbols` followed by `lookaheads`.
pub fn compute_symbols_first(
  result: &mut BitSet,
  first: &FirstAndNullable,
  symbols: &[Symbol],
  lookaheads: &BitSet,
) {
  for sym in symbols {
    match sym {
      Symbol::Token(token) => {
        result.insert(token.index());
        return;
      }
      Symbol::Nonterminal(nt) => {
        result.union_with(&first.first[nt.index()]);
        if !first.nullable.contains(nt.index()) {
          return;
        }
      }
    }
  }
  result.union_with(lookaheads);
}

#[cfg(test)]
mod tests {
  use super::*;
  use grammar::GrammarBuilder;
  use grammar::rule::*;
  use crate::augment::augment;

  #[test]
  fn nullable_chain() {
    let mut builder = GrammarBuilder::new("t");
    builder
      .rule("z", choice(vec![string("d"), seq(vec![sym("x"), sym("y"), sym("z")])]))
      .rule("y", choice(vec![blank(), string("c")]))
      .rule("x", choice(vec![sym("y"), string("a")]));
    let lowered = builder.build().unwrap().lower().unwrap();
    let grammar = augment(&lowered).unwrap();
    let sets = compute(&grammar);

    // tokens: "d" 0, "c" 1, "a" 2
    assert!(!sets.nullable.contains(0));
    assert!(sets.nullable.contains(1));
    assert!(sets.nullable.contains(2));
    assert_eq!(sets.first[0].iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(sets.first[1].iter().collect::<Vec<_>>(), vec![1]);
    assert_eq!(sets.first[2].iter().collect::<Vec<_>>(), vec![1, 2]);
  }
}
