use std::collections::VecDeque;
use bit_set::BitSet;
use grammar::{HashMap, Map, Symbol};
use tracing::debug;
use crate::augment::AugmentedGrammar;
use crate::first::{self, FirstAndNullable};
use super::{Builder, Item, State, StateStore, encode_item, decode_item};

/// Builds the LALR(1) automaton. State 0 is the start state.
pub fn gen_states(builder: &mut Builder) {
  let sets = first::compute(builder.grammar);
  let max_nsym_p1 = builder.max_nsym_p1;

  let start_kernel = vec![Item {
    key: encode_item(max_nsym_p1, builder.grammar.start_prod, 0),
    lookaheads: BitSet::new(),
  }];
  let (start_state, _) = store_state(&mut builder.states, start_kernel);

  let mut queue = VecDeque::new();
  queue.push_back(start_state);

  while let Some(state_ix) = queue.pop_front() {
    let state = &builder.states[state_ix as usize];
    let mut items = state.items[..state.kernel_len].to_vec();
    compute_closure(builder.grammar, &sets, max_nsym_p1, &mut items);

    let transitions = compute_transitions(builder.grammar, max_nsym_p1, &items);
    builder.states[state_ix as usize].items = items;

    for (sym, mut kernel_item_set) in transitions {
      kernel_item_set.sort_by_key(|item| item.key);

      let (next_state, changed) = store_state(&mut builder.states, kernel_item_set);
      if changed {
        queue.push_back(next_state);
      }
      builder.states[state_ix as usize].transitions.insert(sym, next_state);
    }
  }

  debug!(states = builder.states.len(), "built LALR(1) automaton");
}

/// `kernel_item_set` is sorted by the field `key`. States with the same
/// kernel are merged and their lookaheads united.
///
/// Returns whether the state has changed.
fn store_state(states: &mut StateStore, kernel_item_set: Vec<Item>) -> (u32, bool) {
  let kernel_key_set = kernel_item_set.iter()
    .map(|item| item.key)
    .collect::<Vec<_>>();

  if let Some(i) = states.get_index_of(&kernel_key_set) {
    let mut changed = false;
    for (item, new_item) in states[i].items.iter_mut().zip(kernel_item_set) {
      if !new_item.lookaheads.is_subset(&item.lookaheads) {
        item.lookaheads.union_with(&new_item.lookaheads);
        changed = true;
      }
    }
    (i as u32, changed)
  } else {
    let state_ix = states.insert_full(
      kernel_key_set,
      State::new(kernel_item_set),
    ).0 as u32;

    (state_ix, true)
  }
}

fn compute_closure(
  grammar: &AugmentedGrammar,
  sets: &FirstAndNullable,
  max_nsym_p1: usize,
  items: &mut Vec<Item>,
) {
  let mut index = items.iter()
    .enumerate()
    .map(|(i, item)| (item.key, i))
    .collect::<HashMap<_, _>>();
  let mut first = BitSet::new();

  loop {
    let mut changed = false;
    let mut i = 0;
    while i < items.len() {
      let (prod, dot) = decode_item(max_nsym_p1, items[i].key);
      let symbols = &grammar.prods[prod].symbols;

      if let Some(Symbol::Nonterminal(nt)) = symbols.get(dot) {
        first.clear();
        first::compute_symbols_first(
          &mut first,
          sets,
          &symbols[dot + 1..],
          &items[i].lookaheads);

        for prod_ix in grammar.nt_ranges[nt.index()].clone() {
          let key = encode_item(max_nsym_p1, prod_ix, 0);
          match index.get(&key) {
            Some(&j) => {
              if !first.is_subset(&items[j].lookaheads) {
                items[j].lookaheads.union_with(&first);
                changed = true;
              }
            }
            None => {
              index.insert(key, items.len());
              items.push(Item {
                key,
                lookaheads: first.clone(),
              });
              changed = true;
            }
          }
        }
      }

      i += 1;
    }

    if !changed {
      break;
    }
  }
}

fn compute_transitions(
  grammar: &AugmentedGrammar,
  max_nsym_p1: usize,
  items: &[Item],
) -> Map<Symbol, Vec<Item>> {
  let mut transitions = Map::<_, Vec<Item>>::default();

  for item in items {
    let (prod_ix, dot) = decode_item(max_nsym_p1, item.key);
    let prod = &grammar.prods[prod_ix];
    if dot == prod.symbols.len() {
      continue;
    }

    let next_item = encode_item(max_nsym_p1, prod_ix, dot + 1);
    transitions.entry(prod.symbols[dot])
      .or_default()
      .push(Item {
        key: next_item,
        lookaheads: item.lookaheads.clone(),
      });
  }

  transitions
}

#[cfg(test)]
mod tests {
  use super::*;
  use grammar::GrammarBuilder;
  use grammar::rule::*;
  use crate::augment::augment;

  #[test]
  fn dragon_book_lalr() {
    // S = C C; C = c C | d
    let mut builder = GrammarBuilder::new("t");
    builder
      .rule("s", seq(vec![sym("c_"), sym("c_")]))
      .rule("c_", choice(vec![seq(vec![string("c"), sym("c_")]), string("d")]));
    let lowered = builder.build().unwrap().lower().unwrap();
    let grammar = augment(&lowered).unwrap();
    let mut builder = Builder::new(&grammar);
    gen_states(&mut builder);

    // the canonical LR(1) automaton has 10 states, LALR(1) merges 3 pairs.
    assert_eq!(builder.states.len(), 8);
    assert!(builder.states_string().starts_with("State 0:\n  S' → . s $"));
  }
}
