use std::collections::{BTreeMap, BTreeSet, VecDeque};
use super::nfa::{Nfa, State};
use super::dfa::{Dfa, State as DfaState};
use super::dfa_builder::DfaBuilder;
use crate::HashMap;

/// Subset construction. The value of an accepting DFA state is the sorted list
/// of values of the NFA accepting states it contains.
pub fn powerset<V: Clone + Ord>(nfa: &Nfa<V>, start: State) -> Dfa<Vec<V>> {
  let mut edges = HashMap::<State, Vec<(Option<u32>, State)>>::default();
  for ((src, c), dests) in &nfa.transitions {
    let out = edges.entry(*src).or_default();
    out.extend(dests.iter().map(|dest| (*c, *dest)));
  }

  let mut builder = DfaBuilder::new();
  let mut states = BTreeMap::<BTreeSet<State>, DfaState>::new();
  let mut queue = VecDeque::new();

  let start_set = epsilon_closure(&edges, std::iter::once(start));
  let dfa_start = builder.state();
  states.insert(start_set.clone(), dfa_start);
  queue.push_back(start_set);

  while let Some(set) = queue.pop_front() {
    let from = states[&set];

    let mut values = set.iter()
      .filter_map(|s| nfa.accept_states.get(s).cloned())
      .collect::<Vec<_>>();
    if !values.is_empty() {
      values.sort();
      values.dedup();
      builder.accept(from, values);
    }

    let mut moves = BTreeMap::<u32, BTreeSet<State>>::new();
    for s in &set {
      if let Some(out) = edges.get(s) {
        for &(c, dest) in out {
          if let Some(c) = c {
            moves.entry(c).or_default().insert(dest);
          }
        }
      }
    }

    for (c, targets) in moves {
      let target_set = epsilon_closure(&edges, targets.into_iter());
      let to = match states.get(&target_set) {
        Some(&to) => to,
        None => {
          let to = builder.state();
          states.insert(target_set.clone(), to);
          queue.push_back(target_set);
          to
        }
      };
      builder.transition(from, to, c);
    }
  }

  builder.build(dfa_start)
}

fn epsilon_closure(
  edges: &HashMap<State, Vec<(Option<u32>, State)>>,
  seeds: impl Iterator<Item = State>,
) -> BTreeSet<State> {
  let mut closure = BTreeSet::new();
  let mut stack = seeds.collect::<Vec<_>>();

  while let Some(s) = stack.pop() {
    if !closure.insert(s) {
      continue;
    }
    if let Some(out) = edges.get(&s) {
      for &(c, dest) in out {
        if c.is_none() && !closure.contains(&dest) {
          stack.push(dest);
        }
      }
    }
  }

  closure
}
