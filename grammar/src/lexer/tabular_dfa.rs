//! DFA table compression scheme from
//! https://stackoverflow.com/questions/29139162/dfa-state-transition-table-compression
//!
//! Every row is displaced into one shared transition vector; a slot belongs to
//! a state only if its check value equals that state.

use serde::{Serialize, Deserialize};
use super::dfa::Dfa;

pub use super::dfa::State;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabularDfa<V> {
  start: u32,
  state_base: Vec<usize>,
  /// (check state, next state + 1)
  transitions: Vec<(u32, u32)>,
  accept_states: Vec<Option<V>>,
}

impl<V> TabularDfa<V> {
  pub fn start(&self) -> State {
    State(self.start)
  }

  pub fn num_states(&self) -> usize {
    self.state_base.len()
  }

  pub fn transition(&self, state: State, c: u32) -> Option<State> {
    let ix = self.state_base[state.0 as usize] + c as usize;
    match self.transitions.get(ix) {
      Some(&(check, next)) if check == state.0 && next != 0 => Some(State(next - 1)),
      _ => None,
    }
  }

  /// if the state is accepting state, return the value.
  pub fn result(&self, state: State) -> Option<&V> {
    self.accept_states[state.0 as usize].as_ref()
  }
}

impl<V: Clone> TabularDfa<V> {
  pub fn from_dfa(dfa: &Dfa<V>, num_letters: usize) -> Self {
    let num_states = dfa.num_states as usize;
    let mut rows = vec![vec![]; num_states];
    for (&(state, c), &next) in &dfa.transitions {
      rows[state.0 as usize].push((c as usize, next.0));
    }

    let mut occupied = vec![false; num_letters];
    let mut state_base = Vec::with_capacity(num_states);
    let mut transitions: Vec<(u32, u32)> = vec![];

    for (state, row) in rows.iter_mut().enumerate() {
      row.sort();
      let mut base = 0;
      while row.iter().any(|&(c, _)| occupied.get(base + c).cloned().unwrap_or(false)) {
        base += 1;
      }

      let needed = base + num_letters;
      if occupied.len() < needed {
        occupied.resize(needed, false);
      }
      if transitions.len() < needed {
        transitions.resize(needed, (u32::MAX, 0));
      }

      for &(c, next) in row.iter() {
        occupied[base + c] = true;
        transitions[base + c] = (state as u32, next + 1);
      }
      state_base.push(base);
    }

    let mut accept_states = vec![None; num_states];
    for (state, value) in &dfa.accept_states {
      accept_states[state.0 as usize] = Some(value.clone());
    }

    Self {
      start: dfa.start,
      state_base,
      transitions,
      accept_states,
    }
  }
}
