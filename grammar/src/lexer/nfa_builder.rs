use super::nfa::*;
use crate::{Map, Set};

pub struct NfaBuilder<V> {
  counter: usize,
  transitions: Map<(State, Option<u32>), Set<State>>,
  accept_states: Map<State, V>,
}

impl<V> NfaBuilder<V> {
  pub fn new() -> Self {
    Self {
      counter: 0,
      transitions: Map::default(),
      accept_states: Map::default(),
    }
  }

  pub fn build(self) -> Nfa<V> {
    Nfa {
      transitions: self.transitions,
      accept_states: self.accept_states,
    }
  }

  pub fn state(&mut self) -> State {
    let i = self.counter;
    self.counter += 1;
    State(i)
  }

  /// `None` is an epsilon transition.
  pub fn transition(&mut self, src: State, dest: State, c: Option<u32>) {
    self.transitions.entry((src, c)).or_default().insert(dest);
  }

  pub fn accept(&mut self, state: State, value: V) {
    self.accept_states.insert(state, value);
  }
}
