use super::dfa::*;
use crate::Map;

pub struct DfaBuilder<V> {
  counter: u32,
  transitions: Map<(State, u32), State>,
  accept_states: Map<State, V>,
}

impl<V> DfaBuilder<V> {
  pub fn new() -> Self {
    Self {
      counter: 0,
      transitions: Map::default(),
      accept_states: Map::default(),
    }
  }

  pub fn build(self, start: State) -> Dfa<V> {
    Dfa {
      start: start.0,
      transitions: self.transitions,
      accept_states: self.accept_states,
      num_states: self.counter,
    }
  }

  pub fn state(&mut self) -> State {
    let i = self.counter;
    self.counter += 1;
    State(i)
  }

  pub fn transition(&mut self, src: State, dest: State, c: u32) {
    self.transitions.insert((src, c), dest);
  }

  pub fn accept(&mut self, state: State, value: V) {
    self.accept_states.insert(state, value);
  }
}
