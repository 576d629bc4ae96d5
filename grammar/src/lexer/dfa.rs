use crate::Map;

#[derive(Debug)]
pub struct Dfa<V> {
  pub start: u32,
  pub transitions: Map<(State, u32), State>,
  pub accept_states: Map<State, V>,
  pub num_states: u32,
}

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct State(pub u32);

impl<V> Dfa<V> {
  pub fn start(&self) -> State {
    State(self.start)
  }

  pub fn transition(&self, state: State, c: u32) -> Option<State> {
    self.transitions.get(&(state, c)).cloned()
  }

  /// if the state is accepting state, return the value.
  pub fn result(&self, state: State) -> Option<&V> {
    self.accept_states.get(&state)
  }
}
