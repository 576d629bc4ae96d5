use std::fmt::{self, Debug};
use super::dfa::Dfa;
use super::nfa_builder::NfaBuilder;
use crate::{Map, Set};

#[derive(Debug)]
pub struct Nfa<V> {
  pub transitions: Map<(State, Option<u32>), Set<State>>,
  pub accept_states: Map<State, V>,
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct State(pub usize);

impl<V> Nfa<V> {
  pub fn builder() -> NfaBuilder<V> {
    NfaBuilder::new()
  }
}

impl<V: Clone + Ord> Nfa<V> {
  pub fn to_dfa(&self, start: State) -> Dfa<Vec<V>> {
    super::powerset_cons::powerset(self, start)
  }
}

impl Debug for State {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "State({})", self.0)
  }
}
