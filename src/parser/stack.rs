//! Parse stacks shared between versions.
//!
//! Every version of the parse is a path from its head node down to the base.
//! Forking a version copies only the head index, so versions share the
//! entries below the point where they diverged.

use crate::language::StateId;
use crate::length::Length;
use crate::subtree::Subtree;

#[derive(Debug, Clone)]
pub(crate) struct StackNode {
  /// state after `subtree` was pushed.
  pub state: StateId,
  pub subtree: Option<Subtree>,
  pub prev: Option<usize>,
  /// end of `subtree`.
  pub position: Length,
  /// totals over the subtrees from the base up to this node.
  pub error_cost: u32,
  pub dynamic_precedence: i32,
  /// pushed whole from the previous tree.
  pub reused: bool,
}

#[derive(Debug)]
pub(crate) struct Stack {
  nodes: Vec<StackNode>,
}

impl Stack {
  pub fn new() -> Self {
    Stack {
      nodes: vec![StackNode {
        state: 0,
        subtree: None,
        prev: None,
        position: Length::ZERO,
        error_cost: 0,
        dynamic_precedence: 0,
        reused: false,
      }],
    }
  }

  pub fn base(&self) -> usize {
    0
  }

  pub fn node(&self, index: usize) -> &StackNode {
    &self.nodes[index]
  }

  pub fn push(&mut self, prev: usize, state: StateId, subtree: Subtree, reused: bool) -> usize {
    let below = &self.nodes[prev];
    let node = StackNode {
      state,
      position: below.position + subtree.total_size(),
      error_cost: below.error_cost + subtree.error_cost,
      dynamic_precedence: below.dynamic_precedence + subtree.dynamic_precedence,
      subtree: Some(subtree),
      prev: Some(prev),
      reused,
    };
    self.nodes.push(node);
    self.nodes.len() - 1
  }

  /// Subtrees from the base up to `head`.
  pub fn subtrees(&self, head: usize) -> Vec<Subtree> {
    let mut result = vec![];
    let mut index = Some(head);
    while let Some(i) = index {
      let node = &self.nodes[i];
      if let Some(subtree) = &node.subtree {
        result.push(subtree.clone());
      }
      index = node.prev;
    }
    result.reverse();
    result
  }

  /// States of the base and of every entry that is not an extra or an error,
  /// from the bottom.
  pub fn real_states(&self, head: usize) -> Vec<StateId> {
    let mut result = vec![];
    let mut index = Some(head);
    while let Some(i) = index {
      let node = &self.nodes[i];
      match &node.subtree {
        Some(subtree) if subtree.is_extra_like() => {}
        _ => result.push(node.state),
      }
      index = node.prev;
    }
    result.reverse();
    result
  }

  /// Whether two heads lead through the same states at the same positions.
  pub fn same_states(&self, a: usize, b: usize) -> bool {
    let (mut a, mut b) = (Some(a), Some(b));
    loop {
      match (a, b) {
        (Some(x), Some(y)) if x == y => return true,
        (Some(x), Some(y)) => {
          let (x, y) = (&self.nodes[x], &self.nodes[y]);
          if x.state != y.state || x.position != y.position {
            return false;
          }
          a = x.prev;
          b = y.prev;
        }
        (None, None) => return true,
        _ => return false,
      }
    }
  }
}
