//! Cursor over the previous tree, offering subtrees for reuse in text order.

use crate::scanner::ScannerState;
use crate::subtree::Subtree;

struct Entry {
  subtree: Subtree,
  child_index: usize,
  /// start of the subtree's padding.
  byte_offset: usize,
}

pub(crate) struct ReusableNodes {
  stack: Vec<Entry>,
  last_external_state: Option<ScannerState>,
}

impl ReusableNodes {
  pub fn new(root: &Subtree) -> Self {
    ReusableNodes {
      stack: vec![Entry {
        subtree: root.clone(),
        child_index: 0,
        byte_offset: 0,
      }],
      last_external_state: None,
    }
  }

  pub fn tree(&self) -> Option<&Subtree> {
    self.stack.last().map(|entry| &entry.subtree)
  }

  pub fn byte_offset(&self) -> usize {
    self.stack.last().map_or(usize::MAX, |entry| entry.byte_offset)
  }

  /// Scanner state after the last external token before the current subtree.
  pub fn last_external_state(&self) -> ScannerState {
    self.last_external_state.clone().unwrap_or_default()
  }

  /// Moves past the current subtree.
  pub fn advance(&mut self) {
    let last = match self.stack.last() {
      Some(entry) => entry,
      None => return,
    };
    let byte_offset = last.byte_offset + last.subtree.total_size().bytes;
    if last.subtree.external_state.is_some() {
      self.last_external_state = last.subtree.external_state.clone();
    }

    loop {
      let popped = match self.stack.pop() {
        Some(entry) => entry,
        None => return,
      };
      let next_index = popped.child_index + 1;
      let parent = match self.stack.last() {
        Some(entry) => &entry.subtree,
        None => return,
      };
      if let Some(next) = parent.children.get(next_index) {
        let next = next.clone();
        self.stack.push(Entry {
          subtree: next,
          child_index: next_index,
          byte_offset,
        });
        return;
      }
    }
  }

  /// Moves to the first child of the current subtree.
  pub fn descend(&mut self) -> bool {
    let last = match self.stack.last() {
      Some(entry) => entry,
      None => return false,
    };
    match last.subtree.children.first() {
      Some(child) => {
        let entry = Entry {
          subtree: child.clone(),
          child_index: 0,
          byte_offset: last.byte_offset,
        };
        self.stack.push(entry);
        true
      }
      None => false,
    }
  }
}
