use std::time::Duration;
use crate::tree::Tree;

pub const DEFAULT_MAX_VERSIONS: usize = 6;
pub const DEFAULT_MAX_RECOVERY_SKIPS: usize = 16;

/// Limits for one parse.
///
/// When `max_steps` or `deadline` is reached the parser stops and returns
/// the best partial tree it has, flagged in [`ParseOutcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
  /// parser actions, counted over all stack versions.
  pub max_steps: Option<u64>,
  /// wall-clock time, measured from the start of the parse.
  pub deadline: Option<Duration>,
  /// stack versions kept alive at once when the grammar is ambiguous.
  pub max_versions: usize,
  /// error recoveries allowed at one position before giving up on the rest
  /// of the text.
  pub max_recovery_skips: usize,
}

impl Default for ParseOptions {
  fn default() -> Self {
    ParseOptions {
      max_steps: None,
      deadline: None,
      max_versions: DEFAULT_MAX_VERSIONS,
      max_recovery_skips: DEFAULT_MAX_RECOVERY_SKIPS,
    }
  }
}

impl ParseOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn max_steps(mut self, steps: u64) -> Self {
    self.max_steps = Some(steps);
    self
  }

  pub fn deadline(mut self, deadline: Duration) -> Self {
    self.deadline = Some(deadline);
    self
  }

  pub fn max_versions(mut self, versions: usize) -> Self {
    self.max_versions = versions.max(1);
    self
  }

  pub fn max_recovery_skips(mut self, skips: usize) -> Self {
    self.max_recovery_skips = skips;
    self
  }
}

#[derive(Debug, Clone)]
pub struct ParseOutcome {
  pub tree: Tree,
  /// the parse stopped early; the tree ends in an error node covering the
  /// text that was not parsed.
  pub budget_exceeded: bool,
}

impl ParseOutcome {
  pub fn into_tree(self) -> Tree {
    self.tree
  }
}
