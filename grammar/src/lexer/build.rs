use std::collections::BTreeSet;
use crate::regex::{Regex, MAX_CHAR};
use crate::Map;
use super::nfa::{State, Nfa};
use super::nfa_builder::NfaBuilder;
use super::dfa::Dfa;
use super::tabular_dfa::TabularDfa;
use super::{Lexer, TokenId};
use super::util;

pub struct LexicalToken<'a> {
  pub id: TokenId,
  pub regex: &'a Regex,
  /// lexical precedence; higher wins between matches of equal length.
  pub precedence: i32,
  /// string tokens win over patterns of equal precedence.
  pub literal: bool,
}

/// Accepting value ordered by priority: the smallest candidate wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
  neg_precedence: i32,
  non_literal: bool,
  token: TokenId,
}

pub fn build(tokens: &[LexicalToken]) -> Lexer {
  let char_intervals = compute_char_intervals(tokens);

  let mut nfa_builder = Nfa::builder();
  let start = nfa_builder.state();

  for token in tokens {
    let enter = nfa_builder.state();
    nfa_builder.transition(start, enter, None);
    let accept = add_regex_to_nfa(
      &mut nfa_builder, token.regex, enter, &char_intervals);

    nfa_builder.accept(accept, Candidate {
      neg_precedence: -token.precedence,
      non_literal: !token.literal,
      token: token.id,
    });
  }

  let nfa = nfa_builder.build();
  let dfa = nfa.to_dfa(start);
  let dfa = Dfa {
    start: dfa.start,
    num_states: dfa.num_states,
    transitions: dfa.transitions,
    accept_states: dfa.accept_states.into_iter()
      .map(|(state, candidates)| {
        (state, candidates.into_iter().map(|c| c.token).collect::<Vec<_>>())
      })
      .collect::<Map<_, _>>(),
  };

  Lexer {
    dfa: TabularDfa::from_dfa(&dfa, char_intervals.len()),
    reachable: compute_reachable(&dfa),
    char_intervals,
  }
}

/// Tokens accepted in each state or in any state reachable from it, sorted.
fn compute_reachable(dfa: &Dfa<Vec<TokenId>>) -> Vec<Vec<TokenId>> {
  let mut reachable = (0..dfa.num_states)
    .map(|state| {
      dfa.accept_states.get(&super::dfa::State(state))
        .map(|tokens| tokens.iter().cloned().collect::<BTreeSet<_>>())
        .unwrap_or_default()
    })
    .collect::<Vec<_>>();

  let mut changed = true;
  while changed {
    changed = false;
    for (&(from, _), &to) in &dfa.transitions {
      if from == to {
        continue;
      }
      let next = reachable[to.0 as usize].clone();
      let current = &mut reachable[from.0 as usize];
      let before = current.len();
      current.extend(next);
      changed |= current.len() != before;
    }
  }

  reachable.into_iter()
    .map(|tokens| tokens.into_iter().collect())
    .collect()
}

fn add_regex_to_nfa<V>(
  builder: &mut NfaBuilder<V>,
  regex: &Regex,
  enter: State,
  char_intervals: &[u32],
) -> State {
  match regex {
    Regex::Empty => {
      enter
    }
    Regex::Set(ranges) => {
      let exit = builder.state();
      for &(lo, hi) in ranges {
        let lower = util::find_char_interval(lo, char_intervals);
        let upper = if hi >= MAX_CHAR {
          char_intervals.len() as u32
        } else {
          util::find_char_interval(hi + 1, char_intervals)
        };
        (lower..upper).for_each(|i| {
          builder.transition(enter, exit, Some(i));
        });
      }
      exit
    }
    Regex::Alt(alts) => {
      let exit = builder.state();
      alts.iter().for_each(|alt| {
        let last = add_regex_to_nfa(builder, alt, enter, char_intervals);
        builder.transition(last, exit, None);
      });
      exit
    }
    Regex::Concat(items) => {
      items.iter().fold(enter, |enter, item| {
        add_regex_to_nfa(builder, item, enter, char_intervals)
      })
    }
    Regex::Optional(item) => {
      let exit = add_regex_to_nfa(builder, item, enter, char_intervals);
      builder.transition(enter, exit, None);
      exit
    }
    Regex::Many(item) => {
      let exit = builder.state();
      builder.transition(enter, exit, None);
      let temp = add_regex_to_nfa(builder, item, exit, char_intervals);
      builder.transition(temp, exit, None);
      exit
    }
    Regex::Many1(item) => {
      let temp = builder.state();
      builder.transition(enter, temp, None);
      let exit = add_regex_to_nfa(builder, item, temp, char_intervals);
      builder.transition(exit, temp, None);
      exit
    }
  }
}

/// Lower bounds of the intervals of code points that no pattern distinguishes.
fn compute_char_intervals(tokens: &[LexicalToken]) -> Vec<u32> {
  let mut char_intervals = BTreeSet::new();
  char_intervals.insert(0);

  for token in tokens {
    collect_char_intervals(token.regex, &mut char_intervals);
  }

  char_intervals.into_iter().collect()
}

fn collect_char_intervals(regex: &Regex, intervals: &mut BTreeSet<u32>) {
  match regex {
    Regex::Empty => {}
    Regex::Set(ranges) => {
      for &(lo, hi) in ranges {
        intervals.insert(lo);
        if hi < MAX_CHAR {
          intervals.insert(hi + 1);
        }
      }
    }
    Regex::Alt(items) | Regex::Concat(items) => {
      items.iter().for_each(|item|
        collect_char_intervals(item, intervals));
    }
    Regex::Optional(item) | Regex::Many(item) | Regex::Many1(item) => {
      collect_char_intervals(item, intervals);
    }
  }
}
