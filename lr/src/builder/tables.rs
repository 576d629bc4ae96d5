use std::cmp::Ordering;
use grammar::{Assoc, Symbol, TokenId};
use itertools::Itertools;
use tracing::debug;
use super::{Builder, decode_item};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
  Shift(u32),
  /// production index in the lowered grammar.
  Reduce(usize),
  Accept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
  ShiftReduce,
  ReduceReduce,
}

/// A cell left with more than one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
  pub state: u32,
  pub token: TokenId,
  pub kind: ConflictKind,
  pub actions: Vec<Action>,
  /// items of the state, rendered for diagnostics.
  pub items: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ParseTables {
  pub num_states: usize,
  /// grammar tokens plus the end-of-input token.
  pub num_tokens: usize,
  pub num_nts: usize,
  pub eof: TokenId,
  /// `action[state * num_tokens + token]`, empty cells are errors.
  pub action: Vec<Vec<Action>>,
  /// `goto[state * num_nts + nt]`
  pub goto: Vec<Option<u32>>,
  pub conflicts: Vec<Conflict>,
}

impl ParseTables {
  pub fn actions(&self, state: u32, token: TokenId) -> &[Action] {
    &self.action[state as usize * self.num_tokens + token.index()]
  }

  pub fn goto(&self, state: u32, nt: usize) -> Option<u32> {
    self.goto[state as usize * self.num_nts + nt]
  }
}

/// Generates the ACTION and GOTO tables.
pub fn gen_tables(builder: &Builder) -> ParseTables {
  let grammar = builder.grammar;
  let num_states = builder.states.len();
  let num_tokens = grammar.num_tokens();
  // the augmented start symbol never appears in a GOTO entry.
  let num_nts = grammar.grammar.nts.len();

  let mut action = vec![vec![]; num_states * num_tokens];
  let mut goto = vec![None; num_states * num_nts];
  let mut conflicts = vec![];

  for (from_state, state) in builder.states.values().enumerate() {
    // token -> precedences of the productions that shift it
    let mut shift_precs = vec![vec![]; num_tokens];

    for item in &state.items {
      let (prod_ix, dot) = decode_item(builder.max_nsym_p1, item.key);
      let prod = &grammar.prods[prod_ix];

      if dot < prod.symbols.len() {
        let sym = prod.symbols[dot];
        match sym {
          Symbol::Token(token) if token == grammar.eof => {
            action[from_state * num_tokens + token.index()] = vec![Action::Accept];
          }
          Symbol::Token(token) => {
            let to_state = state.transitions[&sym];
            let cell = &mut action[from_state * num_tokens + token.index()];
            if !cell.contains(&Action::Shift(to_state)) {
              cell.push(Action::Shift(to_state));
            }
            shift_precs[token.index()].push(prod.prec);
          }
          Symbol::Nonterminal(nt) => {
            goto[from_state * num_nts + nt.index()] = Some(state.transitions[&sym]);
          }
        }
      } else if prod_ix != grammar.start_prod {
        for lookahead in item.lookaheads.iter() {
          let cell = &mut action[from_state * num_tokens + lookahead];
          if !cell.contains(&Action::Reduce(prod_ix)) {
            cell.push(Action::Reduce(prod_ix));
          }
        }
      }
    }

    for token in 0..num_tokens {
      let cell = &mut action[from_state * num_tokens + token];
      if cell.len() < 2 {
        continue;
      }

      resolve_cell(builder, cell, &shift_precs[token]);
      cell.sort();

      if cell.len() > 1 {
        let kind = if cell.iter().any(|a| matches!(a, Action::Shift(_))) {
          ConflictKind::ShiftReduce
        } else {
          ConflictKind::ReduceReduce
        };
        let items = state.items.iter()
          .map(|item| {
            let mut s = String::new();
            let _ = builder.fmt_item(item, &mut s);
            s
          })
          .collect();
        debug!(
          state = from_state,
          token = %builder.token_name(token),
          kind = ?kind,
          actions = %cell.iter().map(|a| format!("{:?}", a)).join(" "),
          "unresolved conflict kept for GLR"
        );
        conflicts.push(Conflict {
          state: from_state as u32,
          token: TokenId::new(token as u32),
          kind,
          actions: cell.clone(),
          items,
        });
      }
    }
  }

  ParseTables {
    num_states,
    num_tokens,
    num_nts,
    eof: grammar.eof,
    action,
    goto,
    conflicts,
  }
}

/// Applies precedence and associativity to a cell with several actions.
///
/// A reduction of higher precedence than every shifting production removes
/// the shift; one of lower precedence is removed. At equal precedence, left
/// associativity reduces, right associativity shifts and non-associativity
/// removes both. Among reductions only those of the highest precedence are
/// kept. Whatever remains is left for the runtime.
fn resolve_cell(builder: &Builder, cell: &mut Vec<Action>, shift_precs: &[i32]) {
  let prods = &builder.grammar.prods;
  let shift = cell.iter().position(|a| matches!(a, Action::Shift(_)));

  if let Some(shift_ix) = shift {
    let shift_action = cell[shift_ix];
    let shift_min = shift_precs.iter().copied().min().unwrap_or(0);
    let shift_max = shift_precs.iter().copied().max().unwrap_or(0);

    let mut keep_shift = true;
    let mut kept = vec![];
    for &action in cell.iter() {
      let prod_ix = match action {
        Action::Reduce(prod_ix) => prod_ix,
        _ => continue,
      };
      let prod = &prods[prod_ix];

      if prod.prec > shift_max {
        keep_shift = false;
        kept.push(action);
      } else if prod.prec < shift_min {
        // shift wins
      } else if shift_min == shift_max {
        match prod.assoc {
          Some(Assoc::Left) => {
            keep_shift = false;
            kept.push(action);
          }
          Some(Assoc::Right) => {}
          Some(Assoc::None) => keep_shift = false,
          None => kept.push(action),
        }
      } else {
        kept.push(action);
      }
    }

    if keep_shift {
      kept.push(shift_action);
    }
    *cell = kept;
  }

  let max_reduce_prec = cell.iter()
    .filter_map(|a| match a {
      Action::Reduce(prod_ix) => Some(prods[*prod_ix].prec),
      _ => None,
    })
    .max();
  if let Some(max) = max_reduce_prec {
    cell.retain(|a| match a {
      Action::Reduce(prod_ix) => prods[*prod_ix].prec.cmp(&max) == Ordering::Equal,
      _ => true,
    });
  }
}
