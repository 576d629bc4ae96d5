//! Rule expression trees.

use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
  Blank,
  /// reference to a rule, a named token or an external token.
  Symbol(String),
  /// literal token, declared implicitly.
  String(String),
  /// regular expression token, see [`crate::regex`].
  Pattern(String),
  Seq(Vec<Rule>),
  Choice(Vec<Rule>),
  Repeat(Box<Rule>),
  Repeat1(Box<Rule>),
  Optional(Box<Rule>),
  Prec {
    level: i32,
    assoc: Option<Assoc>,
    rule: Box<Rule>,
  },
  DynamicPrec {
    level: i32,
    rule: Box<Rule>,
  },
  Alias {
    rule: Box<Rule>,
    name: String,
    named: bool,
  },
  /// strings and patterns combined into one token. Only allowed as the
  /// whole body of a rule or an extra.
  Token(Box<Rule>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Assoc {
  Left,
  Right,
  None,
}

pub fn sym(name: &str) -> Rule {
  Rule::Symbol(name.to_owned())
}

pub fn string(text: &str) -> Rule {
  Rule::String(text.to_owned())
}

pub fn pattern(source: &str) -> Rule {
  Rule::Pattern(source.to_owned())
}

pub fn blank() -> Rule {
  Rule::Blank
}

pub fn seq(rules: impl IntoIterator<Item = Rule>) -> Rule {
  Rule::Seq(rules.into_iter().collect())
}

pub fn choice(rules: impl IntoIterator<Item = Rule>) -> Rule {
  Rule::Choice(rules.into_iter().collect())
}

pub fn repeat(rule: Rule) -> Rule {
  Rule::Repeat(Box::new(rule))
}

pub fn repeat1(rule: Rule) -> Rule {
  Rule::Repeat1(Box::new(rule))
}

pub fn optional(rule: Rule) -> Rule {
  Rule::Optional(Box::new(rule))
}

pub fn prec(level: i32, rule: Rule) -> Rule {
  Rule::Prec { level, assoc: None, rule: Box::new(rule) }
}

pub fn prec_left(level: i32, rule: Rule) -> Rule {
  Rule::Prec { level, assoc: Some(Assoc::Left), rule: Box::new(rule) }
}

pub fn prec_right(level: i32, rule: Rule) -> Rule {
  Rule::Prec { level, assoc: Some(Assoc::Right), rule: Box::new(rule) }
}

pub fn prec_dynamic(level: i32, rule: Rule) -> Rule {
  Rule::DynamicPrec { level, rule: Box::new(rule) }
}

/// Renames the node produced by `rule` to `name`, as a named node.
pub fn alias(rule: Rule, name: &str) -> Rule {
  Rule::Alias { rule: Box::new(rule), name: name.to_owned(), named: true }
}

/// Compiles `rule`, made of strings and patterns, into a single token.
pub fn token(rule: Rule) -> Rule {
  Rule::Token(Box::new(rule))
}

impl Rule {
  /// A rule body is lexical if it is one string, one pattern or an explicit
  /// [`token`], possibly under a precedence. Such a rule becomes a named
  /// token instead of a nonterminal.
  pub fn is_lexical(&self) -> bool {
    match self {
      Rule::String(_) | Rule::Pattern(_) | Rule::Token(_) => true,
      Rule::Prec { rule, .. } => rule.is_lexical(),
      _ => false,
    }
  }
}
