use crate::regex::Regex;
use crate::rule::Rule;
use crate::{GrammarError, HashMap, Map, TokenId};

pub use lower::*;

mod lower;

/// A grammar whose rules have been split into tokens and nonterminals.
#[derive(Debug, Clone)]
pub struct Grammar {
  pub name: String,
  pub tokens: Vec<TokenDef>,
  pub nts: Vec<NonterminalDef>,
  pub word_token: Option<TokenId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenDef {
  pub name: String,
  pub kind: TokenKind,
  /// `None` for tokens recognized by the external scanner.
  pub regex: Option<Regex>,
  pub named: bool,
  pub visible: bool,
  /// lexical precedence.
  pub precedence: i32,
  /// the text of a string token.
  pub literal: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
  Normal,
  /// consumed between tokens and never part of the tree, e.g. whitespace.
  Skip,
  /// allowed anywhere and kept in the tree, e.g. comments.
  Extra,
}

#[derive(Debug, Clone)]
pub struct NonterminalDef {
  pub name: String,
  pub rule: Rule,
  pub visible: bool,
}

#[derive(Debug, Default)]
pub struct GrammarBuilder {
  name: String,
  rules: Map<String, Rule>,
  extras: Vec<Rule>,
  externals: Vec<String>,
  word: Option<String>,
  duplicates: Vec<String>,
}

impl GrammarBuilder {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_owned(),
      ..Self::default()
    }
  }

  /// The first rule is the start rule.
  pub fn rule(&mut self, name: &str, rule: Rule) -> &mut Self {
    if self.rules.insert(name.to_owned(), rule).is_some() {
      self.duplicates.push(name.to_owned());
    }
    self
  }

  /// Patterns and strings become skipped tokens; symbols of tokens become
  /// extras that may appear between any two tokens.
  pub fn extra(&mut self, rule: Rule) -> &mut Self {
    self.extras.push(rule);
    self
  }

  /// Declares a token recognized by the external scanner. External tokens
  /// are numbered in declaration order.
  pub fn external(&mut self, name: &str) -> &mut Self {
    self.externals.push(name.to_owned());
    self
  }

  /// Identifier-like token used to keep keywords from matching a prefix of
  /// a longer word.
  pub fn word(&mut self, name: &str) -> &mut Self {
    self.word = Some(name.to_owned());
    self
  }

  pub fn build(&self) -> Result<Grammar, GrammarError> {
    if self.rules.is_empty() {
      return Err(GrammarError::NoRules);
    }
    if let Some(name) = self.duplicates.first() {
      return Err(GrammarError::NameConflict(name.clone()));
    }

    let mut tokens = vec![];
    let mut nts = vec![];
    let mut names = HashMap::<String, ()>::default();

    for name in &self.externals {
      if names.insert(name.clone(), ()).is_some() || self.rules.contains_key(name) {
        return Err(GrammarError::NameConflict(name.clone()));
      }
      let named = is_identifier(name);
      tokens.push(TokenDef {
        name: name.clone(),
        kind: TokenKind::Normal,
        regex: None,
        named,
        visible: !name.starts_with('_'),
        precedence: 0,
        literal: if named { None } else { Some(name.clone()) },
      });
    }

    for (name, rule) in &self.rules {
      names.insert(name.clone(), ());
      if rule.is_lexical() {
        let regex = to_regex(name, rule)?;
        tokens.push(TokenDef {
          name: name.clone(),
          kind: TokenKind::Normal,
          literal: regex.as_literal().filter(|_| is_string(rule)),
          regex: Some(regex),
          named: true,
          visible: !name.starts_with('_'),
          precedence: lexical_precedence(rule),
        });
      } else {
        nts.push(NonterminalDef {
          name: name.clone(),
          rule: rule.clone(),
          visible: !name.starts_with('_'),
        });
      }
    }

    for nt in &nts {
      collect_anonymous_tokens(&nt.name, &nt.rule, &mut tokens)?;
    }

    for (i, extra) in self.extras.iter().enumerate() {
      match extra {
        Rule::Symbol(name) => {
          let token = tokens.iter_mut()
            .find(|t| &t.name == name)
            .ok_or_else(|| GrammarError::InvalidToken(name.clone()))?;
          token.kind = TokenKind::Extra;
        }
        rule if rule.is_lexical() => {
          let name = format!("_skip{}", i);
          tokens.push(TokenDef {
            regex: Some(to_regex(&name, rule)?),
            name,
            kind: TokenKind::Skip,
            named: false,
            visible: false,
            precedence: lexical_precedence(rule),
            literal: None,
          });
        }
        _ => return Err(GrammarError::InvalidToken(format!("extra #{}", i))),
      }
    }

    let word_token = match &self.word {
      Some(name) => {
        let ix = tokens.iter()
          .position(|t| &t.name == name && t.regex.is_some())
          .ok_or_else(|| GrammarError::NameNotFound(name.clone()))?;
        Some(TokenId(ix as u32))
      }
      None => None,
    };

    Ok(Grammar {
      name: self.name.clone(),
      tokens,
      nts,
      word_token,
    })
  }
}

impl Grammar {
  pub fn lower(&self) -> Result<LoweredGrammar, GrammarError> {
    lower::lower(self)
  }
}

fn is_identifier(name: &str) -> bool {
  name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_string(rule: &Rule) -> bool {
  match rule {
    Rule::String(_) => true,
    Rule::Prec { rule, .. } => is_string(rule),
    _ => false,
  }
}

fn lexical_precedence(rule: &Rule) -> i32 {
  match rule {
    Rule::Prec { level, .. } => *level,
    Rule::Token(rule) => lexical_precedence(rule),
    _ => 0,
  }
}

fn to_regex(name: &str, rule: &Rule) -> Result<Regex, GrammarError> {
  let regex = rule_to_regex(name, rule)?;
  if regex.accepts_empty() {
    return Err(GrammarError::Regex {
      name: name.to_owned(),
      error: crate::regex::RegexError {
        kind: crate::regex::RegexErrorKind::Empty,
        offset: 0,
      },
    });
  }
  Ok(regex)
}

fn rule_to_regex(name: &str, rule: &Rule) -> Result<Regex, GrammarError> {
  let convert = |rules: &[Rule]| {
    rules.iter()
      .map(|r| rule_to_regex(name, r))
      .collect::<Result<Vec<_>, _>>()
  };

  Ok(match rule {
    Rule::String(text) => Regex::literal(text),
    Rule::Pattern(source) => Regex::parse(source).map_err(|error| GrammarError::Regex {
      name: name.to_owned(),
      error,
    })?,
    Rule::Seq(rules) => Regex::Concat(convert(rules)?),
    Rule::Choice(rules) => Regex::Alt(convert(rules)?),
    Rule::Repeat(rule) => Regex::Many(Box::new(rule_to_regex(name, rule)?)),
    Rule::Repeat1(rule) => Regex::Many1(Box::new(rule_to_regex(name, rule)?)),
    Rule::Optional(rule) => Regex::Optional(Box::new(rule_to_regex(name, rule)?)),
    Rule::Prec { rule, .. } | Rule::Token(rule) => rule_to_regex(name, rule)?,
    _ => return Err(GrammarError::InvalidToken(name.to_owned())),
  })
}

fn collect_anonymous_tokens(
  name: &str,
  rule: &Rule,
  tokens: &mut Vec<TokenDef>,
) -> Result<(), GrammarError> {
  match rule {
    Rule::String(text) => {
      let exists = tokens.iter().any(|t| {
        t.literal.as_deref() == Some(text.as_str()) && !t.named
      });
      if !exists {
        tokens.push(TokenDef {
          name: text.clone(),
          kind: TokenKind::Normal,
          regex: Some(Regex::literal(text)),
          named: false,
          visible: true,
          precedence: 0,
          literal: Some(text.clone()),
        });
      }
    }
    Rule::Pattern(source) => {
      if !tokens.iter().any(|t| !t.named && t.literal.is_none() && &t.name == source) {
        tokens.push(TokenDef {
          name: source.clone(),
          kind: TokenKind::Normal,
          regex: Some(to_regex(source, rule)?),
          named: false,
          visible: false,
          precedence: 0,
          literal: None,
        });
      }
    }
    Rule::Seq(rules) | Rule::Choice(rules) => {
      for rule in rules {
        collect_anonymous_tokens(name, rule, tokens)?;
      }
    }
    Rule::Repeat(rule) | Rule::Repeat1(rule) | Rule::Optional(rule) => {
      collect_anonymous_tokens(name, rule, tokens)?;
    }
    Rule::Prec { rule, .. } | Rule::DynamicPrec { rule, .. } | Rule::Alias { rule, .. } => {
      collect_anonymous_tokens(name, rule, tokens)?;
    }
    Rule::Token(_) => return Err(GrammarError::InvalidToken(name.to_owned())),
    Rule::Blank | Rule::Symbol(_) => {}
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rule::*;
  use pretty_assertions::assert_eq;

  fn template() -> GrammarBuilder {
    let mut builder = GrammarBuilder::new("template");
    builder
      .rule("template", repeat(sym("output")))
      .rule("output", seq(vec![string("{{"), sym("identifier"), string("}}")]))
      .rule("identifier", pattern("[a-z]+"))
      .extra(pattern(r"\s"));
    builder
  }

  #[test]
  fn splits_tokens_and_rules() {
    let grammar = template().build().unwrap();
    let names = grammar.tokens.iter().map(|t| t.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["identifier", "{{", "}}", "_skip0"]);
    assert_eq!(grammar.tokens[3].kind, TokenKind::Skip);
    assert_eq!(grammar.tokens[1].literal.as_deref(), Some("{{"));
    assert!(!grammar.tokens[1].named);
    let nts = grammar.nts.iter().map(|t| t.name.as_str()).collect::<Vec<_>>();
    assert_eq!(nts, vec!["template", "output"]);
  }

  #[test]
  fn external_literal_is_reused() {
    let mut builder = GrammarBuilder::new("tags");
    builder
      .external("/>")
      .rule("tag", seq(vec![string("<"), string("/>")]));
    let grammar = builder.build().unwrap();
    let names = grammar.tokens.iter().map(|t| t.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["/>", "<"]);
    assert!(grammar.tokens[0].regex.is_none());
  }

  #[test]
  fn only_single_terminals_and_explicit_tokens_are_lexical() {
    let mut builder = GrammarBuilder::new("lexical");
    builder
      .rule("s", repeat(choice(vec![sym("keyword"), sym("pair"), sym("entity")])))
      .rule("keyword", choice(vec![string("if"), string("endif")]))
      .rule("pair", seq(vec![string("<"), string("/>")]))
      .rule("entity", token(seq(vec![string("&"), pattern("[a-z]+"), string(";")])));
    let grammar = builder.build().unwrap();
    let nts = grammar.nts.iter().map(|t| t.name.as_str()).collect::<Vec<_>>();
    assert_eq!(nts, vec!["s", "keyword", "pair"]);
    let entity = grammar.tokens.iter().find(|t| t.name == "entity").unwrap();
    assert!(entity.named);
    assert_eq!(entity.literal, None);
    assert!(grammar.lower().is_ok());

    let mut builder = GrammarBuilder::new("nested");
    builder.rule("s", seq(vec![string("a"), token(string("b"))]));
    assert_eq!(builder.build().unwrap_err(), GrammarError::InvalidToken("s".to_owned()));
  }

  #[test]
  fn errors() {
    assert_eq!(GrammarBuilder::new("empty").build().unwrap_err(), GrammarError::NoRules);

    let mut builder = GrammarBuilder::new("dup");
    builder.rule("a", string("a")).rule("a", string("b"));
    assert_eq!(builder.build().unwrap_err(), GrammarError::NameConflict("a".to_owned()));

    let mut builder = GrammarBuilder::new("empty-token");
    builder.rule("a", pattern("x*"));
    assert!(matches!(builder.build().unwrap_err(), GrammarError::Regex { .. }));
  }
}
