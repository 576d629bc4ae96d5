#![allow(dead_code)]

use std::sync::Once;
use twigsitter::rule::*;
use twigsitter::{GrammarBuilder, Language, ParseOptions, Parser, Tree};

static TRACING: Once = Once::new();

/// Prints engine traces when `RUST_LOG` is set, e.g. `RUST_LOG=twigsitter=trace`.
pub fn init_tracing() {
  TRACING.call_once(|| {
    if std::env::var("RUST_LOG").is_ok() {
      let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    }
  });
}

/// `{{ name }}` statements separated by whitespace.
pub fn output_grammar() -> GrammarBuilder {
  let mut builder = GrammarBuilder::new("output");
  builder
    .rule("source", repeat(sym("output-statement")))
    .rule("output-statement", seq(vec![string("{{"), sym("identifier"), string("}}")]))
    .rule("identifier", pattern("[a-z]+"))
    .extra(pattern(r"\s"));
  builder
}

pub fn output_language() -> Language {
  Language::compile(&output_grammar(), None).unwrap()
}

/// Sums and products; `ambiguous` leaves out their precedences.
pub fn arithmetic_language(ambiguous: bool) -> Language {
  let binary = |op: &str| seq(vec![sym("_expression"), string(op), sym("_expression")]);
  let (sum, product) = if ambiguous {
    (binary("+"), binary("*"))
  } else {
    (prec_left(1, binary("+")), prec_left(2, binary("*")))
  };
  let mut builder = GrammarBuilder::new("arithmetic");
  builder
    .rule("program", sym("_expression"))
    .rule("_expression", choice(vec![sym("sum"), sym("product"), sym("number")]))
    .rule("sum", sum)
    .rule("product", product)
    .rule("number", pattern("[0-9]+"))
    .extra(pattern(r"\s"));
  Language::compile(&builder, None).unwrap()
}

pub fn parse(language: &Language, text: &str) -> Tree {
  init_tracing();
  Parser::new(language).parse(text, None).into_tree()
}

pub fn parse_with(language: &Language, text: &str, options: ParseOptions) -> (Tree, bool) {
  init_tracing();
  let mut parser = Parser::new(language);
  parser.set_options(options);
  let outcome = parser.parse(text, None);
  (outcome.tree, outcome.budget_exceeded)
}
