//! The Shopware Twig template dialect: HTML markup with `{% %}` statements
//! and `{{ }}` output.
//!
//! ```
//! use twigsitter::{twig, Parser};
//!
//! let language = twig::language().unwrap();
//! let mut parser = Parser::new(&language);
//! let tree = parser.parse("{% block content %}<p>Hi</p>{% endblock %}", None).into_tree();
//! assert!(!tree.has_error());
//! ```

use std::sync::Arc;
use grammar::rule::*;
use grammar::GrammarBuilder;
use once_cell::sync::Lazy;
use crate::error::LoadError;
use crate::language::Language;

mod scanner;

pub use self::scanner::TwigScanner;

static LANGUAGE: Lazy<Result<Language, LoadError>> = Lazy::new(|| {
  Language::compile(&grammar(), Some(Arc::new(TwigScanner)))
});

/// The Twig language, built once per process.
pub fn language() -> Result<Language, LoadError> {
  LANGUAGE.clone()
}

/// The grammar of the Twig dialect. External tokens are declared in the
/// order [`TwigScanner`] numbers them.
pub fn grammar() -> GrammarBuilder {
  let mut builder = GrammarBuilder::new("shopware_twig");
  builder
    .external("_start_tag_name")
    .external("_style_start_tag_name")
    .external("_end_tag_name")
    .external("erroneous_end_tag_name")
    .external("/>")
    .external("_implicit_end_tag")
    .external("raw_text")
    .external("comment")
    .extra(pattern(r"\s"))
    .extra(sym("comment"));

  builder
    .rule("template", repeat(choice(vec![
      sym("statement_directive"),
      sym("output_directive"),
      sym("html_element"),
      sym("style_element"),
      sym("html_doctype"),
      sym("html_entity"),
      sym("content"),
      sym("erroneous_end_tag"),
    ])))
    .rule("content", prec_right(0, pattern(r"[^<>&\{\s]([^<>&\{]*[^<>&\{\s])?")))
    .rule("html_element", choice(vec![
      seq(vec![
        sym("html_start_tag"),
        repeat(sym("_node")),
        choice(vec![sym("html_end_tag"), sym("_implicit_end_tag")]),
      ]),
      sym("html_self_closing_tag"),
    ]))
    .rule("_node", choice(vec![
      sym("html_element"),
      sym("style_element"),
      sym("statement_directive"),
      sym("output_directive"),
      sym("html_entity"),
      sym("content"),
      sym("erroneous_end_tag"),
    ]))
    .rule("html_start_tag", seq(vec![
      string("<"),
      alias(sym("_start_tag_name"), "html_tag_name"),
      repeat(sym("html_attribute")),
      string(">"),
    ]))
    .rule("html_end_tag", seq(vec![
      string("</"),
      alias(sym("_end_tag_name"), "html_tag_name"),
      string(">"),
    ]))
    .rule("html_self_closing_tag", seq(vec![
      string("<"),
      alias(sym("_start_tag_name"), "html_tag_name"),
      repeat(sym("html_attribute")),
      string("/>"),
    ]))
    .rule("erroneous_end_tag", seq(vec![
      string("</"),
      sym("erroneous_end_tag_name"),
      string(">"),
    ]))
    .rule("style_element", seq(vec![
      sym("style_start_tag"),
      optional(sym("raw_text")),
      sym("html_end_tag"),
    ]))
    .rule("style_start_tag", seq(vec![
      string("<"),
      alias(sym("_style_start_tag_name"), "html_tag_name"),
      repeat(sym("html_attribute")),
      string(">"),
    ]))
    .rule("html_attribute", seq(vec![
      sym("html_attribute_name"),
      optional(seq(vec![
        string("="),
        choice(vec![sym("html_attribute_value"), sym("html_quoted_attribute_value")]),
      ])),
    ]))
    .rule("html_attribute_name", pattern(r"[a-zA-Z][a-zA-Z0-9_\-]*"))
    .rule("html_attribute_value", pattern(r#"[^>\s"']+"#))
    .rule("html_quoted_attribute_value", choice(vec![
      seq(vec![
        string("\""),
        optional(alias(sym("_double_quoted_text"), "html_attribute_value")),
        string("\""),
      ]),
      seq(vec![
        string("'"),
        optional(alias(sym("_single_quoted_text"), "html_attribute_value")),
        string("'"),
      ]),
    ]))
    .rule("_double_quoted_text", pattern(r#"[^"<>]+"#))
    .rule("_single_quoted_text", pattern(r"[^'<>]+"))
    .rule("html_doctype", pattern(r"<!(?:DOCTYPE|doctype)[^>]*>"))
    .rule("statement_directive", seq(vec![
      string("{%"),
      choice(vec![sym("if_statement"), sym("tag_statement"), sym("parent_statement")]),
      string("%}"),
    ]))
    .rule("if_statement", seq(vec![sym("conditional"), sym("variable")]))
    .rule("tag_statement", choice(vec![
      seq(vec![sym("tag"), optional(sym("variable"))]),
      sym("conditional"),
    ]))
    .rule("tag", choice(vec![string("block"), string("endblock")]))
    .rule("conditional", choice(vec![string("if"), string("endif")]))
    .rule("variable", pattern("[a-zA-Z0-9_]+"))
    .rule("parent_statement", seq(vec![string("parent"), string("("), string(")")]))
    .rule("output_directive", seq(vec![string("{{"), sym("variable"), string("}}")]))
    .rule("html_entity", choice(vec![
      pattern("&[a-zA-Z][a-zA-Z0-9]*;"),
      pattern("&#[0-9]+;"),
      pattern("&#[xX][0-9a-fA-F]+;"),
    ]));
  builder
}
