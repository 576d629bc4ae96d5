use pretty_assertions::assert_eq;
use twigsitter::{twig, Parser, Query, QueryCursor, SyntaxErrorKind, Tree};

const STOREFRONT: &str = r#"{% block page_product_detail %}
  <div class="product-detail" data-product-id="{{ id }}">
    <!-- gallery -->
    <h1 class="product-detail-name">{{ name }}</h1>
    {% if available %}
      <p>In stock &amp; ready</p>
    {% endif %}
    <img src="cover.png" alt='cover'>
    <br/>
    {% parent() %}
  </div>
{% endblock %}
"#;

fn parse(text: &str) -> Tree {
  let language = twig::language().unwrap();
  Parser::new(&language).parse(text, None).into_tree()
}

#[test]
fn storefront_template() {
  let tree = parse(STOREFRONT);
  assert!(!tree.has_error(), "{}", tree.to_sexp());
  assert_eq!(tree.root_node().kind(), "template");
  assert_eq!(tree.root_node().byte_range(), 0..STOREFRONT.len());
}

#[test]
fn document_with_doctype() {
  let text = "<!DOCTYPE html>\n<html><head><style>body { margin: 0 }</style></head><body>Hi</body></html>\n";
  let tree = parse(text);
  assert!(!tree.has_error(), "{}", tree.to_sexp());
  let kinds = tree.root_node().named_children().iter().map(|n| n.kind()).collect::<Vec<_>>();
  assert_eq!(kinds, vec!["html_doctype", "html_element"]);
}

#[test]
fn table_rows_close_implicitly() {
  let text = "<table><tr><td>a<td>b<tr><td>c</table>";
  let tree = parse(text);
  assert!(!tree.has_error(), "{}", tree.to_sexp());
  let language = twig::language().unwrap();
  let query = Query::new(&language, "(html_element (html_start_tag (html_tag_name) @name))").unwrap();
  let names = QueryCursor::new()
    .matches(&query, tree.root_node(), text)
    .map(|m| m.captures[0].node.utf8_text(text).to_owned())
    .collect::<Vec<_>>();
  assert_eq!(names, vec!["table", "tr", "td", "td", "tr", "td"]);
}

#[test]
fn stray_character_is_a_local_error() {
  let text = "<p>a</p>&<p>b</p>";
  let tree = parse(text);
  let errors = tree.errors();
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].kind, SyntaxErrorKind::Lex);
  assert_eq!(errors[0].byte_range, 8..9);
  let elements = tree.root_node().named_children().into_iter()
    .filter(|n| n.kind() == "html_element" && !n.has_error())
    .count();
  assert_eq!(elements, 2);
}

#[test]
fn errors_stay_inside_the_broken_directive() {
  let clean = "<div>a</div>{{ xzy }}<div>b</div>";
  let broken = "<div>a</div>{{ x$y }}<div>b</div>";
  let clean_tree = parse(clean);
  let broken_tree = parse(broken);
  assert!(!clean_tree.has_error());
  assert!(broken_tree.has_error());

  for error in broken_tree.errors() {
    assert!(12 <= error.byte_range.start && error.byte_range.end <= 21, "{:?}", error);
  }
  let clean_children = clean_tree.root_node().named_children();
  let broken_children = broken_tree.root_node().named_children();
  assert_eq!(
    broken_children.first().unwrap().to_sexp_with_ranges(),
    clean_children.first().unwrap().to_sexp_with_ranges()
  );
  assert_eq!(
    broken_children.last().unwrap().to_sexp_with_ranges(),
    clean_children.last().unwrap().to_sexp_with_ranges()
  );
}

#[test]
fn invalid_utf8_in_content() {
  let language = twig::language().unwrap();
  let text = b"<p>a\xffb</p><p>c</p>";
  let tree = Parser::new(&language).parse_bytes(text, None).into_tree();
  let errors = tree.errors();
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].kind, SyntaxErrorKind::Lex);
  assert_eq!(errors[0].byte_range, 4..5);
  let last = tree.root_node().named_children().into_iter().last().unwrap();
  assert_eq!(last.kind(), "html_element");
  assert!(!last.has_error());
  assert_eq!(last.bytes(text), b"<p>c</p>");
}

#[test]
fn unclosed_output_directive() {
  let text = "{{ name }}<p>{{ }}</p>";
  let tree = parse(text);
  let errors = tree.errors();
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].kind, SyntaxErrorKind::Missing("variable".to_owned()));
  assert!(!tree.root_node().named_child(0).unwrap().has_error());
}

#[test]
fn query_blocks_by_name() {
  let language = twig::language().unwrap();
  let tree = parse(STOREFRONT);
  let query = Query::new(&language, r#"
    ((statement_directive (tag_statement (tag) @tag (variable) @name))
      (#eq? @tag "block"))
    ((output_directive (variable) @output) (#match? @output "^n"))
  "#).unwrap();
  let found = QueryCursor::new()
    .matches(&query, tree.root_node(), STOREFRONT)
    .map(|m| {
      let last = m.captures.last().unwrap();
      (m.pattern_index, last.node.utf8_text(STOREFRONT))
    })
    .collect::<Vec<_>>();
  assert_eq!(found, vec![(0, "page_product_detail"), (1, "name")]);
}

#[test]
fn cursor_walks_in_document_order() {
  let text = "<p>a<b>c</b></p>";
  let tree = parse(text);
  let mut cursor = tree.walk();
  assert!(cursor.goto_first_child());
  assert_eq!(cursor.node().kind(), "html_element");
  assert!(cursor.goto_first_child());
  assert_eq!(cursor.node().kind(), "html_start_tag");
  assert!(cursor.goto_next_sibling());
  assert_eq!(cursor.node().kind(), "content");
  assert!(cursor.goto_next_sibling());
  assert_eq!(cursor.node().kind(), "html_element");
  assert_eq!(cursor.depth(), 2);
  assert!(cursor.goto_parent());
  assert_eq!(cursor.node().byte_range(), 0..text.len());

  let node = tree.node_at(5).unwrap();
  assert_eq!(node.kind(), "html_tag_name");
  assert_eq!(node.utf8_text(text), "b");
}
