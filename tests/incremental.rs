mod common;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use twigsitter::{twig, InputEdit, Language, Parser, Tree};
use common::*;

/// Parses `old_text`, applies the edit and re-parses incrementally. Returns
/// the old tree, the edited old tree, the new tree and the new text.
fn reparse(
  language: &Language,
  old_text: &str,
  start: usize,
  old_end: usize,
  inserted: &str,
) -> (Tree, Tree, Tree, String) {
  let mut parser = Parser::new(language);
  let old_tree = parser.parse(old_text, None).into_tree();
  let edit = InputEdit::replace(old_text, start, old_end, inserted);
  let new_text = edit.apply(old_text, inserted);
  let edited = old_tree.edit(&edit);
  let new_tree = parser.parse(&new_text, Some(&edited)).into_tree();
  (old_tree, edited, new_tree, new_text)
}

fn assert_same_as_fresh(language: &Language, tree: &Tree, text: &str) {
  let fresh = parse(language, text);
  assert_eq!(tree.root_node().to_sexp_with_ranges(), fresh.root_node().to_sexp_with_ranges());
}

#[test]
fn renaming_an_identifier() {
  let language = output_language();
  let (old, _, new, text) = reparse(&language, "{{ a }} {{ b }} {{ c }}", 11, 12, "bbb");
  assert_eq!(text, "{{ a }} {{ bbb }} {{ c }}");
  assert_same_as_fresh(&language, &new, &text);

  let old_first = old.root_node().named_child(0).unwrap();
  let new_first = new.root_node().named_child(0).unwrap();
  assert_eq!(old_first.id(), new_first.id());
  assert_ne!(
    old.root_node().named_child(1).unwrap().id(),
    new.root_node().named_child(1).unwrap().id()
  );
}

#[test]
fn inserting_a_statement() {
  let language = output_language();
  let (_, edited, new, text) = reparse(&language, "{{ a }} {{ b }}", 8, 8, "{{ c }} ");
  assert_eq!(text, "{{ a }} {{ c }} {{ b }}");
  assert_same_as_fresh(&language, &new, &text);

  let changed = edited.changed_ranges(&new).iter()
    .map(|r| r.start_byte..r.end_byte)
    .collect::<Vec<_>>();
  assert_eq!(changed, vec![8..15]);
}

#[test]
fn text_only_change_has_no_changed_ranges() {
  let language = output_language();
  let (_, edited, new, _) = reparse(&language, "{{ a }} {{ b }}", 11, 12, "z");
  assert!(edited.changed_ranges(&new).is_empty());
  assert!(edited.root_node().has_changes());
}

#[test]
fn deleting_a_statement() {
  let language = output_language();
  let (_, _, new, text) = reparse(&language, "{{ a }} {{ b }} {{ c }}", 7, 15, "");
  assert_eq!(text, "{{ a }} {{ c }}");
  assert_same_as_fresh(&language, &new, &text);
}

#[test]
fn breaking_and_fixing_a_statement() {
  let language = output_language();
  let (_, _, broken, text) = reparse(&language, "{{ a }} {{ b }}", 11, 12, "");
  assert_eq!(text, "{{ a }} {{  }}");
  assert!(broken.has_error());
  assert_same_as_fresh(&language, &broken, &text);

  let mut parser = Parser::new(&language);
  let edit = InputEdit::replace(&text, 11, 11, "b");
  let fixed_text = edit.apply(&text, "b");
  let fixed = parser.parse(&fixed_text, Some(&broken.edit(&edit))).into_tree();
  assert!(!fixed.has_error());
  assert_same_as_fresh(&language, &fixed, &fixed_text);
}

#[test]
fn twig_edit_inside_element() {
  let language = twig::language().unwrap();
  let old_text = "{% block main %}<div class=\"box\"><p>Hello</p></div>{% endblock %}";
  let start = old_text.find("Hello").unwrap();
  let (_, _, new, text) = reparse(&language, old_text, start, start + 5, "Goodbye");
  assert!(!new.has_error());
  assert_same_as_fresh(&language, &new, &text);
}

#[test]
fn twig_new_element() {
  let language = twig::language().unwrap();
  let old_text = "<ul><li>One</li></ul>";
  let at = old_text.find("</ul>").unwrap();
  let (_, _, new, text) = reparse(&language, old_text, at, at, "<li>Two</li>");
  assert_eq!(text, "<ul><li>One</li><li>Two</li></ul>");
  assert!(!new.has_error());
  assert_same_as_fresh(&language, &new, &text);
}

#[test]
fn twig_edit_on_last_line_reuses_earlier_elements() {
  let language = twig::language().unwrap();
  let old_text = "<div><p>One</p></div>\n<div><p>Two</p></div>\n<div><p>Three</p></div>\n";
  let at = old_text.find("Three").unwrap();
  let (old, _, new, text) = reparse(&language, old_text, at, at + 5, "Four");
  assert!(!new.has_error());
  assert_same_as_fresh(&language, &new, &text);
  for i in 0..2 {
    assert_eq!(
      old.root_node().named_child(i).unwrap().id(),
      new.root_node().named_child(i).unwrap().id()
    );
  }
  assert_ne!(
    old.root_node().named_child(2).unwrap().id(),
    new.root_node().named_child(2).unwrap().id()
  );
}

fn storefront(blocks: usize) -> String {
  (0..blocks)
    .map(|i| format!(
      "{{% block item_{} %}}\n<div class=\"item\"><h2>{{{{ title }}}}</h2>\n<ul><li>One<li>Two</ul>\n</div>\n{{% endblock %}}\n",
      i
    ))
    .collect()
}

#[test]
fn large_twig_document_is_mostly_reused() {
  let language = twig::language().unwrap();
  let old_text = storefront(300);
  let at = old_text.rfind("Two").unwrap();
  let (old, _, new, text) = reparse(&language, &old_text, at, at + 3, "Three");
  assert!(!new.has_error());
  assert_same_as_fresh(&language, &new, &text);

  let old_ids = old.root_node().named_children().iter().map(|n| n.id()).collect::<Vec<_>>();
  let reused = new.root_node().named_children().iter()
    .filter(|n| old_ids.contains(&n.id()))
    .count();
  assert_eq!(old_ids.len(), 900);
  assert!(reused >= old_ids.len() - 3, "only {} of {} reused", reused, old_ids.len());
}

fn document() -> impl Strategy<Value = Vec<String>> {
  prop::collection::vec("[a-z]{1,4}", 1..8)
}

fn render(names: &[String]) -> String {
  names.iter().map(|n| format!("{{{{ {} }}}}", n)).collect::<Vec<_>>().join("\n")
}

/// Byte offset of statement `index` in `render(names)`.
fn offset_of(names: &[String], index: usize) -> usize {
  names[..index].iter().map(|n| n.len() + 7).sum()
}

#[derive(Debug, Clone)]
enum Change {
  Rename(usize, String),
  Insert(usize, String),
  Delete(usize),
}

fn change() -> impl Strategy<Value = Change> {
  prop_oneof![
    (any::<prop::sample::Index>(), "[a-z]{1,4}").prop_map(|(i, n)| Change::Rename(i.index(usize::MAX), n)),
    (any::<prop::sample::Index>(), "[a-z]{1,4}").prop_map(|(i, n)| Change::Insert(i.index(usize::MAX), n)),
    any::<prop::sample::Index>().prop_map(|i| Change::Delete(i.index(usize::MAX))),
  ]
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(48))]

  #[test]
  fn incremental_matches_fresh(names in document(), change in change()) {
    let language = output_language();
    let old_text = render(&names);
    let count = names.len();
    let (start, old_end, inserted) = match change {
      Change::Rename(i, name) => {
        let i = i % count;
        let at = offset_of(&names, i) + 3;
        (at, at + names[i].len(), name)
      }
      Change::Insert(i, name) => {
        let at = offset_of(&names, i % (count + 1)).min(old_text.len());
        if at < old_text.len() {
          (at, at, format!("{{{{ {} }}}}\n", name))
        } else {
          (at, at, format!("\n{{{{ {} }}}}", name))
        }
      }
      Change::Delete(i) => {
        let i = i % count;
        let at = offset_of(&names, i);
        let end = (at + names[i].len() + 7).min(old_text.len());
        (at, end, String::new())
      }
    };

    let (_, _, new, text) = reparse(&language, &old_text, start, old_end, &inserted);
    let fresh = parse(&language, &text);
    prop_assert_eq!(new.root_node().to_sexp_with_ranges(), fresh.root_node().to_sexp_with_ranges());
    prop_assert!(!new.has_error());
  }
}

fn twig_document() -> impl Strategy<Value = String> {
  let fragment = prop::sample::select(vec![
    "<div class=\"box\">", "</div>", "<p>", "</p>", "<br/>", "<img src=\"a.png\">",
    "<ul>", "<li>", "</ul>", "{% block main %}", "{% endblock %}", "{% if shown %}",
    "{% endif %}", "{{ title }}", "Hello", " ", "\n", "&amp;", "<!-- note -->",
  ]);
  prop::collection::vec(fragment, 1..16).prop_map(|parts| parts.concat())
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(64))]

  #[test]
  fn twig_byte_edits_match_fresh(
    old_text in twig_document(),
    start in any::<prop::sample::Index>(),
    removed in 0usize..6,
    inserted in r#"[a-z<>/{}%&" =!-]{0,6}"#,
  ) {
    let language = twig::language().unwrap();
    let start = start.index(old_text.len() + 1);
    let old_end = (start + removed).min(old_text.len());
    let (_, _, new, text) = reparse(&language, &old_text, start, old_end, &inserted);
    let fresh = parse(&language, &text);
    prop_assert_eq!(new.root_node().to_sexp_with_ranges(), fresh.root_node().to_sexp_with_ranges());
    prop_assert_eq!(new.root_node().byte_range(), 0..text.len());
  }
}
