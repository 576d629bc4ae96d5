use criterion::{criterion_group, criterion_main, Criterion};
use grammar::GrammarBuilder;
use grammar::rule::*;

fn expression_grammar() -> grammar::LoweredGrammar {
  let binary = |op: &str, level: i32| {
    prec_left(level, seq(vec![sym("expr"), string(op), sym("expr")]))
  };

  let mut builder = GrammarBuilder::new("expr");
  builder
    .rule("program", repeat(seq(vec![sym("expr"), string(";")])))
    .rule("expr", choice(vec![
      binary("||", 1),
      binary("&&", 2),
      binary("==", 3),
      binary("<", 4),
      binary("+", 5),
      binary("-", 5),
      binary("*", 6),
      binary("/", 6),
      prec_right(7, seq(vec![string("-"), sym("expr")])),
      seq(vec![string("("), sym("expr"), string(")")]),
      seq(vec![sym("identifier"), string("("), optional(sym("arguments")), string(")")]),
      sym("identifier"),
      sym("number"),
    ]))
    .rule("arguments", seq(vec![sym("expr"), repeat(seq(vec![string(","), sym("expr")]))]))
    .rule("identifier", pattern(r"[a-zA-Z_]\w*"))
    .rule("number", pattern(r"\d+"))
    .extra(pattern(r"\s"));

  builder.build().unwrap().lower().unwrap()
}

fn lalr_benchmark(c: &mut Criterion) {
  let grammar = expression_grammar();
  c.bench_function("expr", |b| b.iter(|| lr::build(&grammar).unwrap()));
}

criterion_group!{
  name = benches;
  config = Criterion::default().significance_level(0.1).sample_size(10);
  targets = lalr_benchmark
}
criterion_main!(benches);
