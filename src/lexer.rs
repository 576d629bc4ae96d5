//! Context-aware tokenization.
//!
//! The parser asks for one token at a time, in a given parse state. Only
//! tokens that state can use are considered, so one character sequence may
//! lex differently depending on where it appears.

use grammar::{Lexer, TokenId};
use crate::language::{Language, StateId, Symbol, END, ERROR, SymbolKind};
use crate::length::{next_char, Length};
use crate::scanner::{ScanCursor, ScannerState};

#[derive(Debug, Clone)]
pub(crate) struct Lexed {
  pub symbol: Symbol,
  /// skipped text before the token.
  pub padding: Length,
  pub size: Length,
  /// how far past the end of the token the lexer looked.
  pub lookahead_bytes: usize,
  /// scanner state after an external token.
  pub external_state: Option<ScannerState>,
}

struct Match {
  best: Option<(Symbol, usize)>,
  word_end: Option<usize>,
  peek: usize,
}

/// Lexes the next token at `position` for a parser in `state`.
pub(crate) fn lex(
  language: &Language,
  text: &[u8],
  position: Length,
  state: StateId,
  scanner_state: &ScannerState,
) -> Lexed {
  let data = language.data();
  let valid = |symbol: Symbol| {
    !language.actions(state, symbol).is_empty() || language.symbol_is_extra(symbol)
  };
  let is_skip = |symbol: Symbol| data.symbols[symbol as usize].kind == SymbolKind::Skip;

  let external_valid = data.external_tokens.iter()
    .map(|&symbol| valid(symbol))
    .collect::<Vec<_>>();
  let try_external = external_valid.iter().any(|&v| v);

  let mut pos = position.bytes;
  let mut max_peek = pos;

  loop {
    if let (true, Some(scanner)) = (try_external, language.scanner()) {
      let mut cursor = ScanCursor::new(text, pos);
      let result = scanner.scan(scanner_state, &mut cursor, &external_valid);
      max_peek = max_peek.max(cursor.max_peek());
      if let Some((index, new_state)) = result {
        if external_valid.get(index).copied().unwrap_or(false) {
          return token(
            text,
            position,
            data.external_tokens[index],
            cursor.token_start(),
            cursor.token_end(),
            max_peek,
            Some(new_state),
          );
        }
      }
    }

    if pos >= text.len() {
      return token(text, position, END, pos, pos, max_peek.max(pos + 1), None);
    }

    let found = longest_match(&data.lexer, text, pos, data.word_token, |symbol| {
      valid(symbol) || is_skip(symbol)
    });
    max_peek = max_peek.max(found.peek);

    match found.best {
      Some((symbol, end)) if is_skip(symbol) => {
        pos = end;
        continue;
      }
      Some((symbol, end)) => {
        let symbol_end = match (data.word_token, found.word_end) {
          (Some(word), Some(word_end)) if word_end > end && !language.symbol_is_named(symbol) => {
            (word, word_end)
          }
          _ => (symbol, end),
        };
        return token(text, position, symbol_end.0, pos, symbol_end.1, max_peek, None);
      }
      None => {}
    }

    // nothing valid here: fall back to tokens that make sense out of context
    let any = longest_match(&data.lexer, text, pos, None, |symbol| language.is_recovery_token(symbol));
    max_peek = max_peek.max(any.peek);
    if let Some((symbol, end)) = any.best {
      return token(text, position, symbol, pos, end, max_peek, None);
    }

    let (end, peek) = error_end(language, text, pos);
    max_peek = max_peek.max(peek);
    return token(text, position, ERROR, pos, end, max_peek, None);
  }
}

fn token(
  text: &[u8],
  position: Length,
  symbol: Symbol,
  start: usize,
  end: usize,
  max_peek: usize,
  external_state: Option<ScannerState>,
) -> Lexed {
  Lexed {
    symbol,
    padding: Length::of_bytes(&text[position.bytes..start]),
    size: Length::of_bytes(&text[start..end]),
    lookahead_bytes: max_peek.saturating_sub(end).max(1),
    external_state,
  }
}

fn token_symbol(kind: TokenId) -> Symbol {
  (kind.index() + 1) as Symbol
}

/// Runs the DFA from `start` while some token satisfying `accept` (or the
/// word token) is still reachable, so the scan stops as soon as only
/// unwanted tokens could match.
fn longest_match(
  lexer: &Lexer,
  text: &[u8],
  start: usize,
  word: Option<Symbol>,
  accept: impl Fn(Symbol) -> bool,
) -> Match {
  let wanted = |kind: TokenId| {
    let symbol = token_symbol(kind);
    accept(symbol) || word == Some(symbol)
  };
  let mut state = lexer.dfa.start();
  let mut result = Match {
    best: None,
    word_end: None,
    peek: text.len() + 1,
  };

  let mut pos = start;
  while let Some((c, len)) = next_char(text, pos) {
    let end = pos + len;
    let next = c.and_then(|c| lexer.dfa.transition(state, lexer.char_class(c)));
    match next {
      Some(next) if lexer.can_reach(next, &wanted) => state = next,
      _ => {
        result.peek = end;
        break;
      }
    }
    if let Some(kinds) = lexer.dfa.result(state) {
      let symbols = kinds.iter().map(|&kind| token_symbol(kind));
      if let Some(symbol) = symbols.clone().find(|&s| accept(s)) {
        result.best = Some((symbol, end));
      }
      if word.map_or(false, |w| symbols.clone().any(|s| s == w)) {
        result.word_end = Some(end);
      }
    }
    pos = end;
  }
  result
}

/// Unrecognized text extends over non-whitespace characters where no
/// recovery token starts, and is at least one character long. Returns the
/// end and how far the scan looked.
fn error_end(language: &Language, text: &[u8], start: usize) -> (usize, usize) {
  let lexer = &language.data().lexer;
  let mut end = match next_char(text, start) {
    Some((_, len)) => start + len,
    None => return (start, start + 1),
  };
  let mut peek = end;
  while let Some((c, len)) = next_char(text, end) {
    if c.map_or(false, char::is_whitespace) {
      peek = peek.max(end + len);
      break;
    }
    let found = longest_match(lexer, text, end, None, |symbol| language.is_recovery_token(symbol));
    peek = peek.max(found.peek);
    if found.best.is_some() {
      break;
    }
    end += len;
  }
  if end >= text.len() {
    peek = peek.max(end + 1);
  }
  (end, peek)
}

#[cfg(test)]
mod tests {
  use super::*;
  use grammar::GrammarBuilder;
  use grammar::rule::*;

  fn language() -> Language {
    let mut builder = GrammarBuilder::new("blocks");
    builder
      .rule("source", repeat(sym("item")))
      .rule("item", choice(vec![
        seq(vec![string("block"), sym("name")]),
        sym("number"),
      ]))
      .rule("name", pattern("[a-z]+"))
      .rule("number", pattern("[0-9]+"))
      .extra(pattern(r"\s"))
      .word("name");
    Language::compile(&builder, None).unwrap()
  }

  /// Words and quoted strings; the quoted text is only valid inside quotes.
  fn quoted_language() -> Language {
    let mut builder = GrammarBuilder::new("quoted");
    builder
      .rule("source", repeat(choice(vec![sym("word"), sym("quoted")])))
      .rule("word", pattern("[a-z]+"))
      .rule("quoted", seq(vec![string("\""), optional(sym("_text")), string("\"")]))
      .rule("_text", pattern(r#"[^"]+"#))
      .extra(pattern(r"\s"));
    Language::compile(&builder, None).unwrap()
  }

  fn lex_at_start(language: &Language, text: &str) -> (String, usize, usize) {
    let lexed = lex(language, text.as_bytes(), Length::ZERO, 0, &ScannerState::default());
    (
      language.symbol_name(lexed.symbol).to_owned(),
      lexed.padding.bytes,
      lexed.size.bytes,
    )
  }

  #[test]
  fn skips_padding() {
    let language = language();
    assert_eq!(lex_at_start(&language, "  block x"), ("block".to_owned(), 2, 5));
    assert_eq!(lex_at_start(&language, " \n 42"), ("number".to_owned(), 3, 2));
    assert_eq!(lex_at_start(&language, "   "), ("end".to_owned(), 3, 0));
  }

  #[test]
  fn keyword_prefix_of_word() {
    let language = language();
    assert_eq!(lex_at_start(&language, "blockx"), ("name".to_owned(), 0, 6));
  }

  #[test]
  fn invalid_tokens_are_still_lexed() {
    let language = language();
    assert_eq!(lex_at_start(&language, "x"), ("name".to_owned(), 0, 1));
  }

  #[test]
  fn unrecognized_text() {
    let language = language();
    assert_eq!(lex_at_start(&language, "@@ 12"), ("ERROR".to_owned(), 0, 2));
    assert_eq!(lex_at_start(&language, "@1"), ("ERROR".to_owned(), 0, 1));
  }

  #[test]
  fn lookahead_is_recorded() {
    let language = language();
    let lexed = lex(&language, b"42 ", Length::ZERO, 0, &ScannerState::default());
    assert_eq!(lexed.lookahead_bytes, 1);
    let lexed = lex(&language, b"42", Length::ZERO, 0, &ScannerState::default());
    assert_eq!(lexed.lookahead_bytes, 1);
  }

  #[test]
  fn context_only_tokens_are_not_a_fallback() {
    let language = quoted_language();
    assert_eq!(lex_at_start(&language, ",b c"), ("ERROR".to_owned(), 0, 1));
    assert_eq!(lex_at_start(&language, ",,\"x\""), ("ERROR".to_owned(), 0, 2));
    assert_eq!(lex_at_start(&language, "\"x"), ("\"".to_owned(), 0, 1));
  }

  #[test]
  fn lookahead_stops_when_no_wanted_token_can_match() {
    let language = quoted_language();
    let text = format!("abc {}", "def ".repeat(1000));
    let lexed = lex(&language, text.as_bytes(), Length::ZERO, 0, &ScannerState::default());
    assert_eq!(language.symbol_name(lexed.symbol), "word");
    assert_eq!(lexed.size.bytes, 3);
    assert_eq!(lexed.lookahead_bytes, 1);
  }

  #[test]
  fn invalid_utf8_is_an_error_token() {
    let language = language();
    let lexed = lex(&language, b"\xff\xfe 12", Length::ZERO, 0, &ScannerState::default());
    assert_eq!(lexed.symbol, ERROR);
    assert_eq!(lexed.size.bytes, 2);
    let lexed = lex(&language, b"12\xff", Length::ZERO, 0, &ScannerState::default());
    assert_eq!(language.symbol_name(lexed.symbol), "number");
    assert_eq!(lexed.size.bytes, 2);
  }
}
