use super::{Lexer, Token};

pub struct Tokens<'lexer, 'input> {
  lexer: &'lexer Lexer,
  input: &'input str,
  pos: usize,
}

#[derive(Debug)]
pub struct Error {
  pub char: char,
  pub start: usize,
  pub end: usize,
}

impl<'lexer, 'input> Tokens<'lexer, 'input> {
  pub(super) fn new(lexer: &'lexer Lexer, input: &'input str) -> Self {
    Self {
      lexer,
      input,
      pos: 0,
    }
  }
}

impl<'lexer, 'input> Iterator for Tokens<'lexer, 'input> {
  type Item = Result<Token<'input>, Error>;

  fn next(&mut self) -> Option<Self::Item> {
    let c = self.input[self.pos..].chars().next()?;

    let start = self.pos;
    let mut state = self.lexer.dfa.start();
    let mut best = None;

    for (offset, c) in self.input[start..].char_indices() {
      match self.lexer.dfa.transition(state, self.lexer.char_class(c)) {
        Some(next) => state = next,
        None => break,
      }
      if let Some(kinds) = self.lexer.dfa.result(state) {
        best = Some((kinds[0], start + offset + c.len_utf8()));
      }
    }

    match best {
      Some((kind, end)) => {
        self.pos = end;
        Some(Ok(Token {
          kind,
          text: &self.input[start..end],
          start,
          end,
        }))
      }
      None => {
        self.pos += c.len_utf8();
        Some(Err(Error {
          char: c,
          start,
          end: self.pos,
        }))
      }
    }
  }
}
