use anyhow::{bail, Result};

use crate::error::SyntaxError;
use crate::source::TemplateSource;

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    fn new(kind: TokenKind, lexeme: String, line: usize, column: usize) -> Self {
        Self {
            kind,
            lexeme,
            line,
            column,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Text(String),
    Open,            // {{
    OpenUnescaped,   // {{{
    OpenAmpersand,   // {{&
    OpenBlock,       // {{#
    OpenInverse,     // {{^
    OpenEndBlock,    // {{/
    OpenPartial,     // {{>
    OpenRawBlock,    // {{{{
    OpenEndRawBlock, // {{{{/
    Close,           // }}
    CloseUnescaped,  // }}}
    CloseRawBlock,   // }}}}
    Identifier,
    StringLiteral(String),
    IntegerLiteral(i64),
    FloatLiteral(f64),
    BooleanLiteral(bool),
    Null,
    Equals,
    Pipe,
    Eof,
}

const OPENERS: &[(&str, TokenKind)] = &[
    ("{{{{/", TokenKind::OpenEndRawBlock),
    ("{{{{", TokenKind::OpenRawBlock),
    ("{{{", TokenKind::OpenUnescaped),
    ("{{&", TokenKind::OpenAmpersand),
    ("{{#", TokenKind::OpenBlock),
    ("{{^", TokenKind::OpenInverse),
    ("{{/", TokenKind::OpenEndBlock),
    ("{{>", TokenKind::OpenPartial),
    ("{{", TokenKind::Open),
];

pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a TemplateSource) -> Self {
        Self {
            input: &source.contents,
            position: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        while self.position < self.input.len() {
            if self.rest().starts_with("{{!") {
                self.skip_comment()?;
                continue;
            }
            if self.rest().starts_with("{{") {
                let raw_open = self.lex_mustache(&mut tokens)?;
                if raw_open {
                    self.lex_raw_body(&mut tokens);
                }
                continue;
            }
            tokens.push(self.lex_text());
        }

        tokens.push(Token::new(
            TokenKind::Eof,
            String::new(),
            self.line,
            self.column,
        ));

        Ok(tokens)
    }

    fn lex_text(&mut self) -> Token {
        let start = self.position;
        let start_line = self.line;
        let start_column = self.column;
        while self.position < self.input.len() && !self.rest().starts_with("{{") {
            self.advance_char();
        }
        let text = self.slice(start, self.position).to_string();
        Token::new(TokenKind::Text(text.clone()), text, start_line, start_column)
    }

    /// Lexes one `{{ ... }}` construct. Returns true when it opened a raw block
    /// whose body must be taken verbatim.
    fn lex_mustache(&mut self, tokens: &mut Vec<Token>) -> Result<bool> {
        let start_line = self.line;
        let start_column = self.column;
        let (opener, kind) = OPENERS
            .iter()
            .find(|(opener, _)| self.rest().starts_with(opener))
            .map(|(opener, kind)| (*opener, kind.clone()))
            .unwrap_or(("{{", TokenKind::Open));
        self.advance_by(opener.len());
        tokens.push(Token::new(
            kind.clone(),
            opener.to_string(),
            start_line,
            start_column,
        ));

        let (closer, close_kind) = match kind {
            TokenKind::OpenRawBlock | TokenKind::OpenEndRawBlock => {
                ("}}}}", TokenKind::CloseRawBlock)
            }
            TokenKind::OpenUnescaped => ("}}}", TokenKind::CloseUnescaped),
            _ => ("}}", TokenKind::Close),
        };

        loop {
            self.skip_whitespace();
            let Some(next) = self.peek_char() else {
                bail!(SyntaxError::at(
                    "Unterminated mustache starting",
                    start_line,
                    start_column
                ));
            };
            if self.rest().starts_with(closer) {
                let line = self.line;
                let column = self.column;
                self.advance_by(closer.len());
                tokens.push(Token::new(close_kind, closer.to_string(), line, column));
                return Ok(kind == TokenKind::OpenRawBlock);
            }

            let token = match next {
                '"' | '\'' => self.lex_string()?,
                '=' => self.simple_token(TokenKind::Equals),
                '|' => self.simple_token(TokenKind::Pipe),
                ch if ch.is_ascii_digit() => self.lex_number()?,
                '-' if matches!(self.peek_next_char(), Some(ch) if ch.is_ascii_digit()) => {
                    self.lex_number()?
                }
                ch if is_identifier_char(ch) => self.lex_identifier(),
                other => bail!(SyntaxError::at(
                    format!("Unexpected character '{other}'"),
                    self.line,
                    self.column
                )),
            };
            tokens.push(token);
        }
    }

    fn lex_raw_body(&mut self, tokens: &mut Vec<Token>) {
        let start = self.position;
        let start_line = self.line;
        let start_column = self.column;
        while self.position < self.input.len() && !self.rest().starts_with("{{{{/") {
            self.advance_char();
        }
        if self.position > start {
            let text = self.slice(start, self.position).to_string();
            tokens.push(Token::new(
                TokenKind::Text(text.clone()),
                text,
                start_line,
                start_column,
            ));
        }
    }

    fn skip_comment(&mut self) -> Result<()> {
        let start_line = self.line;
        let start_column = self.column;
        let terminator = if self.rest().starts_with("{{!--") {
            "--}}"
        } else {
            "}}"
        };
        self.advance_by(3); // consume '{{!'
        while self.position < self.input.len() {
            if self.rest().starts_with(terminator) {
                self.advance_by(terminator.len());
                return Ok(());
            }
            self.advance_char();
        }
        bail!(SyntaxError::at(
            "Unterminated comment starting",
            start_line,
            start_column
        ));
    }

    fn lex_string(&mut self) -> Result<Token> {
        let start = self.position;
        let start_line = self.line;
        let start_column = self.column;
        let quote = self.advance_char().unwrap_or('"');

        let mut value = String::new();
        while let Some(ch) = self.peek_char() {
            match ch {
                '\\' => {
                    self.advance_char();
                    if let Some(escaped) = self.advance_char() {
                        value.push(escaped);
                    }
                }
                ch if ch == quote => {
                    self.advance_char(); // consume closing quote
                    let lexeme = self.slice(start, self.position).to_string();
                    return Ok(Token::new(
                        TokenKind::StringLiteral(value),
                        lexeme,
                        start_line,
                        start_column,
                    ));
                }
                _ => {
                    value.push(ch);
                    self.advance_char();
                }
            }
        }

        bail!(SyntaxError::at(
            "Unterminated string literal starting",
            start_line,
            start_column
        ));
    }

    fn lex_number(&mut self) -> Result<Token> {
        let start = self.position;
        let start_line = self.line;
        let start_column = self.column;
        let mut is_float = false;

        self.advance_char(); // consume sign or first digit

        while let Some(ch) = self.peek_char() {
            match ch {
                '0'..='9' => {
                    self.advance_char();
                }
                '.' if !is_float => {
                    is_float = true;
                    self.advance_char();
                }
                _ => break,
            }
        }

        let lexeme = self.slice(start, self.position).to_string();
        let kind = if is_float {
            match lexeme.parse::<f64>() {
                Ok(value) => TokenKind::FloatLiteral(value),
                Err(_) => bail!(SyntaxError::at(
                    format!("Failed to parse number literal '{lexeme}'"),
                    start_line,
                    start_column
                )),
            }
        } else {
            match lexeme.parse::<i64>() {
                Ok(value) => TokenKind::IntegerLiteral(value),
                Err(_) => bail!(SyntaxError::at(
                    format!("Failed to parse number literal '{lexeme}'"),
                    start_line,
                    start_column
                )),
            }
        };
        Ok(Token::new(kind, lexeme, start_line, start_column))
    }

    fn lex_identifier(&mut self) -> Token {
        let start = self.position;
        let start_line = self.line;
        let start_column = self.column;

        while let Some(ch) = self.peek_char() {
            if is_identifier_char(ch) {
                self.advance_char();
            } else {
                break;
            }
        }

        let lexeme = self.slice(start, self.position).to_string();
        let kind = match lexeme.as_str() {
            "true" => TokenKind::BooleanLiteral(true),
            "false" => TokenKind::BooleanLiteral(false),
            "null" | "undefined" => TokenKind::Null,
            _ => TokenKind::Identifier,
        };
        Token::new(kind, lexeme, start_line, start_column)
    }

    fn simple_token(&mut self, kind: TokenKind) -> Token {
        let start_line = self.line;
        let start_column = self.column;
        let start = self.position;
        self.advance_char();
        Token::new(
            kind,
            self.slice(start, self.position).to_string(),
            start_line,
            start_column,
        )
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn rest(&self) -> &str {
        &self.input[self.position..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_next_char(&self) -> Option<char> {
        let mut iter = self.rest().chars();
        iter.next()?;
        iter.next()
    }

    fn advance_by(&mut self, bytes: usize) {
        let target = self.position + bytes;
        while self.position < target {
            if self.advance_char().is_none() {
                break;
            }
        }
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.position += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn slice(&self, start: usize, end: usize) -> &str {
        &self.input[start..end]
    }
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | '/' | '@' | '*' | '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let source = TemplateSource::inline(input);
        Lexer::new(&source)
            .tokenize()
            .expect("tokenize")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn lexes_block_with_params_and_else() {
        let kinds = kinds("{{#each items as |item|}}A{{else}}B{{/each}}");
        assert_eq!(
            kinds,
            vec![
                TokenKind::OpenBlock,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Pipe,
                TokenKind::Identifier,
                TokenKind::Pipe,
                TokenKind::Close,
                TokenKind::Text("A".into()),
                TokenKind::Open,
                TokenKind::Identifier,
                TokenKind::Close,
                TokenKind::Text("B".into()),
                TokenKind::OpenEndBlock,
                TokenKind::Identifier,
                TokenKind::Close,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn raw_block_body_is_verbatim() {
        let kinds = kinds("{{{{raw}}}}{{not parsed}}{{{{/raw}}}}");
        assert_eq!(kinds[2], TokenKind::CloseRawBlock);
        assert_eq!(kinds[3], TokenKind::Text("{{not parsed}}".into()));
        assert_eq!(kinds[4], TokenKind::OpenEndRawBlock);
    }

    #[test]
    fn comments_are_dropped() {
        let kinds = kinds("a{{!-- {{ignored}} --}}b{{! short }}");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Text("a".into()),
                TokenKind::Text("b".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn reports_unterminated_mustache() {
        let source = TemplateSource::inline("hello {{name");
        let err = Lexer::new(&source).tokenize().unwrap_err();
        assert!(err.to_string().contains("line 1, column 7"), "{err}");
        let syntax = err.downcast_ref::<SyntaxError>().expect("typed lexer error");
        assert_eq!((syntax.span.line, syntax.span.column), (1, 7));
    }

    #[test]
    fn lexes_inverted_section_opener() {
        let kinds = kinds("{{^if ok}}no{{/if}}");
        assert_eq!(kinds[0], TokenKind::OpenInverse);
        assert_eq!(kinds[3], TokenKind::Close);
        assert_eq!(kinds[4], TokenKind::Text("no".into()));
    }
}
