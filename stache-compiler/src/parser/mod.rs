use anyhow::{bail, Result};
use serde_json::{Number, Value};

use crate::ast::*;
use crate::error::SyntaxError;
use crate::lexer::{Token, TokenKind};
use crate::path::{BLOCK_SIGIL, INVERSE_SIGIL};

/// How a run of statements ended.
enum Terminator {
    Eof(SourceSpan),
    Else(SourceSpan),
    End { name: String, span: SourceSpan },
}

struct Parameters {
    arguments: Vec<Argument>,
    hash: Vec<HashArgument>,
    block_params: Vec<String>,
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    fn span_from_token(token: &Token) -> SourceSpan {
        let len = token.lexeme.chars().count().max(1);
        SourceSpan::new(
            token.line,
            token.column,
            token.line,
            token.column + len.saturating_sub(1),
        )
    }

    pub fn parse(&mut self) -> Result<Template> {
        let (statements, terminator) = self.parse_statements()?;
        match terminator {
            Terminator::Eof(_) => Ok(Template::new(statements)),
            Terminator::Else(span) => bail!(SyntaxError::new(
                "Unexpected {{else}} outside of a block",
                span
            )),
            Terminator::End { name, span } => bail!(SyntaxError::new(
                format!("Unexpected closing tag '{name}' without an open block"),
                span
            )),
        }
    }

    fn parse_statements(&mut self) -> Result<(Vec<Node>, Terminator)> {
        let mut statements = Vec::new();

        loop {
            let token = self.peek().clone();
            let span = Self::span_from_token(&token);
            match &token.kind {
                TokenKind::Eof => return Ok((statements, Terminator::Eof(span))),
                TokenKind::Text(value) => {
                    self.advance();
                    statements.push(Node::Text(TextNode {
                        value: value.clone(),
                        span,
                    }));
                }
                TokenKind::Open if self.is_else() => {
                    self.advance(); // {{
                    self.advance(); // else
                    self.expect_close(TokenKind::Close)?;
                    return Ok((statements, Terminator::Else(span)));
                }
                TokenKind::OpenInverse if self.peek_next().kind == TokenKind::Close => {
                    self.advance(); // {{^
                    self.advance(); // }}
                    return Ok((statements, Terminator::Else(span)));
                }
                TokenKind::Open | TokenKind::OpenAmpersand => {
                    self.advance();
                    let expression = self.parse_expression(true, span)?;
                    self.expect_close(TokenKind::Close)?;
                    statements.push(Node::Expression(ExpressionNode {
                        escaped: token.kind == TokenKind::Open,
                        ..expression
                    }));
                }
                TokenKind::OpenUnescaped => {
                    self.advance();
                    let expression = self.parse_expression(false, span)?;
                    self.expect_close(TokenKind::CloseUnescaped)?;
                    statements.push(Node::Expression(expression));
                }
                TokenKind::OpenBlock => {
                    self.advance();
                    statements.push(self.parse_block(BLOCK_SIGIL, span)?);
                }
                TokenKind::OpenInverse => {
                    self.advance();
                    statements.push(self.parse_block(INVERSE_SIGIL, span)?);
                }
                TokenKind::OpenEndBlock => {
                    self.advance();
                    let name = self.expect_identifier()?;
                    self.expect_close(TokenKind::Close)?;
                    return Ok((statements, Terminator::End { name, span }));
                }
                TokenKind::OpenPartial => {
                    self.advance();
                    statements.push(self.parse_partial(span)?);
                }
                TokenKind::OpenRawBlock => {
                    self.advance();
                    statements.push(self.parse_raw_block(span)?);
                }
                other => bail!(SyntaxError::new(format!("Unexpected token {other:?}"), span)),
            }
        }
    }

    fn parse_expression(&mut self, escaped: bool, span: SourceSpan) -> Result<ExpressionNode> {
        let name = self.expect_identifier()?;
        let parameters = self.parse_parameters(false)?;
        Ok(ExpressionNode {
            path: PathExpression::parse(&name),
            arguments: parameters.arguments,
            hash: parameters.hash,
            escaped,
            span,
        })
    }

    /// Parses a `{{#name}}` block or, with the `^` sigil, an inverted
    /// section. Both share the closing and `{{else}}` rules.
    fn parse_block(&mut self, sigil: char, open_span: SourceSpan) -> Result<Node> {
        let name = self.expect_identifier()?;
        let parameters = self.parse_parameters(true)?;
        self.expect_close(TokenKind::Close)?;

        let (body, terminator) = self.parse_statements()?;
        let body_span = body
            .first()
            .map(|node| node.span())
            .unwrap_or(open_span);
        let body = Node::Block(BlockNode::new(body, body_span));

        let (inversion, end) = match terminator {
            Terminator::Else(else_span) => {
                let (inversion, terminator) = self.parse_statements()?;
                let inversion = Node::Block(BlockNode::new(inversion, else_span));
                (Some(Box::new(inversion)), terminator)
            }
            other => (None, other),
        };

        let close_span = match end {
            Terminator::End { name: closing, span } => {
                if closing.trim_start_matches('*') != name.trim_start_matches('*') {
                    bail!(SyntaxError::new(
                        format!("'{closing}' does not match the open block '{name}'"),
                        span
                    ));
                }
                span
            }
            Terminator::Else(span) => bail!(SyntaxError::new(
                format!("Duplicate {{{{else}}}} in '{name}'"),
                span
            )),
            Terminator::Eof(_) => bail!(SyntaxError::new(
                format!("Unclosed block '{name}'"),
                open_span
            )),
        };

        Ok(Node::BlockHelper(BlockHelperNode {
            helper_name: format!("{sigil}{name}"),
            arguments: parameters.arguments,
            hash: parameters.hash,
            block_params: parameters.block_params,
            body: Box::new(body),
            inversion,
            is_raw: false,
            span: SourceSpan::union(&open_span, &close_span),
        }))
    }

    fn parse_raw_block(&mut self, open_span: SourceSpan) -> Result<Node> {
        let name = self.expect_identifier()?;
        let parameters = self.parse_parameters(false)?;
        self.expect_close(TokenKind::CloseRawBlock)?;

        let mut content = Vec::new();
        if let TokenKind::Text(value) = &self.peek().kind {
            let value = value.clone();
            let span = Self::span_from_token(self.peek());
            self.advance();
            content.push(Node::Text(TextNode { value, span }));
        }

        let close = self.peek().clone();
        if close.kind != TokenKind::OpenEndRawBlock {
            bail!(SyntaxError::new(
                format!("Unclosed raw block '{name}'"),
                open_span
            ));
        }
        self.advance();
        let closing = self.expect_identifier()?;
        if closing != name {
            bail!(SyntaxError::new(
                format!("'{closing}' does not match the open raw block '{name}'"),
                Self::span_from_token(&close)
            ));
        }
        self.expect_close(TokenKind::CloseRawBlock)?;

        Ok(Node::BlockHelper(BlockHelperNode {
            helper_name: format!("{BLOCK_SIGIL}{name}"),
            arguments: parameters.arguments,
            hash: parameters.hash,
            block_params: Vec::new(),
            body: Box::new(Node::Block(BlockNode::new(content, open_span))),
            inversion: None,
            is_raw: true,
            span: SourceSpan::union(&open_span, &Self::span_from_token(&close)),
        }))
    }

    fn parse_partial(&mut self, span: SourceSpan) -> Result<Node> {
        let token = self.advance().clone();
        let name = match &token.kind {
            TokenKind::Identifier => token.lexeme.clone(),
            TokenKind::StringLiteral(value) => value.clone(),
            other => bail!(SyntaxError::new(
                format!("Expected a partial name but found {other:?}"),
                Self::span_from_token(&token)
            )),
        };
        self.expect_close(TokenKind::Close)?;
        Ok(Node::Partial(PartialNode { name, span }))
    }

    fn parse_parameters(&mut self, allow_block_params: bool) -> Result<Parameters> {
        let mut parameters = Parameters {
            arguments: Vec::new(),
            hash: Vec::new(),
            block_params: Vec::new(),
        };

        while !self.at_close() {
            let token = self.peek().clone();
            if token.kind == TokenKind::Identifier
                && token.lexeme == "as"
                && self.peek_next().kind == TokenKind::Pipe
            {
                if !allow_block_params {
                    bail!(SyntaxError::new(
                        "Block parameters are only allowed on block helpers",
                        Self::span_from_token(&token)
                    ));
                }
                self.advance(); // as
                self.advance(); // |
                while self.peek().kind == TokenKind::Identifier {
                    let param = self.advance().lexeme.clone();
                    parameters.block_params.push(param);
                }
                self.expect(TokenKind::Pipe, "'|' to close block parameters")?;
                continue;
            }

            if token.kind == TokenKind::Identifier && self.peek_next().kind == TokenKind::Equals {
                self.advance(); // key
                self.advance(); // =
                let value = self.parse_argument()?;
                parameters.hash.push(HashArgument {
                    key: token.lexeme,
                    value,
                });
                continue;
            }

            if !parameters.hash.is_empty() {
                bail!(SyntaxError::new(
                    "Positional argument after hash arguments",
                    Self::span_from_token(&token)
                ));
            }
            let argument = self.parse_argument()?;
            parameters.arguments.push(argument);
        }

        Ok(parameters)
    }

    fn parse_argument(&mut self) -> Result<Argument> {
        let token = self.advance().clone();
        let argument = match &token.kind {
            TokenKind::Identifier => Argument::Path(PathExpression::parse(&token.lexeme)),
            TokenKind::StringLiteral(value) => Argument::Literal(Value::String(value.clone())),
            TokenKind::IntegerLiteral(value) => Argument::Literal(Value::from(*value)),
            TokenKind::FloatLiteral(value) => Argument::Literal(
                Number::from_f64(*value)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            ),
            TokenKind::BooleanLiteral(value) => Argument::Literal(Value::Bool(*value)),
            TokenKind::Null => Argument::Literal(Value::Null),
            other => bail!(SyntaxError::new(
                format!("Expected an argument but found {other:?}"),
                Self::span_from_token(&token)
            )),
        };
        Ok(argument)
    }

    fn expect_identifier(&mut self) -> Result<String> {
        let token = self.peek().clone();
        if token.kind != TokenKind::Identifier {
            bail!(SyntaxError::new(
                format!("Expected a name but found {:?}", token.kind),
                Self::span_from_token(&token)
            ));
        }
        self.advance();
        Ok(token.lexeme)
    }

    fn expect_close(&mut self, kind: TokenKind) -> Result<()> {
        let expected = match kind {
            TokenKind::CloseUnescaped => "'}}}'",
            TokenKind::CloseRawBlock => "'}}}}'",
            _ => "'}}'",
        };
        self.expect(kind, expected)
    }

    fn expect(&mut self, kind: TokenKind, description: &str) -> Result<()> {
        let token = self.peek().clone();
        if token.kind != kind {
            bail!(SyntaxError::new(
                format!("Expected {description} but found '{}'", token.lexeme),
                Self::span_from_token(&token)
            ));
        }
        self.advance();
        Ok(())
    }

    fn is_else(&self) -> bool {
        let name = self.peek_next();
        name.kind == TokenKind::Identifier
            && name.lexeme == "else"
            && matches!(
                self.tokens.get(self.current + 2).map(|token| &token.kind),
                Some(TokenKind::Close)
            )
    }

    fn at_close(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Close
                | TokenKind::CloseUnescaped
                | TokenKind::CloseRawBlock
                | TokenKind::Eof
        )
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.current.min(last)]
    }

    fn peek_next(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.current + 1).min(last)]
    }

    fn advance(&mut self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        let index = self.current.min(last);
        if self.current < last {
            self.current += 1;
        }
        &self.tokens[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::source::TemplateSource;

    fn parse(input: &str) -> Result<Template> {
        let source = TemplateSource::inline(input);
        let tokens = Lexer::new(&source).tokenize()?;
        Parser::new(tokens).parse()
    }

    #[test]
    fn parses_block_helper_with_inversion_and_params() {
        let template = parse("{{#each people as |person i|}}{{person}}{{else}}none{{/each}}")
            .expect("parse");
        let Node::BlockHelper(block) = &template.statements[0] else {
            panic!("expected block helper, found {:?}", template.statements[0]);
        };
        assert_eq!(block.helper_name, "#each");
        assert_eq!(block.block_params, vec!["person", "i"]);
        assert_eq!(
            block.arguments,
            vec![Argument::Path(PathExpression::parse("people"))]
        );
        assert!(matches!(block.body.as_ref(), Node::Block(body) if body.statements.len() == 1));
        assert!(block.inversion.is_some());
        assert!(!block.is_raw);
    }

    #[test]
    fn parses_hash_arguments_and_literals() {
        let template = parse("{{link \"home\" 3 active=true}}").expect("parse");
        let Node::Expression(expression) = &template.statements[0] else {
            panic!("expected expression");
        };
        assert_eq!(expression.path.original, "link");
        assert_eq!(expression.arguments.len(), 2);
        assert_eq!(expression.hash[0].key, "active");
        assert!(expression.escaped);
    }

    #[test]
    fn inline_partial_closes_without_star() {
        let template = parse("{{#*inline \"row\"}}x{{/inline}}").expect("parse");
        let Node::BlockHelper(block) = &template.statements[0] else {
            panic!("expected block helper");
        };
        assert_eq!(block.helper_name, "#*inline");
    }

    #[test]
    fn raw_block_is_marked_raw() {
        let template = parse("{{{{raw}}}}{{x}}{{{{/raw}}}}").expect("parse");
        let Node::BlockHelper(block) = &template.statements[0] else {
            panic!("expected block helper");
        };
        assert!(block.is_raw);
        let Node::Block(body) = block.body.as_ref() else {
            panic!("expected block body");
        };
        assert_eq!(
            body.statements,
            vec![Node::Text(TextNode {
                value: "{{x}}".into(),
                span: body.statements[0].span(),
            })]
        );
    }

    #[test]
    fn rejects_mismatched_close() {
        let err = parse("{{#if a}}x{{/each}}").unwrap_err();
        assert!(err.to_string().contains("does not match"), "{err}");
    }

    #[test]
    fn parses_inverted_section_with_caret_sigil() {
        let template = parse("{{^if ok}}no{{^}}yes{{/if}}").expect("parse");
        let Node::BlockHelper(block) = &template.statements[0] else {
            panic!("expected block helper, found {:?}", template.statements[0]);
        };
        assert_eq!(block.helper_name, "^if");
        assert!(block.inversion.is_some(), "{{^}} separates the else section");
    }

    #[test]
    fn syntax_errors_carry_their_span() {
        let err = parse("ab\n{{#if a}}x{{/each}}").unwrap_err();
        let syntax = err.downcast_ref::<SyntaxError>().expect("typed parse error");
        assert_eq!((syntax.span.line, syntax.span.column), (2, 11));
    }

    #[test]
    fn rejects_unclosed_block() {
        let err = parse("{{#if a}}x").unwrap_err();
        assert!(err.to_string().contains("Unclosed block 'if'"), "{err}");
    }
}
