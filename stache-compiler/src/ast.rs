use std::fmt;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceSpan {
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl SourceSpan {
    pub fn new(line: usize, column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            line,
            column,
            end_line,
            end_column,
        }
    }

    pub fn single_point(line: usize, column: usize) -> Self {
        Self::new(line, column, line, column)
    }

    pub fn union(a: &Self, b: &Self) -> Self {
        if a.line == 0 {
            return *b;
        }
        if b.line == 0 {
            return *a;
        }

        let (start_line, start_column) =
            if (a.line < b.line) || (a.line == b.line && a.column <= b.column) {
                (a.line, a.column)
            } else {
                (b.line, b.column)
            };

        let (end_line, end_column) = if (a.end_line > b.end_line)
            || (a.end_line == b.end_line && a.end_column >= b.end_column)
        {
            (a.end_line, a.end_column)
        } else {
            (b.end_line, b.end_column)
        };

        Self::new(start_line, start_column, end_line, end_column)
    }
}

impl Default for SourceSpan {
    fn default() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub statements: Vec<Node>,
}

impl Template {
    pub fn new(statements: Vec<Node>) -> Self {
        Self { statements }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(TextNode),
    Expression(ExpressionNode),
    BlockHelper(BlockHelperNode),
    Partial(PartialNode),
    /// A sequence of statements forming the body of a block.
    Block(BlockNode),
}

impl Node {
    pub fn span(&self) -> SourceSpan {
        match self {
            Node::Text(text) => text.span,
            Node::Expression(expression) => expression.span,
            Node::BlockHelper(helper) => helper.span,
            Node::Partial(partial) => partial.span,
            Node::Block(block) => block.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub value: String,
    pub span: SourceSpan,
}

/// `{{name args}}`, `{{{name}}}` or `{{& name}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionNode {
    pub path: PathExpression,
    pub arguments: Vec<Argument>,
    pub hash: Vec<HashArgument>,
    pub escaped: bool,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockNode {
    pub statements: Vec<Node>,
    pub span: SourceSpan,
}

impl BlockNode {
    pub fn new(statements: Vec<Node>, span: SourceSpan) -> Self {
        Self { statements, span }
    }

    pub fn empty(span: SourceSpan) -> Self {
        Self::new(Vec::new(), span)
    }
}

/// `{{#name args as |params|}}body{{else}}inversion{{/name}}`.
///
/// `helper_name` keeps the opening sigil (`#each`, `#*inline`). `body` and
/// `inversion` are expected to be [`Node::Block`]; anything else is rejected
/// when the call site is bound.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockHelperNode {
    pub helper_name: String,
    pub arguments: Vec<Argument>,
    pub hash: Vec<HashArgument>,
    pub block_params: Vec<String>,
    pub body: Box<Node>,
    pub inversion: Option<Box<Node>>,
    pub is_raw: bool,
    pub span: SourceSpan,
}

/// `{{> name}}`
#[derive(Debug, Clone, PartialEq)]
pub struct PartialNode {
    pub name: String,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Path(PathExpression),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HashArgument {
    pub key: String,
    pub value: Argument,
}

/// A lookup path such as `this`, `../title`, `@index` or `author.name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpression {
    pub original: String,
    /// Number of leading `../` segments.
    pub depth: usize,
    pub data: bool,
    pub segments: Vec<String>,
}

impl PathExpression {
    pub fn parse(original: &str) -> Self {
        let mut rest = original;
        let mut depth = 0;
        while let Some(stripped) = rest.strip_prefix("../") {
            depth += 1;
            rest = stripped;
        }

        let data = rest.starts_with('@');
        let rest = rest.trim_start_matches('@');

        let segments = rest
            .split(['.', '/'])
            .filter(|segment| !segment.is_empty() && *segment != "this")
            .map(str::to_string)
            .collect();

        Self {
            original: original.to_string(),
            depth,
            data,
            segments,
        }
    }

    /// `this`, `.` and `../` resolve to a context value rather than a member.
    pub fn is_context_reference(&self) -> bool {
        !self.data && self.segments.is_empty()
    }

    /// A single bare identifier, the shape a helper name takes.
    pub fn simple_name(&self) -> Option<&str> {
        if self.depth == 0 && !self.data && self.segments.len() == 1 && !self.original.contains(['.', '/'])
        {
            self.segments.first().map(String::as_str)
        } else {
            None
        }
    }
}
