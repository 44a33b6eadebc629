//! Argument-tree parser.
//!
//! Turns the flat token stream into a [`Program`]: a sequence of literal
//! tokens and [`Call`]s, where every call followed by `[` owns a list of
//! `;`-separated [`Argument`]s that are themselves token sequences.
//!
//! Arguments are left unevaluated.  The only extra structure the parser adds
//! is the position of the first comparison operator in each argument, so
//! built-ins can treat `a == b` as a comparison without re-scanning.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::RuntimeOptions;
use crate::error::{Result, ScriptError};

use super::lexer::{Operator, Span, Token, TokenKind};

// ── AST ───────────────────────────────────────────────────────────────────────

/// A `$name` or `$name[arg;arg;…]` call site.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Name including the leading `$`, as written in the source.
    pub name: String,
    /// Empty for `$name`; one (possibly empty) argument per slot otherwise.
    pub args: Vec<Argument>,
    pub span: Span,
}

impl Call {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Call {
            name: name.into(),
            args: Vec::new(),
            span,
        }
    }

    /// `true` when the call was written with brackets (`$x[]` counts).
    pub fn has_brackets(&self) -> bool {
        !self.args.is_empty()
    }

    pub fn arg(&self, index: usize) -> Option<&Argument> {
        self.args.get(index)
    }
}

/// One `;`-separated slot of a call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Argument {
    nodes: Vec<Token>,
    /// Index of the first operator token, if any.
    operator: Option<usize>,
}

/// An argument viewed as `lhs OP rhs`.
#[derive(Debug, Clone, Copy)]
pub struct Comparison<'a> {
    pub lhs: &'a [Token],
    pub op: Operator,
    pub rhs: &'a [Token],
}

impl Argument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: Token) {
        if self.operator.is_none() && matches!(token.kind, TokenKind::Operator(_)) {
            self.operator = Some(self.nodes.len());
        }
        self.nodes.push(token);
    }

    pub fn nodes(&self) -> &[Token] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Split around the first operator.  Operators nested inside calls
    /// belong to those calls' own arguments and are not considered.
    pub fn comparison(&self) -> Option<Comparison<'_>> {
        let idx = self.operator?;
        match &self.nodes[idx].kind {
            TokenKind::Operator(op) => Some(Comparison {
                lhs: &self.nodes[..idx],
                op: *op,
                rhs: &self.nodes[idx + 1..],
            }),
            _ => None,
        }
    }
}

impl FromIterator<Token> for Argument {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        let mut arg = Argument::new();
        for token in iter {
            arg.push(token);
        }
        arg
    }
}

/// Root of a parsed script.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub nodes: Vec<Token>,
}

impl Program {
    pub fn nodes(&self) -> &[Token] {
        &self.nodes
    }
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// How many calls may be nested inside one another, counting the outermost.
/// Applies when parsing and again when evaluating, where `$eval` can nest
/// calls the parser never saw.
pub const MAX_NESTING: usize = 64;

/// Recursive-descent parser.
///
/// An instance handles one token stream at a time; asking a busy instance to
/// parse fails with [`ScriptError::ParserBusy`].  Separate instances are
/// independent.
#[derive(Debug, Default)]
pub struct Parser {
    busy: AtomicBool,
}

/// Clears the busy flag when parsing ends, successfully or not.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        if flag.swap(true, Ordering::Acquire) {
            return Err(ScriptError::ParserBusy);
        }
        Ok(BusyGuard(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn parse(&self, tokens: Vec<Token>, options: &RuntimeOptions) -> Result<Program> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        let mut cursor = Cursor {
            tokens: tokens.into(),
            strict: options.strict_brackets,
            depth: 0,
        };
        let mut nodes = Vec::new();
        while let Some(token) = cursor.shift() {
            nodes.push(cursor.parse_atom(token)?);
        }
        Ok(Program { nodes })
    }
}

struct Cursor {
    tokens: VecDeque<Token>,
    strict: bool,
    /// Bracketed calls currently open around the cursor.
    depth: usize,
}

impl Cursor {
    fn shift(&mut self) -> Option<Token> {
        self.tokens.pop_front()
    }

    fn peek_is_open(&self) -> bool {
        matches!(self.tokens.front(), Some(t) if t.kind == TokenKind::Open)
    }

    fn parse_atom(&mut self, token: Token) -> Result<Token> {
        let Token { kind, span } = token;
        match kind {
            TokenKind::Str(_) | TokenKind::Number(_) | TokenKind::Operator(_) => {
                Ok(Token::new(kind, span))
            }
            TokenKind::Call(mut call) => {
                if self.depth >= MAX_NESTING {
                    return Err(ScriptError::syntax(
                        "nesting too deep",
                        span.line,
                        span.column,
                    ));
                }
                if self.peek_is_open() {
                    self.shift();
                    self.depth += 1;
                    let args = self.read_arguments(span);
                    self.depth -= 1;
                    call.args = args?;
                }
                Ok(Token::new(TokenKind::Call(call), span))
            }
            TokenKind::Open | TokenKind::Close | TokenKind::NewArg => {
                if self.strict {
                    return Err(ScriptError::syntax(
                        format!("Unexpected token of type {} at {span}", kind.name()),
                        span.line,
                        span.column,
                    ));
                }
                let ch = match kind {
                    TokenKind::Open => "[",
                    TokenKind::Close => "]",
                    _ => ";",
                };
                Ok(Token::text(ch, span))
            }
        }
    }

    /// Read `arg;arg;…]` after the opening bracket has been consumed.
    fn read_arguments(&mut self, call_span: Span) -> Result<Vec<Argument>> {
        let mut args = Vec::new();
        let mut current = Argument::new();
        while let Some(token) = self.shift() {
            match token.kind {
                TokenKind::Close => {
                    args.push(current);
                    return Ok(args);
                }
                TokenKind::NewArg => args.push(std::mem::take(&mut current)),
                _ => current.push(self.parse_atom(token)?),
            }
        }
        Err(ScriptError::syntax(
            "Expected ']', got none",
            call_span.line,
            call_span.column,
        ))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::lexer::tokenize;

    fn parse_with(src: &str, strict: bool) -> Result<Program> {
        let options = RuntimeOptions {
            strict_brackets: strict,
            ..RuntimeOptions::default()
        };
        Parser::new().parse(tokenize(src)?, &options)
    }

    fn parse(src: &str) -> Program {
        parse_with(src, false).expect("parse failed")
    }

    fn only_call(program: &Program) -> &Call {
        match &program.nodes[..] {
            [Token {
                kind: TokenKind::Call(c),
                ..
            }] => c,
            other => panic!("expected a single call, got {other:?}"),
        }
    }

    fn text_of(arg: &Argument) -> String {
        arg.nodes()
            .iter()
            .map(|t| match &t.kind {
                TokenKind::Str(s) => s.clone(),
                TokenKind::Number(n) => n.to_string(),
                TokenKind::Operator(op) => op.as_str().to_owned(),
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    #[test]
    fn call_without_brackets_has_no_arguments() {
        let p = parse("$foo");
        let c = only_call(&p);
        assert_eq!(c.name, "$foo");
        assert!(c.args.is_empty());
        assert!(!c.has_brackets());
    }

    #[test]
    fn empty_brackets_are_one_empty_argument() {
        let p = parse("$foo[]");
        let c = only_call(&p);
        assert_eq!(c.args.len(), 1);
        assert!(c.args[0].is_empty());
        assert!(c.has_brackets());
    }

    #[test]
    fn single_argument() {
        let p = parse("$foo[bar]");
        let c = only_call(&p);
        assert_eq!(c.args.len(), 1);
        assert_eq!(text_of(&c.args[0]), "bar");
    }

    #[test]
    fn several_arguments_including_empty_ones() {
        let p = parse("$foo[a;;c]");
        let c = only_call(&p);
        let texts: Vec<String> = c.args.iter().map(text_of).collect();
        assert_eq!(texts, vec!["a", "", "c"]);
    }

    #[test]
    fn nested_calls() {
        let p = parse("$a[x $b[y;z] w]");
        let outer = only_call(&p);
        assert_eq!(outer.args.len(), 1);
        let nodes = outer.args[0].nodes();
        assert_eq!(nodes.len(), 3);
        match &nodes[1].kind {
            TokenKind::Call(inner) => {
                assert_eq!(inner.name, "$b");
                assert_eq!(inner.args.len(), 2);
            }
            other => panic!("expected inner call, got {other:?}"),
        }
    }

    #[test]
    fn unterminated_bracket_is_syntax_error() {
        let err = parse_with("$foo[bar", false).unwrap_err();
        match err {
            ScriptError::Syntax {
                message,
                line,
                column,
            } => {
                assert_eq!(message, "Expected ']', got none");
                assert_eq!((line, column), (1, 1));
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    fn nested(levels: usize) -> String {
        format!("{}x{}", "$a[".repeat(levels), "]".repeat(levels))
    }

    #[test]
    fn nesting_up_to_the_limit_parses() {
        assert!(parse_with(&nested(MAX_NESTING - 1), false).is_ok());
        assert!(parse_with(&nested(MAX_NESTING), true).is_ok());
    }

    #[test]
    fn nesting_past_the_limit_is_syntax_error() {
        let err = parse_with(&nested(MAX_NESTING + 1), false).unwrap_err();
        assert!(err.to_string().ends_with("nesting too deep"), "{err}");
        assert_eq!(err.position(), Some((1, 3 * MAX_NESTING + 1)));

        // A bare call one level further down counts too.
        let src = format!("{}$b{}", "$a[".repeat(MAX_NESTING), "]".repeat(MAX_NESTING));
        assert!(matches!(parse_with(&src, false), Err(ScriptError::Syntax { .. })));

        // Far past the limit fails the same way instead of exhausting the stack.
        assert!(parse_with(&nested(5000), false).is_err());
    }

    #[test]
    fn unterminated_nested_bracket_is_syntax_error() {
        assert!(matches!(
            parse_with("$a[$b[x]", false),
            Err(ScriptError::Syntax { .. })
        ));
    }

    #[test]
    fn stray_punctuation_becomes_text_when_not_strict() {
        let p = parse("a ] b ; c [");
        let joined: String = p
            .nodes
            .iter()
            .map(|t| match &t.kind {
                TokenKind::Str(s) => s.as_str(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(joined, "a ] b ; c [");
    }

    #[test]
    fn stray_punctuation_is_error_when_strict() {
        let err = parse_with("a ] b", true).unwrap_err();
        assert_eq!(err.position(), Some((1, 3)));
        assert!(matches!(parse_with("x;y", true), Err(ScriptError::Syntax { .. })));
        assert!(parse_with("$a[x;y]", true).is_ok());
    }

    #[test]
    fn comparison_is_split_at_first_operator() {
        let p = parse("$if[$x == 5;yes]");
        let c = only_call(&p);
        let cmp = c.args[0].comparison().expect("comparison");
        assert_eq!(cmp.op, Operator::Eq);
        assert_eq!(cmp.lhs.len(), 2);
        assert!(matches!(cmp.lhs[0].kind, TokenKind::Call(_)));
        assert_eq!(cmp.rhs.len(), 1);
        assert!(c.args[1].comparison().is_none());
    }

    #[test]
    fn nested_operator_is_not_a_comparison_of_outer_argument() {
        let p = parse("$if[$a[1 < 2];yes]");
        let c = only_call(&p);
        assert!(c.args[0].comparison().is_none());
    }

    #[test]
    fn busy_parser_rejects_second_parse() {
        let parser = Parser::new();
        parser.busy.store(true, Ordering::SeqCst);
        let tokens = tokenize("hi").unwrap();
        assert!(matches!(
            parser.parse(tokens, &RuntimeOptions::default()),
            Err(ScriptError::ParserBusy)
        ));
    }

    #[test]
    fn parser_is_reusable_after_finishing() {
        let parser = Parser::new();
        let opts = RuntimeOptions::default();
        parser.parse(tokenize("a").unwrap(), &opts).unwrap();
        assert!(!parser.is_busy());
        parser.parse(tokenize("$b[c]").unwrap(), &opts).unwrap();
    }

    #[test]
    fn busy_flag_clears_after_error() {
        let parser = Parser::new();
        assert!(parser
            .parse(tokenize("$a[").unwrap(), &RuntimeOptions::default())
            .is_err());
        assert!(!parser.is_busy());
    }
}
