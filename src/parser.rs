mod error;

use std::rc::Rc;

pub use error::{ParseError, ParseResult};

use crate::ast::{
    Argument, AssignOperator, BinaryOperator, CatchClause, ClassDef, CompareOperator, Constant,
    ForHeader, FunctionDef, ImportBindings, ImportName, Node, NodeKind, Parameter, SequenceKind,
    StepOperator, UnaryOperator,
};
use crate::stack;
use crate::token::{Keyword, Span, Token, TokenKind};

/// Entry rule for a parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A sequence of statements.
    Exec,
    /// A single expression (or bare tuple).
    Eval,
}

/// Where a statement list ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    Program,
    Brace,
    Case,
}

/// Deepest nesting of statements and expressions a program may use.
const MAX_NESTING_DEPTH: usize = 1000;

pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
    depth: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last().map(Token::kind), Some(TokenKind::EOF)) {
            let end = tokens.last().map_or(0, |token| token.span.end);
            tokens.push(Token::new(TokenKind::EOF, Span::point(end)));
        }
        Self {
            tokens,
            index: 0,
            depth: 0,
        }
    }

    pub fn parse(mut self, mode: Mode) -> ParseResult<Node> {
        let node = match mode {
            Mode::Exec => self.parse_statements(Terminator::Program)?,
            Mode::Eval => {
                self.skip_separators();
                let node = self.parse_expression_list()?;
                self.skip_separators();
                node
            }
        };
        if !self.at(&TokenKind::EOF) {
            return Err(self.error("invalid syntax"));
        }
        Ok(node)
    }

    fn current(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_kind(&self, distance: usize) -> &TokenKind {
        let index = (self.index + distance).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn advance(&mut self) {
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
    }

    fn reverse(&mut self, amount: usize) {
        self.index = self.index.saturating_sub(amount);
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.kind() == kind
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        self.kind().is_keyword(keyword)
    }

    fn previous_end(&self) -> usize {
        match self.index.checked_sub(1) {
            Some(previous) => self.tokens[previous].span.end,
            None => self.current().span.start,
        }
    }

    fn span_from(&self, start: Span) -> Span {
        Span::new(start.start, self.previous_end().max(start.start))
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.current().span, self.index)
    }

    fn error_at(&self, message: impl Into<String>, span: Span) -> ParseError {
        ParseError::new(message, span, self.index)
    }

    /// Runs a recursive rule one nesting level deeper.
    fn nested<T>(&mut self, rule: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        self.deepen(1)?;
        self.depth += 1;
        let result = stack::ensure_sufficient_stack(|| rule(self));
        self.depth -= 1;
        result
    }

    /// Fails once `levels` more nodes would nest past the limit.
    fn deepen(&self, levels: usize) -> ParseResult<()> {
        if self.depth + levels > MAX_NESTING_DEPTH {
            return Err(self.error("too many nested expressions"));
        }
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Span> {
        if !self.at(&kind) {
            return Err(self.error(format!("expected {kind}")));
        }
        let span = self.current().span;
        self.advance();
        Ok(span)
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> ParseResult<Span> {
        if !self.at_keyword(keyword) {
            return Err(self.error(format!("expected '{}'", keyword.as_str())));
        }
        let span = self.current().span;
        self.advance();
        Ok(span)
    }

    fn expect_identifier(&mut self) -> ParseResult<(String, Span)> {
        match self.kind() {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                let span = self.current().span;
                self.advance();
                Ok((name, span))
            }
            _ => Err(self.error("expected identifier")),
        }
    }

    fn skip_newlines(&mut self) -> usize {
        let mut count = 0;
        while self.at(&TokenKind::Newline) {
            self.advance();
            count += 1;
        }
        count
    }

    fn skip_separators(&mut self) -> usize {
        let mut count = 0;
        while matches!(self.kind(), TokenKind::Newline | TokenKind::Semicolon) {
            self.advance();
            count += 1;
        }
        count
    }

    /// Skips newlines only when `keyword` follows them.
    fn newlines_then_keyword(&mut self, keyword: Keyword) -> bool {
        let skipped = self.skip_newlines();
        if self.at_keyword(keyword) {
            return true;
        }
        self.reverse(skipped);
        false
    }

    fn is_terminator(&self, terminator: Terminator) -> bool {
        match terminator {
            Terminator::Program | Terminator::Brace => {
                matches!(self.kind(), TokenKind::RBrace | TokenKind::EOF)
            }
            Terminator::Case => {
                matches!(self.kind(), TokenKind::RBrace | TokenKind::EOF)
                    || self.at_keyword(Keyword::Case)
                    || self.at_keyword(Keyword::Default)
            }
        }
    }

    fn starts_expression(&self) -> bool {
        match self.kind() {
            TokenKind::Number(_)
            | TokenKind::String(_)
            | TokenKind::Identifier(_)
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::LBrace
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Tilde
            | TokenKind::Bang
            | TokenKind::PlusPlus
            | TokenKind::MinusMinus
            | TokenKind::Ellipsis => true,
            TokenKind::Keyword(keyword) => matches!(
                keyword,
                Keyword::True
                    | Keyword::False
                    | Keyword::None
                    | Keyword::Debug
                    | Keyword::Func
                    | Keyword::Not
            ),
            _ => false,
        }
    }

    // Statements

    fn parse_statements(&mut self, terminator: Terminator) -> ParseResult<Node> {
        let start = self.current().span;
        let mut statements = Vec::new();

        loop {
            self.skip_separators();
            if self.is_terminator(terminator) {
                break;
            }
            statements.push(self.parse_statement()?);
            if !matches!(self.kind(), TokenKind::Newline | TokenKind::Semicolon)
                && !self.is_terminator(terminator)
            {
                return Err(self.error("invalid syntax"));
            }
        }

        let span = match (statements.first(), statements.last()) {
            (Some(first), Some(last)) => first.span.to(last.span),
            _ => Span::point(start.start),
        };
        Ok(Node::new(NodeKind::Block(statements), span))
    }

    fn parse_block(&mut self) -> ParseResult<Node> {
        self.skip_newlines();
        let open = self.expect(TokenKind::LBrace)?;
        let mut body = self.parse_statements(Terminator::Brace)?;
        self.expect(TokenKind::RBrace)?;
        body.span = self.span_from(open);
        Ok(body)
    }

    fn parse_statement(&mut self) -> ParseResult<Node> {
        self.nested(Self::parse_statement_inner)
    }

    fn parse_statement_inner(&mut self) -> ParseResult<Node> {
        let TokenKind::Keyword(keyword) = *self.kind() else {
            if self.at(&TokenKind::At) {
                return self.parse_decorated();
            }
            return self.parse_simple_statement();
        };

        match keyword {
            Keyword::If => self.parse_if(),
            Keyword::Switch => self.parse_switch(),
            Keyword::Try => self.parse_try(),
            Keyword::For => self.parse_for(),
            Keyword::While => self.parse_while(),
            Keyword::Do => self.parse_do_while(),
            Keyword::With => self.parse_with(),
            Keyword::Class => self.parse_class(Vec::new()),
            Keyword::Return => self.parse_return(),
            Keyword::Throw => self.parse_throw(),
            Keyword::Break | Keyword::Continue => {
                let kind = if keyword == Keyword::Break {
                    NodeKind::Break
                } else {
                    NodeKind::Continue
                };
                let span = self.current().span;
                self.advance();
                Ok(Node::new(kind, span))
            }
            Keyword::Del => self.parse_delete(),
            Keyword::Assert => self.parse_assert(),
            Keyword::Global => self.parse_global(),
            Keyword::Import | Keyword::From => self.parse_import(),
            _ => self.parse_simple_statement(),
        }
    }

    fn parse_simple_statement(&mut self) -> ParseResult<Node> {
        if !self.starts_expression() {
            return Err(self.error("expected an expression or statement"));
        }
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> ParseResult<Node> {
        let target = self.parse_expression_list()?;
        let Some(operator) = assign_operator(self.kind()) else {
            return Ok(target);
        };
        self.advance();
        self.skip_newlines();
        let value = self.parse_assignment()?;
        let span = target.span.to(value.span);
        Ok(Node::new(
            NodeKind::Assign {
                target: target.boxed(),
                operator,
                value: value.boxed(),
            },
            span,
        ))
    }

    fn parse_condition(&mut self) -> ParseResult<Node> {
        self.skip_newlines();
        self.expect(TokenKind::LParen)?;
        self.skip_newlines();
        let condition = self.parse_expression()?;
        self.skip_newlines();
        self.expect(TokenKind::RParen)?;
        Ok(condition)
    }

    fn parse_else(&mut self) -> ParseResult<Option<Box<Node>>> {
        if !self.newlines_then_keyword(Keyword::Else) {
            return Ok(None);
        }
        self.advance();
        Ok(Some(self.parse_block()?.boxed()))
    }

    fn parse_if(&mut self) -> ParseResult<Node> {
        let start = self.expect_keyword(Keyword::If)?;
        let condition = self.parse_condition()?;
        let body = self.parse_block()?;
        let mut branches = vec![(condition, body)];
        let mut otherwise = None;

        loop {
            if self.newlines_then_keyword(Keyword::Elif) {
                self.advance();
                let condition = self.parse_condition()?;
                let body = self.parse_block()?;
                branches.push((condition, body));
            } else if self.newlines_then_keyword(Keyword::Else) {
                self.advance();
                if self.at_keyword(Keyword::If) {
                    otherwise = Some(self.parse_if()?.boxed());
                } else {
                    otherwise = Some(self.parse_block()?.boxed());
                }
                break;
            } else {
                break;
            }
        }

        Ok(Node::new(
            NodeKind::If {
                branches,
                otherwise,
            },
            self.span_from(start),
        ))
    }

    fn parse_switch(&mut self) -> ParseResult<Node> {
        let start = self.expect_keyword(Keyword::Switch)?;
        let subject = self.parse_condition()?;
        self.skip_newlines();
        self.expect(TokenKind::LBrace)?;
        self.skip_separators();

        let mut cases = Vec::new();
        let mut default = None;
        while self.at_keyword(Keyword::Case) {
            self.advance();
            self.skip_newlines();
            let value = self.parse_expression()?;
            self.skip_newlines();
            self.expect(TokenKind::Colon)?;
            let body = self.parse_statements(Terminator::Case)?;
            cases.push((value, body));
        }
        if self.at_keyword(Keyword::Default) {
            self.advance();
            self.skip_newlines();
            self.expect(TokenKind::Colon)?;
            default = Some(self.parse_statements(Terminator::Brace)?.boxed());
        }

        self.skip_separators();
        self.expect(TokenKind::RBrace)?;
        Ok(Node::new(
            NodeKind::Switch {
                subject: subject.boxed(),
                cases,
                default,
            },
            self.span_from(start),
        ))
    }

    fn parse_try(&mut self) -> ParseResult<Node> {
        let start = self.expect_keyword(Keyword::Try)?;
        let body = self.parse_block()?;

        let mut catches = Vec::new();
        while self.newlines_then_keyword(Keyword::Catch) {
            self.advance();
            self.skip_newlines();
            let (class, binding) = if self.at(&TokenKind::LParen) {
                self.advance();
                self.skip_newlines();
                let clause = self.parse_catch_header()?;
                self.skip_newlines();
                self.expect(TokenKind::RParen)?;
                clause
            } else {
                (None, None)
            };
            let body = self.parse_block()?;
            catches.push(CatchClause {
                class,
                binding,
                body,
            });
        }

        let otherwise = if !catches.is_empty() {
            self.parse_else()?
        } else {
            None
        };

        let finally = if self.newlines_then_keyword(Keyword::Finally) {
            self.advance();
            Some(self.parse_block()?.boxed())
        } else {
            None
        };

        if catches.is_empty() && finally.is_none() {
            return Err(self.error("expected 'catch' or 'finally'"));
        }

        Ok(Node::new(
            NodeKind::Try {
                body: body.boxed(),
                catches,
                otherwise,
                finally,
            },
            self.span_from(start),
        ))
    }

    /// `(name)` binds any fault; `(Type as name)` or `(Type name)` filters
    /// by type; a non-identifier type alone filters without binding.
    fn parse_catch_header(&mut self) -> ParseResult<(Option<Node>, Option<String>)> {
        let first = self.parse_expression()?;
        if self.at_keyword(Keyword::As) {
            self.advance();
            let (name, _) = self.expect_identifier()?;
            return Ok((Some(first), Some(name)));
        }
        if let TokenKind::Identifier(_) = self.kind() {
            let (name, _) = self.expect_identifier()?;
            return Ok((Some(first), Some(name)));
        }
        match first.kind {
            NodeKind::Identifier(name) => Ok((None, Some(name))),
            _ => Ok((Some(first), None)),
        }
    }

    fn parse_for(&mut self) -> ParseResult<Node> {
        let start = self.expect_keyword(Keyword::For)?;
        self.skip_newlines();
        self.expect(TokenKind::LParen)?;
        self.skip_newlines();

        let init = if self.at(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_assignment()?)
        };
        self.skip_newlines();

        let header = if self.at(&TokenKind::Semicolon) {
            self.advance();
            self.skip_newlines();
            let condition = if self.at(&TokenKind::Semicolon) {
                None
            } else {
                Some(self.parse_expression()?.boxed())
            };
            self.skip_newlines();
            self.expect(TokenKind::Semicolon)?;
            self.skip_newlines();
            let update = if self.at(&TokenKind::RParen) {
                None
            } else {
                Some(self.parse_assignment()?.boxed())
            };
            ForHeader::Counter {
                init: init.map(Node::boxed),
                condition,
                update,
            }
        } else if self.at_keyword(Keyword::Of) {
            let Some(target) = init else {
                return Err(self.error("expected expression"));
            };
            self.advance();
            self.skip_newlines();
            let iterable = self.parse_expression()?;
            ForHeader::Each {
                target: target.boxed(),
                iterable: iterable.boxed(),
            }
        } else {
            return Err(self.error("expected 'of' or ';'"));
        };

        self.skip_newlines();
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block()?;
        let otherwise = self.parse_else()?;
        Ok(Node::new(
            NodeKind::For {
                header,
                body: body.boxed(),
                otherwise,
            },
            self.span_from(start),
        ))
    }

    fn parse_while(&mut self) -> ParseResult<Node> {
        let start = self.expect_keyword(Keyword::While)?;
        let condition = self.parse_condition()?;
        let body = self.parse_block()?;
        let otherwise = self.parse_else()?;
        Ok(Node::new(
            NodeKind::While {
                condition: condition.boxed(),
                body: body.boxed(),
                otherwise,
            },
            self.span_from(start),
        ))
    }

    fn parse_do_while(&mut self) -> ParseResult<Node> {
        let start = self.expect_keyword(Keyword::Do)?;
        let body = self.parse_block()?;
        self.skip_newlines();
        self.expect_keyword(Keyword::While)?;
        let condition = self.parse_condition()?;
        let otherwise = self.parse_else()?;
        Ok(Node::new(
            NodeKind::DoWhile {
                body: body.boxed(),
                condition: condition.boxed(),
                otherwise,
            },
            self.span_from(start),
        ))
    }

    fn parse_with(&mut self) -> ParseResult<Node> {
        let start = self.expect_keyword(Keyword::With)?;
        self.skip_newlines();
        self.expect(TokenKind::LParen)?;
        self.skip_newlines();
        let manager = self.parse_expression()?;
        self.skip_newlines();
        let alias = if self.at_keyword(Keyword::As) {
            self.advance();
            self.skip_newlines();
            Some(self.parse_postfix()?.boxed())
        } else {
            None
        };
        self.skip_newlines();
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(Node::new(
            NodeKind::With {
                manager: manager.boxed(),
                alias,
                body: body.boxed(),
            },
            self.span_from(start),
        ))
    }

    fn parse_decorated(&mut self) -> ParseResult<Node> {
        let mut decorators = Vec::new();
        while self.at(&TokenKind::At) {
            self.advance();
            decorators.push(self.parse_expression()?);
            if !self.at(&TokenKind::Newline) {
                return Err(self.error("expected newline after decorator"));
            }
            self.skip_newlines();
        }

        if self.at_keyword(Keyword::Func) {
            self.parse_function(decorators)
        } else if self.at_keyword(Keyword::Class) {
            self.parse_class(decorators)
        } else {
            Err(self.error("expected 'func' or 'class' after decorator"))
        }
    }

    fn parse_class(&mut self, decorators: Vec<Node>) -> ParseResult<Node> {
        let start = decorators
            .first()
            .map_or(self.current().span, |decorator| decorator.span);
        self.expect_keyword(Keyword::Class)?;
        self.skip_newlines();
        let (name, _) = self.expect_identifier()?;

        let mut bases = Vec::new();
        if self.newlines_then_keyword(Keyword::Extends) {
            self.advance();
            loop {
                self.skip_newlines();
                bases.push(self.parse_postfix()?);
                if !self.at(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }

        let body = self.parse_block()?;
        Ok(Node::new(
            NodeKind::Class(Box::new(ClassDef {
                name,
                bases,
                body,
                decorators,
            })),
            self.span_from(start),
        ))
    }

    fn parse_return(&mut self) -> ParseResult<Node> {
        let start = self.expect_keyword(Keyword::Return)?;
        let value = if self.starts_expression() {
            Some(self.parse_expression_list()?.boxed())
        } else {
            None
        };
        Ok(Node::new(NodeKind::Return(value), self.span_from(start)))
    }

    fn parse_throw(&mut self) -> ParseResult<Node> {
        let start = self.expect_keyword(Keyword::Throw)?;
        let exception = self.parse_expression()?;
        let cause = if self.at_keyword(Keyword::From) {
            self.advance();
            Some(self.parse_expression()?.boxed())
        } else {
            None
        };
        Ok(Node::new(
            NodeKind::Throw {
                exception: exception.boxed(),
                cause,
            },
            self.span_from(start),
        ))
    }

    fn parse_delete(&mut self) -> ParseResult<Node> {
        let start = self.expect_keyword(Keyword::Del)?;
        let targets = match self.parse_expression_list()? {
            Node {
                kind:
                    NodeKind::Sequence {
                        kind: SequenceKind::Tuple,
                        elements,
                    },
                ..
            } => elements,
            target => vec![target],
        };
        Ok(Node::new(NodeKind::Delete(targets), self.span_from(start)))
    }

    fn parse_assert(&mut self) -> ParseResult<Node> {
        let start = self.expect_keyword(Keyword::Assert)?;
        let condition = self.parse_expression()?;
        let message = if self.at(&TokenKind::Comma) {
            self.advance();
            self.skip_newlines();
            Some(self.parse_expression()?.boxed())
        } else {
            None
        };
        Ok(Node::new(
            NodeKind::Assert {
                condition: condition.boxed(),
                message,
            },
            self.span_from(start),
        ))
    }

    fn parse_global(&mut self) -> ParseResult<Node> {
        let start = self.expect_keyword(Keyword::Global)?;
        let mut names = vec![self.expect_identifier()?.0];
        while self.at(&TokenKind::Comma) {
            self.advance();
            names.push(self.expect_identifier()?.0);
        }
        Ok(Node::new(NodeKind::Global(names), self.span_from(start)))
    }

    fn parse_module_name(&mut self) -> ParseResult<String> {
        if let TokenKind::String(path) = self.kind() {
            let path = path.clone();
            self.advance();
            return Ok(path);
        }
        let mut name = self.expect_identifier()?.0;
        while self.at(&TokenKind::Dot) {
            self.advance();
            name.push('.');
            name.push_str(&self.expect_identifier()?.0);
        }
        Ok(name)
    }

    fn parse_import(&mut self) -> ParseResult<Node> {
        let start = self.current().span;

        if self.at_keyword(Keyword::Import) {
            self.advance();
            let module = self.parse_module_name()?;
            let alias = if self.at_keyword(Keyword::As) {
                self.advance();
                Some(self.expect_identifier()?.0)
            } else {
                None
            };
            return Ok(Node::new(
                NodeKind::Import {
                    module,
                    bindings: ImportBindings::Module { alias },
                },
                self.span_from(start),
            ));
        }

        self.expect_keyword(Keyword::From)?;
        let module = self.parse_module_name()?;
        self.expect_keyword(Keyword::Import)?;

        let bindings = if self.at(&TokenKind::Star) {
            self.advance();
            ImportBindings::All
        } else {
            let parenthesized = self.at(&TokenKind::LParen);
            if parenthesized {
                self.advance();
                self.skip_newlines();
            }
            let mut names = Vec::new();
            loop {
                let (name, span) = self.expect_identifier()?;
                let alias = if self.at_keyword(Keyword::As) {
                    self.advance();
                    Some(self.expect_identifier()?.0)
                } else {
                    None
                };
                names.push(ImportName {
                    name,
                    alias,
                    span: self.span_from(span),
                });
                if parenthesized {
                    self.skip_newlines();
                }
                if !self.at(&TokenKind::Comma) {
                    break;
                }
                self.advance();
                if parenthesized {
                    self.skip_newlines();
                    if self.at(&TokenKind::RParen) {
                        break;
                    }
                }
            }
            if parenthesized {
                self.expect(TokenKind::RParen)?;
            }
            ImportBindings::Names(names)
        };

        Ok(Node::new(
            NodeKind::Import { module, bindings },
            self.span_from(start),
        ))
    }

    // Expressions

    /// An expression, or several separated by commas forming a bare tuple.
    fn parse_expression_list(&mut self) -> ParseResult<Node> {
        let first = self.parse_expression()?;
        if !self.at(&TokenKind::Comma) {
            return Ok(first);
        }

        let start = first.span;
        let mut elements = vec![first];
        while self.at(&TokenKind::Comma) {
            self.advance();
            if !self.starts_expression() {
                break;
            }
            elements.push(self.parse_expression()?);
        }
        Ok(Node::new(
            NodeKind::Sequence {
                kind: SequenceKind::Tuple,
                elements,
            },
            self.span_from(start),
        ))
    }

    pub(crate) fn parse_expression(&mut self) -> ParseResult<Node> {
        self.nested(Self::parse_expression_inner)
    }

    fn parse_expression_inner(&mut self) -> ParseResult<Node> {
        let node = self.parse_logic()?;

        if self.at(&TokenKind::Question) {
            self.advance();
            self.skip_newlines();
            let then = self.parse_expression()?;
            self.skip_newlines();
            if !self.at(&TokenKind::Colon) {
                return Err(self.error("expected ':'"));
            }
            self.advance();
            self.skip_newlines();
            let otherwise = self.parse_expression()?;
            let span = node.span.to(otherwise.span);
            return Ok(Node::new(
                NodeKind::Ternary {
                    condition: node.boxed(),
                    then: then.boxed(),
                    otherwise: otherwise.boxed(),
                },
                span,
            ));
        }

        if self.at_keyword(Keyword::If) {
            self.advance();
            let condition = self.parse_logic()?;
            self.expect_keyword(Keyword::Else)?;
            let otherwise = self.parse_expression()?;
            let span = node.span.to(otherwise.span);
            return Ok(Node::new(
                NodeKind::Ternary {
                    condition: condition.boxed(),
                    then: node.boxed(),
                    otherwise: otherwise.boxed(),
                },
                span,
            ));
        }

        if self.at(&TokenKind::ColonEqual) {
            if !matches!(node.kind, NodeKind::Identifier(_)) {
                return Err(self.error_at(
                    "cannot use assignment expressions with expression",
                    node.span,
                ));
            }
            self.advance();
            self.skip_newlines();
            let value = self.parse_expression()?;
            let span = node.span.to(value.span);
            return Ok(Node::new(
                NodeKind::Assign {
                    target: node.boxed(),
                    operator: AssignOperator::Walrus,
                    value: value.boxed(),
                },
                span,
            ));
        }

        Ok(node)
    }

    fn logic_operator(&self) -> Option<(BinaryOperator, usize)> {
        let operator = match self.kind() {
            TokenKind::Keyword(Keyword::And) | TokenKind::AmpAmp => (BinaryOperator::And, 1),
            TokenKind::Keyword(Keyword::Or) | TokenKind::PipePipe => (BinaryOperator::Or, 1),
            TokenKind::QuestionQuestion => (BinaryOperator::Nullish, 1),
            TokenKind::Keyword(Keyword::In) => (BinaryOperator::In, 1),
            TokenKind::Keyword(Keyword::Not) if self.peek_kind(1).is_keyword(Keyword::In) => {
                (BinaryOperator::NotIn, 2)
            }
            TokenKind::Keyword(Keyword::Is) if self.peek_kind(1).is_keyword(Keyword::Not) => {
                (BinaryOperator::IsNot, 2)
            }
            TokenKind::Keyword(Keyword::Is) => (BinaryOperator::Is, 1),
            _ => return None,
        };
        Some(operator)
    }

    fn parse_logic(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_not()?;
        let mut chain = 0;
        while let Some((operator, width)) = self.logic_operator() {
            chain += 1;
            self.deepen(chain)?;
            for _ in 0..width {
                self.advance();
            }
            self.skip_newlines();
            let right = self.parse_not()?;
            left = binary(left, operator, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> ParseResult<Node> {
        if self.at_keyword(Keyword::Not) {
            return self.nested(Self::parse_negation);
        }
        self.parse_comparison()
    }

    fn parse_negation(&mut self) -> ParseResult<Node> {
        let start = self.current().span;
        self.advance();
        self.skip_newlines();
        let operand = self.parse_not()?;
        let span = start.to(operand.span);
        Ok(Node::new(
            NodeKind::Unary {
                operator: UnaryOperator::Not,
                operand: operand.boxed(),
            },
            span,
        ))
    }

    fn parse_comparison(&mut self) -> ParseResult<Node> {
        let first = self.parse_bitwise()?;
        let mut rest = Vec::new();
        while let Some(operator) = compare_operator(self.kind()) {
            self.advance();
            self.skip_newlines();
            rest.push((operator, self.parse_bitwise()?));
        }

        if rest.is_empty() {
            return Ok(first);
        }
        let span = rest
            .last()
            .map_or(first.span, |(_, last)| first.span.to(last.span));
        Ok(Node::new(
            NodeKind::Compare {
                first: first.boxed(),
                rest,
            },
            span,
        ))
    }

    fn parse_binary_level(
        &mut self,
        operand: fn(&mut Self) -> ParseResult<Node>,
        operator: fn(&TokenKind) -> Option<BinaryOperator>,
    ) -> ParseResult<Node> {
        let mut left = operand(self)?;
        let mut chain = 0;
        while let Some(found) = operator(self.kind()) {
            chain += 1;
            self.deepen(chain)?;
            self.advance();
            self.skip_newlines();
            let right = operand(self)?;
            left = binary(left, found, right);
        }
        Ok(left)
    }

    fn parse_bitwise(&mut self) -> ParseResult<Node> {
        self.parse_binary_level(Self::parse_arith, |kind| match kind {
            TokenKind::Amp => Some(BinaryOperator::BitAnd),
            TokenKind::Pipe => Some(BinaryOperator::BitOr),
            TokenKind::Caret => Some(BinaryOperator::BitXor),
            TokenKind::LessLess => Some(BinaryOperator::Shl),
            TokenKind::GreaterGreater => Some(BinaryOperator::Shr),
            _ => None,
        })
    }

    fn parse_arith(&mut self) -> ParseResult<Node> {
        self.parse_binary_level(Self::parse_term, |kind| match kind {
            TokenKind::Plus => Some(BinaryOperator::Add),
            TokenKind::Minus => Some(BinaryOperator::Sub),
            _ => None,
        })
    }

    fn parse_term(&mut self) -> ParseResult<Node> {
        self.parse_binary_level(Self::parse_unary, |kind| match kind {
            TokenKind::Star => Some(BinaryOperator::Mul),
            TokenKind::Slash => Some(BinaryOperator::Div),
            TokenKind::SlashSlash => Some(BinaryOperator::FloorDiv),
            TokenKind::Percent => Some(BinaryOperator::Mod),
            TokenKind::At => Some(BinaryOperator::MatMul),
            _ => None,
        })
    }

    fn parse_unary(&mut self) -> ParseResult<Node> {
        self.nested(Self::parse_unary_inner)
    }

    fn parse_unary_inner(&mut self) -> ParseResult<Node> {
        let start = self.current().span;
        let operator = match self.kind() {
            TokenKind::Plus => UnaryOperator::Plus,
            TokenKind::Minus => UnaryOperator::Minus,
            TokenKind::Tilde => UnaryOperator::Invert,
            TokenKind::Bang => UnaryOperator::Not,
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let operator = if self.at(&TokenKind::PlusPlus) {
                    StepOperator::Increment
                } else {
                    StepOperator::Decrement
                };
                self.advance();
                self.skip_newlines();
                let target = self.parse_unary()?;
                let span = start.to(target.span);
                return Ok(Node::new(
                    NodeKind::Step {
                        target: target.boxed(),
                        operator,
                        prefix: true,
                    },
                    span,
                ));
            }
            _ => return self.parse_power(),
        };
        self.advance();
        self.skip_newlines();
        let operand = self.parse_unary()?;
        let span = start.to(operand.span);
        Ok(Node::new(
            NodeKind::Unary {
                operator,
                operand: operand.boxed(),
            },
            span,
        ))
    }

    fn parse_power(&mut self) -> ParseResult<Node> {
        let left = self.parse_postfix()?;
        if !self.at(&TokenKind::StarStar) {
            return Ok(left);
        }
        self.advance();
        self.skip_newlines();
        let right = self.parse_unary()?;
        Ok(binary(left, BinaryOperator::Pow, right))
    }

    fn parse_postfix(&mut self) -> ParseResult<Node> {
        let mut node = self.parse_atom()?;
        let mut chain = 0;

        loop {
            if matches!(
                self.kind(),
                TokenKind::Dot
                    | TokenKind::LBracket
                    | TokenKind::LParen
                    | TokenKind::PlusPlus
                    | TokenKind::MinusMinus
            ) {
                chain += 1;
                self.deepen(chain)?;
            }
            match self.kind() {
                TokenKind::Dot => {
                    self.advance();
                    self.skip_newlines();
                    let (name, _) = self.expect_identifier()?;
                    let span = self.span_from(node.span);
                    node = Node::new(
                        NodeKind::Attribute {
                            target: node.boxed(),
                            name,
                        },
                        span,
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    self.skip_newlines();
                    let index = self.parse_subscript_items()?;
                    self.skip_newlines();
                    self.expect(TokenKind::RBracket)?;
                    let span = self.span_from(node.span);
                    node = Node::new(
                        NodeKind::Subscript {
                            target: node.boxed(),
                            index: index.boxed(),
                        },
                        span,
                    );
                }
                TokenKind::LParen => {
                    self.advance();
                    let arguments = self.parse_arguments()?;
                    let span = self.span_from(node.span);
                    node = Node::new(
                        NodeKind::Call {
                            target: node.boxed(),
                            arguments,
                        },
                        span,
                    );
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let operator = if self.at(&TokenKind::PlusPlus) {
                        StepOperator::Increment
                    } else {
                        StepOperator::Decrement
                    };
                    self.advance();
                    let span = self.span_from(node.span);
                    node = Node::new(
                        NodeKind::Step {
                            target: node.boxed(),
                            operator,
                            prefix: false,
                        },
                        span,
                    );
                }
                _ => return Ok(node),
            }
        }
    }

    fn parse_subscript_items(&mut self) -> ParseResult<Node> {
        let first = self.parse_slice_or_expression()?;
        if !self.at(&TokenKind::Comma) {
            return Ok(first);
        }

        let start = first.span;
        let mut elements = vec![first];
        while self.at(&TokenKind::Comma) {
            self.advance();
            self.skip_newlines();
            if self.at(&TokenKind::RBracket) {
                break;
            }
            elements.push(self.parse_slice_or_expression()?);
            self.skip_newlines();
        }
        Ok(Node::new(
            NodeKind::Sequence {
                kind: SequenceKind::Tuple,
                elements,
            },
            self.span_from(start),
        ))
    }

    fn parse_slice_or_expression(&mut self) -> ParseResult<Node> {
        let start_span = self.current().span;
        let start = if self.at(&TokenKind::Colon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.skip_newlines();
        if !self.at(&TokenKind::Colon) {
            return start.ok_or_else(|| self.error("expected expression"));
        }

        let slice_end = |parser: &Self| {
            matches!(
                parser.kind(),
                TokenKind::Colon | TokenKind::RBracket | TokenKind::Comma
            )
        };

        self.advance();
        self.skip_newlines();
        let stop = if slice_end(self) {
            None
        } else {
            Some(self.parse_expression()?.boxed())
        };
        self.skip_newlines();
        let step = if self.at(&TokenKind::Colon) {
            self.advance();
            self.skip_newlines();
            if slice_end(self) {
                None
            } else {
                Some(self.parse_expression()?.boxed())
            }
        } else {
            None
        };

        Ok(Node::new(
            NodeKind::Slice {
                start: start.map(Node::boxed),
                stop,
                step,
            },
            self.span_from(start_span),
        ))
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Argument>> {
        let mut arguments = Vec::new();
        let mut keyword_seen = false;
        self.skip_newlines();

        while !self.at(&TokenKind::RParen) {
            let value = self.parse_expression()?;
            self.skip_newlines();

            if self.at(&TokenKind::Equal) {
                let NodeKind::Identifier(name) = value.kind else {
                    return Err(self.error_at("expected identifier", value.span));
                };
                self.advance();
                self.skip_newlines();
                let value = self.parse_expression()?;
                keyword_seen = true;
                arguments.push(Argument {
                    keyword: Some(name),
                    value,
                });
            } else if keyword_seen {
                return Err(self.error_at(
                    "positional argument follows keyword argument",
                    value.span,
                ));
            } else {
                arguments.push(Argument {
                    keyword: None,
                    value,
                });
            }

            self.skip_newlines();
            match self.kind() {
                TokenKind::Comma => {
                    self.advance();
                    self.skip_newlines();
                }
                TokenKind::RParen => {}
                _ => return Err(self.unclosed(')')),
            }
        }

        self.advance();
        Ok(arguments)
    }

    fn unclosed(&self, closing: char) -> ParseError {
        self.error(format!(
            "expected ',' or '{closing}'. Did you forget a comma or closing bracket?"
        ))
    }

    fn parse_atom(&mut self) -> ParseResult<Node> {
        let span = self.current().span;
        let kind = match self.kind().clone() {
            TokenKind::Number(number) => NodeKind::Number(number),
            TokenKind::String(mut value) => {
                self.advance();
                while let TokenKind::String(next) = self.kind() {
                    value.push_str(next);
                    self.advance();
                }
                return Ok(Node::new(NodeKind::String(value), self.span_from(span)));
            }
            TokenKind::Identifier(name) => NodeKind::Identifier(name),
            TokenKind::Ellipsis => NodeKind::Constant(Constant::Ellipsis),
            TokenKind::Keyword(Keyword::True) => NodeKind::Constant(Constant::True),
            TokenKind::Keyword(Keyword::False) => NodeKind::Constant(Constant::False),
            TokenKind::Keyword(Keyword::None) => NodeKind::Constant(Constant::None),
            TokenKind::Keyword(Keyword::Debug) => NodeKind::Constant(Constant::Debug),
            TokenKind::Keyword(Keyword::Func) => return self.parse_function(Vec::new()),
            TokenKind::LParen => return self.parse_parenthesized(),
            TokenKind::LBracket => return self.parse_list(),
            TokenKind::LBrace => return self.parse_brace_literal(),
            _ => return Err(self.error("expected expression")),
        };
        self.advance();
        Ok(Node::new(kind, span))
    }

    fn parse_parenthesized(&mut self) -> ParseResult<Node> {
        let start = self.expect(TokenKind::LParen)?;
        self.skip_newlines();
        if self.at(&TokenKind::RParen) {
            self.advance();
            return Ok(sequence(SequenceKind::Tuple, Vec::new(), self.span_from(start)));
        }

        let first = self.parse_expression()?;
        self.skip_newlines();
        if self.at(&TokenKind::RParen) {
            self.advance();
            return Ok(first);
        }
        if !self.at(&TokenKind::Comma) {
            return Err(self.unclosed(')'));
        }

        let mut elements = vec![first];
        self.parse_elements_tail(&mut elements, &TokenKind::RParen, ')')?;
        Ok(sequence(SequenceKind::Tuple, elements, self.span_from(start)))
    }

    /// Continues a comma-separated list after its first element, consuming
    /// the closing delimiter.
    fn parse_elements_tail(
        &mut self,
        elements: &mut Vec<Node>,
        close: &TokenKind,
        closing: char,
    ) -> ParseResult<()> {
        while self.at(&TokenKind::Comma) {
            self.advance();
            self.skip_newlines();
            if self.at(close) {
                break;
            }
            elements.push(self.parse_expression()?);
            self.skip_newlines();
        }
        if !self.at(close) {
            return Err(self.unclosed(closing));
        }
        self.advance();
        Ok(())
    }

    fn parse_list(&mut self) -> ParseResult<Node> {
        let start = self.expect(TokenKind::LBracket)?;
        self.skip_newlines();
        let mut elements = Vec::new();
        if !self.at(&TokenKind::RBracket) {
            elements.push(self.parse_expression()?);
            self.skip_newlines();
        }
        self.parse_elements_tail(&mut elements, &TokenKind::RBracket, ']')?;
        Ok(sequence(SequenceKind::List, elements, self.span_from(start)))
    }

    /// `{` opens either a mapping or a set. The mapping is tried first; if it
    /// fails for want of a `:` the parser rewinds and reads a set instead.
    fn parse_brace_literal(&mut self) -> ParseResult<Node> {
        let checkpoint = self.index;
        match self.parse_dict() {
            Ok(node) => Ok(node),
            Err(dict_error) if dict_error.message == "expected ':'" => {
                self.reverse(self.index - checkpoint);
                self.parse_set()
                    .map_err(|set_error| dict_error.deeper(set_error))
            }
            Err(error) => Err(error),
        }
    }

    fn parse_dict(&mut self) -> ParseResult<Node> {
        let start = self.expect(TokenKind::LBrace)?;
        self.skip_newlines();
        let mut entries = Vec::new();

        while !self.at(&TokenKind::RBrace) {
            let key = self.parse_expression()?;
            self.skip_newlines();
            if !self.at(&TokenKind::Colon) {
                return Err(self.error("expected ':'"));
            }
            self.advance();
            self.skip_newlines();
            let value = self.parse_expression()?;
            self.skip_newlines();
            entries.push((key, value));

            match self.kind() {
                TokenKind::Comma => {
                    self.advance();
                    self.skip_newlines();
                }
                TokenKind::RBrace => {}
                _ => return Err(self.unclosed('}')),
            }
        }

        self.advance();
        Ok(Node::new(NodeKind::Dict { entries }, self.span_from(start)))
    }

    fn parse_set(&mut self) -> ParseResult<Node> {
        let start = self.expect(TokenKind::LBrace)?;
        self.skip_newlines();
        let mut elements = vec![self.parse_expression()?];
        self.skip_newlines();
        self.parse_elements_tail(&mut elements, &TokenKind::RBrace, '}')?;
        Ok(sequence(SequenceKind::Set, elements, self.span_from(start)))
    }

    fn parse_function(&mut self, decorators: Vec<Node>) -> ParseResult<Node> {
        let start = decorators
            .first()
            .map_or(self.current().span, |decorator| decorator.span);
        self.expect_keyword(Keyword::Func)?;
        self.skip_newlines();

        let name = match self.kind() {
            TokenKind::Identifier(_) => Some(self.expect_identifier()?.0),
            _ => None,
        };
        self.skip_newlines();
        if !self.at(&TokenKind::LParen) {
            return Err(self.error("expected identifier or '('"));
        }
        self.advance();
        self.skip_newlines();

        let mut parameters = Vec::new();
        let mut default_seen = false;
        while !self.at(&TokenKind::RParen) {
            let (name, _) = self.expect_identifier()?;
            self.skip_newlines();
            let default = if self.at(&TokenKind::Equal) {
                self.advance();
                self.skip_newlines();
                default_seen = true;
                Some(self.parse_expression()?)
            } else if default_seen {
                return Err(self.error("expected '='"));
            } else {
                None
            };
            parameters.push(Parameter { name, default });

            self.skip_newlines();
            match self.kind() {
                TokenKind::Comma => {
                    self.advance();
                    self.skip_newlines();
                }
                TokenKind::RParen => {}
                _ => return Err(self.unclosed(')')),
            }
        }
        self.advance();

        let body = self.parse_block()?;
        Ok(Node::new(
            NodeKind::Function(Rc::new(FunctionDef {
                name,
                parameters,
                body,
                decorators,
            })),
            self.span_from(start),
        ))
    }
}

fn binary(left: Node, operator: BinaryOperator, right: Node) -> Node {
    let span = left.span.to(right.span);
    Node::new(
        NodeKind::Binary {
            left: left.boxed(),
            operator,
            right: right.boxed(),
        },
        span,
    )
}

fn sequence(kind: SequenceKind, elements: Vec<Node>, span: Span) -> Node {
    Node::new(NodeKind::Sequence { kind, elements }, span)
}

fn compare_operator(kind: &TokenKind) -> Option<CompareOperator> {
    let operator = match kind {
        TokenKind::EqualEqual => CompareOperator::Equal,
        TokenKind::BangEqual => CompareOperator::NotEqual,
        TokenKind::TildeEqual => CompareOperator::ApproxEqual,
        TokenKind::TildeBang => CompareOperator::NotApproxEqual,
        TokenKind::Less => CompareOperator::Less,
        TokenKind::Greater => CompareOperator::Greater,
        TokenKind::LessEqual => CompareOperator::LessEqual,
        TokenKind::GreaterEqual => CompareOperator::GreaterEqual,
        _ => return None,
    };
    Some(operator)
}

fn assign_operator(kind: &TokenKind) -> Option<AssignOperator> {
    let augmented = |operator| Some(AssignOperator::Augmented(operator));
    match kind {
        TokenKind::Equal => Some(AssignOperator::Assign),
        TokenKind::ColonEqual => Some(AssignOperator::Walrus),
        TokenKind::PlusEqual => augmented(BinaryOperator::Add),
        TokenKind::MinusEqual => augmented(BinaryOperator::Sub),
        TokenKind::StarEqual => augmented(BinaryOperator::Mul),
        TokenKind::SlashEqual => augmented(BinaryOperator::Div),
        TokenKind::SlashSlashEqual => augmented(BinaryOperator::FloorDiv),
        TokenKind::StarStarEqual => augmented(BinaryOperator::Pow),
        TokenKind::PercentEqual => augmented(BinaryOperator::Mod),
        TokenKind::AmpEqual => augmented(BinaryOperator::BitAnd),
        TokenKind::PipeEqual => augmented(BinaryOperator::BitOr),
        TokenKind::CaretEqual => augmented(BinaryOperator::BitXor),
        TokenKind::LessLessEqual => augmented(BinaryOperator::Shl),
        TokenKind::GreaterGreaterEqual => augmented(BinaryOperator::Shr),
        TokenKind::AtEqual => augmented(BinaryOperator::MatMul),
        _ => None,
    }
}

pub fn parse(tokens: Vec<Token>, mode: Mode) -> ParseResult<Node> {
    Parser::new(tokens).parse(mode)
}

pub fn parse_tokens(tokens: Vec<Token>) -> ParseResult<Node> {
    parse(tokens, Mode::Exec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::token::Number;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn parse_source(source: &str) -> ParseResult<Node> {
        parse_tokens(tokenize(source).expect("tokenize should succeed"))
    }

    fn statements(source: &str) -> Vec<Node> {
        match parse_source(source).expect("parse should succeed").kind {
            NodeKind::Block(statements) => statements,
            other => panic!("expected block, got {other:?}"),
        }
    }

    fn expression(source: &str) -> Node {
        parse(tokenize(source).expect("tokenize"), Mode::Eval).expect("parse should succeed")
    }

    #[test]
    fn precedence_binds_power_tighter_than_unary() {
        let node = expression("-2 ** 2");
        let NodeKind::Unary { operator, operand } = node.kind else {
            panic!("expected unary");
        };
        assert_eq!(operator, UnaryOperator::Minus);
        assert!(matches!(
            operand.kind,
            NodeKind::Binary {
                operator: BinaryOperator::Pow,
                ..
            }
        ));
    }

    #[test]
    fn power_is_right_associative() {
        let node = expression("2 ** 3 ** 2");
        let NodeKind::Binary { left, right, .. } = node.kind else {
            panic!("expected binary");
        };
        assert!(matches!(left.kind, NodeKind::Number(Number::Int(2))));
        assert!(matches!(
            right.kind,
            NodeKind::Binary {
                operator: BinaryOperator::Pow,
                ..
            }
        ));
    }

    #[test]
    fn comparisons_chain() {
        let node = expression("a < b <= c");
        let NodeKind::Compare { rest, .. } = node.kind else {
            panic!("expected compare");
        };
        let operators: Vec<_> = rest.iter().map(|(operator, _)| *operator).collect();
        assert_eq!(
            operators,
            vec![CompareOperator::Less, CompareOperator::LessEqual]
        );
    }

    #[test]
    fn both_ternary_spellings_agree() {
        assert_eq!(expression("c ? a : b"), expression("a if c else b"));
    }

    #[test]
    fn braces_disambiguate_dict_and_set() {
        assert!(matches!(expression("{}").kind, NodeKind::Dict { .. }));
        assert!(matches!(expression("{1: 2, 3: 4}").kind, NodeKind::Dict { .. }));
        assert!(matches!(
            expression("{1, 2}").kind,
            NodeKind::Sequence {
                kind: SequenceKind::Set,
                ..
            }
        ));
    }

    #[test]
    fn deeper_alternative_error_wins() {
        let err = parse_source("x = {1, 2 3}").expect_err("malformed set");
        assert!(err.message.starts_with("expected ',' or '}'"), "{err}");
    }

    #[test]
    fn parses_statement_forms() {
        let body = statements(indoc! {r#"
            a, b = (1, 2)
            for (i = 0; i < 3; i++) { continue } else { y = "done" }
            for (k of items) { }
            switch (x) { case 1: y = 1; case 2: y = 2; break; default: y = 3 }
            try { f() } catch (TypeError as e) { g(e) } else { h() } finally { k() }
            do { n-- } while (n > 0)
            with (open() as handle) { handle.read() }
            class Point extends Base, Mixin { func norm(self) { return self.x } }
            from utils import helper as h, other
            import tools
            throw ValueError("bad") from cause
            assert ok, "message"
            del a, b[0]
            global total
        "#});
        assert_eq!(body.len(), 14);
        assert!(matches!(body[0].kind, NodeKind::Assign { .. }));
        assert!(matches!(
            body[1].kind,
            NodeKind::For {
                header: ForHeader::Counter { .. },
                otherwise: Some(_),
                ..
            }
        ));
        assert!(matches!(
            body[2].kind,
            NodeKind::For {
                header: ForHeader::Each { .. },
                ..
            }
        ));
        let NodeKind::Switch { cases, default, .. } = &body[3].kind else {
            panic!("expected switch");
        };
        assert_eq!(cases.len(), 2);
        assert!(default.is_some());
        let NodeKind::Try { catches, .. } = &body[4].kind else {
            panic!("expected try");
        };
        assert_eq!(catches[0].binding.as_deref(), Some("e"));
        assert!(catches[0].class.is_some());
        assert!(matches!(body[7].kind, NodeKind::Class(_)));
        assert!(matches!(
            &body[8].kind,
            NodeKind::Import {
                bindings: ImportBindings::Names(names),
                ..
            } if names.len() == 2
        ));
        let NodeKind::Delete(targets) = &body[12].kind else {
            panic!("expected delete");
        };
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn catch_with_single_name_binds_without_filter() {
        let body = statements("try { f() } catch (e) { g(e) }");
        let NodeKind::Try { catches, .. } = &body[0].kind else {
            panic!("expected try");
        };
        assert_eq!(catches[0].binding.as_deref(), Some("e"));
        assert!(catches[0].class.is_none());
    }

    #[test]
    fn decorators_attach_to_function() {
        let body = statements(indoc! {"
            @outer
            @inner(1)
            func target() { }
        "});
        let NodeKind::Function(def) = &body[0].kind else {
            panic!("expected function");
        };
        assert_eq!(def.decorators.len(), 2);
        assert_eq!(def.name.as_deref(), Some("target"));
    }

    #[test]
    fn keyword_arguments_and_slices() {
        let node = expression("f(a, b=1)[1:2, ::3]");
        let NodeKind::Subscript { target, index } = node.kind else {
            panic!("expected subscript");
        };
        let NodeKind::Call { arguments, .. } = target.kind else {
            panic!("expected call");
        };
        assert_eq!(arguments[1].keyword.as_deref(), Some("b"));
        let NodeKind::Sequence { elements, .. } = index.kind else {
            panic!("expected tuple index");
        };
        assert!(matches!(elements[1].kind, NodeKind::Slice { start: None, stop: None, step: Some(_) }));
    }

    #[test]
    fn reports_syntax_errors() {
        let cases = [
            ("f(a b)", "expected ',' or ')'"),
            ("x = ", "expected expression"),
            ("f(a=1, b)", "positional argument follows keyword argument"),
            ("for (x in y) { }", "expected 'of' or ';'"),
            ("x = 1 2", "invalid syntax"),
            ("}", "invalid syntax"),
            ("if (x) ", "expected '{'"),
            ("try { }", "expected 'catch' or 'finally'"),
        ];
        for (source, expected) in cases {
            let err = parse_source(source).expect_err(source);
            assert!(
                err.message.starts_with(expected),
                "{source}: expected '{expected}', got '{}'",
                err.message
            );
        }
    }

    #[test]
    fn error_spans_point_at_offending_token() {
        let err = parse_source("x = (1, 2").expect_err("unclosed");
        assert_eq!(err.span, Span::point(9));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let depth = 50_000;
        let sources = [
            format!("x = {}1{}", "(".repeat(depth), ")".repeat(depth)),
            format!("x = {}1{}", "[".repeat(depth), "]".repeat(depth)),
            format!("x = {}1", "- ".repeat(depth)),
            format!("x = {}true", "not ".repeat(depth)),
            format!("x = 1{}", " + 1".repeat(depth)),
            format!("x = a{}", ".b".repeat(depth)),
            format!("{}x = 1{}", "if (true) { ".repeat(depth), " }".repeat(depth)),
        ];
        for source in &sources {
            let err = parse_source(source).expect_err("nesting past the limit");
            assert_eq!(err.message, "too many nested expressions");
        }
    }

    #[test]
    fn nesting_below_the_limit_parses() {
        let source = format!("x = {}1{}", "(".repeat(200), ")".repeat(200));
        let block = statements(&source);
        assert_eq!(block.len(), 1);
        expression(&format!("1{}", " + 1".repeat(500)));
    }
}
