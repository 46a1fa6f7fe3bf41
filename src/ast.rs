//! Syntax tree produced by the parser.
//!
//! Nodes are immutable after construction. Equality ignores spans so two
//! parses of differently formatted source compare equal when their
//! structure matches.

use std::rc::Rc;

use crate::token::{Number, Span};

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn boxed(self) -> Box<Node> {
        Box::new(self)
    }

    /// Identifiers, attributes, subscripts, and sequences of those.
    pub fn is_assign_target(&self) -> bool {
        match &self.kind {
            NodeKind::Identifier(_) | NodeKind::Attribute { .. } | NodeKind::Subscript { .. } => {
                true
            }
            NodeKind::Sequence {
                kind: SequenceKind::List | SequenceKind::Tuple,
                elements,
            } => elements.iter().all(Node::is_assign_target),
            _ => false,
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    True,
    False,
    None,
    Debug,
    Ellipsis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    List,
    Tuple,
    Set,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    MatMul,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    And,
    Or,
    Nullish,
    In,
    NotIn,
    Is,
    IsNot,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::FloorDiv => "//",
            BinaryOperator::Mod => "%",
            BinaryOperator::MatMul => "@",
            BinaryOperator::Pow => "**",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::Shl => "<<",
            BinaryOperator::Shr => ">>",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
            BinaryOperator::Nullish => "??",
            BinaryOperator::In => "in",
            BinaryOperator::NotIn => "not in",
            BinaryOperator::Is => "is",
            BinaryOperator::IsNot => "is not",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOperator {
    Equal,
    NotEqual,
    ApproxEqual,
    NotApproxEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
}

impl CompareOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOperator::Equal => "==",
            CompareOperator::NotEqual => "!=",
            CompareOperator::ApproxEqual => "~=",
            CompareOperator::NotApproxEqual => "~!",
            CompareOperator::Less => "<",
            CompareOperator::Greater => ">",
            CompareOperator::LessEqual => "<=",
            CompareOperator::GreaterEqual => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Minus,
    Not,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOperator {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOperator {
    Assign,
    Walrus,
    Augmented(BinaryOperator),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub keyword: Option<String>,
    pub value: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub default: Option<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub parameters: Vec<Parameter>,
    pub body: Node,
    pub decorators: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<Node>,
    pub body: Node,
    pub decorators: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub class: Option<Node>,
    pub binding: Option<String>,
    pub body: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForHeader {
    Counter {
        init: Option<Box<Node>>,
        condition: Option<Box<Node>>,
        update: Option<Box<Node>>,
    },
    Each {
        target: Box<Node>,
        iterable: Box<Node>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportBindings {
    /// `import m [as alias]`
    Module { alias: Option<String> },
    /// `from m import a [as b], c`
    Names(Vec<ImportName>),
    /// `from m import *`
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Number(Number),
    String(String),
    Constant(Constant),
    Identifier(String),
    Attribute {
        target: Box<Node>,
        name: String,
    },
    Subscript {
        target: Box<Node>,
        index: Box<Node>,
    },
    Slice {
        start: Option<Box<Node>>,
        stop: Option<Box<Node>>,
        step: Option<Box<Node>>,
    },
    Call {
        target: Box<Node>,
        arguments: Vec<Argument>,
    },
    Sequence {
        kind: SequenceKind,
        elements: Vec<Node>,
    },
    Dict {
        entries: Vec<(Node, Node)>,
    },
    Binary {
        left: Box<Node>,
        operator: BinaryOperator,
        right: Box<Node>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Node>,
    },
    Ternary {
        condition: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    Compare {
        first: Box<Node>,
        rest: Vec<(CompareOperator, Node)>,
    },
    Step {
        target: Box<Node>,
        operator: StepOperator,
        prefix: bool,
    },
    Assign {
        target: Box<Node>,
        operator: AssignOperator,
        value: Box<Node>,
    },
    Block(Vec<Node>),
    If {
        branches: Vec<(Node, Node)>,
        otherwise: Option<Box<Node>>,
    },
    Switch {
        subject: Box<Node>,
        cases: Vec<(Node, Node)>,
        default: Option<Box<Node>>,
    },
    Try {
        body: Box<Node>,
        catches: Vec<CatchClause>,
        otherwise: Option<Box<Node>>,
        finally: Option<Box<Node>>,
    },
    With {
        manager: Box<Node>,
        alias: Option<Box<Node>>,
        body: Box<Node>,
    },
    For {
        header: ForHeader,
        body: Box<Node>,
        otherwise: Option<Box<Node>>,
    },
    While {
        condition: Box<Node>,
        body: Box<Node>,
        otherwise: Option<Box<Node>>,
    },
    DoWhile {
        body: Box<Node>,
        condition: Box<Node>,
        otherwise: Option<Box<Node>>,
    },
    Function(Rc<FunctionDef>),
    Class(Box<ClassDef>),
    Return(Option<Box<Node>>),
    Throw {
        exception: Box<Node>,
        cause: Option<Box<Node>>,
    },
    Break,
    Continue,
    Delete(Vec<Node>),
    Assert {
        condition: Box<Node>,
        message: Option<Box<Node>>,
    },
    Global(Vec<String>),
    Import {
        module: String,
        bindings: ImportBindings,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str, start: usize) -> Node {
        Node::new(
            NodeKind::Identifier(name.to_string()),
            Span::new(start, start + name.len()),
        )
    }

    #[test]
    fn equality_ignores_spans() {
        assert_eq!(ident("a", 0), ident("a", 10));
        assert_ne!(ident("a", 0), ident("b", 0));
    }

    #[test]
    fn assign_targets_nest_through_sequences() {
        let tuple = Node::new(
            NodeKind::Sequence {
                kind: SequenceKind::Tuple,
                elements: vec![ident("a", 0), ident("b", 3)],
            },
            Span::new(0, 4),
        );
        assert!(tuple.is_assign_target());

        let literal = Node::new(NodeKind::Number(Number::Int(1)), Span::new(0, 1));
        assert!(!literal.is_assign_target());

        let set = Node::new(
            NodeKind::Sequence {
                kind: SequenceKind::Set,
                elements: vec![ident("a", 1)],
            },
            Span::new(0, 3),
        );
        assert!(!set.is_assign_target());
    }
}
