//! Static checks run between parsing and evaluation.
//!
//! The pass only reads the tree. It tracks how deeply the walk is nested in
//! loops, switches, and function bodies, and reports the first misplaced
//! statement or malformed target it meets.

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::ast::{
    Argument, AssignOperator, ClassDef, ForHeader, FunctionDef, Node, NodeKind, Parameter,
    SequenceKind,
};
use crate::token::Span;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub span: Span,
}

impl ValidationError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

pub type ValidationResult = Result<(), ValidationError>;

pub fn validate(node: &Node) -> ValidationResult {
    Validator::default().visit(node)
}

#[derive(Default, Clone, Copy)]
struct Validator {
    loops: usize,
    switches: usize,
    functions: usize,
}

impl Validator {
    fn visit_all<'a>(&mut self, nodes: impl IntoIterator<Item = &'a Node>) -> ValidationResult {
        nodes.into_iter().try_for_each(|node| self.visit(node))
    }

    fn visit_optional(&mut self, node: Option<&Node>) -> ValidationResult {
        node.map_or(Ok(()), |node| self.visit(node))
    }

    fn visit_loop_body(&mut self, body: &Node) -> ValidationResult {
        self.loops += 1;
        let result = self.visit(body);
        self.loops -= 1;
        result
    }

    fn visit(&mut self, node: &Node) -> ValidationResult {
        crate::stack::ensure_sufficient_stack(|| self.visit_node(node))
    }

    fn visit_node(&mut self, node: &Node) -> ValidationResult {
        match &node.kind {
            NodeKind::Number(_)
            | NodeKind::String(_)
            | NodeKind::Constant(_)
            | NodeKind::Identifier(_)
            | NodeKind::Global(_)
            | NodeKind::Import { .. } => Ok(()),
            NodeKind::Attribute { target, .. } => self.visit(target),
            NodeKind::Subscript { target, index } => {
                self.visit(target)?;
                self.visit(index)
            }
            NodeKind::Slice { start, stop, step } => {
                self.visit_optional(start.as_deref())?;
                self.visit_optional(stop.as_deref())?;
                self.visit_optional(step.as_deref())
            }
            NodeKind::Call { target, arguments } => {
                self.visit(target)?;
                check_keywords(arguments)?;
                self.visit_all(arguments.iter().map(|argument| &argument.value))
            }
            NodeKind::Sequence { elements, .. } => self.visit_all(elements),
            NodeKind::Dict { entries } => entries.iter().try_for_each(|(key, value)| {
                self.visit(key)?;
                self.visit(value)
            }),
            NodeKind::Binary { left, right, .. } => {
                self.visit(left)?;
                self.visit(right)
            }
            NodeKind::Unary { operand, .. } => self.visit(operand),
            NodeKind::Ternary {
                condition,
                then,
                otherwise,
            } => {
                self.visit(condition)?;
                self.visit(then)?;
                self.visit(otherwise)
            }
            NodeKind::Compare { first, rest } => {
                self.visit(first)?;
                self.visit_all(rest.iter().map(|(_, node)| node))
            }
            NodeKind::Step { target, .. } => {
                if !is_single_target(target) {
                    return Err(ValidationError::new("cannot assign to expression", target.span));
                }
                self.visit(target)
            }
            NodeKind::Assign {
                target,
                operator,
                value,
            } => {
                check_assign_target(target, *operator)?;
                self.visit(target)?;
                self.visit(value)
            }
            NodeKind::Block(statements) => self.visit_all(statements),
            NodeKind::If {
                branches,
                otherwise,
            } => {
                for (condition, body) in branches {
                    self.visit(condition)?;
                    self.visit(body)?;
                }
                self.visit_optional(otherwise.as_deref())
            }
            NodeKind::Switch {
                subject,
                cases,
                default,
            } => {
                self.visit(subject)?;
                self.switches += 1;
                let result = cases
                    .iter()
                    .try_for_each(|(case, body)| {
                        self.visit(case)?;
                        self.visit(body)
                    })
                    .and_then(|()| self.visit_optional(default.as_deref()));
                self.switches -= 1;
                result
            }
            NodeKind::Try {
                body,
                catches,
                otherwise,
                finally,
            } => {
                self.visit(body)?;
                for clause in catches {
                    self.visit_optional(clause.class.as_ref())?;
                    self.visit(&clause.body)?;
                }
                self.visit_optional(otherwise.as_deref())?;
                self.visit_optional(finally.as_deref())
            }
            NodeKind::With {
                manager,
                alias,
                body,
            } => {
                self.visit(manager)?;
                if let Some(alias) = alias {
                    if !alias.is_assign_target() {
                        return Err(ValidationError::new("cannot assign to expression", alias.span));
                    }
                    self.visit(alias)?;
                }
                self.visit(body)
            }
            NodeKind::For {
                header,
                body,
                otherwise,
            } => {
                match header {
                    ForHeader::Counter {
                        init,
                        condition,
                        update,
                    } => {
                        self.visit_optional(init.as_deref())?;
                        self.visit_optional(condition.as_deref())?;
                        self.visit_optional(update.as_deref())?;
                    }
                    ForHeader::Each { target, iterable } => {
                        if !target.is_assign_target() {
                            return Err(ValidationError::new(
                                "cannot assign to expression",
                                target.span,
                            ));
                        }
                        self.visit(target)?;
                        self.visit(iterable)?;
                    }
                }
                self.visit_loop_body(body)?;
                self.visit_optional(otherwise.as_deref())
            }
            NodeKind::While {
                condition,
                body,
                otherwise,
            } => {
                self.visit(condition)?;
                self.visit_loop_body(body)?;
                self.visit_optional(otherwise.as_deref())
            }
            NodeKind::DoWhile {
                body,
                condition,
                otherwise,
            } => {
                self.visit_loop_body(body)?;
                self.visit(condition)?;
                self.visit_optional(otherwise.as_deref())
            }
            NodeKind::Function(definition) => self.visit_function(definition),
            NodeKind::Class(definition) => self.visit_class(definition),
            NodeKind::Return(value) => {
                if self.functions == 0 {
                    return Err(ValidationError::new("return outside of function", node.span));
                }
                self.visit_optional(value.as_deref())
            }
            NodeKind::Throw { exception, cause } => {
                self.visit(exception)?;
                self.visit_optional(cause.as_deref())
            }
            NodeKind::Break => {
                if self.loops == 0 && self.switches == 0 {
                    return Err(ValidationError::new(
                        "break outside of loop or switch case",
                        node.span,
                    ));
                }
                Ok(())
            }
            NodeKind::Continue => {
                if self.loops == 0 {
                    return Err(ValidationError::new("continue outside of loop", node.span));
                }
                Ok(())
            }
            NodeKind::Delete(targets) => {
                for target in targets {
                    check_delete_target(target)?;
                    self.visit(target)?;
                }
                Ok(())
            }
            NodeKind::Assert { condition, message } => {
                self.visit(condition)?;
                self.visit_optional(message.as_deref())
            }
        }
    }

    fn visit_function(&mut self, definition: &FunctionDef) -> ValidationResult {
        self.visit_all(&definition.decorators)?;
        check_parameters(&definition.parameters, definition.body.span)?;
        self.visit_all(
            definition
                .parameters
                .iter()
                .filter_map(|parameter| parameter.default.as_ref()),
        )?;

        let outer = *self;
        *self = Validator {
            loops: 0,
            switches: 0,
            functions: outer.functions + 1,
        };
        let result = self.visit(&definition.body);
        *self = outer;
        result
    }

    fn visit_class(&mut self, definition: &ClassDef) -> ValidationResult {
        self.visit_all(&definition.decorators)?;
        self.visit_all(&definition.bases)?;

        let outer = *self;
        *self = Validator::default();
        let result = self.visit(&definition.body);
        *self = outer;
        result
    }
}

fn is_single_target(node: &Node) -> bool {
    matches!(
        node.kind,
        NodeKind::Identifier(_) | NodeKind::Attribute { .. } | NodeKind::Subscript { .. }
    )
}

fn check_assign_target(target: &Node, operator: AssignOperator) -> ValidationResult {
    match operator {
        AssignOperator::Assign if target.is_assign_target() => Ok(()),
        AssignOperator::Assign => Err(ValidationError::new(
            "cannot assign to expression here. Maybe you meant '==' instead of '='?",
            target.span,
        )),
        AssignOperator::Walrus if matches!(target.kind, NodeKind::Identifier(_)) => Ok(()),
        AssignOperator::Walrus => Err(ValidationError::new(
            "cannot use assignment expressions with expression",
            target.span,
        )),
        AssignOperator::Augmented(_) if is_single_target(target) => Ok(()),
        AssignOperator::Augmented(_) => Err(ValidationError::new(
            "illegal expression for augmented assignment",
            target.span,
        )),
    }
}

fn check_delete_target(target: &Node) -> ValidationResult {
    match &target.kind {
        NodeKind::Number(_) | NodeKind::String(_) | NodeKind::Constant(_) | NodeKind::Dict { .. } => {
            Err(ValidationError::new("cannot delete literal", target.span))
        }
        NodeKind::Sequence {
            kind: SequenceKind::List | SequenceKind::Tuple,
            elements,
        } => elements.iter().try_for_each(check_delete_target),
        _ if is_single_target(target) => Ok(()),
        _ => Err(ValidationError::new("cannot delete expression", target.span)),
    }
}

fn check_parameters(parameters: &[Parameter], span: Span) -> ValidationResult {
    let mut seen = FxHashSet::default();
    for parameter in parameters {
        if !seen.insert(parameter.name.as_str()) {
            return Err(ValidationError::new(
                format!(
                    "duplicate argument '{}' in function definition",
                    parameter.name
                ),
                span,
            ));
        }
    }
    Ok(())
}

fn check_keywords(arguments: &[Argument]) -> ValidationResult {
    let mut seen = FxHashSet::default();
    for argument in arguments {
        if let Some(keyword) = &argument.keyword
            && !seen.insert(keyword.as_str())
        {
            return Err(ValidationError::new(
                format!("duplicate argument '{keyword}' in call definition"),
                argument.value.span,
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse_tokens;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn check(source: &str) -> ValidationResult {
        let tokens = tokenize(source).expect("source should tokenize");
        validate(&parse_tokens(tokens).expect("source should parse"))
    }

    fn message(source: &str) -> String {
        check(source).expect_err("validation should fail").message
    }

    #[test]
    fn accepts_well_placed_statements() {
        check(indoc! {"
            func f(a, b = 1) {
                for (i = 0; i < 3; i++) {
                    if (i == 1) { continue }
                    switch (i) { case 2: break }
                }
                return a + b
            }
            while (true) { break }
            switch (1) { case 1: x = 1; break }
            a, [b, c.d] = 1, [2, 3]
            del a, b[0], c.d
        "})
        .expect("program should validate");
    }

    #[test]
    fn rejects_misplaced_control_flow() {
        assert_eq!(message("break"), "break outside of loop or switch case");
        assert_eq!(message("switch (1) { case 1: continue }"), "continue outside of loop");
        assert_eq!(message("return 1"), "return outside of function");
        assert_eq!(
            message("while (true) { func f() { break } }"),
            "break outside of loop or switch case"
        );
        assert_eq!(message("class A { return 1 }"), "return outside of function");
    }

    #[test]
    fn rejects_bad_targets() {
        assert_eq!(
            message("1 = x"),
            "cannot assign to expression here. Maybe you meant '==' instead of '='?"
        );
        assert_eq!(message("for (1 of x) {}"), "cannot assign to expression");
        assert_eq!(message("del 1"), "cannot delete literal");
        assert_eq!(message("(a, b) += 1"), "illegal expression for augmented assignment");
    }

    #[test]
    fn rejects_duplicate_names() {
        assert_eq!(
            message("func f(a, a) {}"),
            "duplicate argument 'a' in function definition"
        );
        assert_eq!(
            message("f(x=1, x=2)"),
            "duplicate argument 'x' in call definition"
        );
    }
}
