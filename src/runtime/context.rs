//! Call frames.
//!
//! A [`Context`] is created for every module, class body, and function call.
//! The chain of parents is what a traceback walks; scoping itself lives in
//! the [`SymbolTable`] each frame owns.

use std::fmt;
use std::rc::Rc;

use crate::runtime::symtab::SymbolTable;
use crate::runtime::value::Function;
use crate::token::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Module,
    Function,
    Class,
}

pub struct Context {
    pub file: Rc<str>,
    pub source: Rc<str>,
    /// Name shown in tracebacks.
    pub name: String,
    /// Dotted path used for `__qualname__` of definitions made inside.
    pub qualname: Option<String>,
    pub symbols: Rc<SymbolTable>,
    pub parent: Option<Rc<Context>>,
    /// Where in the parent frame this frame was entered.
    pub entry_span: Span,
    pub kind: FrameKind,
    /// Function whose call opened this frame.
    pub callee: Option<Rc<Function>>,
}

impl Context {
    pub const MODULE_NAME: &'static str = "<program>";

    pub fn module(
        file: Rc<str>,
        source: Rc<str>,
        symbols: Rc<SymbolTable>,
        parent: Option<CallSite>,
    ) -> Rc<Self> {
        let (parent, entry_span) = match parent {
            Some(site) => (Some(site.context), site.span),
            None => (None, Span::POSITIONLESS),
        };
        Rc::new(Self {
            file,
            source,
            name: Self::MODULE_NAME.to_string(),
            qualname: None,
            symbols,
            parent,
            entry_span,
            kind: FrameKind::Module,
            callee: None,
        })
    }

    /// A frame for a function or class body defined in `self`'s file.
    pub fn enter(
        self: &Rc<Self>,
        kind: FrameKind,
        name: String,
        qualname: Option<String>,
        symbols: Rc<SymbolTable>,
        site: CallSite,
    ) -> Rc<Self> {
        Rc::new(Self {
            file: self.file.clone(),
            source: self.source.clone(),
            name,
            qualname,
            symbols,
            parent: Some(site.context),
            entry_span: site.span,
            kind,
            callee: None,
        })
    }

    /// The frame of one call of `function`, entered from `site`.
    pub fn call(function: &Rc<Function>, symbols: Rc<SymbolTable>, site: CallSite) -> Rc<Self> {
        let closure = &function.closure;
        Rc::new(Self {
            file: closure.file.clone(),
            source: closure.source.clone(),
            name: function.name.clone(),
            qualname: Some(function.qualname.clone()),
            symbols,
            parent: Some(site.context),
            entry_span: site.span,
            kind: FrameKind::Function,
            callee: Some(function.clone()),
        })
    }

    /// Qualified name for a definition called `name` made in this frame.
    pub fn qualify(&self, name: &str) -> String {
        match (&self.qualname, self.kind) {
            (Some(prefix), FrameKind::Function) => format!("{prefix}.<locals>.{name}"),
            (Some(prefix), _) => format!("{prefix}.{name}"),
            (None, _) => name.to_string(),
        }
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent.as_ref();
        while let Some(context) = current {
            depth += 1;
            current = context.parent.as_ref();
        }
        depth
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("file", &self.file)
            .field("name", &self.name)
            .field("qualname", &self.qualname)
            .field("entry_span", &self.entry_span)
            .field("kind", &self.kind)
            .finish()
    }
}

/// The frame and span a call was made from.
#[derive(Debug, Clone)]
pub struct CallSite {
    pub context: Rc<Context>,
    pub span: Span,
}

impl CallSite {
    pub fn new(context: Rc<Context>, span: Span) -> Self {
        Self { context, span }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn module() -> Rc<Context> {
        Context::module(
            "main.pys".into(),
            "".into(),
            SymbolTable::root(SymbolTable::detached()),
            None,
        )
    }

    #[test]
    fn qualified_names_follow_nesting() {
        let module = module();
        assert_eq!(module.qualify("Outer"), "Outer");

        let class = module.enter(
            FrameKind::Class,
            "Outer".to_string(),
            Some("Outer".to_string()),
            SymbolTable::child(&module.symbols),
            CallSite::new(module.clone(), Span::new(0, 5)),
        );
        assert_eq!(class.qualify("method"), "Outer.method");

        let function = class.enter(
            FrameKind::Function,
            "method".to_string(),
            Some("Outer.method".to_string()),
            SymbolTable::child(&class.symbols),
            CallSite::new(class.clone(), Span::new(6, 9)),
        );
        assert_eq!(function.qualify("inner"), "Outer.method.<locals>.inner");
        assert_eq!(function.depth(), 2);
    }
}
