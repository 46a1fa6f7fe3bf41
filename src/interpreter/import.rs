//! Module resolution and the `import` statement.

use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::ast::ImportBindings;
use crate::parser::Mode;
use crate::runtime::context::CallSite;
use crate::runtime::error::RuntimeError;
use crate::runtime::exception::{ExceptionKind, Fault, HostFault, Throwable};
use crate::runtime::symtab::{Operand, SymbolTable};
use crate::runtime::value::{Module, Value};

use super::Interpreter;

/// Locates script modules.
pub trait ModuleResolver {
    /// Path of module `name` imported from a file in `base_dir`.
    fn resolve(&self, name: &str, base_dir: &Path, library_paths: &[PathBuf]) -> Option<PathBuf>;

    fn load(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Resolves `a.b` to `a/b.pys` or `a/b/__init__.pys`, first next to the
/// importing file and then in each library path.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileResolver;

impl ModuleResolver for FileResolver {
    fn resolve(&self, name: &str, base_dir: &Path, library_paths: &[PathBuf]) -> Option<PathBuf> {
        let relative: PathBuf = if name.contains('/') || name.ends_with(".pys") {
            PathBuf::from(name)
        } else {
            name.split('.').collect()
        };
        std::iter::once(base_dir)
            .chain(library_paths.iter().map(PathBuf::as_path))
            .find_map(|directory| {
                let target = directory.join(&relative);
                if target.is_dir() {
                    let package = target.join("__init__.pys");
                    return package.is_file().then_some(package);
                }
                let file = if target.extension().is_some_and(|extension| extension == "pys") {
                    target
                } else {
                    target.with_extension("pys")
                };
                file.is_file().then(|| file.canonicalize().unwrap_or(file))
            })
    }
}

/// Fallback for names no script module answers to, backed by the
/// embedding's native modules.
pub trait HostBridge {
    /// The exported names of host module `name`, `None` when the host has
    /// no such module.
    fn load(&mut self, name: &str) -> Option<Result<Vec<(String, Value)>, HostFault>>;
}

impl Interpreter {
    /// Loads (or fetches from the cache) the module `name` on behalf of the
    /// code at `site`.
    pub(crate) fn import_module(&mut self, site: &CallSite, name: &str) -> Result<Rc<Module>, RuntimeError> {
        let base_dir = Path::new(&*site.context.file)
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        let Some(path) = self
            .resolver
            .resolve(name, &base_dir, &self.config.library_paths)
        else {
            return self.import_host(site, name);
        };

        if self.loading.contains(&path) {
            return Err(RuntimeError::CircularImport {
                module: name.to_string(),
                importer: site.context.file.to_string(),
            });
        }
        if let Some(module) = self.modules.get(&path) {
            debug!(module = name, path = %path.display(), "module cache hit");
            return Ok(module.clone());
        }

        let source = self
            .resolver
            .load(&path)
            .map_err(|error| RuntimeError::ImportFailed {
                module: name.to_string(),
                reason: error.to_string(),
            })?;
        debug!(module = name, path = %path.display(), "loading module");

        let file: Rc<str> = path.to_string_lossy().into();
        let symbols = SymbolTable::root(self.builtins.clone());
        self.loading.insert(path.clone());
        let result = self.run_unit(
            file.clone(),
            source.into(),
            Mode::Exec,
            symbols.clone(),
            Some(site.clone()),
        );
        self.loading.remove(&path);
        result?;

        let module = Rc::new(Module {
            name: name.to_string(),
            file,
            symbols,
        });
        self.modules.insert(path, module.clone());
        Ok(module)
    }

    fn import_host(&mut self, site: &CallSite, name: &str) -> Result<Rc<Module>, RuntimeError> {
        let not_found = || RuntimeError::ModuleNotFound {
            module: name.to_string(),
        };
        let host = self.host.as_mut().ok_or_else(not_found)?;
        match host.load(name).ok_or_else(not_found)? {
            Ok(exports) => {
                debug!(module = name, "loaded host module");
                let symbols = SymbolTable::detached();
                for (export, value) in exports {
                    symbols.set(&export, value, Operand::Assign);
                }
                Ok(Rc::new(Module {
                    name: name.to_string(),
                    file: "<host>".into(),
                    symbols,
                }))
            }
            Err(fault) => Err(self.host_fault(site, &fault).into()),
        }
    }

    /// A script fault standing in for a native one, keeping its type tag.
    fn host_fault(&self, site: &CallSite, fault: &dyn Throwable) -> Fault {
        let type_name = fault.type_name();
        let kind = ExceptionKind::from_name(&type_name).unwrap_or(ExceptionKind::Exception);
        let exception = self.exceptions.instantiate(kind, fault.message());
        let mut fault = Fault::new(exception, fault.message(), site.span, site.context.clone());
        fault.type_name = type_name;
        fault
    }

    /// Executes an `import` statement at `site`.
    pub(crate) fn import(
        &mut self,
        site: &CallSite,
        name: &str,
        bindings: &ImportBindings,
    ) -> Result<(), RuntimeError> {
        let module = self.import_module(site, name)?;
        let symbols = &site.context.symbols;
        match bindings {
            ImportBindings::Module { alias } => {
                let binding = alias.as_deref().unwrap_or_else(|| binding_name(name));
                symbols.set(binding, Value::Module(module), Operand::Assign);
            }
            ImportBindings::Names(names) => {
                for imported in names {
                    if !module.symbols.include(&imported.name) {
                        return Err(RuntimeError::CannotImportName {
                            name: imported.name.clone(),
                            module: name.to_string(),
                        });
                    }
                    let binding = imported.alias.as_ref().unwrap_or(&imported.name);
                    symbols.set(binding, module.symbols.get(&imported.name), Operand::Assign);
                }
            }
            ImportBindings::All => {
                for (export, value) in module.symbols.entries() {
                    if !export.starts_with('_') {
                        symbols.set(&export, value, Operand::Assign);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Name `import a.b.c` binds: the last dotted component, or the file stem
/// of a path.
fn binding_name(name: &str) -> &str {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let last = last.strip_suffix(".pys").unwrap_or(last);
    last.rsplit('.').next().unwrap_or(last)
}

#[cfg(test)]
mod tests {
    use super::super::OutputBuffer;
    use super::*;
    use crate::config::Config;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use rustc_hash::FxHashMap;

    /// Modules held in memory, keyed by dotted name.
    struct Memory(FxHashMap<&'static str, &'static str>);

    impl ModuleResolver for Memory {
        fn resolve(&self, name: &str, _: &Path, _: &[PathBuf]) -> Option<PathBuf> {
            self.0.contains_key(name).then(|| PathBuf::from(format!("/mem/{name}.pys")))
        }

        fn load(&self, path: &Path) -> io::Result<String> {
            let stem = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or_default();
            self.0
                .get(stem)
                .map(|source| source.to_string())
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "missing"))
        }
    }

    struct Natives;

    impl HostBridge for Natives {
        fn load(&mut self, name: &str) -> Option<Result<Vec<(String, Value)>, HostFault>> {
            match name {
                "native" => Some(Ok(vec![("answer".to_string(), Value::Int(42))])),
                "broken" => Some(Err(HostFault {
                    type_name: "OSError".to_string(),
                    message: "device not ready".to_string(),
                })),
                _ => None,
            }
        }
    }

    fn session(modules: &[(&'static str, &'static str)]) -> (Interpreter, OutputBuffer) {
        let stdout = OutputBuffer::new();
        let interpreter = Interpreter::new(Config::default())
            .with_stdout(stdout.clone())
            .with_resolver(Memory(modules.iter().copied().collect()))
            .with_host_bridge(Natives);
        (interpreter, stdout)
    }

    #[test]
    fn import_forms_bind_names() {
        let (mut interpreter, stdout) = session(&[(
            "shapes",
            "PI = 3\n_hidden = 1\nfunc area(r) { return PI * r * r }",
        )]);
        interpreter
            .execute(
                "/mem/main.pys",
                indoc! {"
                    import shapes
                    import shapes as s
                    from shapes import area as a, PI
                    print(shapes.area(2), s.PI, a(1), PI)
                    from shapes import *
                    print(area(1), globals().get('_hidden'))
                "},
                Mode::Exec,
            )
            .expect("imports should succeed");
        assert_eq!(stdout.contents(), "12 3 3 3\n3 None\n");
    }

    #[test]
    fn modules_run_once() {
        let (mut interpreter, stdout) = session(&[("noisy", "print('loaded')")]);
        interpreter
            .execute("/mem/main.pys", "import noisy\nx = require('noisy')\nimport noisy", Mode::Exec)
            .expect("imports should succeed");
        assert_eq!(stdout.contents(), "loaded\n");
    }

    #[test]
    fn import_failures() {
        let (mut interpreter, _) = session(&[("a", "import b"), ("b", "import a"), ("m", "x = 1")]);
        let fault = interpreter
            .execute("/mem/main.pys", "import a", Mode::Exec)
            .expect_err("circular import should fail");
        assert_eq!(
            fault.to_string(),
            "ImportError: cannot import module name 'a' from partially initialized module '/mem/b.pys', mostly during circular import"
        );

        let fault = interpreter
            .execute("/mem/main.pys", "import nowhere", Mode::Exec)
            .expect_err("missing module should fail");
        assert_eq!(fault.to_string(), "ModuleNotFoundError: No module named 'nowhere'");

        let fault = interpreter
            .execute("/mem/main.pys", "from m import y", Mode::Exec)
            .expect_err("missing name should fail");
        assert_eq!(fault.to_string(), "ImportError: cannot import name 'y' from 'm'");
    }

    #[test]
    fn host_bridge_fills_in_missing_modules() {
        let (mut interpreter, stdout) = session(&[]);
        interpreter
            .execute("/mem/main.pys", "from native import answer\nprint(answer)", Mode::Exec)
            .expect("host import should succeed");
        assert_eq!(stdout.contents(), "42\n");

        let fault = interpreter
            .execute("/mem/main.pys", "import broken", Mode::Exec)
            .expect_err("host fault should propagate");
        assert_eq!(fault.to_string(), "OSError: device not ready");
    }

    #[test]
    fn binding_names() {
        assert_eq!(binding_name("a.b.c"), "c");
        assert_eq!(binding_name("lib/util.pys"), "util");
        assert_eq!(binding_name("plain"), "plain");
    }
}
