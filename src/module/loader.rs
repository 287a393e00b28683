//! Module loading: parse the entry source, chase imports through the
//! injected resolver, cache parses per absolute key, and hand the compiler
//! a dependency-ordered bundle.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{SourceKind, Stmt, StmtKind};
use crate::error::{ErrorCode, QuillError};
use crate::lexer::Lexer;
use crate::module::resolver::{key_dir, SourceResolver};
use crate::parser::Parser;

/// One parsed source unit.
#[derive(Debug)]
pub struct ParsedModule {
    /// Absolute key assigned by the resolver.
    pub key: String,
    pub content: String,
    pub kind: SourceKind,
    pub statements: Vec<Stmt>,
    pub errors: Vec<QuillError>,
    /// Set when the module carries a `library 'name'` declaration.
    pub library_name: Option<String>,
}

impl ParsedModule {
    /// Parse a source unit under the given kind.
    pub fn parse(key: &str, content: &str, kind: SourceKind) -> Self {
        let (tokens, mut errors) = Lexer::new(content).tokenize();
        let mut parser = Parser::new(tokens, kind);
        let statements = parser.parse();
        errors.extend(parser.errors);
        for err in &mut errors {
            if err.module.is_none() {
                err.module = Some(key.to_string());
            }
        }

        let library_name = statements.iter().find_map(|stmt| match &stmt.kind {
            StmtKind::Library { name } => Some(name.clone()),
            _ => None,
        });

        Self {
            key: key.to_string(),
            content: content.to_string(),
            kind,
            statements,
            errors,
            library_name,
        }
    }

    /// The first accumulated error, if any.
    pub fn first_error(&self) -> Option<&QuillError> {
        self.errors.first()
    }
}

/// The transitive closure of modules for one compilation: every reached
/// module keyed by absolute key, in dependency order with the entry last.
#[derive(Debug)]
pub struct Compilation {
    pub modules: IndexMap<String, Rc<RefCell<ParsedModule>>>,
    pub entry_key: String,
    pub library_name: Option<String>,
}

impl Compilation {
    /// All errors accumulated across the bundle, entry included.
    pub fn errors(&self) -> Vec<QuillError> {
        self.modules
            .values()
            .flat_map(|module| module.borrow().errors.clone())
            .collect()
    }
}

/// The module loader. The parse cache lives as long as the loader, so
/// parsing the same module twice returns the identical parse result.
pub struct ModuleLoader {
    resolver: Box<dyn SourceResolver>,
    cache: IndexMap<String, Rc<RefCell<ParsedModule>>>,
}

impl ModuleLoader {
    pub fn new(resolver: Box<dyn SourceResolver>) -> Self {
        Self {
            resolver,
            cache: IndexMap::new(),
        }
    }

    /// Parse the entry and every transitively imported module into a
    /// compilation bundle. Resolver failures are recorded on the importing
    /// module as external errors; loading continues.
    pub fn parse_to_compilation(&mut self, entry_key: &str, content: &str) -> Compilation {
        let mut order: Vec<Rc<RefCell<ParsedModule>>> = Vec::new();

        let entry = Rc::new(RefCell::new(ParsedModule::parse(
            entry_key,
            content,
            SourceKind::Script,
        )));
        self.cache.insert(entry_key.to_string(), entry.clone());
        self.load_imports(&entry, &mut order);
        order.push(entry.clone());

        let mut modules = IndexMap::new();
        for module in order {
            let key = module.borrow().key.clone();
            modules.entry(key).or_insert(module);
        }

        let library_name = entry.borrow().library_name.clone();
        Compilation {
            modules,
            entry_key: entry_key.to_string(),
            library_name,
        }
    }

    /// Fetch a cached parse, if present. Used to observe cache identity.
    pub fn cached(&self, key: &str) -> Option<Rc<RefCell<ParsedModule>>> {
        self.cache.get(key).cloned()
    }

    fn load_imports(
        &mut self,
        module: &Rc<RefCell<ParsedModule>>,
        order: &mut Vec<Rc<RefCell<ParsedModule>>>,
    ) {
        let current_dir = key_dir(&module.borrow().key);
        let statement_count = module.borrow().statements.len();

        for index in 0..statement_count {
            let (key, span) = {
                let borrowed = module.borrow();
                match &borrowed.statements[index].kind {
                    StmtKind::Import(decl) => (decl.key.clone(), decl.span),
                    _ => continue,
                }
            };

            let resolved = match self.resolver.resolve(&key, &current_dir) {
                Ok(resolved) => resolved,
                Err(message) => {
                    let err = QuillError::new(
                        ErrorCode::SourceProviderError,
                        format!("cannot resolve import '{}': {}", key, message),
                        span,
                    )
                    .in_module(module.borrow().key.clone());
                    module.borrow_mut().errors.push(err);
                    continue;
                }
            };

            // Attach the resolved absolute key back onto the declaration.
            {
                let mut borrowed = module.borrow_mut();
                if let StmtKind::Import(decl) = &mut borrowed.statements[index].kind {
                    decl.resolved_key = Some(resolved.key.clone());
                }
            }

            if self.cache.contains_key(&resolved.key) {
                // Already parsed (or currently being parsed in a cycle):
                // the cache prevents re-parsing, which is what guarantees
                // termination.
                continue;
            }

            let imported = Rc::new(RefCell::new(ParsedModule::parse(
                &resolved.key,
                &resolved.content,
                SourceKind::Module,
            )));
            self.cache.insert(resolved.key.clone(), imported.clone());
            self.load_imports(&imported, order);
            order.push(imported);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::resolver::MemorySourceResolver;

    fn loader_with(sources: &[(&str, &str)]) -> ModuleLoader {
        let mut resolver = MemorySourceResolver::new();
        for (key, content) in sources {
            resolver.add(*key, *content);
        }
        ModuleLoader::new(Box::new(resolver))
    }

    #[test]
    fn test_imports_come_before_importer() {
        let mut loader = loader_with(&[("util.ql", "var helper = 1")]);
        let compilation =
            loader.parse_to_compilation("main.ql", "import 'util.ql'\nvar x = 2");
        let keys: Vec<_> = compilation.modules.keys().cloned().collect();
        assert_eq!(keys, vec!["util.ql".to_string(), "main.ql".to_string()]);
        assert_eq!(compilation.entry_key, "main.ql");
    }

    #[test]
    fn test_import_key_is_annotated() {
        let mut loader = loader_with(&[("lib/util.ql", "var helper = 1")]);
        let compilation =
            loader.parse_to_compilation("lib/main.ql", "import 'util.ql'");
        let entry = compilation.modules.get("lib/main.ql").expect("entry");
        let resolved = entry
            .borrow()
            .statements
            .iter()
            .find_map(|stmt| match &stmt.kind {
                StmtKind::Import(decl) => decl.resolved_key.clone(),
                _ => None,
            });
        assert_eq!(resolved.as_deref(), Some("lib/util.ql"));
    }

    #[test]
    fn test_cache_returns_identical_parse() {
        let mut loader = loader_with(&[("util.ql", "var helper = 1")]);
        let first = loader.parse_to_compilation("a.ql", "import 'util.ql'");
        let second = loader.parse_to_compilation("b.ql", "import 'util.ql'");
        let from_first = first.modules.get("util.ql").expect("util in first");
        let from_second = second.modules.get("util.ql").expect("util in second");
        assert!(Rc::ptr_eq(from_first, from_second));
    }

    #[test]
    fn test_resolver_failure_is_recorded_and_loading_continues() {
        let mut loader = loader_with(&[("good.ql", "var ok = 1")]);
        let compilation = loader
            .parse_to_compilation("main.ql", "import 'missing.ql'\nimport 'good.ql'");
        let errors = compilation.errors();
        assert!(errors
            .iter()
            .any(|e| e.code == ErrorCode::SourceProviderError));
        assert!(compilation.modules.contains_key("good.ql"));
    }

    #[test]
    fn test_cyclic_imports_terminate() {
        let mut loader = loader_with(&[
            ("a.ql", "import 'b.ql'\nvar a = 1"),
            ("b.ql", "import 'a.ql'\nvar b = 2"),
        ]);
        let compilation = loader.parse_to_compilation("main.ql", "import 'a.ql'");
        assert!(compilation.modules.contains_key("a.ql"));
        assert!(compilation.modules.contains_key("b.ql"));
    }

    #[test]
    fn test_library_name_from_entry() {
        let mut loader = loader_with(&[]);
        let compilation = loader.parse_to_compilation("main.ql", "library 'tools'");
        assert_eq!(compilation.library_name.as_deref(), Some("tools"));
    }
}
