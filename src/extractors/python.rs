// Python extractor
//
// Functions, classes, methods and module-level assignments. Python has no
// export syntax; the module convention applies instead: top-level names not
// starting with an underscore are treated as exported.

use tree_sitter::{Node, Tree};

use crate::extractors::base::{
    Export, Import, Symbol, SymbolKind, node_location, node_text,
};
use crate::extractors::typescript::signature_of;

#[derive(Clone, Copy)]
enum Scope<'a> {
    Module,
    Class(&'a str),
    Function,
}

pub struct PythonExtractor {
    file_path: String,
    content: String,
    symbols: Vec<Symbol>,
    imports: Vec<Import>,
}

impl PythonExtractor {
    pub fn new(file_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            content: content.into(),
            symbols: Vec::new(),
            imports: Vec::new(),
        }
    }

    pub fn extract(mut self, tree: &Tree) -> (Vec<Symbol>, Vec<Import>, Vec<Export>) {
        self.visit(tree.root_node(), Scope::Module);

        let exports = self
            .symbols
            .iter()
            .filter(|s| s.is_exported)
            .map(|s| Export {
                file_path: self.file_path.clone(),
                name: s.name.clone(),
            })
            .collect();

        (self.symbols, self.imports, exports)
    }

    fn visit(&mut self, node: Node, scope: Scope) {
        match node.kind() {
            "function_definition" => {
                if let Some(name) = self.field_text(node, "name") {
                    let kind = match scope {
                        Scope::Class(_) => SymbolKind::Method,
                        _ => SymbolKind::Function,
                    };
                    self.push_symbol(node, &name, kind, scope);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit_children(body, Scope::Function);
                }
                return;
            }
            "class_definition" => {
                if let Some(name) = self.field_text(node, "name") {
                    self.push_symbol(node, &name, SymbolKind::Class, scope);
                    if let Some(body) = node.child_by_field_name("body") {
                        self.visit_children(body, Scope::Class(&name));
                    }
                }
                return;
            }
            "decorated_definition" => {
                if let Some(definition) = node.child_by_field_name("definition") {
                    self.visit(definition, scope);
                }
                return;
            }
            "assignment" => {
                // Module-level `NAME = ...` bindings only; locals are noise.
                if matches!(scope, Scope::Module) {
                    if let Some(left) = node.child_by_field_name("left") {
                        if left.kind() == "identifier" {
                            let name = node_text(&left, &self.content);
                            self.push_symbol(node, &name, SymbolKind::Variable, scope);
                        }
                    }
                }
                return;
            }
            "import_statement" => {
                self.collect_plain_import(node);
                return;
            }
            "import_from_statement" => {
                self.collect_from_import(node);
                return;
            }
            _ => {}
        }

        self.visit_children(node, scope);
    }

    fn visit_children(&mut self, node: Node, scope: Scope) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child, scope);
        }
    }

    fn push_symbol(&mut self, node: Node, name: &str, kind: SymbolKind, scope: Scope) {
        let mut symbol = Symbol::new(
            self.file_path.clone(),
            name,
            kind,
            node_location(&node),
        );
        symbol.signature = Some(signature_of(&node_text(&node, &self.content)));
        if let Scope::Class(parent) = scope {
            symbol.parent_symbol_name = Some(parent.to_string());
        }
        symbol.is_exported = matches!(scope, Scope::Module) && !name.starts_with('_');
        self.symbols.push(symbol);
    }

    /// `import a.b, c as d`
    fn collect_plain_import(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            let module = match child.kind() {
                "dotted_name" => Some(node_text(&child, &self.content)),
                "aliased_import" => child
                    .child_by_field_name("name")
                    .map(|n| node_text(&n, &self.content)),
                _ => None,
            };
            if let Some(module) = module {
                self.imports.push(Import {
                    file_path: self.file_path.clone(),
                    module,
                    imported_name: None,
                    is_external: true,
                });
            }
        }
    }

    /// `from .mod import foo, bar as baz` / `from os import path`
    fn collect_from_import(&mut self, node: Node) {
        let Some(module_node) = node.child_by_field_name("module_name") else {
            return;
        };
        let module = node_text(&module_node, &self.content);
        let is_external = !module.starts_with('.');

        // Imported names are the dotted/aliased children after the `import`
        // keyword; the module itself sits before it.
        let mut named = Vec::new();
        let mut seen_import_keyword = false;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "import" {
                seen_import_keyword = true;
                continue;
            }
            if !seen_import_keyword {
                continue;
            }
            match child.kind() {
                "dotted_name" => named.push(node_text(&child, &self.content)),
                "aliased_import" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        named.push(node_text(&name, &self.content));
                    }
                }
                _ => {}
            }
        }

        if named.is_empty() {
            // `from mod import *`
            self.imports.push(Import {
                file_path: self.file_path.clone(),
                module,
                imported_name: None,
                is_external,
            });
        } else {
            for name in named {
                self.imports.push(Import {
                    file_path: self.file_path.clone(),
                    module: module.clone(),
                    imported_name: Some(name),
                    is_external,
                });
            }
        }
    }

    fn field_text(&self, node: Node, field: &str) -> Option<String> {
        node.child_by_field_name(field)
            .map(|n| node_text(&n, &self.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    fn parse_py(content: &str) -> (Vec<Symbol>, Vec<Import>, Vec<Export>) {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .unwrap();
        let tree = parser.parse(content, None).unwrap();
        PythonExtractor::new("test.py", content).extract(&tree)
    }

    #[test]
    fn extracts_functions_and_classes() {
        let src = "def handler(req):\n    return req\n\nclass Service:\n    def run(self):\n        pass\n";
        let (symbols, _, _) = parse_py(src);

        let func = symbols.iter().find(|s| s.name == "handler").unwrap();
        assert_eq!(func.kind, SymbolKind::Function);

        let class = symbols.iter().find(|s| s.name == "Service").unwrap();
        assert_eq!(class.kind, SymbolKind::Class);

        let method = symbols.iter().find(|s| s.name == "run").unwrap();
        assert_eq!(method.kind, SymbolKind::Method);
        assert_eq!(method.parent_symbol_name.as_deref(), Some("Service"));
    }

    #[test]
    fn underscore_names_are_private() {
        let src = "def _helper():\n    pass\n\ndef public():\n    pass\n";
        let (symbols, _, exports) = parse_py(src);

        assert!(!symbols.iter().find(|s| s.name == "_helper").unwrap().is_exported);
        assert!(symbols.iter().find(|s| s.name == "public").unwrap().is_exported);
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].name, "public");
    }

    #[test]
    fn from_imports_record_names() {
        let (_, imports, _) = parse_py("from os.path import join, split\n");
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].module, "os.path");
        assert_eq!(imports[0].imported_name.as_deref(), Some("join"));
        assert!(imports[0].is_external);
    }

    #[test]
    fn relative_imports_are_internal() {
        let (_, imports, _) = parse_py("from .models import User\n");
        assert_eq!(imports.len(), 1);
        assert!(!imports[0].is_external);
        assert_eq!(imports[0].imported_name.as_deref(), Some("User"));
    }

    #[test]
    fn module_level_assignment_is_a_variable() {
        let (symbols, _, _) = parse_py("VERSION = \"1.0\"\n\ndef f():\n    local = 1\n");
        assert!(symbols.iter().any(|s| s.name == "VERSION" && s.kind == SymbolKind::Variable));
        assert!(!symbols.iter().any(|s| s.name == "local"));
    }

    #[test]
    fn decorated_functions_are_extracted() {
        let src = "@cached\ndef compute():\n    return 1\n";
        let (symbols, _, _) = parse_py(src);
        assert!(symbols.iter().any(|s| s.name == "compute" && s.kind == SymbolKind::Function));
    }
}
