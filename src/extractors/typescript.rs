// TypeScript / JavaScript extractor
//
// Handles ts, tsx, js and jsx sources (the grammar is chosen by the
// registry). Walks the tree once, tracking the enclosing scope so methods
// get their class as `parent_symbol_name` and export statements mark the
// declarations they wrap.

use tree_sitter::{Node, Tree};

use crate::extractors::base::{
    Export, Import, Symbol, SymbolKind, node_location, node_text,
};

/// Scope passed down the walk; only top-level and class bodies produce
/// symbols for variables, function bodies are recursed for nested
/// declarations but their locals are skipped.
#[derive(Clone, Copy)]
enum Scope<'a> {
    TopLevel,
    Class(&'a str),
    Function,
}

pub struct TypeScriptExtractor {
    file_path: String,
    content: String,
    symbols: Vec<Symbol>,
    imports: Vec<Import>,
    exports: Vec<Export>,
}

impl TypeScriptExtractor {
    pub fn new(file_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            content: content.into(),
            symbols: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
        }
    }

    pub fn extract(mut self, tree: &Tree) -> (Vec<Symbol>, Vec<Import>, Vec<Export>) {
        self.visit(tree.root_node(), Scope::TopLevel, false);

        // Exported declarations become exports alongside the explicit
        // `export { ... }` clauses collected during the walk.
        let declared: Vec<Export> = self
            .symbols
            .iter()
            .filter(|s| s.is_exported && s.parent_symbol_name.is_none())
            .map(|s| Export {
                file_path: self.file_path.clone(),
                name: s.name.clone(),
            })
            .collect();
        for export in declared {
            self.push_export(export.name);
        }

        (self.symbols, self.imports, self.exports)
    }

    fn visit(&mut self, node: Node, scope: Scope, exported: bool) {
        match node.kind() {
            "import_statement" => {
                self.collect_import(node);
                return;
            }
            "export_statement" => {
                self.collect_export_clause(node);
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    self.visit(child, scope, true);
                }
                return;
            }
            "class_declaration" | "abstract_class_declaration" => {
                if let Some(name) = self.field_text(node, "name") {
                    self.push_symbol(node, &name, SymbolKind::Class, scope, exported);
                    if let Some(body) = node.child_by_field_name("body") {
                        let mut cursor = body.walk();
                        for child in body.children(&mut cursor) {
                            self.visit(child, Scope::Class(&name), false);
                        }
                    }
                }
                return;
            }
            "interface_declaration" => {
                if let Some(name) = self.field_text(node, "name") {
                    self.push_symbol(node, &name, SymbolKind::Interface, scope, exported);
                    if let Some(body) = node.child_by_field_name("body") {
                        let mut cursor = body.walk();
                        for child in body.children(&mut cursor) {
                            self.visit(child, Scope::Class(&name), false);
                        }
                    }
                }
                return;
            }
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = self.field_text(node, "name") {
                    self.push_symbol(node, &name, SymbolKind::Function, scope, exported);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit(body, Scope::Function, false);
                }
                return;
            }
            "method_definition" | "method_signature" => {
                if let Some(name) = self.field_text(node, "name") {
                    self.push_symbol(node, &name, SymbolKind::Method, scope, false);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit(body, Scope::Function, false);
                }
                return;
            }
            "type_alias_declaration" => {
                if let Some(name) = self.field_text(node, "name") {
                    self.push_symbol(node, &name, SymbolKind::Type, scope, exported);
                }
                return;
            }
            "enum_declaration" => {
                if let Some(name) = self.field_text(node, "name") {
                    self.push_symbol(node, &name, SymbolKind::Enum, scope, exported);
                }
                return;
            }
            "variable_declarator" => {
                // `const f = () => {}` counts as a function; plain bindings
                // are variables. Locals inside function bodies are skipped.
                if let Some(name) = self.field_text(node, "name") {
                    let is_function_value = node
                        .child_by_field_name("value")
                        .map(|v| {
                            matches!(
                                v.kind(),
                                "arrow_function" | "function_expression" | "function"
                            )
                        })
                        .unwrap_or(false);
                    let kind = if is_function_value {
                        SymbolKind::Function
                    } else {
                        SymbolKind::Variable
                    };
                    if matches!(scope, Scope::TopLevel) || is_function_value {
                        self.push_symbol(node, &name, kind, scope, exported);
                    }
                }
                if let Some(value) = node.child_by_field_name("value") {
                    self.visit(value, Scope::Function, false);
                }
                return;
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child, scope, exported);
        }
    }

    fn push_symbol(
        &mut self,
        node: Node,
        name: &str,
        kind: SymbolKind,
        scope: Scope,
        exported: bool,
    ) {
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
        symbol.is_exported = exported;
        self.symbols.push(symbol);
    }

    /// `import d, { a, b as c } from "./m"` and friends.
    fn collect_import(&mut self, node: Node) {
        let Some(module) = self.field_text(node, "source").map(strip_quotes) else {
            return;
        };
        let is_external = is_external_module(&module);

        let mut named = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "import_clause" {
                continue;
            }
            let mut clause_cursor = child.walk();
            for part in child.children(&mut clause_cursor) {
                match part.kind() {
                    // Default import binds one name.
                    "identifier" => named.push(node_text(&part, &self.content)),
                    "named_imports" => {
                        let mut spec_cursor = part.walk();
                        for spec in part.children(&mut spec_cursor) {
                            if spec.kind() == "import_specifier" {
                                if let Some(name) = self.field_text(spec, "name") {
                                    named.push(name);
                                }
                            }
                        }
                    }
                    // `* as ns` imports the whole module, no single name.
                    "namespace_import" => {}
                    _ => {}
                }
            }
        }

        if named.is_empty() {
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

    /// `export { a, b as c }`, optionally re-exported `from "./m"`.
    fn collect_export_clause(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "export_clause" {
                continue;
            }
            let mut spec_cursor = child.walk();
            for spec in child.children(&mut spec_cursor) {
                if spec.kind() == "export_specifier" {
                    let name = self
                        .field_text(spec, "alias")
                        .or_else(|| self.field_text(spec, "name"));
                    if let Some(name) = name {
                        self.push_export(name);
                    }
                }
            }
        }
    }

    fn push_export(&mut self, name: String) {
        if !self.exports.iter().any(|e| e.name == name) {
            self.exports.push(Export {
                file_path: self.file_path.clone(),
                name,
            });
        }
    }

    fn field_text(&self, node: Node, field: &str) -> Option<String> {
        node.child_by_field_name(field)
            .map(|n| node_text(&n, &self.content))
    }
}

fn strip_quotes(s: String) -> String {
    s.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}

fn is_external_module(module: &str) -> bool {
    !(module.starts_with("./") || module.starts_with("../") || module.starts_with('/'))
}

/// Declaration head: the node text up to the body brace, single line,
/// bounded length.
pub(crate) fn signature_of(text: &str) -> String {
    let head = text.split('{').next().unwrap_or(text);
    let line = head.lines().next().unwrap_or(head).trim();
    let mut sig: String = line.chars().take(160).collect();
    if sig.is_empty() {
        sig = text.chars().take(60).collect();
    }
    sig
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    fn parse_ts(content: &str) -> (Vec<Symbol>, Vec<Import>, Vec<Export>) {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
            .unwrap();
        let tree = parser.parse(content, None).unwrap();
        TypeScriptExtractor::new("test.ts", content).extract(&tree)
    }

    #[test]
    fn extracts_exported_function() {
        let (symbols, _, exports) = parse_ts("export function foo(a: number): number { return a; }");
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "foo");
        assert_eq!(symbols[0].kind, SymbolKind::Function);
        assert!(symbols[0].is_exported);
        assert!(exports.iter().any(|e| e.name == "foo"));
    }

    #[test]
    fn methods_carry_their_class_as_parent() {
        let src = r#"
export class Widget {
    render(): string { return "x"; }
}
"#;
        let (symbols, _, _) = parse_ts(src);
        let class = symbols.iter().find(|s| s.name == "Widget").unwrap();
        assert_eq!(class.kind, SymbolKind::Class);
        let method = symbols.iter().find(|s| s.name == "render").unwrap();
        assert_eq!(method.kind, SymbolKind::Method);
        assert_eq!(method.parent_symbol_name.as_deref(), Some("Widget"));
    }

    #[test]
    fn interface_members_parent_to_interface() {
        let src = "interface Store { get(key: string): string; }";
        let (symbols, _, _) = parse_ts(src);
        let iface = symbols.iter().find(|s| s.name == "Store").unwrap();
        assert_eq!(iface.kind, SymbolKind::Interface);
        let get = symbols.iter().find(|s| s.name == "get").unwrap();
        assert_eq!(get.parent_symbol_name.as_deref(), Some("Store"));
    }

    #[test]
    fn named_imports_record_module_and_name() {
        let (_, imports, _) = parse_ts("import { foo, bar } from \"./a\";");
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].module, "./a");
        assert_eq!(imports[0].imported_name.as_deref(), Some("foo"));
        assert!(!imports[0].is_external);
    }

    #[test]
    fn package_imports_are_external() {
        let (_, imports, _) = parse_ts("import { useState } from \"react\";");
        assert_eq!(imports.len(), 1);
        assert!(imports[0].is_external);
    }

    #[test]
    fn arrow_function_binding_is_a_function() {
        let (symbols, _, _) = parse_ts("export const handler = (req: Request) => req;");
        let sym = symbols.iter().find(|s| s.name == "handler").unwrap();
        assert_eq!(sym.kind, SymbolKind::Function);
        assert!(sym.is_exported);
    }

    #[test]
    fn export_clause_names_are_collected() {
        let src = "function a() {}\nfunction b() {}\nexport { a, b };";
        let (_, _, exports) = parse_ts(src);
        let names: Vec<_> = exports.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"a"));
        assert!(names.contains(&"b"));
    }

    #[test]
    fn locations_are_one_based_and_ordered() {
        let (symbols, _, _) = parse_ts("function f() {\n  return 1;\n}");
        let loc = crate::extractors::base::decode_location(&symbols[0].location).unwrap();
        assert_eq!(loc.0, 1);
        assert!(loc.2 >= loc.0);
    }

    #[test]
    fn type_and_enum_declarations() {
        let src = "export type Id = string;\nexport enum Color { Red, Green }";
        let (symbols, _, _) = parse_ts(src);
        assert!(symbols.iter().any(|s| s.name == "Id" && s.kind == SymbolKind::Type));
        assert!(symbols.iter().any(|s| s.name == "Color" && s.kind == SymbolKind::Enum));
    }
}
