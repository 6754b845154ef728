// Base types shared by all language extractors.
//
// Extractors turn a source file into a language-independent ParseResult:
// a flat symbol table with parent links, import/export edges and a
// hierarchical outline. Hierarchy is reconstructed by grouping on
// `parent_symbol_name` within a file; there is no cross-file parentage.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A code symbol (function, class, method, ...) extracted from source code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Symbol {
    /// Unique identifier (ULID).
    pub id: String,
    /// Repo-relative path of the defining file.
    pub file_path: String,
    /// Symbol name as it appears in code.
    pub name: String,
    pub kind: SymbolKind,
    /// Declaration signature, when the language surface has one.
    pub signature: Option<String>,
    /// Encoded span, `"sLine:sCol-eLine:eCol"` (1-based lines, 0-based cols).
    pub location: String,
    /// Name of the enclosing class/interface within the same file.
    pub parent_symbol_name: Option<String>,
    pub is_exported: bool,
}

impl Symbol {
    pub fn new(
        file_path: impl Into<String>,
        name: impl Into<String>,
        kind: SymbolKind,
        location: String,
    ) -> Self {
        Self {
            id: Ulid::new().to_string(),
            file_path: file_path.into(),
            name: name.into(),
            kind,
            signature: None,
            location,
            parent_symbol_name: None,
            is_exported: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Method,
    Interface,
    Type,
    Enum,
    Variable,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::Interface => "interface",
            Self::Type => "type",
            Self::Enum => "enum",
            Self::Variable => "variable",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(Self::Function),
            "class" => Some(Self::Class),
            "method" => Some(Self::Method),
            "interface" => Some(Self::Interface),
            "type" => Some(Self::Type),
            "enum" => Some(Self::Enum),
            "variable" => Some(Self::Variable),
            _ => None,
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An import edge from a file to a module.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Import {
    pub file_path: String,
    /// Module specifier as written in source (`"./a"`, `"react"`, `"os.path"`).
    pub module: String,
    /// The named binding, when the import names one (`foo` in
    /// `import { foo } from "./a"`). None for bare/namespace imports.
    pub imported_name: Option<String>,
    /// True when the module does not resolve inside the repository
    /// (non-relative specifier).
    pub is_external: bool,
}

/// An exported name of a file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Export {
    pub file_path: String,
    pub name: String,
}

/// One node of the hierarchical file outline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutlineNode {
    pub name: String,
    pub kind: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OutlineNode>,
}

/// Language-independent result of parsing one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseResult {
    pub language: String,
    pub symbols: Vec<Symbol>,
    pub imports: Vec<Import>,
    pub exports: Vec<Export>,
    pub outline: Vec<OutlineNode>,
    pub parse_time_ms: u64,
    /// Set when extraction failed; the file is still counted as indexed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl ParseResult {
    /// Empty result for a file that failed to parse.
    pub fn with_error(language: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            diagnostic: Some(diagnostic.into()),
            ..Default::default()
        }
    }

    /// Build the outline by a single grouping pass over `parent_symbol_name`.
    pub fn outline_from_symbols(symbols: &[Symbol]) -> Vec<OutlineNode> {
        let mut children_of: HashMap<&str, Vec<&Symbol>> = HashMap::new();
        let mut roots: Vec<&Symbol> = Vec::new();

        for sym in symbols {
            match sym.parent_symbol_name.as_deref() {
                Some(parent) => children_of.entry(parent).or_default().push(sym),
                None => roots.push(sym),
            }
        }

        fn node(sym: &Symbol, children_of: &HashMap<&str, Vec<&Symbol>>) -> OutlineNode {
            let children = children_of
                .get(sym.name.as_str())
                .map(|kids| kids.iter().map(|k| node(k, children_of)).collect())
                .unwrap_or_default();
            OutlineNode {
                name: sym.name.clone(),
                kind: sym.kind.to_string(),
                location: sym.location.clone(),
                children,
            }
        }

        let empty: HashMap<&str, Vec<&Symbol>> = HashMap::new();
        // Only container kinds adopt children, so a function that happens to
        // share a name with a class cannot steal its methods.
        roots
            .iter()
            .map(|sym| {
                if matches!(sym.kind, SymbolKind::Class | SymbolKind::Interface) {
                    node(sym, &children_of)
                } else {
                    node(sym, &empty)
                }
            })
            .collect()
    }
}

/// Encode a span as `"sLine:sCol-eLine:eCol"`.
pub fn encode_location(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> String {
    format!("{start_line}:{start_col}-{end_line}:{end_col}")
}

/// Decode a span; returns None unless all four fields are non-negative
/// integers with `end_line >= start_line`.
pub fn decode_location(location: &str) -> Option<(u32, u32, u32, u32)> {
    let (start, end) = location.split_once('-')?;
    let (sl, sc) = start.split_once(':')?;
    let (el, ec) = end.split_once(':')?;
    let (sl, sc, el, ec) = (
        sl.parse().ok()?,
        sc.parse().ok()?,
        el.parse().ok()?,
        ec.parse().ok()?,
    );
    if el < sl {
        return None;
    }
    Some((sl, sc, el, ec))
}

/// Span of a tree-sitter node in location encoding. Lines are converted from
/// tree-sitter's 0-based rows to 1-based; columns stay 0-based.
pub fn node_location(node: &tree_sitter::Node) -> String {
    let start = node.start_position();
    let end = node.end_position();
    encode_location(
        start.row as u32 + 1,
        start.column as u32,
        end.row as u32 + 1,
        end.column as u32,
    )
}

/// Text covered by a tree-sitter node.
pub fn node_text(node: &tree_sitter::Node, content: &str) -> String {
    content
        .get(node.start_byte()..node.end_byte())
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_round_trip() {
        let loc = encode_location(3, 0, 10, 1);
        assert_eq!(loc, "3:0-10:1");
        assert_eq!(decode_location(&loc), Some((3, 0, 10, 1)));
    }

    #[test]
    fn location_rejects_inverted_lines() {
        assert_eq!(decode_location("10:0-3:0"), None);
        assert_eq!(decode_location("garbage"), None);
        assert_eq!(decode_location("1:2-3"), None);
    }

    #[test]
    fn outline_groups_methods_under_class() {
        let mut class = Symbol::new("a.ts", "Widget", SymbolKind::Class, "1:0-9:1".into());
        class.is_exported = true;
        let mut method = Symbol::new("a.ts", "render", SymbolKind::Method, "2:2-4:3".into());
        method.parent_symbol_name = Some("Widget".into());
        let func = Symbol::new("a.ts", "helper", SymbolKind::Function, "11:0-12:1".into());

        let outline = ParseResult::outline_from_symbols(&[class, method, func]);
        assert_eq!(outline.len(), 2);
        assert_eq!(outline[0].name, "Widget");
        assert_eq!(outline[0].children.len(), 1);
        assert_eq!(outline[0].children[0].name, "render");
        assert!(outline[1].children.is_empty());
    }

    #[test]
    fn symbol_ids_are_unique() {
        let a = Symbol::new("a.ts", "x", SymbolKind::Variable, "1:0-1:1".into());
        let b = Symbol::new("a.ts", "x", SymbolKind::Variable, "1:0-1:1".into());
        assert_ne!(a.id, b.id);
    }
}
