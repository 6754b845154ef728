// Language extractors
//
// A stateless registry dispatches files to the per-language extractors and
// assembles the language-independent ParseResult consumed by the cache and
// the indexer.

pub mod base;
pub mod markdown;
pub mod python;
pub mod typescript;

use std::path::Path;
use std::time::Instant;

use tree_sitter::Parser;

use crate::errors::Result;
pub use base::{
    Export, Import, OutlineNode, ParseResult, Symbol, SymbolKind, decode_location,
    encode_location,
};
use markdown::MarkdownExtractor;
use python::PythonExtractor;
use typescript::TypeScriptExtractor;

/// Registry of parser backends keyed by language.
#[derive(Default)]
pub struct ParserRegistry;

impl ParserRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn supported_languages() -> &'static [&'static str] {
        &["typescript", "tsx", "javascript", "jsx", "python", "markdown"]
    }

    /// Map a path to its language by extension.
    pub fn language_for_path(path: &Path) -> Option<&'static str> {
        match path.extension().and_then(|e| e.to_str())? {
            "ts" => Some("typescript"),
            "tsx" => Some("tsx"),
            "js" => Some("javascript"),
            "jsx" => Some("jsx"),
            "py" => Some("python"),
            "md" => Some("markdown"),
            _ => None,
        }
    }

    /// Parse one file into a ParseResult.
    ///
    /// Extraction failures never propagate: they yield an empty result with a
    /// diagnostic so the file is still indexed (and cached) without symbols.
    /// Only real I/O belongs to the caller; this function works on content
    /// already in memory.
    pub fn parse(&self, file_path: &str, content: &str, language: &str) -> Result<ParseResult> {
        let started = Instant::now();

        let mut result = match language {
            "markdown" => ParseResult {
                language: language.to_string(),
                outline: MarkdownExtractor::outline(content),
                ..Default::default()
            },
            "typescript" | "tsx" | "javascript" | "jsx" => {
                match self.parse_tree(language, content) {
                    Ok(tree) => {
                        let (symbols, imports, exports) =
                            TypeScriptExtractor::new(file_path, content).extract(&tree);
                        let outline = ParseResult::outline_from_symbols(&symbols);
                        ParseResult {
                            language: language.to_string(),
                            symbols,
                            imports,
                            exports,
                            outline,
                            ..Default::default()
                        }
                    }
                    Err(diag) => ParseResult::with_error(language, diag),
                }
            }
            "python" => match self.parse_tree(language, content) {
                Ok(tree) => {
                    let (symbols, imports, exports) =
                        PythonExtractor::new(file_path, content).extract(&tree);
                    let outline = ParseResult::outline_from_symbols(&symbols);
                    ParseResult {
                        language: language.to_string(),
                        symbols,
                        imports,
                        exports,
                        outline,
                        ..Default::default()
                    }
                }
                Err(diag) => ParseResult::with_error(language, diag),
            },
            other => ParseResult::with_error(other, format!("unsupported language: {other}")),
        };

        result.parse_time_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }

    fn parse_tree(
        &self,
        language: &str,
        content: &str,
    ) -> std::result::Result<tree_sitter::Tree, String> {
        let grammar: tree_sitter::Language = match language {
            "typescript" => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            "tsx" => tree_sitter_typescript::LANGUAGE_TSX.into(),
            "javascript" | "jsx" => tree_sitter_javascript::LANGUAGE.into(),
            "python" => tree_sitter_python::LANGUAGE.into(),
            other => return Err(format!("no grammar for language: {other}")),
        };

        let mut parser = Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| format!("failed to load {language} grammar: {e}"))?;
        parser
            .parse(content, None)
            .ok_or_else(|| format!("{language} parser produced no tree"))
    }
}
