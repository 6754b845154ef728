// Markdown outline extractor
//
// Markdown files carry no symbols or imports; headings become the
// hierarchical outline so documentation still participates in navigation,
// BM25 and semantic search. Fenced code blocks are skipped so a `# comment`
// inside a shell snippet is not mistaken for a heading.

use regex::Regex;

use crate::extractors::base::{OutlineNode, encode_location};

pub struct MarkdownExtractor;

impl MarkdownExtractor {
    pub fn outline(content: &str) -> Vec<OutlineNode> {
        let heading = Regex::new(r"^(#{1,6})\s+(.+?)\s*$").expect("static heading pattern");

        // (level, node) stack; nodes pop into their parent's children.
        let mut stack: Vec<(usize, OutlineNode)> = Vec::new();
        let mut roots: Vec<OutlineNode> = Vec::new();
        let mut in_fence = false;

        for (idx, line) in content.lines().enumerate() {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
            let Some(caps) = heading.captures(line) else {
                continue;
            };

            let level = caps[1].len();
            let line_no = idx as u32 + 1;
            let node = OutlineNode {
                name: caps[2].to_string(),
                kind: format!("h{level}"),
                location: encode_location(line_no, 0, line_no, line.len() as u32),
                children: Vec::new(),
            };

            while let Some((top_level, _)) = stack.last() {
                if *top_level >= level {
                    let (_, done) = stack.pop().expect("checked non-empty");
                    attach(&mut stack, &mut roots, done);
                } else {
                    break;
                }
            }
            stack.push((level, node));
        }

        while let Some((_, done)) = stack.pop() {
            attach(&mut stack, &mut roots, done);
        }
        roots
    }
}

fn attach(stack: &mut [(usize, OutlineNode)], roots: &mut Vec<OutlineNode>, node: OutlineNode) {
    match stack.last_mut() {
        Some((_, parent)) => parent.children.push(node),
        None => roots.push(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nests_headings_by_level() {
        let md = "# Title\n\nintro\n\n## Setup\n\n### Linux\n\n## Usage\n";
        let outline = MarkdownExtractor::outline(md);

        assert_eq!(outline.len(), 1);
        assert_eq!(outline[0].name, "Title");
        assert_eq!(outline[0].children.len(), 2);
        assert_eq!(outline[0].children[0].name, "Setup");
        assert_eq!(outline[0].children[0].children[0].name, "Linux");
        assert_eq!(outline[0].children[1].name, "Usage");
    }

    #[test]
    fn ignores_hashes_inside_code_fences() {
        let md = "# Real\n\n```sh\n# not a heading\n```\n";
        let outline = MarkdownExtractor::outline(md);
        assert_eq!(outline.len(), 1);
        assert_eq!(outline[0].name, "Real");
        assert!(outline[0].children.is_empty());
    }

    #[test]
    fn sibling_after_deeper_heading_pops_back() {
        let md = "## A\n### A1\n## B\n";
        let outline = MarkdownExtractor::outline(md);
        assert_eq!(outline.len(), 2);
        assert_eq!(outline[0].children.len(), 1);
    }

    #[test]
    fn empty_document_yields_empty_outline() {
        assert!(MarkdownExtractor::outline("").is_empty());
    }
}
