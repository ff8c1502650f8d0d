use std::path::Path;

use codegraph_core::{ChunkMetadata, Chunker, CodeChunk, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use tree_sitter::{Node, Parser as TsParser};

const DEFAULT_CHUNK_TOKENS: usize = 512;
const DEFAULT_OVERLAP_TOKENS: usize = 50;
const CHARS_PER_TOKEN_ESTIMATE: usize = 4;

fn module_name_for_path(path: &str) -> String {
    let normalized = path.trim_start_matches("./");
    match normalized.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').next().unwrap_or("_root").to_string(),
        None => "_root".to_string(),
    }
}

fn chunk_id(file_path: &str, start_line: u32, end_line: u32, chunk_type: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_path.as_bytes());
    hasher.update(start_line.to_le_bytes());
    hasher.update(end_line.to_le_bytes());
    hasher.update(chunk_type.as_bytes());
    format!("{:x}", hasher.finalize())[..24].to_string()
}

/// Splits text into chunks bounded by a token budget, preserving a
/// trailing-line overlap between consecutive chunks. Uses a real BPE
/// tokenizer when one was loaded at construction time, falling back to
/// a 4-chars-per-token estimate otherwise — same fallback the
/// reference implementation uses when its tokenizer fails to load.
pub struct TokenChunker {
    chunk_tokens: usize,
    overlap_tokens: usize,
    tokenizer: Option<tokenizers::Tokenizer>,
}

impl TokenChunker {
    pub fn new() -> Self {
        Self {
            chunk_tokens: DEFAULT_CHUNK_TOKENS,
            overlap_tokens: DEFAULT_OVERLAP_TOKENS,
            tokenizer: None,
        }
    }

    pub fn with_tokenizer_file(path: &Path) -> Self {
        let tokenizer = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| warn!("failed to load tokenizer at {path:?}, using char estimate: {e}"))
            .ok();
        Self {
            chunk_tokens: DEFAULT_CHUNK_TOKENS,
            overlap_tokens: DEFAULT_OVERLAP_TOKENS,
            tokenizer,
        }
    }

    fn estimate_tokens(&self, text: &str) -> usize {
        match &self.tokenizer {
            Some(tok) => tok
                .encode(text, false)
                .map(|enc| enc.get_ids().len())
                .unwrap_or_else(|_| text.len().div_ceil(CHARS_PER_TOKEN_ESTIMATE)),
            None => text.len().div_ceil(CHARS_PER_TOKEN_ESTIMATE).max(1),
        }
    }
}

impl Default for TokenChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker for TokenChunker {
    fn chunk_file(&self, path: &str, content: &str) -> Result<Vec<CodeChunk>> {
        if content.is_empty() {
            return Ok(Vec::new());
        }

        let file_name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string());
        let module = module_name_for_path(path);

        let lines: Vec<&str> = content.lines().collect();
        let mut chunks = Vec::new();
        let mut current: Vec<(u32, &str)> = Vec::new();
        let mut current_tokens = 0usize;

        for (idx, line) in lines.iter().enumerate() {
            let line_no = (idx + 1) as u32;
            let line_tokens = self.estimate_tokens(line);

            if current_tokens + line_tokens > self.chunk_tokens && !current.is_empty() {
                chunks.push(self.build_chunk(path, &file_name, &module, &current));

                let mut overlap: Vec<(u32, &str)> = Vec::new();
                let mut overlap_tokens = 0usize;
                for &(ln, text) in current.iter().rev() {
                    let t = self.estimate_tokens(text);
                    if overlap_tokens + t > self.overlap_tokens {
                        break;
                    }
                    overlap_tokens += t;
                    overlap.push((ln, text));
                }
                overlap.reverse();
                current_tokens = overlap_tokens;
                current = overlap;
            }

            current.push((line_no, line));
            current_tokens += line_tokens;
        }

        if !current.is_empty() {
            chunks.push(self.build_chunk(path, &file_name, &module, &current));
        }

        Ok(chunks)
    }
}

impl TokenChunker {
    fn build_chunk(
        &self,
        path: &str,
        file_name: &str,
        module: &str,
        lines: &[(u32, &str)],
    ) -> CodeChunk {
        let start_line = lines.first().map(|(n, _)| *n).unwrap_or(1);
        let end_line = lines.last().map(|(n, _)| *n).unwrap_or(start_line);
        let text = lines.iter().map(|(_, t)| *t).collect::<Vec<_>>().join("\n");
        let chunk_tokens = self.estimate_tokens(&text) as u32;

        CodeChunk {
            id: chunk_id(path, start_line, end_line, "token_bounded"),
            text,
            metadata: ChunkMetadata {
                file_path: path.to_string(),
                file_name: file_name.to_string(),
                module: module.to_string(),
                start_line,
                end_line,
                chunk_type: "token_bounded".to_string(),
                function_name: None,
                chunk_tokens,
            },
        }
    }
}

/// Splits text along AST boundaries: one chunk per top-level function,
/// struct, enum, declaration, preprocessor definition, and the file's
/// leading comment block (if any). Falls back to an empty result (the
/// caller is expected to retry with `TokenChunker`) when the file has
/// no top-level constructs tree-sitter recognizes, or isn't valid
/// enough to parse at all.
pub struct SemanticChunker {
    language: tree_sitter::Language,
    token_fallback: TokenChunker,
}

impl SemanticChunker {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_c::LANGUAGE.into(),
            token_fallback: TokenChunker::new(),
        }
    }

    fn make_parser(&self) -> TsParser {
        let mut parser = TsParser::new();
        parser
            .set_language(&self.language)
            .expect("tree-sitter-c language is compatible with this tree-sitter runtime");
        parser
    }
}

impl Default for SemanticChunker {
    fn default() -> Self {
        Self::new()
    }
}

const TOP_LEVEL_KINDS: &[&str] = &[
    "function_definition",
    "struct_specifier",
    "enum_specifier",
    "declaration",
    "preproc_def",
    "preproc_function_def",
    "type_definition",
];

impl Chunker for SemanticChunker {
    fn chunk_file(&self, path: &str, content: &str) -> Result<Vec<CodeChunk>> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut parser = self.make_parser();
        let Some(tree) = parser.parse(content, None) else {
            debug!("tree-sitter produced no tree for {path}, falling back to token chunking");
            return self.token_fallback.chunk_file(path, content);
        };

        let file_name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string());
        let module = module_name_for_path(path);

        let mut chunks = Vec::new();
        let mut cursor = tree.root_node().walk();
        let mut first_child = true;

        for child in tree.root_node().children(&mut cursor) {
            let is_leading_comment = first_child && child.kind() == "comment";
            first_child = false;

            if !is_leading_comment && !TOP_LEVEL_KINDS.contains(&child.kind()) {
                continue;
            }

            if let Some(chunk) = self.build_semantic_chunk(child, content, path, &file_name, &module) {
                chunks.push(chunk);
            }
        }

        if chunks.is_empty() {
            debug!("no semantic chunks found in {path}, falling back to token chunking");
            return self.token_fallback.chunk_file(path, content);
        }

        Ok(chunks)
    }
}

impl SemanticChunker {
    fn build_semantic_chunk(
        &self,
        node: Node,
        content: &str,
        path: &str,
        file_name: &str,
        module: &str,
    ) -> Option<CodeChunk> {
        let text = node.utf8_text(content.as_bytes()).ok()?.to_string();
        if text.trim().is_empty() {
            return None;
        }

        let start_line = (node.start_position().row + 1) as u32;
        let end_line = (node.end_position().row + 1) as u32;
        let chunk_type = self.specific_kind(node);
        let function_name = if chunk_type == "function_definition" {
            self.declarator_name(node, content)
        } else {
            None
        };

        Some(CodeChunk {
            id: chunk_id(path, start_line, end_line, &chunk_type),
            text: text.clone(),
            metadata: ChunkMetadata {
                file_path: path.to_string(),
                file_name: file_name.to_string(),
                module: module.to_string(),
                start_line,
                end_line,
                chunk_type,
                function_name,
                chunk_tokens: (text.len().div_ceil(CHARS_PER_TOKEN_ESTIMATE)) as u32,
            },
        })
    }

    /// A top-level `declaration` often just wraps a `struct_specifier`
    /// or `enum_specifier` (e.g. `struct foo { ... };`) — report the
    /// wrapped kind so chunk_type reflects what the declaration actually
    /// introduces rather than the generic wrapper node.
    fn specific_kind(&self, node: Node) -> String {
        if node.kind() == "declaration" {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "struct_specifier" || child.kind() == "enum_specifier" {
                    return child.kind().to_string();
                }
            }
        }
        node.kind().to_string()
    }

    fn declarator_name(&self, node: Node, content: &str) -> Option<String> {
        let declarator = node.child_by_field_name("declarator")?;
        find_identifier(declarator, content)
    }
}

fn find_identifier(node: Node, content: &str) -> Option<String> {
    if node.kind() == "identifier" {
        return node.utf8_text(content.as_bytes()).ok().map(|s| s.to_string());
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = find_identifier(child, content) {
            return Some(found);
        }
    }
    None
}

/// The orchestrator's chunker: semantic first, falling back to
/// token-bounded chunking when the file yields no semantic chunks.
pub struct CChunker {
    semantic: SemanticChunker,
    token: TokenChunker,
}

impl CChunker {
    pub fn new() -> Self {
        Self {
            semantic: SemanticChunker::new(),
            token: TokenChunker::new(),
        }
    }
}

impl Default for CChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker for CChunker {
    fn chunk_file(&self, path: &str, content: &str) -> Result<Vec<CodeChunk>> {
        let semantic_chunks = self.semantic.chunk_file(path, content)?;
        if !semantic_chunks.is_empty() {
            return Ok(semantic_chunks);
        }
        self.token.chunk_file(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_chunker_single_chunk_for_short_file() {
        let chunker = TokenChunker::new();
        let content = "int main(void) { return 0; }\n";
        let chunks = chunker.chunk_file("main.c", content).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.start_line, 1);
    }

    #[test]
    fn token_chunker_splits_long_file_with_overlap() {
        let chunker = TokenChunker::new();
        let line = "int x = 1; /* padding padding padding padding */\n".repeat(200);
        let chunks = chunker.chunk_file("big.c", &line).unwrap();
        assert!(chunks.len() > 1);
        // consecutive chunks overlap: second chunk's first line number is
        // <= first chunk's last line number.
        assert!(chunks[1].metadata.start_line <= chunks[0].metadata.end_line);
    }

    #[test]
    fn token_chunker_empty_file_yields_no_chunks() {
        let chunker = TokenChunker::new();
        assert!(chunker.chunk_file("empty.c", "").unwrap().is_empty());
    }

    #[test]
    fn semantic_chunker_splits_function_and_struct() {
        let chunker = SemanticChunker::new();
        let src = "struct point { int x; int y; };\n\nint add(int a, int b) {\n    return a + b;\n}\n";
        let chunks = chunker.chunk_file("shapes.c", src).unwrap();
        assert!(chunks.iter().any(|c| c.metadata.chunk_type == "struct_specifier"));
        let func = chunks
            .iter()
            .find(|c| c.metadata.chunk_type == "function_definition")
            .unwrap();
        assert_eq!(func.metadata.function_name.as_deref(), Some("add"));
    }

    #[test]
    fn semantic_chunker_falls_back_when_nothing_top_level() {
        let chunker = SemanticChunker::new();
        // A bare expression statement has no top-level construct this
        // chunker recognizes, so it should fall back to token chunking.
        let src = "1 + 1;\n";
        let chunks = chunker.chunk_file("weird.c", src).unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.metadata.chunk_type == "token_bounded"));
    }

    #[test]
    fn combined_chunker_prefers_semantic() {
        let chunker = CChunker::new();
        let src = "int helper(void) { return 1; }\n";
        let chunks = chunker.chunk_file("h.c", src).unwrap();
        assert_eq!(chunks[0].metadata.chunk_type, "function_definition");
    }
}
