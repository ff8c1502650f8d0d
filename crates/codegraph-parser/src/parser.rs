use std::fs;
use std::path::Path;

use async_trait::async_trait;
use codegraph_core::{
    CallType, CodeGraphError, CodeParser, FileDependency, FileInfo, Function, FunctionCall,
    ParsedCode, Result,
};
use tracing::{debug, warn};
use tree_sitter::{Node, Parser as TsParser, Query, QueryCursor, StreamingIterator, Tree};

use crate::includes::extract_file_dependencies as extract_includes;

const FUNCTION_QUERY: &str = "(function_definition) @func";
const FALLBACK_FUNCTION_QUERY: &str = "(function_definition declarator: (_) @decl) @func";
const CALL_QUERY: &str = "(call_expression) @call";
const MAX_COMMENT_HOPS: usize = 15;

/// Tree-sitter–driven C parser. One instance compiles its queries once
/// and is cheap to clone (the compiled `Query`s and `Language` handle
/// are reference-counted internally by tree-sitter).
pub struct CParser {
    language: tree_sitter::Language,
    function_query: Query,
    fallback_function_query: Query,
    call_query: Query,
}

impl Default for CParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CParser {
    pub fn new() -> Self {
        let language: tree_sitter::Language = tree_sitter_c::LANGUAGE.into();
        let function_query = Query::new(&language, FUNCTION_QUERY)
            .expect("FUNCTION_QUERY is a valid tree-sitter-c query");
        let fallback_function_query = Query::new(&language, FALLBACK_FUNCTION_QUERY)
            .expect("FALLBACK_FUNCTION_QUERY is a valid tree-sitter-c query");
        let call_query =
            Query::new(&language, CALL_QUERY).expect("CALL_QUERY is a valid tree-sitter-c query");
        Self {
            language,
            function_query,
            fallback_function_query,
            call_query,
        }
    }

    fn make_ts_parser(&self) -> TsParser {
        let mut parser = TsParser::new();
        parser
            .set_language(&self.language)
            .expect("tree-sitter-c language is compatible with this tree-sitter runtime");
        parser
    }

    /// Parses `content` (the text of `file_path`) into functions and
    /// calls. Tolerant of malformed C: tree-sitter always produces a
    /// best-effort tree, so this never fails on syntax errors alone.
    pub fn parse_source(&self, file_path: &str, content: &str) -> Result<(Vec<Function>, Vec<FunctionCall>)> {
        let mut ts_parser = self.make_ts_parser();
        let tree = ts_parser
            .parse(content, None)
            .ok_or_else(|| CodeGraphError::Parse(format!("tree-sitter produced no tree for {file_path}")))?;

        let functions = self.extract_functions(&tree, content, file_path);
        let calls = self.extract_calls(&tree, content, file_path, &functions);
        Ok((functions, calls))
    }

    fn extract_functions(&self, tree: &Tree, content: &str, file_path: &str) -> Vec<Function> {
        let mut functions = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.function_query, tree.root_node(), content.as_bytes());

        while let Some(m) = matches.next() {
            for capture in m.captures {
                let node = capture.node;
                if node.kind() != "function_definition" {
                    continue;
                }
                match self.build_function(node, content, file_path) {
                    Some(func) => functions.push(func),
                    None => {
                        // Primary declarator walk failed (e.g. an unusual
                        // macro-wrapped signature). Fall back to a looser
                        // query that only needs *a* declarator child.
                        if let Some(func) = self.build_function_fallback(node, content, file_path) {
                            functions.push(func);
                        } else {
                            warn!(
                                "could not determine function name for node at {}:{}",
                                file_path,
                                node.start_position().row + 1
                            );
                        }
                    }
                }
            }
        }

        functions
    }

    fn build_function(&self, node: Node, content: &str, file_path: &str) -> Option<Function> {
        let declarator = node.child_by_field_name("declarator")?;
        let name = innermost_identifier(declarator, content)?;

        let parameters = declarator
            .child_by_field_name("parameters")
            .map(|p| normalize_parameters(node_text(p, content)))
            .unwrap_or_default();

        let return_type = node
            .child_by_field_name("type")
            .map(|t| node_text(t, content).trim().to_string())
            .unwrap_or_else(|| "void".to_string());

        let docstring = leading_comment(node, content);
        let start_line = (node.start_position().row + 1) as u32;
        let end_line = (node.end_position().row + 1) as u32;
        let code = node_text(node, content).to_string();

        let mut function = Function::new(name, file_path, start_line, end_line, code).ok()?;
        function.parameters = parameters;
        function.return_type = return_type;
        function.docstring = docstring;
        Some(function)
    }

    /// Looser extraction path used when [`build_function`] can't recover
    /// a declarator: grabs whatever the fallback query's `@decl` capture
    /// points at and looks for the first identifier under it.
    fn build_function_fallback(&self, node: Node, content: &str, file_path: &str) -> Option<Function> {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.fallback_function_query, node, content.as_bytes());
        let mut name = None;
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let capture_name = self.fallback_function_query.capture_names()[capture.index as usize];
                if capture_name == "decl" {
                    name = first_identifier_in_subtree(capture.node, content);
                }
            }
        }
        let name = name?;
        let start_line = (node.start_position().row + 1) as u32;
        let end_line = (node.end_position().row + 1) as u32;
        let code = node_text(node, content).to_string();
        Function::new(name, file_path, start_line, end_line, code).ok()
    }

    fn extract_calls(
        &self,
        tree: &Tree,
        content: &str,
        file_path: &str,
        functions: &[Function],
    ) -> Vec<FunctionCall> {
        let mut calls = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.call_query, tree.root_node(), content.as_bytes());

        while let Some(m) = matches.next() {
            for capture in m.captures {
                let call_node = capture.node;
                if call_node.kind() != "call_expression" {
                    continue;
                }
                if let Some(call) = self.build_call(call_node, content, file_path, functions) {
                    calls.push(call);
                }
            }
        }

        calls
    }

    fn build_call(
        &self,
        call_node: Node,
        content: &str,
        file_path: &str,
        functions: &[Function],
    ) -> Option<FunctionCall> {
        let caller_node = enclosing_function(call_node)?;
        let caller_declarator = caller_node.child_by_field_name("declarator")?;
        let caller_name = innermost_identifier(caller_declarator, content)?;

        // Only attribute the call if its caller is actually one of the
        // functions extracted from this file (guards against the
        // fallback-extracted caller being a sibling macro body rather
        // than a real function).
        if !functions
            .iter()
            .any(|f| f.name == caller_name && f.file_path == file_path)
        {
            debug!("skipping call inside untracked function {caller_name}");
            return None;
        }

        let function_child = call_node.child_by_field_name("function")?;
        let (callee, call_type) = classify_call(function_child, content, &caller_name)?;

        let context = leading_comment(call_node, content);
        let line_number = (call_node.start_position().row + 1) as u32;

        Some(FunctionCall {
            caller: caller_name,
            caller_file: file_path.to_string(),
            callee,
            call_type,
            line_number,
            context,
        })
    }
}

impl CParser {
    /// Synchronous core of [`CodeParser::parse_file`]. No `.await` point
    /// is ever hit by the trait method (parsing is pure CPU + local file
    /// I/O), so this is exposed directly for callers — like the rayon
    /// file-collection helper below — that are already off the async
    /// runtime and would rather not pull in an executor just to poll a
    /// future that resolves immediately.
    pub fn parse_file_sync(&self, path: &str) -> Result<ParsedCode> {
        let content = fs::read_to_string(path)
            .map_err(|e| CodeGraphError::Parse(format!("failed to read {path}: {e}")))?;
        let metadata = fs::metadata(path).ok();
        let size = metadata.as_ref().map(|m| m.len()).unwrap_or(0);
        let last_modified = metadata
            .and_then(|m| m.modified().ok())
            .map(chrono::DateTime::<chrono::Utc>::from)
            .unwrap_or_else(chrono::Utc::now);

        let (functions, calls) = self.parse_source(path, &content)?;
        let includes = extract_includes(path, &content)
            .into_iter()
            .map(|d| d.target_path)
            .collect();

        let name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string());

        Ok(ParsedCode {
            file_info: FileInfo {
                path: path.to_string(),
                name,
                size,
                last_modified,
                includes,
            },
            functions,
            calls,
        })
    }

    pub fn extract_file_dependencies_sync(&self, path: &str) -> Result<Vec<FileDependency>> {
        let content = fs::read_to_string(path)
            .map_err(|e| CodeGraphError::Parse(format!("failed to read {path}: {e}")))?;
        Ok(extract_includes(path, &content))
    }
}

#[async_trait]
impl CodeParser for CParser {
    async fn parse_file(&self, path: &str) -> Result<ParsedCode> {
        self.parse_file_sync(path)
    }

    async fn extract_file_dependencies(&self, path: &str) -> Result<Vec<FileDependency>> {
        self.extract_file_dependencies_sync(path)
    }
}

fn node_text<'a>(node: Node, content: &'a str) -> &'a str {
    node.utf8_text(content.as_bytes()).unwrap_or("")
}

/// Recursively descends a declarator subtree to recover the innermost
/// identifier, tolerating pointer (`*name`), array (`name[...]`), and
/// nested/parenthesized declarators.
fn innermost_identifier(node: Node, content: &str) -> Option<String> {
    match node.kind() {
        "identifier" | "field_identifier" => Some(node_text(node, content).to_string()),
        "function_declarator" | "pointer_declarator" | "array_declarator" | "parenthesized_declarator" => {
            let inner = node.child_by_field_name("declarator").or_else(|| {
                // parenthesized_declarator has no named field; its sole
                // child is the nested declarator.
                (0..node.child_count())
                    .filter_map(|i| node.child(i))
                    .find(|c| c.is_named())
            })?;
            innermost_identifier(inner, content)
        }
        _ => {
            // Last resort: search named children depth-first for the
            // first identifier-shaped node.
            for i in 0..node.child_count() {
                if let Some(child) = node.child(i) {
                    if child.is_named() {
                        if let Some(found) = innermost_identifier(child, content) {
                            return Some(found);
                        }
                    }
                }
            }
            None
        }
    }
}

fn first_identifier_in_subtree(node: Node, content: &str) -> Option<String> {
    if node.kind() == "identifier" {
        return Some(node_text(node, content).to_string());
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_identifier_in_subtree(child, content) {
            return Some(found);
        }
    }
    None
}

/// Normalizes a parameter-list node's text: collapses whitespace and
/// splits on top-level commas, treating a sole `void` specially.
fn normalize_parameters(raw: &str) -> Vec<String> {
    let trimmed = raw.trim().trim_start_matches('(').trim_end_matches(')').trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed == "void" {
        return vec!["void".to_string()];
    }

    let mut params = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for ch in trimmed.chars() {
        match ch {
            '(' | '[' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => {
                let normalized = collapse_whitespace(&current);
                if !normalized.is_empty() {
                    params.push(normalized);
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    let normalized = collapse_whitespace(&current);
    if !normalized.is_empty() {
        params.push(normalized);
    }
    params
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Walks backward across unnamed siblings (whitespace, stray tokens)
/// looking for a comment block immediately preceding `node`. Stops at
/// any other named construct or after `MAX_COMMENT_HOPS` hops.
fn leading_comment(node: Node, content: &str) -> Option<String> {
    let mut sibling = node.prev_sibling();
    let mut hops = 0;
    let mut comment_text = None;

    while let Some(s) = sibling {
        hops += 1;
        if hops > MAX_COMMENT_HOPS {
            break;
        }
        if s.kind() == "comment" {
            comment_text = Some(node_text(s, content).to_string());
            break;
        }
        if s.is_named() {
            // Hit another real construct before finding a comment.
            break;
        }
        sibling = s.prev_sibling();
    }

    comment_text.map(|raw| normalize_comment(&raw))
}

/// Strips `/* */`, leading `*` continuation markers and `//`, then joins
/// the remaining lines with a single space.
fn normalize_comment(raw: &str) -> String {
    let stripped = raw
        .trim()
        .trim_start_matches("/*")
        .trim_end_matches("*/")
        .trim_start_matches("//");

    stripped
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn enclosing_function(node: Node) -> Option<Node> {
    let mut current = node.parent();
    while let Some(n) = current {
        if n.kind() == "function_definition" {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// Classifies a call site's `function` child (direct, member, pointer,
/// or recursive), returning the resolved callee name alongside it.
fn classify_call(function_child: Node, content: &str, caller_name: &str) -> Option<(String, CallType)> {
    match function_child.kind() {
        "identifier" => {
            let name = node_text(function_child, content).to_string();
            let call_type = if name == caller_name {
                CallType::Recursive
            } else {
                CallType::Direct
            };
            Some((name, call_type))
        }
        "field_expression" => {
            let field = function_child.child_by_field_name("field")?;
            let name = node_text(field, content).to_string();
            Some((name, CallType::Member))
        }
        "parenthesized_expression" | "pointer_expression" => {
            let name = first_identifier_in_subtree(function_child, content)?;
            Some((name, CallType::Pointer))
        }
        _ => {
            // Unrecognized shape (e.g. a cast around the callee):
            // best-effort direct classification using the first
            // identifier found under the subtree.
            let name = first_identifier_in_subtree(function_child, content)?;
            let call_type = if name == caller_name {
                CallType::Recursive
            } else {
                CallType::Direct
            };
            Some((name, call_type))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> CParser {
        CParser::new()
    }

    #[test]
    fn parses_recursive_function() {
        let src = "int fact(int n){ if(n<=1) return 1; return n*fact(n-1); }";
        let (functions, calls) = parser().parse_source("rec.c", src).unwrap();
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].name, "fact");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].callee, "fact");
        assert_eq!(calls[0].caller, "fact");
        assert_eq!(calls[0].call_type, CallType::Recursive);
    }

    #[test]
    fn parses_member_call() {
        let src = "struct s { void (*f)(); };\nvoid caller(struct s *p){ p->f(); }\n";
        let (functions, calls) = parser().parse_source("member.c", src).unwrap();
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].name, "caller");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].call_type, CallType::Member);
        assert_eq!(calls[0].callee, "f");
    }

    #[test]
    fn parses_direct_and_pointer_calls() {
        let src = r#"
void helper(void) {}
void run(void (*fp)(void)) {
    helper();
    (*fp)();
}
"#;
        let (functions, calls) = parser().parse_source("calls.c", src).unwrap();
        assert_eq!(functions.len(), 2);
        let direct = calls.iter().find(|c| c.callee == "helper").unwrap();
        assert_eq!(direct.call_type, CallType::Direct);
        let pointer = calls.iter().find(|c| c.callee == "fp").unwrap();
        assert_eq!(pointer.call_type, CallType::Pointer);
    }

    #[test]
    fn empty_file_yields_nothing() {
        let (functions, calls) = parser().parse_source("empty.c", "").unwrap();
        assert!(functions.is_empty());
        assert!(calls.is_empty());
    }

    #[test]
    fn void_parameter_list_is_normalized() {
        let src = "int main(void) { return 0; }";
        let (functions, _) = parser().parse_source("main.c", src).unwrap();
        assert_eq!(functions[0].parameters, vec!["void".to_string()]);
    }

    #[test]
    fn captures_leading_comment_as_docstring() {
        let src = "/* computes the sum\n * of two ints */\nint add(int a, int b){ return a+b; }";
        let (functions, _) = parser().parse_source("add.c", src).unwrap();
        assert_eq!(
            functions[0].docstring.as_deref(),
            Some("computes the sum of two ints")
        );
    }

    #[test]
    fn line_numbers_are_one_based_and_ordered() {
        let src = "int a(void){\n return 1;\n}\n";
        let (functions, _) = parser().parse_source("a.c", src).unwrap();
        let f = &functions[0];
        assert!(f.start_line >= 1);
        assert!(f.end_line >= f.start_line);
    }

    #[test]
    fn call_is_skipped_when_caller_is_not_a_tracked_function() {
        let src = "void caller(void){ helper(); }";
        let p = parser();
        let mut ts_parser = p.make_ts_parser();
        let tree = ts_parser.parse(src, None).unwrap();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&p.call_query, tree.root_node(), src.as_bytes());
        let call_node = matches.next().unwrap().captures[0].node;

        // `functions` deliberately omits `caller`, as would happen if the
        // caller's own declarator couldn't be parsed by `build_function`
        // but the call site inside it still matched the call query.
        let call = p.build_call(call_node, src, "caller.c", &[]);
        assert!(call.is_none());
    }
}
