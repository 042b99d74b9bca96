//! Heuristic, line-oriented scanner for top-level Python class headers.
//!
//! This is deliberately not a full Python grammar: it tracks bracket depth
//! to find where a `class Name(Base, Other[T]):` header ends (possibly
//! spanning several lines), then reads the class body far enough to collect
//! its leading docstring and its direct `def`/`async def` members. Anything
//! it cannot make sense of is treated as "no class found here", matching
//! the original AST-based parser's behavior of skipping a file outright on
//! a `SyntaxError`.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::types::{Category, ClassRecord};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("I/O error reading {0}: {1}")]
    Io(std::path::PathBuf, std::io::Error),
    #[error("not valid UTF-8: {0}")]
    Encoding(std::path::PathBuf),
}

/// Method names whose mere presence marks a class as a discovery candidate,
/// even with no recognizable base class.
const CANDIDATE_METHODS: &[&str] = &["get_data", "transform", "index_data", "post_to_index"];

/// Parse one file, returning every top-level class that passes the
/// candidate rule, with `category` assigned but `data_clients` left empty
/// (linking happens once all files have been scanned).
pub fn parse_file(path: &Path, project_root: &Path) -> Result<Vec<ClassRecord>, ParseError> {
    let bytes = fs::read(path).map_err(|e| ParseError::Io(path.to_path_buf(), e))?;
    let source = String::from_utf8(bytes).map_err(|_| ParseError::Encoding(path.to_path_buf()))?;

    let lines: Vec<&str> = source.lines().collect();
    let mut records = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if indent_of(line) == 0 && line.trim_start().starts_with("class ") {
            if let Some((header, consumed, name)) = scan_header(&lines, i) {
                let body_start = i + consumed;
                let (docstring, methods, body_indent) = scan_body(&lines, body_start);
                let _ = body_indent;
                let base_classes = parse_base_classes(&header);
                let source_type = extract_source_type(&header);

                if is_candidate(&base_classes, &methods) {
                    let module_path = module_path_for(path, project_root);
                    records.push(ClassRecord {
                        class_name: name,
                        module_path,
                        file_path: path.to_path_buf(),
                        source_type,
                        base_classes,
                        methods,
                        docstring,
                        category: Category::Adapter, // refined by classify::categorize_and_link
                        data_clients: Vec::new(),
                    });
                }
                i += consumed;
                continue;
            }
        }
        i += 1;
    }

    Ok(records)
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').count()
}

/// Scan a `class Name(...):` header starting at `lines[start]`, which may
/// span multiple lines while any of `()[]{}` are unbalanced. Returns the
/// joined header text (without the trailing `:`), the number of lines
/// consumed, and the class name.
fn scan_header(lines: &[&str], start: usize) -> Option<(String, usize, String)> {
    let first = lines[start].trim_start();
    let rest = first.strip_prefix("class ")?.trim_start();
    let name: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() {
        return None;
    }

    let mut joined = String::new();
    let mut depth = 0i32;
    let mut consumed = 0;
    let mut ended = false;

    for (offset, line) in lines[start..].iter().enumerate() {
        joined.push_str(line);
        joined.push('\n');
        consumed = offset + 1;

        for ch in line.chars() {
            match ch {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                ':' if depth <= 0 => {
                    ended = true;
                }
                _ => {}
            }
        }
        if ended {
            break;
        }
        if offset > 200 {
            // Runaway header (malformed file) — bail out rather than loop.
            return None;
        }
    }

    if !ended {
        return None;
    }

    Some((joined, consumed, name))
}

/// Extract the parenthesized base-class list text from a scanned header,
/// then split it into top-level comma-separated entries (bracket-depth
/// aware) and reduce each to its leaf name.
fn parse_base_classes(header: &str) -> Vec<String> {
    let entries = base_class_entries(header);
    entries.iter().map(|e| leaf_name(e)).collect()
}

/// Raw (un-leafed) text of each base-class entry, e.g. `["BaseConnector[DocA]"]`.
fn base_class_entries(header: &str) -> Vec<String> {
    let open = match header.find('(') {
        Some(i) => i,
        None => return Vec::new(),
    };

    // Find the matching close paren for the opening one, tracking depth.
    let mut depth = 0i32;
    let mut close = None;
    for (i, ch) in header[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(open + i);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = match close {
        Some(c) => c,
        None => return Vec::new(),
    };

    let inner = &header[open + 1..close];
    split_top_level(inner)
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && !s.starts_with("metaclass="))
        .collect()
}

/// Split on commas that are not nested inside `()[]{}`.
fn split_top_level(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();

    for ch in s.chars() {
        match ch {
            '(' | '[' | '{' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

/// Reduce a base-class entry to its leaf name: bare identifier, final
/// attribute of a dotted access, or the leaf of a subscripted head.
fn leaf_name(entry: &str) -> String {
    let head = match entry.find('[') {
        Some(i) => &entry[..i],
        None => entry,
    };
    head.rsplit('.').next().unwrap_or(head).trim().to_string()
}

/// The textual form of the subscript argument of the first subscripted
/// base class, if any (source_type for the linking step).
fn extract_source_type(header: &str) -> Option<String> {
    let entries = base_class_entries(header);
    for entry in &entries {
        if let Some(open) = entry.find('[') {
            if let Some(close) = entry.rfind(']') {
                if close > open {
                    return Some(entry[open + 1..close].trim().to_string());
                }
            }
        }
    }
    None
}

/// Scan the class body starting at `body_start` for its leading docstring
/// and direct method definitions, stopping at the first line that returns
/// to indentation 0 (the class has ended).
fn scan_body(lines: &[&str], body_start: usize) -> (Option<String>, Vec<String>, usize) {
    let mut idx = body_start;
    while idx < lines.len() && lines[idx].trim().is_empty() {
        idx += 1;
    }
    if idx >= lines.len() {
        return (None, Vec::new(), 0);
    }

    let body_indent = indent_of(lines[idx]);
    if body_indent == 0 {
        // Empty class body (`class Foo: pass` on the header line, or a
        // malformed file) — nothing to collect.
        return (None, Vec::new(), 0);
    }

    let docstring = scan_docstring(lines, idx, body_indent);

    let mut methods = Vec::new();
    let mut i = idx;
    while i < lines.len() {
        let line = lines[i];
        if line.trim().is_empty() {
            i += 1;
            continue;
        }
        let this_indent = indent_of(line);
        if this_indent < body_indent {
            break;
        }
        if this_indent == body_indent {
            let trimmed = line.trim_start();
            let def_name = trimmed
                .strip_prefix("async def ")
                .or_else(|| trimmed.strip_prefix("def "));
            if let Some(rest) = def_name {
                let name: String = rest
                    .chars()
                    .take_while(|c| c.is_alphanumeric() || *c == '_')
                    .collect();
                if !name.is_empty() && !name.starts_with('_') {
                    methods.push(name);
                }
            }
        }
        i += 1;
    }

    (docstring, methods, body_indent)
}

fn scan_docstring(lines: &[&str], start: usize, body_indent: usize) -> Option<String> {
    let first = lines[start].trim();
    if indent_of(lines[start]) != body_indent {
        return None;
    }

    for quote in ["\"\"\"", "'''"] {
        if let Some(rest) = first.strip_prefix(quote) {
            if let Some(end) = rest.find(quote) {
                return Some(rest[..end].trim().to_string());
            }
            // Multi-line docstring: scan forward for the closing triple-quote.
            let mut collected = vec![rest.to_string()];
            let mut i = start + 1;
            while i < lines.len() {
                if let Some(end) = lines[i].find(quote) {
                    collected.push(lines[i][..end].to_string());
                    return Some(collected.join("\n").trim().to_string());
                }
                collected.push(lines[i].to_string());
                i += 1;
            }
            return Some(collected.join("\n").trim().to_string());
        }
    }

    for quote in ['"', '\''] {
        if first.starts_with(quote) && first[1..].contains(quote) {
            let rest = &first[1..];
            if let Some(end) = rest.find(quote) {
                return Some(rest[..end].to_string());
            }
        }
    }

    None
}

fn is_candidate(base_classes: &[String], methods: &[String]) -> bool {
    let base_hit = base_classes.iter().any(|b| {
        b.contains("Connector") || b.contains("DataSource") || b.contains("DataClient")
    });
    let method_hit = methods.iter().any(|m| CANDIDATE_METHODS.contains(&m.as_str()));
    base_hit || method_hit
}

fn module_path_for(file_path: &Path, project_root: &Path) -> String {
    let rel = file_path
        .strip_prefix(project_root)
        .unwrap_or(file_path)
        .with_extension("");
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn finds_adapter_with_generic_base_and_links_source_type() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "a.py",
            "class AConnector(BaseConnector[DocA]):\n    \"\"\"An adapter.\"\"\"\n\n    def get_data(self):\n        pass\n\n    def _private(self):\n        pass\n",
        );
        let records = parse_file(&path, dir.path()).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.class_name, "AConnector");
        assert_eq!(r.base_classes, vec!["BaseConnector"]);
        assert_eq!(r.source_type.as_deref(), Some("DocA"));
        assert_eq!(r.methods, vec!["get_data"]);
        assert_eq!(r.docstring.as_deref(), Some("An adapter."));
    }

    #[test]
    fn finds_data_client() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "b.py",
            "class ADataClient(BaseDataClient[DocA]):\n    def fetch(self):\n        pass\n",
        );
        let records = parse_file(&path, dir.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].base_classes, vec!["BaseDataClient"]);
    }

    #[test]
    fn multiline_base_list_is_handled() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "c.py",
            "class Wide(\n    BaseConnector[DocA],\n    Mixin,\n):\n    def transform(self):\n        pass\n",
        );
        let records = parse_file(&path, dir.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].base_classes, vec!["BaseConnector", "Mixin"]);
    }

    #[test]
    fn non_candidate_class_is_not_returned() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "d.py", "class PlainHelper:\n    def helper(self):\n        pass\n");
        let records = parse_file(&path, dir.path()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn methods_only_candidate_defaults_to_adapter_category_upstream() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "e.py", "class Weird:\n    def index_data(self):\n        pass\n");
        let records = parse_file(&path, dir.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].base_classes.is_empty());
    }

    #[test]
    fn dotted_and_subscripted_attribute_bases_reduce_to_leaf_names() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "f.py",
            "class F(pkg.base.BaseConnector[pkg.models.DocA]):\n    def get_data(self):\n        pass\n",
        );
        let records = parse_file(&path, dir.path()).unwrap();
        assert_eq!(records[0].base_classes, vec!["BaseConnector"]);
        assert_eq!(records[0].source_type.as_deref(), Some("pkg.models.DocA"));
    }
}
