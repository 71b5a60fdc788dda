//! Filesystem tools. Paths resolve relative to the process working
//! directory; the engine imposes no sandbox beyond what the caller set up.

use super::{optional_bool, optional_str, optional_usize, required_str};
use crate::turnloop::tool_registry::{Tool, ToolDescriptor, ToolError};
use async_trait::async_trait;
use lazy_static::lazy_static;
use serde_json::{json, Value};
use std::path::Path;

const MAX_SEARCH_MATCHES: usize = 100;
const MAX_GLOB_MATCHES: usize = 200;

pub struct ReadFile;

lazy_static! {
    static ref READ_FILE_DESC: ToolDescriptor = ToolDescriptor::new(
        "read_file",
        "Read a file, optionally restricted to a zero-based line range",
        json!({"type": "object", "properties": {
            "path": {"type": "string"},
            "start_line": {"type": "integer"},
            "end_line": {"type": "integer"}
        }, "required": ["path"]}),
    );
    static ref WRITE_FILE_DESC: ToolDescriptor = ToolDescriptor::new(
        "write_file",
        "Write content to a file, creating it if needed",
        json!({"type": "object", "properties": {
            "path": {"type": "string"},
            "content": {"type": "string"}
        }, "required": ["path", "content"]}),
    );
    static ref EDIT_FILE_DESC: ToolDescriptor = ToolDescriptor::new(
        "edit_file",
        "Replace the first occurrence of old_text with new_text in a file",
        json!({"type": "object", "properties": {
            "path": {"type": "string"},
            "old_text": {"type": "string"},
            "new_text": {"type": "string"}
        }, "required": ["path", "old_text", "new_text"]}),
    );
    static ref LIST_DIR_DESC: ToolDescriptor = ToolDescriptor::new(
        "list_dir",
        "List a directory's entries; directories carry a trailing slash",
        json!({"type": "object", "properties": {
            "path": {"type": "string"},
            "pattern": {"type": "string"},
            "show_hidden": {"type": "boolean"}
        }}),
    );
    static ref SEARCH_DESC: ToolDescriptor = ToolDescriptor::new(
        "search",
        "Search files recursively for lines containing a substring",
        json!({"type": "object", "properties": {
            "pattern": {"type": "string"},
            "path": {"type": "string"},
            "file_pattern": {"type": "string"}
        }, "required": ["pattern"]}),
    );
    static ref GLOB_DESC: ToolDescriptor = ToolDescriptor::new(
        "glob",
        "Find files whose name matches a pattern with * wildcards",
        json!({"type": "object", "properties": {
            "pattern": {"type": "string"},
            "path": {"type": "string"}
        }, "required": ["pattern"]}),
    );
}

#[async_trait]
impl Tool for ReadFile {
    fn descriptor(&self) -> &ToolDescriptor {
        &READ_FILE_DESC
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let path = required_str(&args, "path")?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| ToolError::ExecutionFailed(format!("{}: {}", path, e)))?;

        let start = optional_usize(&args, "start_line", 0);
        let end = args.get("end_line").and_then(|v| v.as_u64()).map(|v| v as usize);
        if start == 0 && end.is_none() {
            return Ok(content);
        }

        // Python-style slice: zero-based, end exclusive, clamped.
        let lines: Vec<&str> = content.lines().collect();
        let end = end.unwrap_or(lines.len()).min(lines.len());
        let start = start.min(end);
        Ok(lines[start..end].join("\n"))
    }
}

pub struct WriteFile;

#[async_trait]
impl Tool for WriteFile {
    fn descriptor(&self) -> &ToolDescriptor {
        &WRITE_FILE_DESC
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let path = required_str(&args, "path")?;
        let content = required_str(&args, "content")?;
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ToolError::ExecutionFailed(format!("{}: {}", path, e)))?;
            }
        }
        std::fs::write(path, content)
            .map_err(|e| ToolError::ExecutionFailed(format!("{}: {}", path, e)))?;
        Ok(format!("Wrote {} bytes to {}", content.len(), path))
    }
}

pub struct EditFile;

#[async_trait]
impl Tool for EditFile {
    fn descriptor(&self) -> &ToolDescriptor {
        &EDIT_FILE_DESC
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let path = required_str(&args, "path")?;
        let old_text = required_str(&args, "old_text")?;
        let new_text = required_str(&args, "new_text")?;
        if old_text.is_empty() {
            return Err(ToolError::InvalidArguments("old_text is empty".into()));
        }

        let current = std::fs::read_to_string(path)
            .map_err(|e| ToolError::ExecutionFailed(format!("{}: {}", path, e)))?;
        if !current.contains(old_text) {
            return Err(ToolError::ExecutionFailed(format!(
                "old_text not found in {}",
                path
            )));
        }
        let updated = current.replacen(old_text, new_text, 1);
        std::fs::write(path, updated)
            .map_err(|e| ToolError::ExecutionFailed(format!("{}: {}", path, e)))?;
        Ok(format!("Edited {}", path))
    }
}

pub struct ListDir;

#[async_trait]
impl Tool for ListDir {
    fn descriptor(&self) -> &ToolDescriptor {
        &LIST_DIR_DESC
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let path = optional_str(&args, "path", ".");
        let pattern = optional_str(&args, "pattern", "*");
        let show_hidden = optional_bool(&args, "show_hidden", false);

        let mut entries = Vec::new();
        let dir = std::fs::read_dir(path)
            .map_err(|e| ToolError::ExecutionFailed(format!("{}: {}", path, e)))?;
        for entry in dir {
            let entry = entry.map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !show_hidden && name.starts_with('.') {
                continue;
            }
            if !wildcard_match(&name, pattern) {
                continue;
            }
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                entries.push(format!("{}/", name));
            } else {
                entries.push(name);
            }
        }
        entries.sort();
        if entries.is_empty() {
            Ok(format!("{} is empty", path))
        } else {
            Ok(entries.join("\n"))
        }
    }
}

pub struct Search;

#[async_trait]
impl Tool for Search {
    fn descriptor(&self) -> &ToolDescriptor {
        &SEARCH_DESC
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let pattern = required_str(&args, "pattern")?;
        let root = optional_str(&args, "path", ".");
        let file_pattern = optional_str(&args, "file_pattern", "*");
        if pattern.is_empty() {
            return Err(ToolError::InvalidArguments("pattern is empty".into()));
        }

        let mut matches = Vec::new();
        search_dir(Path::new(root), pattern, file_pattern, &mut matches);
        if matches.is_empty() {
            Ok(format!("No matches for {:?}", pattern))
        } else if matches.len() >= MAX_SEARCH_MATCHES {
            matches.truncate(MAX_SEARCH_MATCHES);
            matches.push(format!("... capped at {} matches", MAX_SEARCH_MATCHES));
            Ok(matches.join("\n"))
        } else {
            Ok(matches.join("\n"))
        }
    }
}

fn search_dir(dir: &Path, pattern: &str, file_pattern: &str, matches: &mut Vec<String>) {
    if matches.len() >= MAX_SEARCH_MATCHES {
        return;
    }
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || name == "target" || name == "node_modules" {
            continue;
        }
        if path.is_dir() {
            search_dir(&path, pattern, file_pattern, matches);
        } else if !wildcard_match(&name, file_pattern) {
            continue;
        } else if let Ok(content) = std::fs::read_to_string(&path) {
            for (idx, line) in content.lines().enumerate() {
                if line.contains(pattern) {
                    matches.push(format!("{}:{}: {}", path.display(), idx + 1, line.trim()));
                    if matches.len() >= MAX_SEARCH_MATCHES {
                        return;
                    }
                }
            }
        }
    }
}

pub struct Glob;

#[async_trait]
impl Tool for Glob {
    fn descriptor(&self) -> &ToolDescriptor {
        &GLOB_DESC
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let pattern = required_str(&args, "pattern")?;
        let root = optional_str(&args, "path", ".");

        let mut found = Vec::new();
        glob_dir(Path::new(root), pattern, &mut found);
        found.sort();
        if found.is_empty() {
            Ok(format!("No files match {:?}", pattern))
        } else {
            Ok(found.join("\n"))
        }
    }
}

fn glob_dir(dir: &Path, pattern: &str, found: &mut Vec<String>) {
    if found.len() >= MAX_GLOB_MATCHES {
        return;
    }
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || name == "target" || name == "node_modules" {
            continue;
        }
        if path.is_dir() {
            glob_dir(&path, pattern, found);
        } else if wildcard_match(&name, pattern) {
            found.push(path.display().to_string());
            if found.len() >= MAX_GLOB_MATCHES {
                return;
            }
        }
    }
}

/// Filename match with `*` standing for any run of characters.
fn wildcard_match(name: &str, pattern: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return name == pattern;
    }

    let mut rest = name;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turnloop::tool_registry::Tool;
    use serde_json::json;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt").display().to_string();

        let wrote = WriteFile
            .invoke(json!({"path": path, "content": "hello"}))
            .await
            .unwrap();
        assert_eq!(wrote, format!("Wrote 5 bytes to {}", path));

        let read = ReadFile.invoke(json!({"path": path})).await.unwrap();
        assert_eq!(read, "hello");
    }

    #[tokio::test]
    async fn read_file_honors_line_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.txt").display().to_string();
        std::fs::write(&path, "zero\none\ntwo\nthree\n").unwrap();

        let slice = ReadFile
            .invoke(json!({"path": path, "start_line": 1, "end_line": 3}))
            .await
            .unwrap();
        assert_eq!(slice, "one\ntwo");

        let tail = ReadFile
            .invoke(json!({"path": path, "start_line": 2}))
            .await
            .unwrap();
        assert_eq!(tail, "two\nthree");

        // Out-of-range bounds clamp instead of failing.
        let empty = ReadFile
            .invoke(json!({"path": path, "start_line": 90}))
            .await
            .unwrap();
        assert_eq!(empty, "");
    }

    #[tokio::test]
    async fn read_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").display().to_string();
        let err = ReadFile.invoke(json!({"path": path})).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }

    #[tokio::test]
    async fn edit_replaces_first_occurrence_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("code.py").display().to_string();
        std::fs::write(&path, "x = 1\nx = 1\n").unwrap();

        EditFile
            .invoke(json!({"path": path, "old_text": "x = 1", "new_text": "x = 2"}))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x = 2\nx = 1\n");
    }

    #[tokio::test]
    async fn edit_fails_when_old_text_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("code.py").display().to_string();
        std::fs::write(&path, "y = 1\n").unwrap();

        let err = EditFile
            .invoke(json!({"path": path, "old_text": "nope", "new_text": "x"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn list_dir_marks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();

        let listing = ListDir
            .invoke(json!({"path": dir.path().display().to_string()}))
            .await
            .unwrap();
        assert_eq!(listing, "a.txt\nsub/");
    }

    #[tokio::test]
    async fn list_dir_hides_dotfiles_unless_asked() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".secret"), "").unwrap();
        std::fs::write(dir.path().join("open.txt"), "").unwrap();
        let root = dir.path().display().to_string();

        let listing = ListDir.invoke(json!({"path": root})).await.unwrap();
        assert_eq!(listing, "open.txt");

        let listing = ListDir
            .invoke(json!({"path": root, "show_hidden": true}))
            .await
            .unwrap();
        assert_eq!(listing, ".secret\nopen.txt");
    }

    #[tokio::test]
    async fn list_dir_filters_by_pattern() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "").unwrap();
        std::fs::write(dir.path().join("b.md"), "").unwrap();

        let listing = ListDir
            .invoke(json!({"path": dir.path().display().to_string(), "pattern": "*.rs"}))
            .await
            .unwrap();
        assert_eq!(listing, "a.rs");
    }

    #[tokio::test]
    async fn search_restricts_files_by_pattern() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("code.rs"), "needle\n").unwrap();
        std::fs::write(dir.path().join("notes.md"), "needle\n").unwrap();

        let out = Search
            .invoke(json!({
                "pattern": "needle",
                "path": dir.path().display().to_string(),
                "file_pattern": "*.rs"
            }))
            .await
            .unwrap();
        assert!(out.contains("code.rs"));
        assert!(!out.contains("notes.md"));
    }

    #[tokio::test]
    async fn search_reports_path_line_and_text() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\nneedle here\nthree\n").unwrap();

        let out = Search
            .invoke(json!({"pattern": "needle", "path": dir.path().display().to_string()}))
            .await
            .unwrap();
        assert!(out.contains("a.txt:2: needle here"));
    }

    #[tokio::test]
    async fn glob_finds_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("note.md"), "").unwrap();

        let out = Glob
            .invoke(json!({"pattern": "*.rs", "path": dir.path().display().to_string()}))
            .await
            .unwrap();
        assert!(out.contains("lib.rs"));
        assert!(!out.contains("note.md"));
    }

    #[test]
    fn wildcard_patterns_match_expected_names() {
        assert!(wildcard_match("lib.rs", "*.rs"));
        assert!(wildcard_match("test_parser.py", "test_*.py"));
        assert!(wildcard_match("exact.txt", "exact.txt"));
        assert!(!wildcard_match("lib.rs", "*.py"));
        assert!(!wildcard_match("parser_test.py", "test_*.py"));
    }
}
