//! Source collection and import resolution.

use std::{
    collections::{BTreeMap, VecDeque},
    path::{Path, PathBuf},
};

use super::CompileError;

/// The closed set of Solidity sources handed to solc, keyed by source unit name.
///
/// Unit names are project-root relative paths with `/` separators
/// (`contracts/Token.sol`), or the import path itself for files found in an include
/// path (`@openzeppelin/contracts/token/ERC20/ERC20.sol`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSet {
    units: BTreeMap<String, String>,
}

impl SourceSet {
    /// Collect every `*.sol` file under `sources` and, transitively, everything they import.
    pub fn collect(
        root: &Path,
        sources: &Path,
        include_paths: &[PathBuf],
    ) -> Result<Self, CompileError> {
        let sources_dir = root.join(sources);
        let mut files = Vec::new();
        find_solidity_files(&sources_dir, &mut files)?;
        if files.is_empty() {
            return Err(CompileError::NoSources(sources_dir));
        }
        files.sort();

        let mut pending: VecDeque<(String, PathBuf)> = files
            .into_iter()
            .filter_map(|path| {
                let unit = unit_name(root, &path)?;
                Some((unit, path))
            })
            .collect();

        let mut set = Self::default();
        while let Some((unit, path)) = pending.pop_front() {
            if set.units.contains_key(&unit) {
                continue;
            }

            let content = std::fs::read_to_string(&path).map_err(|source| CompileError::Read {
                path: path.clone(),
                source,
            })?;

            for import in parse_imports(&content) {
                let resolved = resolve_import(root, include_paths, &unit, &import)?;
                if !set.units.contains_key(&resolved.0) {
                    pending.push_back(resolved);
                }
            }

            tracing::trace!(unit = %unit, "Collected source");
            set.units.insert(unit, content);
        }

        Ok(set)
    }

    /// Build a set from in-memory sources.
    pub fn from_units(units: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            units: units.into_iter().collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.units.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn contains(&self, unit: &str) -> bool {
        self.units.contains_key(unit)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

fn find_solidity_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), CompileError> {
    if !dir.is_dir() {
        return Err(CompileError::NoSources(dir.to_path_buf()));
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            find_solidity_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "sol") {
            out.push(path);
        }
    }

    Ok(())
}

fn unit_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Resolve an import to its unit name and the file backing it.
fn resolve_import(
    root: &Path,
    include_paths: &[PathBuf],
    from: &str,
    import: &str,
) -> Result<(String, PathBuf), CompileError> {
    let unresolved = || CompileError::UnresolvedImport {
        import: import.to_string(),
        from: from.to_string(),
    };

    if import.starts_with("./") || import.starts_with("../") {
        let base = from.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        let unit = normalize(base, import).ok_or_else(unresolved)?;
        return locate(root, include_paths, &unit)
            .map(|path| (unit, path))
            .ok_or_else(unresolved);
    }

    locate(root, include_paths, import)
        .map(|path| (import.to_string(), path))
        .ok_or_else(unresolved)
}

/// Find the file backing a unit name, first under the root, then in each include path.
fn locate(root: &Path, include_paths: &[PathBuf], unit: &str) -> Option<PathBuf> {
    std::iter::once(root.join(unit))
        .chain(include_paths.iter().map(|include| root.join(include).join(unit)))
        .find(|candidate| candidate.is_file())
}

/// Join a relative import onto a unit directory, folding `.` and `..` segments.
fn normalize(base: &str, relative: &str) -> Option<String> {
    let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

/// Extract the paths of every `import` directive in a Solidity source.
///
/// Handles the `import "p";`, `import "p" as X;`, `import * as X from "p";` and
/// `import {A, B} from "p";` forms. Comments and string literals elsewhere are ignored.
pub fn parse_imports(source: &str) -> Vec<String> {
    let code = strip_comments(source);
    let bytes = code.as_bytes();
    let mut imports = Vec::new();
    let mut search_from = 0;

    while let Some(offset) = code[search_from..].find("import") {
        let start = search_from + offset;
        let end = start + "import".len();
        search_from = end;

        let boundary_before = start == 0
            || matches!(bytes[start - 1], b';' | b'}' | b' ' | b'\t' | b'\n' | b'\r');
        let boundary_after = bytes.get(end).is_some_and(|b| {
            matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'"' | b'\'' | b'{' | b'*')
        });
        if !boundary_before || !boundary_after {
            continue;
        }

        let Some(statement_len) = code[end..].find(';') else {
            break;
        };
        let statement = &code[end..end + statement_len];
        if let Some(path) = last_string_literal(statement) {
            imports.push(path);
        }
        search_from = end + statement_len;
    }

    imports
}

fn last_string_literal(statement: &str) -> Option<String> {
    let close = statement.rfind(['"', '\''])?;
    let quote = statement[close..].chars().next()?;
    let open = statement[..close].rfind(quote)?;
    Some(statement[open + 1..close].to_string())
}

/// Replace comments with whitespace, leaving string literals intact.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"' | '\'', _) => {
                quote = Some(c);
                out.push(c);
            }
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    if c == '\n' {
                        out.push('\n');
                    }
                    prev = c;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    out
}
