//! Declaration extraction: what a file is, from its name, and what it
//! provides and requires, from its content.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::model::{Diagnostic, FileKind, SourceFile};

pub mod declarations;

use declarations::DeclKind;

/// Prefix of synthetic identifiers derived from file paths.
pub const ES_IDENTIFIER_PREFIX: &str = "es6:";

/// Where a file sits in the project and which prefix applies to it.
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    /// Slash-separated path of the file relative to the project root.
    pub rel_path: &'a str,
    /// The `js_prefix` in effect, or `None` if none was ever set.
    pub prefix: Option<&'a str>,
}

/// Information that can be inferred from the name of a file. Does not read
/// the file.
pub fn classify(path: &Path) -> SourceFile {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = Path::new(&name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let kind = if name.starts_with('.') || name.starts_with('_') {
        FileKind::Unknown
    } else {
        FileKind::from_extension(ext)
    };

    let stem = if ext.is_empty() {
        name.as_str()
    } else {
        &name[..name.len() - ext.len() - 1]
    };
    let parts: Vec<&str> = stem.split('_').collect();
    let is_test = parts.len() >= 2 && parts[parts.len() - 1] == "test";

    SourceFile {
        path: path.to_path_buf(),
        src: name.clone(),
        name,
        kind,
        is_test,
        ..Default::default()
    }
}

/// Classify and read a file, collecting declarations from its content.
///
/// A file that cannot be read is reported and returned with name-derived
/// information only.
pub fn file_info(
    path: &Path,
    ctx: &ExtractContext,
    diagnostics: &mut Vec<Diagnostic>,
) -> SourceFile {
    let info = classify(path);
    if !info.kind.is_source() {
        return info;
    }
    match std::fs::read(path) {
        Ok(content) => extract_declarations(info, &content, ctx, diagnostics),
        Err(e) => {
            let diagnostic = Diagnostic::ReadFailure {
                path: path.display().to_string(),
                message: e.to_string(),
            };
            warn!("{}", diagnostic);
            diagnostics.push(diagnostic);
            info
        }
    }
}

/// Augment a classified file with the declarations found in `content`.
pub fn extract_declarations(
    mut info: SourceFile,
    content: &[u8],
    ctx: &ExtractContext,
    diagnostics: &mut Vec<Diagnostic>,
) -> SourceFile {
    if !info.kind.is_source() {
        return info;
    }

    let decls = match declarations::scan(content) {
        Ok(decls) => decls,
        Err(e) => {
            warn!("{}: {:#}", info.path.display(), e);
            return info;
        }
    };

    let mut imports = Vec::new();
    for decl in decls {
        match decl.kind {
            DeclKind::Provide(id) => info.provides.push(id),
            DeclKind::Module(id) => {
                info.is_module = true;
                info.provides.push(id);
            }
            DeclKind::Require(id) => info.requires.push(id),
            DeclKind::TestOnly => info.is_test_only = true,
            DeclKind::Import(specifier) => {
                if is_relative(&specifier) {
                    imports.push(specifier);
                }
            }
        }
    }

    match ctx.prefix {
        Some(prefix) => {
            let dir = parent_dir(ctx.rel_path);
            for specifier in &imports {
                match normalize_relative(dir, specifier) {
                    Some(target) => info.requires.push(es_identifier(prefix, &target)),
                    None => debug!(
                        "{}: import {:?} leaves the project, ignored",
                        ctx.rel_path, specifier
                    ),
                }
            }
            if info.provides.is_empty() {
                info.provides.push(es_identifier(prefix, ctx.rel_path));
                info.provides
                    .push(es_identifier(prefix, strip_extension(ctx.rel_path)));
            }
        }
        None => {
            if !imports.is_empty() {
                let diagnostic = Diagnostic::MissingPrefix {
                    path: ctx.rel_path.to_string(),
                };
                warn!("{}", diagnostic);
                diagnostics.push(diagnostic);
            }
        }
    }

    debug!(
        "{}: provides {:?}, requires {:?}",
        ctx.rel_path, info.provides, info.requires
    );
    info
}

/// The synthetic identifier for a project-relative path under `prefix`.
pub fn es_identifier(prefix: &str, rel_path: &str) -> String {
    let joined: Vec<&str> = [prefix.trim_matches('/'), rel_path.trim_matches('/')]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect();
    format!("{}/{}", ES_IDENTIFIER_PREFIX, joined.join("/"))
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

fn parent_dir(rel_path: &str) -> &str {
    rel_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn strip_extension(rel_path: &str) -> &str {
    let base_start = rel_path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match rel_path[base_start..].rfind('.') {
        Some(dot) if dot > 0 => &rel_path[..base_start + dot],
        _ => rel_path,
    }
}

/// Join a relative specifier onto a project-relative directory, resolving
/// `.` and `..`. Returns `None` if the result would leave the project root.
fn normalize_relative(dir: &str, specifier: &str) -> Option<String> {
    let joined: PathBuf = Path::new(dir).join(specifier);
    let mut parts: Vec<String> = Vec::new();
    for component in joined.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().to_string()),
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.join("/"))
}
