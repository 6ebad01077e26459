//! Bind specification handling.
//!
//! Binds are written as `source:dest`. A relative `source` is interpreted
//! against the directory invo was started in, so it has to be made absolute
//! before the spec is handed to the container engine.

use std::path::{Component, Path, PathBuf};

use crate::error::{RunnerError, RunnerResult};

/// Resolve every bind with a relative source against `base`.
///
/// Returns a new list; absolute sources are copied unchanged. A spec that
/// does not split into exactly two parts on `:` is rejected.
pub fn resolve_binds(binds: &[String], base: &Path) -> RunnerResult<Vec<String>> {
    binds.iter().map(|bind| resolve_bind(bind, base)).collect()
}

/// Resolve a single bind spec against `base`.
pub fn resolve_bind(bind: &str, base: &Path) -> RunnerResult<String> {
    let parts: Vec<&str> = bind.split(':').collect();
    let [source, dest] = parts.as_slice() else {
        return Err(RunnerError::InvalidBind {
            bind: bind.to_string(),
        });
    };

    if Path::new(source).is_absolute() {
        return Ok(bind.to_string());
    }

    let joined = clean_join(base, source);
    Ok(format!("{}:{}", joined.display(), dest))
}

/// Lexically join `rel` onto `base`, dropping `.` and folding `..`.
///
/// `..` at the root stays at the root.
fn clean_join(base: &Path, rel: &str) -> PathBuf {
    let mut out = PathBuf::new();
    for component in base.join(rel).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
