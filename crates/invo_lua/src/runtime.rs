//! Lua runtime setup and control file loading.

use std::path::Path;

use invo_core::InvocationContext;
use mlua::prelude::*;
use tracing::{debug, info};

use crate::error::{ScriptError, ScriptResult};
use crate::globals;

/// Create a Lua state with the `inv` global bound to `ctx`.
pub fn create_runtime(ctx: InvocationContext) -> LuaResult<Lua> {
    let lua = Lua::new();
    globals::register_globals(&lua, ctx)?;
    Ok(lua)
}

/// Execute the control file at `path`.
///
/// The chunk is named after the file so Lua errors point at `file:line`.
pub fn load_file(lua: &Lua, path: &Path) -> ScriptResult<()> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ScriptError::NotFound(path.to_path_buf())
        } else {
            ScriptError::Read {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    debug!("Loading {}", path.display());
    lua.load(&content)
        .set_name(format!("@{}", path.display()))
        .exec()?;
    Ok(())
}

/// Execute a control script given as a string.
pub fn load_str(lua: &Lua, source: &str) -> ScriptResult<()> {
    lua.load(source).set_name("=(command line)").exec()?;
    Ok(())
}

/// Evaluate the control file at `path` with relative binds resolved against
/// `working_dir`, returning the filled invocation context.
pub fn evaluate_file(path: &Path, working_dir: &Path) -> ScriptResult<InvocationContext> {
    let ctx = InvocationContext::new(working_dir);
    let lua = create_runtime(ctx.clone())?;
    load_file(&lua, path)?;

    info!(
        file = %path.display(),
        tasks = ctx.summary().len(),
        "Control file evaluated"
    );
    Ok(ctx)
}

/// Evaluate a control script given as a string.
pub fn evaluate_str(source: &str, working_dir: &Path) -> ScriptResult<InvocationContext> {
    let ctx = InvocationContext::new(working_dir);
    let lua = create_runtime(ctx.clone())?;
    load_str(&lua, source)?;
    Ok(ctx)
}
