//! The `inv` global and the builder tables behind it.
//!
//! Every builder snapshot is exposed to Lua as a fresh table of functions
//! closing over that snapshot. Calling one of them returns the table of the
//! next snapshot, so chains read like
//!
//! ```lua
//! inv.task('test').using('golang').withExpectation({code = 0}).run('go', 'test')
//! ```
//!
//! Two table shapes exist:
//! - builder: `using`, `task`, `wrap`
//! - using: `using`, `run`, `task`, `wrap`, `withExpectation`, `withConfig`,
//!   `withHostConfig`

use std::fmt::Display;

use invo_core::{BuilderState, CoreError, InvocationContext, UsingBuilderState};
use invo_runner::{ContainerConfigOverlay, ExpectationSpec, HostConfigOverlay};
use mlua::prelude::*;
use tracing::debug;

/// Name of the global table control files start from.
pub const GLOBAL_NAME: &str = "inv";

/// Register the `inv` global, bound to the default task of `ctx`.
pub fn register_globals(lua: &Lua, ctx: InvocationContext) -> LuaResult<()> {
    let inv = builder_table(lua, BuilderState::new(ctx))?;
    lua.globals().set(GLOBAL_NAME, inv)?;
    debug!("Registered '{}' global", GLOBAL_NAME);
    Ok(())
}

fn builder_table(lua: &Lua, state: BuilderState) -> LuaResult<LuaTable> {
    let table = lua.create_table()?;

    let s = state.clone();
    table.set(
        "using",
        lua.create_function(move |lua, args: LuaVariadic<LuaValue>| {
            let image = last_string(&args, "using")?;
            using_table(lua, s.using(&image).map_err(core_error)?)
        })?,
    )?;

    let s = state.clone();
    table.set(
        "task",
        lua.create_function(move |lua, args: LuaVariadic<LuaValue>| {
            let id = last_string(&args, "task")?;
            builder_table(lua, s.task(&id).map_err(core_error)?)
        })?,
    )?;

    table.set(
        "wrap",
        lua.create_function(move |lua, _: LuaMultiValue| builder_table(lua, state.wrap()))?,
    )?;

    Ok(table)
}

fn using_table(lua: &Lua, state: UsingBuilderState) -> LuaResult<LuaTable> {
    let table = lua.create_table()?;

    let s = state.clone();
    table.set(
        "using",
        lua.create_function(move |lua, args: LuaVariadic<LuaValue>| {
            let image = last_string(&args, "using")?;
            using_table(lua, s.using(&image).map_err(core_error)?)
        })?,
    )?;

    let s = state.clone();
    table.set(
        "run",
        lua.create_function(move |lua, args: LuaVariadic<LuaValue>| {
            let command = args
                .iter()
                .enumerate()
                .map(|(i, value)| string_value(value, i + 1, "run"))
                .collect::<LuaResult<Vec<String>>>()?;
            using_table(lua, s.run(command).map_err(core_error)?)
        })?,
    )?;

    let s = state.clone();
    table.set(
        "task",
        lua.create_function(move |lua, args: LuaVariadic<LuaValue>| {
            let id = last_string(&args, "task")?;
            using_table(lua, s.task(&id).map_err(core_error)?)
        })?,
    )?;

    let s = state.clone();
    table.set(
        "wrap",
        lua.create_function(move |lua, _: LuaMultiValue| builder_table(lua, s.wrap()))?,
    )?;

    let s = state.clone();
    table.set(
        "withExpectation",
        lua.create_function(move |lua, args: LuaVariadic<LuaValue>| {
            if args.len() != 1 {
                return Err(LuaError::runtime(
                    "expected exactly one argument to 'withExpectation'",
                ));
            }
            let LuaValue::Table(spec) = &args[0] else {
                return Err(bad_argument(1, "withExpectation", "Expected table as argument"));
            };
            let spec = expectation_spec(spec)?;
            let next = s
                .with_expectation(&spec)
                .map_err(|e| bad_argument(1, "withExpectation", e))?;
            using_table(lua, next)
        })?,
    )?;

    let s = state.clone();
    table.set(
        "withConfig",
        lua.create_function(move |lua, args: LuaVariadic<LuaValue>| {
            let value = single_table(&args, "withConfig")?;
            let overlay: ContainerConfigOverlay = lua
                .from_value(value)
                .map_err(|e| bad_argument(1, "withConfig", e))?;
            using_table(lua, s.with_config(&overlay).map_err(core_error)?)
        })?,
    )?;

    table.set(
        "withHostConfig",
        lua.create_function(move |lua, args: LuaVariadic<LuaValue>| {
            let value = single_table(&args, "withHostConfig")?;
            let overlay: HostConfigOverlay = lua
                .from_value(value)
                .map_err(|e| bad_argument(1, "withHostConfig", e))?;
            using_table(lua, state.with_host_config(&overlay))
        })?,
    )?;

    Ok(table)
}

fn expectation_spec(table: &LuaTable) -> LuaResult<ExpectationSpec> {
    let field = |e: LuaError| bad_argument(1, "withExpectation", e);
    Ok(ExpectationSpec {
        code: table.get::<Option<i64>>("code").map_err(field)?,
        stdout: table.get::<Option<String>>("stdout").map_err(field)?,
        stderr: table.get::<Option<String>>("stderr").map_err(field)?,
    })
}

/// The string argument of `using`/`task`. The last argument is taken so
/// that `inv:using('x')` works as well as `inv.using('x')`.
fn last_string(args: &[LuaValue], func: &str) -> LuaResult<String> {
    match args.last() {
        Some(value) => string_value(value, args.len(), func),
        None => Err(bad_argument(1, func, "string expected, got no value")),
    }
}

fn single_table(args: &[LuaValue], func: &str) -> LuaResult<LuaValue> {
    match args {
        [value @ LuaValue::Table(_)] => Ok(value.clone()),
        [other] => Err(bad_argument(
            1,
            func,
            format!("table expected, got {}", other.type_name()),
        )),
        _ => Err(LuaError::runtime(format!(
            "expected exactly one argument to '{}'",
            func
        ))),
    }
}

fn string_value(value: &LuaValue, pos: usize, func: &str) -> LuaResult<String> {
    match value {
        LuaValue::String(s) => Ok(s.to_str()?.to_string()),
        LuaValue::Integer(i) => Ok(i.to_string()),
        LuaValue::Number(n) => Ok(n.to_string()),
        other => Err(bad_argument(
            pos,
            func,
            format!("string expected, got {}", other.type_name()),
        )),
    }
}

fn bad_argument(pos: usize, func: &str, message: impl Display) -> LuaError {
    LuaError::runtime(format!("bad argument #{} to '{}' ({})", pos, func, message))
}

fn core_error(e: CoreError) -> LuaError {
    LuaError::external(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use invo_core::DEFAULT_TASK;

    fn create_test_lua() -> LuaResult<(Lua, InvocationContext)> {
        let lua = Lua::new();
        let ctx = InvocationContext::new("/work");
        register_globals(&lua, ctx.clone())?;
        Ok((lua, ctx))
    }

    fn run_err(script: &str) -> String {
        let (lua, _) = create_test_lua().unwrap();
        lua.load(script).exec().unwrap_err().to_string()
    }

    #[test]
    fn inv_global_is_a_builder_table() -> LuaResult<()> {
        let (lua, _) = create_test_lua()?;
        let inv: LuaTable = lua.globals().get(GLOBAL_NAME)?;
        assert!(inv.contains_key("using")?);
        assert!(inv.contains_key("task")?);
        assert!(inv.contains_key("wrap")?);
        assert!(!inv.contains_key("run")?);
        Ok(())
    }

    #[test]
    fn using_table_offers_all_transitions() -> LuaResult<()> {
        let (lua, _) = create_test_lua()?;
        let using: LuaTable = lua.load("return inv.using('alpine')").eval()?;
        for key in [
            "using",
            "run",
            "task",
            "wrap",
            "withExpectation",
            "withConfig",
            "withHostConfig",
        ] {
            assert!(using.contains_key(key)?, "missing {}", key);
        }
        Ok(())
    }

    #[test]
    fn run_registers_steps() -> LuaResult<()> {
        let (lua, ctx) = create_test_lua()?;
        lua.load(
            r#"
            inv.task('build').using('alpine').run('echo', 'hi')
            inv.using('busybox').run('true')
            "#,
        )
        .exec()?;

        let build = ctx.steps("build").unwrap();
        assert_eq!(build.len(), 1);
        assert_eq!(build[0].config.image, "alpine");
        assert_eq!(build[0].config.command, vec!["echo", "hi"]);
        assert_eq!(build[0].host_config.binds, vec!["/work:/source"]);

        let default = ctx.steps(DEFAULT_TASK).unwrap();
        assert_eq!(default[0].config.image, "busybox");
        Ok(())
    }

    #[test]
    fn numbers_are_accepted_as_arguments() -> LuaResult<()> {
        let (lua, ctx) = create_test_lua()?;
        lua.load("inv.using('alpine').run('sleep', 1)").exec()?;
        assert_eq!(ctx.steps(DEFAULT_TASK).unwrap()[0].config.command, vec!["sleep", "1"]);
        Ok(())
    }

    #[test]
    fn snapshots_fork_independently() -> LuaResult<()> {
        let (lua, ctx) = create_test_lua()?;
        lua.load(
            r#"
            local base = inv.task('t').using('alpine')
            base.withExpectation({code = 1}).run('false')
            base.run('true')
            "#,
        )
        .exec()?;

        let steps = ctx.steps("t").unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].expectation.code(), 1);
        assert_eq!(steps[1].expectation.code(), 0);
        Ok(())
    }

    #[test]
    fn with_config_overlays_fields() -> LuaResult<()> {
        let (lua, ctx) = create_test_lua()?;
        lua.load(
            r#"
            inv.using('golang')
              .withConfig({working_dir = '/go/src/app', env = {'CGO_ENABLED=0'}, user = '1000'})
              .run('go', 'build')
            "#,
        )
        .exec()?;

        let step = &ctx.steps(DEFAULT_TASK).unwrap()[0];
        assert_eq!(step.config.working_dir.as_deref(), Some("/go/src/app"));
        assert_eq!(step.config.env, vec!["CGO_ENABLED=0"]);
        assert_eq!(step.config.user.as_deref(), Some("1000"));
        Ok(())
    }

    #[test]
    fn with_host_config_binds_are_resolved() -> LuaResult<()> {
        let (lua, ctx) = create_test_lua()?;
        lua.load(
            r#"
            inv.using('alpine')
              .withHostConfig({binds = {'dist:/dist', '/var/run/docker.sock:/var/run/docker.sock'}})
              .run('ls')
            "#,
        )
        .exec()?;

        let step = &ctx.steps(DEFAULT_TASK).unwrap()[0];
        assert_eq!(
            step.host_config.binds,
            vec!["/work/dist:/dist", "/var/run/docker.sock:/var/run/docker.sock"]
        );
        Ok(())
    }

    #[test]
    fn wrap_returns_builder_for_same_task() -> LuaResult<()> {
        let (lua, ctx) = create_test_lua()?;
        lua.load("inv.task('pkg').using('alpine').wrap().using('busybox').run('true')")
            .exec()?;

        let steps = ctx.steps("pkg").unwrap();
        assert_eq!(steps[0].config.image, "busybox");
        Ok(())
    }

    #[test]
    fn with_expectation_needs_exactly_one_argument() {
        let err = run_err("inv.using('alpine').withExpectation()");
        assert!(err.contains("expected exactly one argument to 'withExpectation'"), "{}", err);

        let err = run_err("inv.using('alpine').withExpectation({}, {})");
        assert!(err.contains("expected exactly one argument to 'withExpectation'"), "{}", err);
    }

    #[test]
    fn with_expectation_needs_a_table() {
        let err = run_err("inv.using('alpine').withExpectation('code')");
        assert!(err.contains("Expected table as argument"), "{}", err);
    }

    #[test]
    fn with_expectation_rejects_invalid_regex() {
        let err = run_err("inv.using('alpine').withExpectation({stdout = '(unclosed'})");
        assert!(
            err.contains("bad argument #1 to 'withExpectation' (invalid regular expression in stdout:"),
            "{}",
            err
        );
    }

    #[test]
    fn with_config_rejects_unknown_fields() {
        let err = run_err("inv.using('alpine').withConfig({cmd = {'ls'}})");
        assert!(err.contains("bad argument #1 to 'withConfig'"), "{}", err);
    }

    #[test]
    fn using_needs_a_string() {
        let err = run_err("inv.using()");
        assert!(err.contains("bad argument #1 to 'using' (string expected, got no value)"), "{}", err);

        let err = run_err("inv.using({})");
        assert!(err.contains("string expected, got table"), "{}", err);

        let err = run_err("inv.using('')");
        assert!(err.contains("Invalid image reference"), "{}", err);
    }

    #[test]
    fn run_rejects_non_string_arguments() {
        let err = run_err("inv.using('alpine').run('echo', {})");
        assert!(err.contains("bad argument #2 to 'run'"), "{}", err);
    }

    #[test]
    fn malformed_bind_fails_at_run() {
        let (lua, ctx) = create_test_lua().unwrap();
        let err = lua
            .load("inv.using('alpine').withHostConfig({binds = {'a:b:c'}}).run('ls')")
            .exec()
            .unwrap_err()
            .to_string();
        assert!(err.contains("a:b:c"), "{}", err);
        assert!(ctx.registry().is_empty());
    }
}
