//! # invo_lua
//!
//! Lua front-end for invo.
//!
//! Control files (by default `invfile.lua`) describe tasks through the `inv`
//! global:
//!
//! ```lua
//! inv.task('test')
//!   .using('golang:1.22')
//!     .withConfig({env = {'CGO_ENABLED=0'}})
//!     .run('go', 'test', './...')
//!   .using('alpine')
//!     .withExpectation({stdout = '^ok'})
//!     .run('sh', '-c', 'echo ok')
//! ```
//!
//! Evaluating a file fills an [`invo_core::InvocationContext`] which the
//! task runner then executes.

pub mod error;
pub mod globals;
pub mod runtime;

pub use error::{ScriptError, ScriptResult};
pub use globals::{register_globals, GLOBAL_NAME};
pub use runtime::{create_runtime, evaluate_file, evaluate_str, load_file, load_str};
