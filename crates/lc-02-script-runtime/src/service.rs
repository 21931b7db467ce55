//! # Transactional Script Runner
//!
//! Runs one script against one store transaction:
//!
//! ```text
//! run(tx, invocation, args)
//!   ├─ 1. env script (if any): empty table scope, fresh budget
//!   │      └─ fault → warn!, definitions discarded
//!   ├─ 2. globals: args, static_args, env (constants)
//!   ├─ 3. handler script: invocation scope, fresh budget
//!   └─ 4. terminal value → ScriptResult   |   fault → ScriptFault
//! ```
//!
//! The interpreter state lives on the stack of `run` and is dropped on every
//! exit path. Table writes stay pending in the caller's transaction; the
//! caller decides whether to commit.

use lc_01_versioned_store::Transaction;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::adapters::ScopedTables;
use crate::domain::constants::SandboxConstants;
use crate::domain::limits::ExecutionLimits;
use crate::domain::partitions::TablePartitions;
use crate::domain::scope::TableScope;
use crate::domain::script::Script;
use crate::errors::ScriptFault;
use crate::language::{FunctionTable, Interpreter};

/// Global holding the script argument.
pub const ARGS_GLOBAL: &str = "args";

/// Global holding the invocation's static arguments.
pub const STATIC_ARGS_GLOBAL: &str = "static_args";

pub use crate::language::ast::ENV_GLOBAL;

/// Everything needed to run one script, apart from its argument.
#[derive(Debug, Clone)]
pub struct ScriptInvocation<'a> {
    /// Script to run.
    pub script: &'a Script,
    /// Extra arguments fixed by the caller, exposed as `static_args`.
    pub static_args: Vec<Value>,
    /// Tables the script may reach.
    pub scope: TableScope,
    /// Environment-initialization script run before `script`.
    pub env_script: Option<&'a Script>,
}

impl<'a> ScriptInvocation<'a> {
    /// Invocation with no static arguments, no tables and no env script.
    pub fn new(script: &'a Script) -> Self {
        Self {
            script,
            static_args: Vec::new(),
            scope: TableScope::none(),
            env_script: None,
        }
    }

    /// Set the table scope.
    pub fn with_scope(mut self, scope: TableScope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the environment-initialization script.
    pub fn with_env_script(mut self, env_script: Option<&'a Script>) -> Self {
        self.env_script = env_script;
        self
    }

    /// Set the static arguments.
    pub fn with_static_args(mut self, static_args: Vec<Value>) -> Self {
        self.static_args = static_args;
        self
    }
}

/// Executes scripts inside a fresh sandbox per invocation.
#[derive(Debug, Clone)]
pub struct TransactionalScriptRunner {
    partitions: Arc<TablePartitions>,
    constants: Arc<SandboxConstants>,
    env: Arc<Value>,
    limits: ExecutionLimits,
}

impl TransactionalScriptRunner {
    /// Runner with the standard constants.
    pub fn new(partitions: Arc<TablePartitions>, limits: ExecutionLimits) -> Self {
        let constants = SandboxConstants::standard(partitions.count());
        Self::with_constants(partitions, constants, limits)
    }

    /// Runner with explicit constants.
    pub fn with_constants(
        partitions: Arc<TablePartitions>,
        constants: SandboxConstants,
        limits: ExecutionLimits,
    ) -> Self {
        let env = Arc::new(constants.to_env());
        Self {
            partitions,
            constants: Arc::new(constants),
            env,
            limits,
        }
    }

    /// The partition handles scripts are bound to.
    pub fn partitions(&self) -> &TablePartitions {
        &self.partitions
    }

    /// Constants injected as `env`.
    pub fn constants(&self) -> &SandboxConstants {
        &self.constants
    }

    /// Per-script resource limits.
    pub fn limits(&self) -> ExecutionLimits {
        self.limits
    }

    fn globals(&self, args: Value, static_args: &[Value]) -> Map<String, Value> {
        let mut globals = Map::new();
        globals.insert(ARGS_GLOBAL.to_string(), args);
        globals.insert(
            STATIC_ARGS_GLOBAL.to_string(),
            Value::Array(static_args.to_vec()),
        );
        globals.insert(ENV_GLOBAL.to_string(), self.env.as_ref().clone());
        globals
    }

    /// Run the environment-initialization script and return the functions it
    /// defined. A faulting env script contributes nothing.
    fn setup_environment(
        &self,
        tx: &mut Transaction,
        env_script: Option<&Script>,
    ) -> FunctionTable {
        let Some(env_script) = env_script else {
            return FunctionTable::new();
        };
        let globals = self.globals(Value::Null, &[]);
        let scope = TableScope::none();
        let mut tables = ScopedTables::new(tx, &self.partitions, &scope);

        let result = env_script.compile().and_then(|program| {
            let mut interp =
                Interpreter::new(&mut tables, &globals, FunctionTable::new(), self.limits);
            interp.eval(&program)?;
            Ok(interp.into_functions())
        });
        match result {
            Ok(functions) => {
                debug!(functions = functions.len(), "Environment script loaded");
                functions
            }
            Err(fault) => {
                warn!(error = %fault, "Environment script failed, running without it");
                FunctionTable::new()
            }
        }
    }

    /// Run `invocation.script` with `args` against `tx`.
    ///
    /// Returns the script's terminal value. Writes made by the script remain
    /// pending in `tx`.
    #[instrument(skip_all, fields(access = ?invocation.scope.access()))]
    pub fn run(
        &self,
        tx: &mut Transaction,
        invocation: &ScriptInvocation<'_>,
        args: Value,
    ) -> Result<Value, ScriptFault> {
        let functions = self.setup_environment(tx, invocation.env_script);
        let program = invocation.script.compile()?;
        let globals = self.globals(args, &invocation.static_args);

        let mut tables = ScopedTables::new(tx, &self.partitions, &invocation.scope);
        let mut interp = Interpreter::new(&mut tables, &globals, functions, self.limits);
        let result = interp.eval(&program);
        debug!(steps = interp.steps(), ok = result.is_ok(), "Script finished");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::partitions::PartitionId;
    use crate::domain::scope::TableAccess;
    use lc_01_versioned_store::Store;
    use serde_json::json;

    fn runner(n: usize) -> (Store, TransactionalScriptRunner) {
        let store = Store::new();
        let partitions = Arc::new(TablePartitions::create(&store, n).unwrap());
        (store, TransactionalScriptRunner::new(partitions, ExecutionLimits::default()))
    }

    fn rw() -> TableScope {
        TableScope::all(TableAccess::ReadWrite)
    }

    #[test]
    fn test_returns_terminal_value() {
        let (store, runner) = runner(1);
        let script = Script::from_program(&json!({"result": {"$var": "args.x"}}));
        let mut tx = store.begin();
        let out = runner
            .run(&mut tx, &ScriptInvocation::new(&script), json!({"x": 9}))
            .unwrap();
        assert_eq!(out, json!({"result": 9}));
    }

    #[test]
    fn test_error_codes_are_injected() {
        let (store, runner) = runner(1);
        let script = Script::from_program(&json!({"$var": "env.error_codes.NOT_FOUND"}));
        let mut tx = store.begin();
        let out = runner
            .run(&mut tx, &ScriptInvocation::new(&script), Value::Null)
            .unwrap();
        assert_eq!(out, json!(404));
    }

    #[test]
    fn test_static_args() {
        let (store, runner) = runner(1);
        let script = Script::from_program(&json!({"$var": "static_args.1"}));
        let invocation =
            ScriptInvocation::new(&script).with_static_args(vec![json!("a"), json!("b")]);
        let mut tx = store.begin();
        assert_eq!(runner.run(&mut tx, &invocation, Value::Null).unwrap(), json!("b"));
    }

    #[test]
    fn test_writes_stay_pending_in_transaction() {
        let (store, runner) = runner(2);
        let script = Script::from_program(&json!({"$do": [
            {"$put": ["pub1", "k", {"$var": "args"}]},
            {"$get": ["pub1", "k"]}
        ]}));
        let invocation = ScriptInvocation::new(&script).with_scope(rw());
        let mut tx = store.begin();
        assert_eq!(runner.run(&mut tx, &invocation, json!(5)).unwrap(), json!(5));
        assert!(tx.has_writes());
        assert_eq!(store.current_version(), 0);
    }

    #[test]
    fn test_scope_excludes_other_partitions() {
        let (store, runner) = runner(2);
        let script = Script::from_program(&json!({"$put": ["priv0", "k", 1]}));
        let invocation = ScriptInvocation::new(&script)
            .with_scope(TableScope::only([PartitionId::public(0)], TableAccess::ReadWrite));
        let mut tx = store.begin();
        assert_eq!(
            runner.run(&mut tx, &invocation, Value::Null),
            Err(ScriptFault::TableNotInScope("priv0".into()))
        );
    }

    #[test]
    fn test_env_script_definitions_are_visible() {
        let (store, runner) = runner(1);
        let env = Script::from_program(&json!(
            {"$def": ["double", ["x"], {"$mul": [{"$var": "x"}, 2]}]}
        ));
        let script = Script::from_program(&json!({"$call": ["double", {"$var": "args"}]}));
        let invocation = ScriptInvocation::new(&script).with_env_script(Some(&env));
        let mut tx = store.begin();
        assert_eq!(runner.run(&mut tx, &invocation, json!(21)).unwrap(), json!(42));
    }

    #[test]
    fn test_env_script_cannot_touch_tables() {
        let (store, runner) = runner(1);
        let env = Script::from_program(&json!({"$do": [
            {"$def": ["helper", [], 1]},
            {"$put": ["pub0", "k", 1]}
        ]}));
        let script = Script::from_program(&json!({"$call": ["helper"]}));
        let invocation = ScriptInvocation::new(&script)
            .with_scope(rw())
            .with_env_script(Some(&env));
        let mut tx = store.begin();

        // The env script faults on its write, so its definitions are dropped.
        assert_eq!(
            runner.run(&mut tx, &invocation, Value::Null),
            Err(ScriptFault::UndefinedFunction("helper".into()))
        );
        assert!(!tx.has_writes());
    }

    #[test]
    fn test_malformed_env_script_is_tolerated() {
        let (store, runner) = runner(1);
        let env = Script::new("{{ not a script");
        let script = Script::from_program(&json!({"result": "ok"}));
        let invocation = ScriptInvocation::new(&script).with_env_script(Some(&env));
        let mut tx = store.begin();
        assert_eq!(
            runner.run(&mut tx, &invocation, Value::Null).unwrap(),
            json!({"result": "ok"})
        );
    }

    #[test]
    fn test_runs_are_deterministic() {
        let (store, runner) = runner(1);
        let mut seed = store.begin();
        let table = runner.partitions().get(PartitionId::public(0)).unwrap().clone();
        for i in 0..5 {
            seed.put(&table, &json!(i), &json!({"n": i})).unwrap();
        }
        seed.commit().unwrap();

        let script = Script::from_program(&json!({
            "total": {"$add": [
                {"$field": [{"$get": ["pub0", 3]}, "n"]},
                {"$len": {"$var": "env.error_codes"}}
            ]},
            "echo": {"$var": "args"}
        }));
        let invocation = ScriptInvocation::new(&script).with_scope(rw());
        let first = runner.run(&mut store.begin(), &invocation, json!({"b": 1, "a": 2})).unwrap();
        let second = runner.run(&mut store.begin(), &invocation, json!({"a": 2, "b": 1})).unwrap();
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn test_fresh_budget_per_script() {
        let store = Store::new();
        let partitions = Arc::new(TablePartitions::create(&store, 1).unwrap());
        let limits = ExecutionLimits {
            max_steps: 8,
            max_call_depth: 4,
            ..ExecutionLimits::default()
        };
        let runner = TransactionalScriptRunner::new(partitions, limits);
        // Each script alone fits in 8 steps; together they would not.
        let env =
            Script::from_program(&json!({"$do": [{"$def": ["f", [], [1, 2, 3]]}, [4, 5, 6]]}));
        let script = Script::from_program(&json!({"$call": ["f"]}));
        let invocation = ScriptInvocation::new(&script).with_env_script(Some(&env));
        let mut tx = store.begin();
        assert_eq!(runner.run(&mut tx, &invocation, Value::Null).unwrap(), json!([1, 2, 3]));
    }
}
