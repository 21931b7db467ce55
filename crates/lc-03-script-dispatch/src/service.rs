//! # Script Dispatcher
//!
//! ```text
//! Request ─→ strip '/' ─→ "__environment"? ──yes──→ 404
//!                            │no
//!                            ▼
//!            lookup "path" ─miss→ lookup "VERB path" ─miss→ 404 "No handler script found for 'VERB path'"
//!                            │hit                  │hit
//!                            ▼                     ▼
//!                  runner.run(tx, scope=partitions, env script, args=request)
//!                            │
//!          ┌─────────────────┼──────────────────────┬──────────────────┐
//!       Success          Failure(code,msg)      fault / malformed    store conflict
//!    sink.submit(tx)      discard tx              discard tx, 500     Err(Conflict)
//! ```
//!
//! One request, one transaction: it is submitted whole or dropped whole.

use lc_01_versioned_store::{CommitReceipt, Store};
use lc_02_script_runtime::{
    ExecutionLimits, ScriptFault, ScriptInvocation, TableAccess, TableScope,
    TransactionalScriptRunner,
};
use parking_lot::Mutex;
use serde::Serialize;
use shared_types::HttpStatus;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn, Span};
use uuid::Uuid;

use crate::domain::outcome::{ResultPolicy, ScriptOutcome};
use crate::domain::request::{Request, Response};
use crate::domain::script_key::{verb_prefixed, ENVIRONMENT_KEY};
use crate::errors::DispatchError;
use crate::ports::outbound::TransactionSink;
use crate::registry::ScriptRegistry;

/// Dispatcher configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// How script values are translated.
    pub result_policy: ResultPolicy,
    /// Access handlers get to the partitions.
    pub table_access: TableAccess,
    /// Per-script resource limits.
    pub limits: ExecutionLimits,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            result_policy: ResultPolicy::Strict,
            table_access: TableAccess::ReadWrite,
            limits: ExecutionLimits::default(),
        }
    }
}

/// Counters kept by the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Requests handled (including failures).
    pub requests: u64,
    /// Success responses.
    pub succeeded: u64,
    /// Application `error` responses.
    pub application_errors: u64,
    /// Not-found responses.
    pub not_found: u64,
    /// Execution faults and rejected script values.
    pub faults: u64,
    /// Store conflicts returned to the caller.
    pub conflicts: u64,
    /// Non-retryable store failures.
    pub store_failures: u64,
}

/// Result of a dispatched request.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    /// Response for the caller.
    pub response: Response,
    /// Receipt of the committed transaction, if the request wrote anything.
    pub commit: Option<CommitReceipt>,
}

impl Dispatched {
    fn uncommitted(response: Response) -> Self {
        Self {
            response,
            commit: None,
        }
    }

    fn not_found(message: String) -> (Self, Disposition) {
        let response = Response::error(HttpStatus::NOT_FOUND, message);
        (Self::uncommitted(response), Disposition::NotFound)
    }

    fn fault() -> (Self, Disposition) {
        (Self::uncommitted(Response::internal_error()), Disposition::Fault)
    }
}

/// Which branch of dispatch produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Succeeded,
    NotFound,
    ApplicationError,
    Fault,
}

/// Resolves requests to scripts and runs them.
pub struct ScriptDispatcher<S: TransactionSink> {
    store: Store,
    registry: Arc<ScriptRegistry>,
    runner: TransactionalScriptRunner,
    sink: S,
    config: DispatchConfig,
    stats: Mutex<DispatchStats>,
}

impl<S: TransactionSink> ScriptDispatcher<S> {
    /// Create a dispatcher over `registry`'s tables in `store`.
    pub fn new(
        store: Store,
        registry: Arc<ScriptRegistry>,
        sink: S,
        config: DispatchConfig,
    ) -> Self {
        let runner =
            TransactionalScriptRunner::new(Arc::clone(registry.partitions()), config.limits);
        Self {
            store,
            registry,
            runner,
            sink,
            config,
            stats: Mutex::new(DispatchStats::default()),
        }
    }

    /// The registry requests resolve against.
    pub fn registry(&self) -> &Arc<ScriptRegistry> {
        &self.registry
    }

    /// Active configuration.
    pub fn config(&self) -> DispatchConfig {
        self.config
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> DispatchStats {
        self.stats.lock().clone()
    }

    fn record(&self, result: &Result<(Dispatched, Disposition), DispatchError>) {
        let mut stats = self.stats.lock();
        stats.requests += 1;
        match result {
            Ok((_, Disposition::Succeeded)) => stats.succeeded += 1,
            Ok((_, Disposition::NotFound)) => stats.not_found += 1,
            Ok((_, Disposition::Fault)) => stats.faults += 1,
            Ok((_, Disposition::ApplicationError)) => stats.application_errors += 1,
            Err(e) if e.is_retryable() => stats.conflicts += 1,
            Err(_) => stats.store_failures += 1,
        }
    }

    /// Handle one request.
    ///
    /// Not-found, application errors and execution faults come back as
    /// responses. `Err` means the transaction could not be applied;
    /// [`DispatchError::Conflict`] asks the caller to retry.
    #[instrument(
        skip(self, request),
        fields(
            request_id = %Uuid::new_v4(),
            verb = %request.verb,
            path = %request.path,
            key = tracing::field::Empty
        )
    )]
    pub fn dispatch(&self, request: &Request) -> Result<Dispatched, DispatchError> {
        let result = self.dispatch_inner(request);
        self.record(&result);
        result.map(|(dispatched, _)| dispatched)
    }

    fn dispatch_inner(
        &self,
        request: &Request,
    ) -> Result<(Dispatched, Disposition), DispatchError> {
        let local_method = request.local_method();
        if local_method == ENVIRONMENT_KEY {
            debug!("Refusing direct call to environment script");
            return Ok(Dispatched::not_found(format!(
                "Cannot call environment script ('{local_method}')"
            )));
        }

        let mut tx = self.store.begin();

        let (key, script) = match self.registry.lookup(&mut tx, local_method)? {
            Some(script) => (local_method.to_string(), script),
            None => {
                let prefixed = verb_prefixed(&request.verb, local_method);
                match self.registry.lookup(&mut tx, &prefixed)? {
                    Some(script) => (prefixed, script),
                    None => {
                        debug!(key = %prefixed, "No handler script");
                        return Ok(Dispatched::not_found(format!(
                            "No handler script found for '{prefixed}'"
                        )));
                    }
                }
            }
        };
        Span::current().record("key", key.as_str());

        let env_script = self.registry.environment_script(&mut tx)?;
        let invocation = ScriptInvocation::new(&script)
            .with_scope(TableScope::all(self.config.table_access))
            .with_env_script(env_script.as_ref());

        let value = match self.runner.run(&mut tx, &invocation, request.script_args()) {
            Ok(value) => value,
            Err(ScriptFault::Store(e)) if e.is_retryable() => {
                debug!(error = %e, "Store conflict during script execution");
                return Err(DispatchError::Conflict(e));
            }
            Err(fault) => {
                error!(key = %key, error = %fault, "Script execution fault");
                return Ok(Dispatched::fault());
            }
        };

        let outcome = match ScriptOutcome::from_value(value, self.config.result_policy) {
            Ok(outcome) => outcome,
            Err(malformed) => {
                error!(key = %key, error = %malformed, "Script returned a malformed result");
                return Ok(Dispatched::fault());
            }
        };

        if !outcome.is_success() {
            let response = outcome.into_response();
            debug!(status = response.status(), "Application error, discarding transaction");
            return Ok((Dispatched::uncommitted(response), Disposition::ApplicationError));
        }

        let commit = match self.sink.submit(tx) {
            Ok(committed) => committed.receipt().cloned(),
            Err(e) => {
                if e.is_retryable() {
                    debug!(error = %e, "Commit conflict");
                } else {
                    warn!(error = %e, "Commit failed");
                }
                return Err(e.into());
            }
        };
        if let Some(receipt) = &commit {
            info!(version = receipt.version, "Committed request transaction");
        }

        let dispatched = Dispatched {
            response: outcome.into_response(),
            commit,
        };
        Ok((dispatched, Disposition::Succeeded))
    }
}
