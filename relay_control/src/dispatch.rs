use crate::{ProcedureError, ProtocolError};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;

type ProcedureResult = Result<Value, ProcedureError>;
type Handler = Box<dyn Fn(Value) -> Result<ProcedureResult, serde_json::Error> + Send + Sync>;

/// Maps procedure names to their handlers.
///
/// Handlers are typed; the table takes care of decoding the arguments and
/// encoding the reply, so that a handler only ever sees well-formed input.
#[derive(Default)]
pub struct ProcedureTable {
    procedures: HashMap<&'static str, Handler>,
}

impl ProcedureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `name`, replacing any existing one
    pub fn register<A, R, F>(&mut self, name: &'static str, handler: F) -> &mut Self
    where
        A: DeserializeOwned,
        R: Serialize,
        F: Fn(A) -> Result<R, ProcedureError> + Send + Sync + 'static,
    {
        let wrapped = move |args: Value| -> Result<ProcedureResult, serde_json::Error> {
            let args = serde_json::from_value(args)?;
            Ok(handler(args).and_then(|reply| {
                serde_json::to_value(reply).map_err(|e| ProcedureError::Internal(e.to_string()))
            }))
        };
        self.procedures.insert(name, Box::new(wrapped));
        self
    }

    /// Names of all registered procedures, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut ret: Vec<_> = self.procedures.keys().copied().collect();
        ret.sort_unstable();
        ret
    }

    /// Invoke the named procedure.
    ///
    /// The outer `Result` is a protocol-level failure (unknown procedure or
    /// undecodable arguments); the inner one is the procedure's own outcome.
    pub fn call(&self, procedure: &str, args: Value) -> Result<ProcedureResult, ProtocolError> {
        let handler = self
            .procedures
            .get(procedure)
            .ok_or_else(|| ProtocolError::UnknownProcedure(procedure.to_owned()))?;

        handler(args).map_err(|source| ProtocolError::InvalidArguments {
            procedure: procedure.to_owned(),
            source,
        })
    }
}
