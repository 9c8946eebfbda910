//! Errors reported by the user-script extension point.
//!
//! The taxonomy distinguishes *registration-time* problems, which are always
//! recoverable and local (a command is not registered, a delegate degrades
//! to absent), from *invocation-time* failures of script logic, which are
//! never swallowed.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::commands::ParamKind;
use crate::host::TransferError;

/// Script loading failed; fatal to session startup.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The named script file could not be read.
    #[error("user script `{path}` is not readable")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The script body raised an error at top level.
    #[error("user script `{path}` failed to execute")]
    Execution {
        path: PathBuf,
        #[source]
        source: mlua::Error,
    },
    /// Preparing the script environment (globals, reflection) failed.
    #[error("user script environment failure")]
    Environment(#[source] mlua::Error),
}

/// Why a would-be delegate was rejected at load time.
#[derive(Debug, Clone)]
pub enum ViolationReason {
    /// The global bound to a hook name is not a function.
    NotAFunction { type_name: &'static str },
    /// The function declares the `...` catch-all.
    Variadic,
    /// The function declares a parameter outside the hook contract.
    UnknownParameter { parameter: String },
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationReason::NotAFunction { type_name } => {
                write!(f, "global is a {type_name}, not a function")
            }
            ViolationReason::Variadic => write!(f, "delegates may not declare `...`"),
            ViolationReason::UnknownParameter { parameter } => {
                write!(f, "parameter `{parameter}` is not in the hook contract")
            }
        }
    }
}

/// A script function matched a hook name but did not satisfy its contract.
///
/// Non-fatal: the hook is treated as absent for the session, and the
/// violation is recorded on the loaded script for diagnostics.
#[derive(Debug, Clone, Error)]
#[error("hook `{hook}` ignored: {reason}")]
pub struct ContractViolation {
    pub hook: &'static str,
    pub reason: ViolationReason,
}

/// A valid delegate raised during invocation; fatal to the in-progress
/// lifecycle operation.
#[derive(Debug, Error)]
#[error("user script hook `{hook}` failed")]
pub struct DispatchError {
    pub hook: &'static str,
    #[source]
    pub source: mlua::Error,
}

/// A command registration was rejected. The underlying function is left
/// untouched in the script namespace.
#[derive(Debug, Clone, Error)]
pub enum CommandDefinitionError {
    #[error("command marker expects a function or a definition table")]
    InvalidMarker,
    #[error("command function has no name: pass `name` or bind the function to a global")]
    NoName,
    #[error("command `{command}`: `{field}` is not a function")]
    NotAFunction { command: String, field: &'static str },
    #[error("command `{command}`: parameter `{parameter}` declares unsupported type `{ty}`")]
    UnsupportedType {
        command: String,
        parameter: String,
        ty: String,
    },
    #[error("command `{command}`: {declared} parameter types declared, function takes {takes}")]
    TypeCount {
        command: String,
        declared: usize,
        takes: usize,
    },
    #[error("command `{command}`: variadic parameter must be last")]
    VariadicNotLast { command: String },
    #[error("command `{command}`: only one variadic parameter is allowed")]
    MultipleVariadic { command: String },
    #[error("command `{command}`: could not inspect function signature")]
    Inspect {
        command: String,
        #[source]
        source: mlua::Error,
    },
}

/// A command invocation failed.
///
/// The argument variants (`TooFew`/`TooMany`/`Invalid`) are reported to the
/// invoking front end with the session otherwise unaffected. `Failed`
/// carries a callee error unmodified in cause.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("command `{command}`: expected {expected} arguments, got {actual}")]
    TooFew {
        command: String,
        expected: usize,
        actual: usize,
    },
    #[error("command `{command}`: too many arguments: expected {expected}, got {actual}")]
    TooMany {
        command: String,
        expected: usize,
        actual: usize,
    },
    #[error("command `{command}`: invalid {kind} value `{token}` for `{parameter}`")]
    Invalid {
        command: String,
        parameter: String,
        kind: ParamKind,
        token: String,
    },
    /// The command function itself raised.
    #[error("command `{command}` failed")]
    Failed {
        command: String,
        #[source]
        source: mlua::Error,
    },
    /// Internal interpreter failure while marshalling arguments.
    #[error(transparent)]
    Lua(#[from] mlua::Error),
}

/// A sequence step failed, or a name-keyed edit missed.
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("init sequence has no step named `{0}`")]
    NoSuchStep(String),
    #[error("init sequence already contains a step named `{0}`")]
    DuplicateStep(String),
    #[error("init step `{name}` failed")]
    StepFailed {
        name: String,
        #[source]
        source: StepError,
    },
}

/// Cause of a failed sequence step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Script(#[from] mlua::Error),
}

/// Umbrella error for session lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error("session has no core {0}")]
    NoSuchCore(usize),
}
