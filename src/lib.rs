//! User-script extension point for embedded-target debug hosts.
//!
//! A debug host loads one Lua script per session. The script can:
//!
//! - receive lifecycle notifications (`did_connect`, `did_reset`, ...),
//! - override default procedures by returning a truthy value from an
//!   override hook (`will_reset`, `mass_erase`, ...),
//! - edit the target's initialization sequence in `will_init_target`,
//! - register new interactive commands with the `command` marker.
//!
//! ```lua
//! function will_reset(core, reset_type)
//!     -- emulated reset handled here; skip the built-in procedure
//!     if reset_type == ResetType.SW_EMULATED then
//!         core:halt()
//!         return true
//!     end
//! end
//!
//! function dump_word(address)
//!     return string.format("0x%08x", target:read32(address))
//! end
//! command { dump_word, types = { "int" }, help = "Read one word" }
//! ```
//!
//! Hooks are matched by name against the fixed catalog in [`delegate`]; a
//! function whose parameter names fall outside its hook contract is
//! rejected at load time (the hook degrades to absent) rather than at call
//! time. Commands bind raw text tokens to the declared parameter types
//! (`int` accepts `0x`/`0b` prefixes, a sign, and `_` separators).
//!
//! The probe transport, flash machinery, and front ends are collaborators
//! behind the [`host`] traits; this crate only defines the contract between
//! the host and the script.

pub mod commands;
pub mod delegate;
mod error;
pub mod host;
mod options;
mod script;
mod sequence;
mod session;

pub use error::{
    CommandDefinitionError, CommandError, ContractViolation, DispatchError, LoadError,
    SequenceError, SessionError, StepError, ViolationReason,
};
pub use host::{
    BoardInfo, CoreOps, MemoryRegion, MemoryType, ProbeOps, ResetType, SharedCore, SharedProbe,
    SharedTarget, TargetOps, TransferError,
};
pub use options::{OptionValue, Options};
pub use script::{UserScript, DEFAULT_SCRIPT_NAMES, USER_SCRIPT_OPTION};
pub use sequence::{run_shared, CallSequence, HostStep, SequenceStep, StepFn};
pub use session::Session;

pub use delegate::{HookContract, HookKind, HookOutcome};
