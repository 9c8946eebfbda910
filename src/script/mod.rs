//! The loaded user script: namespace, delegates, and commands.
//!
//! One session loads at most one script. The script owns a dedicated Lua
//! state, so nothing a script binds can leak into another session's
//! namespace, and everything it binds survives for the session lifetime.

mod globals;
mod loader;
pub(crate) mod reflect;
mod udata;

pub use loader::{DEFAULT_SCRIPT_NAMES, USER_SCRIPT_OPTION};

use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use mlua::{Lua, LuaOptions, StdLib, Value};

use crate::commands::CommandRegistry;
use crate::delegate::dispatch::{self, Delegate, Resolved};
use crate::delegate::{self, HookContract, HookOutcome};
use crate::error::{CommandError, ContractViolation, DispatchError, LoadError};
use crate::host::{BoardInfo, ResetType, SharedCore, SharedProbe, SharedTarget};
use crate::options::Options;
use crate::sequence::CallSequence;
use crate::script::udata::{CoreHandle, SequenceHandle};

/// The slice of the session graph a script gets access to.
pub(crate) struct ScriptHost {
    pub project_dir: PathBuf,
    pub options: Rc<RefCell<Options>>,
    pub probe: SharedProbe,
    pub target: SharedTarget,
    pub board: BoardInfo,
}

/// A loaded, validated user script.
pub struct UserScript {
    lua: Lua,
    path: PathBuf,
    delegates: HashMap<&'static str, Delegate>,
    violations: Vec<ContractViolation>,
    commands: Rc<RefCell<CommandRegistry>>,
    handles: globals::Handles,
}

impl UserScript {
    /// Discover, execute, and validate the session's script.
    ///
    /// Returns `Ok(None)` when no script is configured anywhere — that is
    /// the normal no-script session, not an error.
    pub(crate) fn load(
        host: ScriptHost,
        explicit: Option<&Path>,
    ) -> Result<Option<UserScript>, LoadError> {
        let Some(source) = loader::discover(&host, explicit)? else {
            return Ok(None);
        };

        // ALL_SAFE plus the debug library: delegate and command
        // registration need `debug.getinfo`/`debug.getlocal` for parameter
        // reflection. Scripts are as trusted as the host process, so the
        // debug library is not a sandbox hole here.
        let lua = unsafe {
            Lua::unsafe_new_with(StdLib::ALL_SAFE | StdLib::DEBUG, LuaOptions::default())
        };

        let commands = Rc::new(RefCell::new(CommandRegistry::new()));
        let handles = globals::install(&lua, &host, &commands).map_err(LoadError::Environment)?;

        loader::execute(&lua, &source)?;

        let mut delegates = HashMap::new();
        let mut violations = Vec::new();
        for contract in delegate::CATALOG {
            match dispatch::resolve(&lua, contract).map_err(LoadError::Environment)? {
                Resolved::Absent => {}
                Resolved::Bound(delegate) => {
                    delegates.insert(contract.name, delegate);
                }
                Resolved::Invalid(violation) => {
                    log::warn!("{violation}");
                    violations.push(violation);
                }
            }
        }
        log::debug!(
            "user script defines {} delegate(s), {} command(s)",
            delegates.len(),
            commands.borrow().len()
        );

        Ok(Some(UserScript {
            lua,
            path: source.path,
            delegates,
            violations,
            commands,
            handles,
        }))
    }

    /// Path the script was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the script defines an eligible delegate for `hook`.
    pub fn has_delegate(&self, hook: &str) -> bool {
        self.delegates.contains_key(hook)
    }

    /// Contract violations recorded while validating delegates.
    pub fn contract_violations(&self) -> &[ContractViolation] {
        &self.violations
    }

    /// The script's command registry.
    pub fn commands(&self) -> Ref<'_, CommandRegistry> {
        self.commands.borrow()
    }

    /// Invoke a registered command with raw tokens from a front end.
    pub fn run_command(
        &self,
        name: &str,
        tokens: &[&str],
    ) -> Result<Option<String>, CommandError> {
        // Clone the command out so a callee re-entering the marker does not
        // hit the registry borrow.
        let command = self
            .commands
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| CommandError::Unknown(name.to_string()))?;
        command.invoke(&self.lua, tokens)
    }

    // ---- hook dispatch -------------------------------------------------

    fn dispatch(
        &self,
        contract: &'static HookContract,
        args: &[Value],
    ) -> Result<HookOutcome, DispatchError> {
        match self.delegates.get(contract.name) {
            None => Ok(HookOutcome::RunDefault),
            Some(delegate) => delegate.invoke(contract, args),
        }
    }

    fn board_arg(&self) -> Value {
        Value::UserData(self.handles.board.clone())
    }

    fn target_arg(&self) -> Value {
        Value::UserData(self.handles.target.clone())
    }

    fn core_arg(
        &self,
        contract: &'static HookContract,
        core: &SharedCore,
    ) -> Result<Value, DispatchError> {
        let ud = self
            .lua
            .create_userdata(CoreHandle(core.clone()))
            .map_err(|source| DispatchError {
                hook: contract.name,
                source,
            })?;
        Ok(Value::UserData(ud))
    }

    pub fn will_connect(&self) -> Result<HookOutcome, DispatchError> {
        self.dispatch(&delegate::WILL_CONNECT, &[self.board_arg()])
    }

    pub fn did_connect(&self) -> Result<HookOutcome, DispatchError> {
        self.dispatch(&delegate::DID_CONNECT, &[self.board_arg()])
    }

    /// `will_init_target`: the hook may edit `sequence` in place; the host
    /// executes the same instance afterwards.
    pub fn will_init_target(
        &self,
        sequence: &Rc<RefCell<CallSequence>>,
    ) -> Result<HookOutcome, DispatchError> {
        let contract = &delegate::WILL_INIT_TARGET;
        let handle = self
            .lua
            .create_userdata(SequenceHandle(sequence.clone()))
            .map_err(|source| DispatchError {
                hook: contract.name,
                source,
            })?;
        self.dispatch(contract, &[self.target_arg(), Value::UserData(handle)])
    }

    pub fn did_init_target(&self) -> Result<HookOutcome, DispatchError> {
        self.dispatch(&delegate::DID_INIT_TARGET, &[self.target_arg()])
    }

    pub fn will_start_debug_core(&self, core: &SharedCore) -> Result<HookOutcome, DispatchError> {
        let contract = &delegate::WILL_START_DEBUG_CORE;
        let core = self.core_arg(contract, core)?;
        self.dispatch(contract, &[core])
    }

    pub fn did_start_debug_core(&self, core: &SharedCore) -> Result<HookOutcome, DispatchError> {
        let contract = &delegate::DID_START_DEBUG_CORE;
        let core = self.core_arg(contract, core)?;
        self.dispatch(contract, &[core])
    }

    pub fn will_stop_debug_core(&self, core: &SharedCore) -> Result<HookOutcome, DispatchError> {
        let contract = &delegate::WILL_STOP_DEBUG_CORE;
        let core = self.core_arg(contract, core)?;
        self.dispatch(contract, &[core])
    }

    pub fn did_stop_debug_core(&self, core: &SharedCore) -> Result<HookOutcome, DispatchError> {
        let contract = &delegate::DID_STOP_DEBUG_CORE;
        let core = self.core_arg(contract, core)?;
        self.dispatch(contract, &[core])
    }

    pub fn will_disconnect(&self, resume: bool) -> Result<HookOutcome, DispatchError> {
        self.dispatch(
            &delegate::WILL_DISCONNECT,
            &[self.target_arg(), Value::Boolean(resume)],
        )
    }

    pub fn did_disconnect(&self, resume: bool) -> Result<HookOutcome, DispatchError> {
        self.dispatch(
            &delegate::DID_DISCONNECT,
            &[self.target_arg(), Value::Boolean(resume)],
        )
    }

    pub fn will_reset(
        &self,
        core: &SharedCore,
        reset_type: ResetType,
    ) -> Result<HookOutcome, DispatchError> {
        let contract = &delegate::WILL_RESET;
        let core = self.core_arg(contract, core)?;
        self.dispatch(contract, &[core, Value::Integer(reset_type.as_i64())])
    }

    pub fn did_reset(
        &self,
        core: &SharedCore,
        reset_type: ResetType,
    ) -> Result<HookOutcome, DispatchError> {
        let contract = &delegate::DID_RESET;
        let core = self.core_arg(contract, core)?;
        self.dispatch(contract, &[core, Value::Integer(reset_type.as_i64())])
    }

    pub fn set_reset_catch(
        &self,
        core: &SharedCore,
        reset_type: ResetType,
    ) -> Result<HookOutcome, DispatchError> {
        let contract = &delegate::SET_RESET_CATCH;
        let core = self.core_arg(contract, core)?;
        self.dispatch(contract, &[core, Value::Integer(reset_type.as_i64())])
    }

    pub fn clear_reset_catch(
        &self,
        core: &SharedCore,
        reset_type: ResetType,
    ) -> Result<HookOutcome, DispatchError> {
        let contract = &delegate::CLEAR_RESET_CATCH;
        let core = self.core_arg(contract, core)?;
        self.dispatch(contract, &[core, Value::Integer(reset_type.as_i64())])
    }

    pub fn mass_erase(&self) -> Result<HookOutcome, DispatchError> {
        self.dispatch(&delegate::MASS_ERASE, &[self.target_arg()])
    }

    pub fn trace_start(&self, mode: u32) -> Result<HookOutcome, DispatchError> {
        self.dispatch(
            &delegate::TRACE_START,
            &[self.target_arg(), Value::Integer(mode as i64)],
        )
    }

    pub fn trace_stop(&self, mode: u32) -> Result<HookOutcome, DispatchError> {
        self.dispatch(
            &delegate::TRACE_STOP,
            &[self.target_arg(), Value::Integer(mode as i64)],
        )
    }
}
