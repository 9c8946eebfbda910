//! The session: root object graph for one debug connection lifetime.
//!
//! Lifecycle methods bracket each built-in default procedure with the hooks
//! from the catalog, and guarantee that exactly one of (script-provided
//! behavior, built-in default) runs per override-hook invocation.

use std::cell::{Ref, RefCell, RefMut};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::debug;

use crate::delegate::HookOutcome;
use crate::error::{CommandError, DispatchError, LoadError, SessionError};
use crate::host::{BoardInfo, ResetType, SharedCore, SharedProbe, SharedTarget};
use crate::options::Options;
use crate::script::{ScriptHost, UserScript};

pub struct Session {
    project_dir: PathBuf,
    options: Rc<RefCell<Options>>,
    probe: SharedProbe,
    target: SharedTarget,
    cores: Vec<SharedCore>,
    board: BoardInfo,
    script: Option<UserScript>,
}

impl Session {
    pub fn new(probe: SharedProbe, target: SharedTarget, board: BoardInfo) -> Session {
        Session {
            project_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            options: Rc::new(RefCell::new(Options::new())),
            probe,
            target,
            cores: Vec::new(),
            board,
            script: None,
        }
    }

    /// Base directory for resolving relative script paths.
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Session {
        self.project_dir = dir.into();
        self
    }

    pub fn with_options(self, options: Options) -> Session {
        *self.options.borrow_mut() = options;
        self
    }

    pub fn with_core(mut self, core: SharedCore) -> Session {
        self.cores.push(core);
        self
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn options(&self) -> Ref<'_, Options> {
        self.options.borrow()
    }

    pub fn options_mut(&self) -> RefMut<'_, Options> {
        self.options.borrow_mut()
    }

    pub fn board(&self) -> &BoardInfo {
        &self.board
    }

    pub fn target(&self) -> &SharedTarget {
        &self.target
    }

    /// The loaded user script, if any.
    pub fn user_script(&self) -> Option<&UserScript> {
        self.script.as_ref()
    }

    /// Load the session's user script.
    ///
    /// `explicit` is the command-line override and takes precedence over
    /// the `user_script` option and the default filenames. Returns whether
    /// a script was loaded; running without one is normal.
    pub fn load_user_script(&mut self, explicit: Option<&Path>) -> Result<bool, LoadError> {
        let host = ScriptHost {
            project_dir: self.project_dir.clone(),
            options: self.options.clone(),
            probe: self.probe.clone(),
            target: self.target.clone(),
            board: self.board.clone(),
        };
        self.script = UserScript::load(host, explicit)?;
        Ok(self.script.is_some())
    }

    fn hook(
        &self,
        invoke: impl FnOnce(&UserScript) -> Result<HookOutcome, DispatchError>,
    ) -> Result<HookOutcome, SessionError> {
        match &self.script {
            Some(script) => invoke(script).map_err(SessionError::from),
            None => Ok(HookOutcome::RunDefault),
        }
    }

    fn core(&self, index: usize) -> Result<SharedCore, SessionError> {
        self.cores
            .get(index)
            .cloned()
            .ok_or(SessionError::NoSuchCore(index))
    }

    /// Establish the debug connection.
    pub fn connect(&mut self) -> Result<(), SessionError> {
        self.hook(|s| s.will_connect())?;
        self.target.borrow_mut().connect()?;
        self.hook(|s| s.did_connect())?;
        Ok(())
    }

    /// Run target initialization.
    ///
    /// The target's init sequence is offered to `will_init_target` for
    /// editing, then executed — the same instance, in final list order.
    pub fn init_target(&mut self) -> Result<(), SessionError> {
        let sequence = Rc::new(RefCell::new(self.target.borrow_mut().init_sequence()));
        self.hook(|s| s.will_init_target(&sequence))?;
        crate::sequence::run_shared(&sequence)?;
        self.hook(|s| s.did_init_target())?;
        Ok(())
    }

    /// Start debugging a core.
    pub fn start_core(&mut self, core: usize) -> Result<(), SessionError> {
        let core = self.core(core)?;
        if !self.hook(|s| s.will_start_debug_core(&core))?.skips_default() {
            core.borrow_mut().start()?;
        }
        self.hook(|s| s.did_start_debug_core(&core))?;
        Ok(())
    }

    /// Stop debugging a core.
    pub fn stop_core(&mut self, core: usize) -> Result<(), SessionError> {
        let core = self.core(core)?;
        if !self.hook(|s| s.will_stop_debug_core(&core))?.skips_default() {
            core.borrow_mut().stop()?;
        }
        self.hook(|s| s.did_stop_debug_core(&core))?;
        Ok(())
    }

    /// Reset a core.
    pub fn reset(&mut self, core: usize, reset_type: ResetType) -> Result<(), SessionError> {
        let core = self.core(core)?;
        debug!("reset core ({reset_type})");
        if !self.hook(|s| s.will_reset(&core, reset_type))?.skips_default() {
            core.borrow_mut().reset(reset_type)?;
        }
        self.hook(|s| s.did_reset(&core, reset_type))?;
        Ok(())
    }

    /// Arrange for a core to halt out of the next reset.
    pub fn set_reset_catch(
        &mut self,
        core: usize,
        reset_type: ResetType,
    ) -> Result<(), SessionError> {
        let core = self.core(core)?;
        if !self.hook(|s| s.set_reset_catch(&core, reset_type))?.skips_default() {
            core.borrow_mut().set_reset_catch(reset_type)?;
        }
        Ok(())
    }

    /// Undo [`Session::set_reset_catch`].
    pub fn clear_reset_catch(
        &mut self,
        core: usize,
        reset_type: ResetType,
    ) -> Result<(), SessionError> {
        let core = self.core(core)?;
        self.hook(|s| s.clear_reset_catch(&core, reset_type))?;
        core.borrow_mut().clear_reset_catch(reset_type)?;
        Ok(())
    }

    /// Erase all of the target's flash.
    pub fn mass_erase(&mut self) -> Result<(), SessionError> {
        if !self.hook(|s| s.mass_erase())?.skips_default() {
            self.target.borrow_mut().mass_erase()?;
        }
        Ok(())
    }

    pub fn trace_start(&mut self, mode: u32) -> Result<(), SessionError> {
        self.hook(|s| s.trace_start(mode))?;
        self.target.borrow_mut().trace_start(mode)?;
        Ok(())
    }

    pub fn trace_stop(&mut self, mode: u32) -> Result<(), SessionError> {
        self.hook(|s| s.trace_stop(mode))?;
        self.target.borrow_mut().trace_stop(mode)?;
        Ok(())
    }

    /// Tear down the debug connection.
    ///
    /// Whether the core is resumed first comes from the
    /// `resume_on_disconnect` option (default true).
    pub fn disconnect(&mut self) -> Result<(), SessionError> {
        let resume = self.options.borrow().get_bool("resume_on_disconnect", true);
        debug!("disconnect (resume={resume})");
        self.hook(|s| s.will_disconnect(resume))?;
        self.target.borrow_mut().disconnect(resume)?;
        self.hook(|s| s.did_disconnect(resume))?;
        Ok(())
    }

    /// Invoke a script-registered command on behalf of a front end.
    pub fn run_command(&self, name: &str, tokens: &[&str]) -> Result<Option<String>, CommandError> {
        match &self.script {
            Some(script) => script.run_command(name, tokens),
            None => Err(CommandError::Unknown(name.to_string())),
        }
    }
}
