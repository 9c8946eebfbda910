//! The fixed hook catalog.
//!
//! Hook names, their contract parameter names and order, and their result
//! kinds are the wire format between the host and the user script: a script
//! function is only recognized as a delegate when its name and parameter
//! list match the catalog verbatim.

pub(crate) mod dispatch;

/// What a delegate's return value means to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Return value is discarded.
    Notification,
    /// A truthy return suppresses the default procedure.
    Override,
}

/// Contract for one hook: the arguments the host is willing to supply and
/// how the result is interpreted.
#[derive(Debug, Clone, Copy)]
pub struct HookContract {
    pub name: &'static str,
    /// Parameter names, in the order the host binds them.
    pub params: &'static [&'static str],
    pub kind: HookKind,
}

impl HookContract {
    /// Whether the contract supplies a parameter of this name.
    pub fn allows_param(&self, name: &str) -> bool {
        self.params.contains(&name)
    }
}

/// Result of one hook invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// Notification delivered; return value discarded.
    Delivered,
    /// Run the built-in default procedure (hook absent, or falsy return).
    RunDefault,
    /// The script handled the operation; skip the default procedure.
    SkipDefault,
}

impl HookOutcome {
    pub fn skips_default(self) -> bool {
        self == HookOutcome::SkipDefault
    }
}

use HookKind::{Notification, Override};

pub const WILL_CONNECT: HookContract = HookContract {
    name: "will_connect",
    params: &["board"],
    kind: Notification,
};
pub const DID_CONNECT: HookContract = HookContract {
    name: "did_connect",
    params: &["board"],
    kind: Notification,
};
pub const WILL_INIT_TARGET: HookContract = HookContract {
    name: "will_init_target",
    params: &["target", "init_sequence"],
    kind: Notification,
};
pub const DID_INIT_TARGET: HookContract = HookContract {
    name: "did_init_target",
    params: &["target"],
    kind: Notification,
};
pub const WILL_START_DEBUG_CORE: HookContract = HookContract {
    name: "will_start_debug_core",
    params: &["core"],
    kind: Override,
};
pub const DID_START_DEBUG_CORE: HookContract = HookContract {
    name: "did_start_debug_core",
    params: &["core"],
    kind: Notification,
};
pub const WILL_STOP_DEBUG_CORE: HookContract = HookContract {
    name: "will_stop_debug_core",
    params: &["core"],
    kind: Override,
};
pub const DID_STOP_DEBUG_CORE: HookContract = HookContract {
    name: "did_stop_debug_core",
    params: &["core"],
    kind: Notification,
};
pub const WILL_DISCONNECT: HookContract = HookContract {
    name: "will_disconnect",
    params: &["target", "resume"],
    kind: Notification,
};
pub const DID_DISCONNECT: HookContract = HookContract {
    name: "did_disconnect",
    params: &["target", "resume"],
    kind: Notification,
};
pub const WILL_RESET: HookContract = HookContract {
    name: "will_reset",
    params: &["core", "reset_type"],
    kind: Override,
};
pub const DID_RESET: HookContract = HookContract {
    name: "did_reset",
    params: &["core", "reset_type"],
    kind: Notification,
};
pub const SET_RESET_CATCH: HookContract = HookContract {
    name: "set_reset_catch",
    params: &["core", "reset_type"],
    kind: Override,
};
pub const CLEAR_RESET_CATCH: HookContract = HookContract {
    name: "clear_reset_catch",
    params: &["core", "reset_type"],
    kind: Notification,
};
pub const MASS_ERASE: HookContract = HookContract {
    name: "mass_erase",
    params: &["target"],
    kind: Override,
};
pub const TRACE_START: HookContract = HookContract {
    name: "trace_start",
    params: &["target", "mode"],
    kind: Notification,
};
pub const TRACE_STOP: HookContract = HookContract {
    name: "trace_stop",
    params: &["target", "mode"],
    kind: Notification,
};

/// Every hook the host dispatches, in lifecycle order.
pub const CATALOG: &[HookContract] = &[
    WILL_CONNECT,
    DID_CONNECT,
    WILL_INIT_TARGET,
    DID_INIT_TARGET,
    WILL_START_DEBUG_CORE,
    DID_START_DEBUG_CORE,
    WILL_STOP_DEBUG_CORE,
    DID_STOP_DEBUG_CORE,
    WILL_DISCONNECT,
    DID_DISCONNECT,
    WILL_RESET,
    DID_RESET,
    SET_RESET_CATCH,
    CLEAR_RESET_CATCH,
    MASS_ERASE,
    TRACE_START,
    TRACE_STOP,
];

/// Look up a contract by hook name.
pub fn contract(name: &str) -> Option<&'static HookContract> {
    CATALOG.iter().find(|c| c.name == name)
}
