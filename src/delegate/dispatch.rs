//! Delegate resolution and invocation.
//!
//! A delegate's parameter descriptor is captured exactly once, when the
//! script finishes loading; invocation only selects and forwards values.

use mlua::{Function, Lua, MultiValue, Value};

use crate::delegate::{HookContract, HookKind, HookOutcome};
use crate::error::{ContractViolation, DispatchError, ViolationReason};
use crate::script::reflect;

/// A validated script delegate for one hook.
pub(crate) struct Delegate {
    func: Function,
    /// For each function parameter (in declaration order), the index of the
    /// contract parameter that supplies its value.
    param_sources: Vec<usize>,
}

/// What the loader found under a hook's name.
pub(crate) enum Resolved {
    Absent,
    Bound(Delegate),
    Invalid(ContractViolation),
}

/// Inspect the global bound to `contract.name` and validate it.
///
/// Eligibility: the global is a function, declares no `...`, and every one
/// of its parameters names a contract parameter. Anything else degrades the
/// hook to absent with a recorded violation.
pub(crate) fn resolve(lua: &Lua, contract: &'static HookContract) -> mlua::Result<Resolved> {
    let func = match lua.globals().get::<Value>(contract.name)? {
        Value::Nil => return Ok(Resolved::Absent),
        Value::Function(func) => func,
        other => {
            return Ok(Resolved::Invalid(ContractViolation {
                hook: contract.name,
                reason: ViolationReason::NotAFunction {
                    type_name: other.type_name(),
                },
            }))
        }
    };

    let sig = reflect::inspect(lua, &func)?;
    if sig.variadic {
        return Ok(Resolved::Invalid(ContractViolation {
            hook: contract.name,
            reason: ViolationReason::Variadic,
        }));
    }

    let mut param_sources = Vec::with_capacity(sig.params.len());
    for param in &sig.params {
        match contract.params.iter().position(|c| c == param) {
            Some(index) => param_sources.push(index),
            None => {
                return Ok(Resolved::Invalid(ContractViolation {
                    hook: contract.name,
                    reason: ViolationReason::UnknownParameter {
                        parameter: param.clone(),
                    },
                }))
            }
        }
    }

    Ok(Resolved::Bound(Delegate {
        func,
        param_sources,
    }))
}

impl Delegate {
    /// Call the delegate with the subset of contract arguments it declares,
    /// in its own parameter order, and interpret the result.
    ///
    /// `args` must hold one value per contract parameter, in contract
    /// order; the session facade constructs it that way.
    pub(crate) fn invoke(
        &self,
        contract: &'static HookContract,
        args: &[Value],
    ) -> Result<HookOutcome, DispatchError> {
        debug_assert_eq!(args.len(), contract.params.len());
        let selected: MultiValue = self
            .param_sources
            .iter()
            .map(|&i| args[i].clone())
            .collect();

        let ret = self
            .func
            .call::<Value>(selected)
            .map_err(|source| DispatchError {
                hook: contract.name,
                source,
            })?;

        Ok(match contract.kind {
            HookKind::Notification => HookOutcome::Delivered,
            HookKind::Override => {
                if truthy(&ret) {
                    HookOutcome::SkipDefault
                } else {
                    HookOutcome::RunDefault
                }
            }
        })
    }
}

// Lua truthiness: only nil and false are falsy.
fn truthy(value: &Value) -> bool {
    !matches!(value, Value::Nil | Value::Boolean(false))
}
