//! Function-signature capture via Lua's own introspection.
//!
//! Delegate validation and command registration both need the parameter
//! list of a script function. Lua exposes it through `debug.getinfo` (arity
//! and the `...` flag) and `debug.getlocal` (parameter names, when called
//! with a function instead of a stack level). Signatures are captured once
//! at registration time and never re-derived per call.

use mlua::{Function, Lua, Table};

/// Parameter list of a script function.
#[derive(Debug, Clone)]
pub(crate) struct FnSignature {
    /// Named parameters, in declaration order.
    pub params: Vec<String>,
    /// Whether the function declares the `...` catch-all. C functions
    /// report no named parameters and set this flag.
    pub variadic: bool,
}

pub(crate) fn inspect(lua: &Lua, func: &Function) -> mlua::Result<FnSignature> {
    let debug: Table = lua.globals().get("debug")?;
    let getinfo: Function = debug.get("getinfo")?;
    let getlocal: Function = debug.get("getlocal")?;

    let info: Table = getinfo.call((func.clone(), "u"))?;
    let nparams: u32 = info.get("nparams")?;
    let variadic: bool = info.get("isvararg")?;

    let mut params = Vec::with_capacity(nparams as usize);
    for i in 1..=nparams {
        let name: Option<String> = getlocal.call((func.clone(), i))?;
        // Lua always names parameters of Lua functions; fall back just in
        // case a stripped chunk reports otherwise.
        params.push(name.unwrap_or_else(|| format!("arg{i}")));
    }

    Ok(FnSignature { params, variadic })
}
