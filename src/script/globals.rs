//! The injected script namespace.
//!
//! Built once per session, before the script body runs. The symbol set is a
//! versioned contract with user scripts: adding or removing a global is a
//! breaking change.
//!
//! Injected symbols:
//! - `log` — `debug`/`info`/`warning`/`error` functions
//! - `session`, `target`, `probe`, `board`, `options` — the session graph
//! - `ResetType`, `MemoryType` — enumeration tables
//! - `RamRegion`, `RomRegion`, `FlashRegion`, `DeviceRegion` — region
//!   constructors
//! - `Error`, `TransferError`, `TransferTimeoutError`, `TransferFaultError`
//!   — error classes with hierarchical `is` classification
//! - `command` — the command-definition marker

use std::cell::RefCell;
use std::rc::Rc;

use mlua::{AnyUserData, Lua, Table, Value};

use crate::commands::CommandRegistry;
use crate::host::{MemoryRegion, MemoryType, ResetType};
use crate::script::udata::{
    BoardHandle, OptionsHandle, ProbeHandle, RegionHandle, SessionHandle, TargetHandle,
};
use crate::script::ScriptHost;

/// Userdata handles retained for hook dispatch after installation.
pub(crate) struct Handles {
    pub board: AnyUserData,
    pub target: AnyUserData,
}

/// Error classes, defined in Lua itself.
///
/// Script-raised errors are class-tagged tables and classify by walking the
/// parent chain. Host faults cross the Rust boundary as opaque error
/// objects, so for those `is` falls back to matching the class name (or any
/// subclass name) inside `tostring(err)`, which `TransferError`'s `Display`
/// leads with.
const PRELUDE: &str = r#"
local function class(name, parent)
    local c = { name = name, parent = parent, subclasses = {} }
    if parent ~= nil then
        parent.subclasses[#parent.subclasses + 1] = c
    end
    function c.is(err)
        if type(err) == "table" and err.class ~= nil then
            local k = err.class
            while k ~= nil do
                if k == c then return true end
                k = k.parent
            end
            return false
        end
        local text = tostring(err)
        local pending = { c }
        local i = 1
        while pending[i] ~= nil do
            local k = pending[i]
            if text:find(k.name .. ":", 1, true) ~= nil then return true end
            for _, sub in ipairs(k.subclasses) do
                pending[#pending + 1] = sub
            end
            i = i + 1
        end
        return false
    end
    setmetatable(c, {
        __call = function(self, message)
            return setmetatable({ class = self, message = message }, {
                __tostring = function(e)
                    return self.name .. ": " .. tostring(e.message)
                end,
            })
        end,
    })
    return c
end

Error = class("Error")
TransferError = class("TransferError", Error)
TransferTimeoutError = class("TransferTimeoutError", TransferError)
TransferFaultError = class("TransferFaultError", TransferError)
"#;

/// Build every injected global and return the handles the dispatcher needs.
pub(crate) fn install(
    lua: &Lua,
    host: &ScriptHost,
    commands: &Rc<RefCell<CommandRegistry>>,
) -> mlua::Result<Handles> {
    let globals = lua.globals();

    install_log(lua, &globals)?;
    install_enums(lua, &globals)?;
    install_region_ctors(lua, &globals)?;
    lua.load(PRELUDE).set_name("=probescript").exec()?;

    let options = lua.create_userdata(OptionsHandle(host.options.clone()))?;
    let probe = lua.create_userdata(ProbeHandle(host.probe.clone()))?;
    let target = lua.create_userdata(TargetHandle(host.target.clone()))?;
    let board = lua.create_userdata(BoardHandle {
        info: host.board.clone(),
        probe: host.probe.clone(),
    })?;
    let session = lua.create_userdata(SessionHandle {
        project_dir: host.project_dir.clone(),
        options: options.clone(),
        probe: probe.clone(),
        target: target.clone(),
        board: board.clone(),
    })?;

    globals.set("options", options)?;
    globals.set("probe", probe)?;
    globals.set("target", target.clone())?;
    globals.set("board", board.clone())?;
    globals.set("session", session)?;

    install_command_marker(lua, &globals, commands)?;

    Ok(Handles { board, target })
}

fn install_log(lua: &Lua, globals: &Table) -> mlua::Result<()> {
    let table = lua.create_table()?;
    table.set(
        "debug",
        lua.create_function(|_, message: String| {
            log::debug!(target: "user_script", "{message}");
            Ok(())
        })?,
    )?;
    table.set(
        "info",
        lua.create_function(|_, message: String| {
            log::info!(target: "user_script", "{message}");
            Ok(())
        })?,
    )?;
    table.set(
        "warning",
        lua.create_function(|_, message: String| {
            log::warn!(target: "user_script", "{message}");
            Ok(())
        })?,
    )?;
    table.set(
        "error",
        lua.create_function(|_, message: String| {
            log::error!(target: "user_script", "{message}");
            Ok(())
        })?,
    )?;
    globals.set("log", table)
}

fn install_enums(lua: &Lua, globals: &Table) -> mlua::Result<()> {
    let reset = lua.create_table()?;
    reset.set("HW", ResetType::Hw.as_i64())?;
    reset.set("SW", ResetType::Sw.as_i64())?;
    reset.set("SW_SYSRESETREQ", ResetType::SwSysresetreq.as_i64())?;
    reset.set("SW_VECTRESET", ResetType::SwVectreset.as_i64())?;
    reset.set("SW_EMULATED", ResetType::SwEmulated.as_i64())?;
    globals.set("ResetType", reset)?;

    let memory = lua.create_table()?;
    memory.set("RAM", MemoryType::Ram.name())?;
    memory.set("ROM", MemoryType::Rom.name())?;
    memory.set("FLASH", MemoryType::Flash.name())?;
    memory.set("DEVICE", MemoryType::Device.name())?;
    globals.set("MemoryType", memory)
}

fn install_region_ctors(lua: &Lua, globals: &Table) -> mlua::Result<()> {
    for (ctor, kind) in [
        ("RamRegion", MemoryType::Ram),
        ("RomRegion", MemoryType::Rom),
        ("FlashRegion", MemoryType::Flash),
        ("DeviceRegion", MemoryType::Device),
    ] {
        let func = lua.create_function(move |_, spec: Table| {
            let start: u64 = spec
                .get::<Option<u64>>("start")?
                .ok_or_else(|| mlua::Error::RuntimeError(format!("{ctor} requires `start`")))?;
            let length: u64 = spec
                .get::<Option<u64>>("length")?
                .ok_or_else(|| mlua::Error::RuntimeError(format!("{ctor} requires `length`")))?;
            let name: Option<String> = spec.get("name")?;
            let sector_size: Option<u32> = spec.get("sector_size")?;

            let mut region =
                MemoryRegion::new(kind, name.unwrap_or_else(|| kind.name().to_string()), start, length);
            region.sector_size = sector_size;
            Ok(RegionHandle(region))
        })?;
        globals.set(ctor, func)?;
    }
    Ok(())
}

fn install_command_marker(
    lua: &Lua,
    globals: &Table,
    commands: &Rc<RefCell<CommandRegistry>>,
) -> mlua::Result<()> {
    let registry = commands.clone();
    let marker = lua.create_function(move |lua, value: Value| {
        match registry.borrow_mut().register_from_lua(lua, &value) {
            Ok(name) => log::debug!("registered user command `{name}`"),
            // Registration failures are local: the function stays usable,
            // the command just does not exist.
            Err(e) => log::warn!("user command not registered: {e}"),
        }
        // Hand the callable back unchanged, decorator style.
        match value {
            Value::Table(ref t) => {
                let positional: Value = t.get(1)?;
                if positional.is_nil() {
                    t.get::<Value>("fn")
                } else {
                    Ok(positional)
                }
            }
            other => Ok(other),
        }
    })?;
    globals.set("command", marker)
}
