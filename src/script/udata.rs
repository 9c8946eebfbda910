//! Lua handles over the session object graph.
//!
//! Each handle wraps the shared collaborator it fronts; scripts hold the
//! same objects the host drives, so a hook mutating state through a handle
//! is visible to the host immediately (and vice versa).

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use mlua::{
    AnyUserData, Function, Lua, MetaMethod, UserData, UserDataFields, UserDataMethods,
    UserDataRef, Value,
};

use crate::host::{
    BoardInfo, MemoryRegion, ResetType, SharedCore, SharedProbe, SharedTarget, TransferError,
};
use crate::options::{OptionValue, Options};
use crate::sequence::{CallSequence, StepFn};

fn transfer_err(e: TransferError) -> mlua::Error {
    mlua::Error::external(e)
}

fn reset_type_arg(value: Option<i64>) -> mlua::Result<ResetType> {
    match value {
        None => Ok(ResetType::Sw),
        Some(raw) => ResetType::from_i64(raw)
            .ok_or_else(|| mlua::Error::RuntimeError(format!("invalid reset type {raw}"))),
    }
}

/// Handle for the debug probe.
pub(crate) struct ProbeHandle(pub SharedProbe);

impl UserData for ProbeHandle {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("unique_id", |_, this| Ok(this.0.unique_id()));
        fields.add_field_method_get("vendor_name", |_, this| Ok(this.0.vendor_name()));
        fields.add_field_method_get("product_name", |_, this| Ok(this.0.product_name()));
    }
}

/// Handle for the target.
pub(crate) struct TargetHandle(pub SharedTarget);

impl UserData for TargetHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("read32", |_, this, address: u64| {
            this.0.borrow_mut().read32(address).map_err(transfer_err)
        });
        methods.add_method("write32", |_, this, (address, value): (u64, u32)| {
            this.0
                .borrow_mut()
                .write32(address, value)
                .map_err(transfer_err)
        });
        methods.add_method("read_memory", |lua, this, (address, length): (u64, usize)| {
            let bytes = this
                .0
                .borrow_mut()
                .read_memory(address, length)
                .map_err(transfer_err)?;
            lua.create_string(&bytes)
        });
        methods.add_method("write_memory", |_, this, (address, data): (u64, mlua::String)| {
            this.0
                .borrow_mut()
                .write_memory(address, &data.as_bytes())
                .map_err(transfer_err)
        });
        methods.add_method("mass_erase", |_, this, ()| {
            this.0.borrow_mut().mass_erase().map_err(transfer_err)
        });
        methods.add_method("memory_regions", |_, this, ()| {
            let regions = this.0.borrow().memory_regions();
            Ok(regions.into_iter().map(RegionHandle).collect::<Vec<_>>())
        });
        methods.add_method(
            "add_memory_region",
            |_, this, region: UserDataRef<RegionHandle>| {
                this.0
                    .borrow_mut()
                    .add_memory_region(region.0.clone())
                    .map_err(transfer_err)
            },
        );
        methods.add_meta_method(MetaMethod::Eq, |_, this, other: Value| {
            Ok(match other {
                Value::UserData(ud) => ud
                    .borrow::<TargetHandle>()
                    .map(|o| Rc::ptr_eq(&this.0, &o.0))
                    .unwrap_or(false),
                _ => false,
            })
        });
    }
}

/// Handle for one core.
pub(crate) struct CoreHandle(pub SharedCore);

impl UserData for CoreHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("halt", |_, this, ()| {
            this.0.borrow_mut().halt().map_err(transfer_err)
        });
        methods.add_method("resume", |_, this, ()| {
            this.0.borrow_mut().resume().map_err(transfer_err)
        });
        methods.add_method("is_halted", |_, this, ()| Ok(this.0.borrow().is_halted()));
        methods.add_method("reset", |_, this, reset_type: Option<i64>| {
            this.0
                .borrow_mut()
                .reset(reset_type_arg(reset_type)?)
                .map_err(transfer_err)
        });
        methods.add_method("set_reset_catch", |_, this, reset_type: Option<i64>| {
            this.0
                .borrow_mut()
                .set_reset_catch(reset_type_arg(reset_type)?)
                .map_err(transfer_err)
        });
        methods.add_method("clear_reset_catch", |_, this, reset_type: Option<i64>| {
            this.0
                .borrow_mut()
                .clear_reset_catch(reset_type_arg(reset_type)?)
                .map_err(transfer_err)
        });
        methods.add_meta_method(MetaMethod::Eq, |_, this, other: Value| {
            Ok(match other {
                Value::UserData(ud) => ud
                    .borrow::<CoreHandle>()
                    .map(|o| Rc::ptr_eq(&this.0, &o.0))
                    .unwrap_or(false),
                _ => false,
            })
        });
    }
}

/// Handle for the board.
pub(crate) struct BoardHandle {
    pub info: BoardInfo,
    pub probe: SharedProbe,
}

impl UserData for BoardHandle {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("name", |_, this| Ok(this.info.name.clone()));
        fields.add_field_method_get("target_type", |_, this| Ok(this.info.target_type.clone()));
        fields.add_field_method_get("description", |_, this| {
            Ok(this.info.description(&*this.probe))
        });
        fields.add_field_method_get("unique_id", |_, this| Ok(this.probe.unique_id()));
        fields.add_field_method_get("test_binary", |_, this| Ok(this.info.test_binary.clone()));
    }
}

/// Handle for the session option map.
pub(crate) struct OptionsHandle(pub Rc<RefCell<Options>>);

fn option_to_lua(lua: &Lua, value: &OptionValue) -> mlua::Result<Value> {
    Ok(match value {
        OptionValue::Bool(v) => Value::Boolean(*v),
        OptionValue::Int(v) => Value::Integer(*v),
        OptionValue::Float(v) => Value::Number(*v),
        OptionValue::Str(v) => Value::String(lua.create_string(v)?),
    })
}

fn option_from_lua(value: &Value) -> mlua::Result<OptionValue> {
    Ok(match value {
        Value::Boolean(v) => OptionValue::Bool(*v),
        Value::Integer(v) => OptionValue::Int(*v),
        Value::Number(v) => OptionValue::Float(*v),
        Value::String(v) => OptionValue::Str(v.to_string_lossy().to_string()),
        other => {
            return Err(mlua::Error::RuntimeError(format!(
                "options cannot store a {}",
                other.type_name()
            )))
        }
    })
}

impl UserData for OptionsHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("get", |lua, this, (name, default): (String, Option<Value>)| {
            match this.0.borrow().get(&name) {
                Some(value) => option_to_lua(lua, value),
                None => Ok(default.unwrap_or(Value::Nil)),
            }
        });
        methods.add_method("set", |_, this, (name, value): (String, Value)| {
            let value = option_from_lua(&value)?;
            this.0.borrow_mut().set(name, value);
            Ok(())
        });
        methods.add_method("is_set", |_, this, name: String| {
            Ok(this.0.borrow().is_set(&name))
        });
    }
}

/// Handle for the session itself.
pub(crate) struct SessionHandle {
    pub project_dir: PathBuf,
    pub options: AnyUserData,
    pub probe: AnyUserData,
    pub target: AnyUserData,
    pub board: AnyUserData,
}

impl UserData for SessionHandle {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("project_dir", |_, this| {
            Ok(this.project_dir.display().to_string())
        });
        fields.add_field_method_get("options", |_, this| Ok(this.options.clone()));
        fields.add_field_method_get("probe", |_, this| Ok(this.probe.clone()));
        fields.add_field_method_get("target", |_, this| Ok(this.target.clone()));
        fields.add_field_method_get("board", |_, this| Ok(this.board.clone()));
    }
}

/// Handle for a memory region.
pub(crate) struct RegionHandle(pub MemoryRegion);

impl UserData for RegionHandle {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("kind", |_, this| Ok(this.0.kind.name()));
        fields.add_field_method_get("name", |_, this| Ok(this.0.name.clone()));
        fields.add_field_method_get("start", |_, this| Ok(this.0.start));
        fields.add_field_method_get("length", |_, this| Ok(this.0.length));
        fields.add_field_method_get("sector_size", |_, this| Ok(this.0.sector_size));
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("contains", |_, this, address: u64| {
            Ok(this.0.contains(address))
        });
    }
}

/// Read-only description of one sequence step, returned by `get`.
pub(crate) struct StepInfo {
    pub name: String,
    /// 1-based position, Lua style.
    pub position: usize,
    pub scripted: bool,
}

impl UserData for StepInfo {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("name", |_, this| Ok(this.name.clone()));
        fields.add_field_method_get("position", |_, this| Ok(this.position));
        fields.add_field_method_get("scripted", |_, this| Ok(this.scripted));
    }
}

/// Handle for the init sequence passed to `will_init_target`.
///
/// Host steps are opaque to the script: they can be located, moved,
/// replaced, and removed by name, but not called.
pub(crate) struct SequenceHandle(pub Rc<RefCell<CallSequence>>);

fn sequence_err(e: crate::error::SequenceError) -> mlua::Error {
    mlua::Error::external(e)
}

impl UserData for SequenceHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("get", |_, this, name: String| {
            let seq = this.0.borrow();
            let position = seq.names().iter().position(|n| *n == name);
            Ok(position.map(|i| StepInfo {
                scripted: seq.get(&name).is_some_and(|s| s.is_scripted()),
                name,
                position: i + 1,
            }))
        });
        methods.add_method("names", |_, this, ()| {
            Ok(this
                .0
                .borrow()
                .names()
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>())
        });
        methods.add_method("append", |_, this, (name, func): (String, Function)| {
            this.0
                .borrow_mut()
                .append(name, StepFn::Script(func))
                .map_err(sequence_err)
        });
        methods.add_method(
            "insert_before",
            |_, this, (anchor, name, func): (String, String, Function)| {
                this.0
                    .borrow_mut()
                    .insert_before(&anchor, name, StepFn::Script(func))
                    .map_err(sequence_err)
            },
        );
        methods.add_method(
            "insert_after",
            |_, this, (anchor, name, func): (String, String, Function)| {
                this.0
                    .borrow_mut()
                    .insert_after(&anchor, name, StepFn::Script(func))
                    .map_err(sequence_err)
            },
        );
        methods.add_method("replace", |_, this, (name, func): (String, Function)| {
            this.0
                .borrow_mut()
                .replace(&name, StepFn::Script(func))
                .map_err(sequence_err)
        });
        methods.add_method("remove", |_, this, name: String| {
            this.0.borrow_mut().remove(&name).map_err(sequence_err)?;
            Ok(())
        });
    }
}
