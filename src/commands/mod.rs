//! User-defined interactive commands.
//!
//! Scripts register commands with the `command` marker injected into their
//! namespace. Registration reflects the function's parameter names and
//! arity, pairs them with the declared type list, and stores the resulting
//! parameter specification next to a shared reference to the function — the
//! script's own global binding is never wrapped or removed.
//!
//! Front ends (the interactive shell, the GDB-server monitor channel)
//! tokenize input themselves and forward `(name, tokens)` to
//! [`CommandRegistry::invoke`].

use std::collections::HashMap;
use std::fmt;

use mlua::{Function, Lua, MultiValue, Table, Value};

use crate::error::{CommandDefinitionError, CommandError};
use crate::script::reflect;

mod coerce;

/// Semantic type of one command parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    Float,
    Str,
    /// Trailing parameter absorbing all remaining tokens verbatim.
    VariadicStr,
}

impl ParamKind {
    /// Parse a marker type name. Variadic parameters are not declared by
    /// name; they come from the function's own `...`.
    fn from_name(name: &str) -> Option<ParamKind> {
        Some(match name {
            "int" => ParamKind::Int,
            "float" => ParamKind::Float,
            "str" => ParamKind::Str,
            _ => return None,
        })
    }

    pub fn is_variadic(self) -> bool {
        self == ParamKind::VariadicStr
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Int => "int",
            ParamKind::Float => "float",
            ParamKind::Str => "str",
            ParamKind::VariadicStr => "str...",
        };
        write!(f, "{name}")
    }
}

/// One positional parameter of a command.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
}

/// A registered command: name, parameter specification, help text, and the
/// underlying script function.
#[derive(Debug, Clone)]
pub struct Command {
    name: String,
    help: Option<String>,
    params: Vec<ParamSpec>,
    func: Function,
}

impl Command {
    pub fn new(
        name: impl Into<String>,
        help: Option<String>,
        params: Vec<ParamSpec>,
        func: Function,
    ) -> Command {
        Command {
            name: name.into(),
            help,
            params,
            func,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// The underlying callable, shared with the script namespace.
    pub fn func(&self) -> &Function {
        &self.func
    }

    /// One-line usage string, e.g. `erase start:int length:int`.
    pub fn usage(&self) -> String {
        let mut usage = self.name.clone();
        for p in &self.params {
            if p.kind.is_variadic() {
                usage.push_str(" ...");
            } else {
                usage.push_str(&format!(" {}:{}", p.name, p.kind));
            }
        }
        usage
    }

    fn fixed_len(&self) -> usize {
        self.params
            .iter()
            .filter(|p| !p.kind.is_variadic())
            .count()
    }

    fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.kind.is_variadic())
    }

    /// Bind raw tokens to the parameter specification and call the function.
    ///
    /// Argument problems are reported as [`CommandError`] variants; an error
    /// raised by the function itself propagates in
    /// [`CommandError::Failed`] with its cause unmodified.
    pub fn invoke(&self, lua: &Lua, tokens: &[&str]) -> Result<Option<String>, CommandError> {
        let fixed = self.fixed_len();
        if tokens.len() < fixed {
            return Err(CommandError::TooFew {
                command: self.name.clone(),
                expected: fixed,
                actual: tokens.len(),
            });
        }
        if !self.is_variadic() && tokens.len() > fixed {
            return Err(CommandError::TooMany {
                command: self.name.clone(),
                expected: fixed,
                actual: tokens.len(),
            });
        }

        let mut args = Vec::with_capacity(tokens.len());
        for (spec, &token) in self.params[..fixed].iter().zip(tokens) {
            let value = match spec.kind {
                ParamKind::Int => coerce::parse_int(token).map(Value::Integer),
                ParamKind::Float => coerce::parse_float(token).map(Value::Number),
                ParamKind::Str | ParamKind::VariadicStr => {
                    Some(Value::String(lua.create_string(token)?))
                }
            };
            match value {
                Some(value) => args.push(value),
                None => {
                    return Err(CommandError::Invalid {
                        command: self.name.clone(),
                        parameter: spec.name.clone(),
                        kind: spec.kind,
                        token: token.to_string(),
                    })
                }
            }
        }
        for &token in &tokens[fixed..] {
            args.push(Value::String(lua.create_string(token)?));
        }

        let results = self
            .func
            .call::<MultiValue>(MultiValue::from_iter(args))
            .map_err(|source| CommandError::Failed {
                command: self.name.clone(),
                source,
            })?;
        Ok(render(results))
    }
}

/// Format a command's return values for the front end.
fn render(results: MultiValue) -> Option<String> {
    let parts: Vec<String> = results
        .into_iter()
        .filter_map(|v| render_value(&v))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\t"))
    }
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Nil => None,
        Value::Boolean(b) => Some(b.to_string()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.to_string_lossy().to_string()),
        other => Some(format!("<{}>", other.type_name())),
    }
}

/// Per-session command registry.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Command>,
    rejections: Vec<CommandDefinitionError>,
}

impl CommandRegistry {
    pub fn new() -> CommandRegistry {
        CommandRegistry::default()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    /// Registered commands, sorted by name for help listings.
    pub fn commands(&self) -> Vec<&Command> {
        let mut all: Vec<&Command> = self.commands.values().collect();
        all.sort_by_key(|c| c.name());
        all
    }

    /// Registrations rejected since the script was loaded.
    pub fn rejections(&self) -> &[CommandDefinitionError] {
        &self.rejections
    }

    /// Validate the parameter shape and store the command.
    ///
    /// Name collisions resolve to the last registration.
    pub fn register(&mut self, command: Command) -> Result<(), CommandDefinitionError> {
        if command.name.is_empty() {
            return Err(CommandDefinitionError::NoName);
        }
        let variadics = command
            .params
            .iter()
            .filter(|p| p.kind.is_variadic())
            .count();
        if variadics > 1 {
            return Err(CommandDefinitionError::MultipleVariadic {
                command: command.name,
            });
        }
        if variadics == 1 && !command.is_variadic() {
            return Err(CommandDefinitionError::VariadicNotLast {
                command: command.name,
            });
        }

        if let Some(prev) = self.commands.insert(command.name.clone(), command) {
            log::debug!(
                "command `{}` re-registered; last registration wins",
                prev.name()
            );
        }
        Ok(())
    }

    /// Entry point for the `command` marker: parse the marker argument,
    /// reflect the function, and register. Failures are recorded and
    /// returned; the function's own binding is untouched either way.
    pub(crate) fn register_from_lua(
        &mut self,
        lua: &Lua,
        value: &Value,
    ) -> Result<String, CommandDefinitionError> {
        let result = parse_marker(lua, value).and_then(|command| {
            let name = command.name().to_string();
            self.register(command)?;
            Ok(name)
        });
        if let Err(e) = &result {
            self.rejections.push(e.clone());
        }
        result
    }

    /// Look up `name` and invoke it with `tokens`.
    pub fn invoke(
        &self,
        lua: &Lua,
        name: &str,
        tokens: &[&str],
    ) -> Result<Option<String>, CommandError> {
        let command = self
            .get(name)
            .ok_or_else(|| CommandError::Unknown(name.to_string()))?;
        command.invoke(lua, tokens)
    }
}

/// Decode the `command` marker argument: a bare function, or a definition
/// table `{ fn, name = ..., types = { ... }, help = ... }` (the function may
/// be the first positional entry or the `fn` field).
fn parse_marker(lua: &Lua, value: &Value) -> Result<Command, CommandDefinitionError> {
    let (func, explicit_name, help, types) = match value {
        Value::Function(f) => (f.clone(), None, None, Vec::new()),
        Value::Table(t) => parse_marker_table(t)?,
        _ => return Err(CommandDefinitionError::InvalidMarker),
    };

    let name = match explicit_name {
        Some(name) => name,
        None => global_name_of(lua, &func).ok_or(CommandDefinitionError::NoName)?,
    };

    let sig = reflect::inspect(lua, &func).map_err(|source| CommandDefinitionError::Inspect {
        command: name.clone(),
        source,
    })?;
    if types.len() != sig.params.len() {
        return Err(CommandDefinitionError::TypeCount {
            command: name,
            declared: types.len(),
            takes: sig.params.len(),
        });
    }

    let mut params = Vec::with_capacity(sig.params.len() + 1);
    for (pname, ty) in sig.params.iter().zip(&types) {
        let kind = ParamKind::from_name(ty).ok_or_else(|| CommandDefinitionError::UnsupportedType {
            command: name.clone(),
            parameter: pname.clone(),
            ty: ty.clone(),
        })?;
        params.push(ParamSpec {
            name: pname.clone(),
            kind,
        });
    }
    if sig.variadic {
        params.push(ParamSpec {
            name: "...".to_string(),
            kind: ParamKind::VariadicStr,
        });
    }

    Ok(Command::new(name, help, params, func))
}

type MarkerFields = (Function, Option<String>, Option<String>, Vec<String>);

fn parse_marker_table(table: &Table) -> Result<MarkerFields, CommandDefinitionError> {
    let explicit_name: Option<String> = marker_field(table, "name", "?")?;
    let hint = explicit_name.as_deref().unwrap_or("?").to_string();

    let mut func_value: Value = marker_field(table, 1, &hint)?;
    if func_value.is_nil() {
        func_value = marker_field(table, "fn", &hint)?;
    }
    let func = match func_value {
        Value::Function(f) => f,
        _ => {
            return Err(CommandDefinitionError::NotAFunction {
                command: hint,
                field: "fn",
            })
        }
    };

    let help: Option<String> = marker_field(table, "help", &hint)?;
    let types: Option<Vec<String>> = marker_field(table, "types", &hint)?;
    Ok((func, explicit_name, help, types.unwrap_or_default()))
}

fn marker_field<V: mlua::FromLua>(
    table: &Table,
    key: impl mlua::IntoLua,
    hint: &str,
) -> Result<V, CommandDefinitionError> {
    table
        .get(key)
        .map_err(|source| CommandDefinitionError::Inspect {
            command: hint.to_string(),
            source,
        })
}

/// Find the global name bound to `func`, for deriving a command name from
/// the function itself.
fn global_name_of(lua: &Lua, func: &Function) -> Option<String> {
    for pair in lua.globals().pairs::<Value, Value>() {
        let Ok((key, value)) = pair else { continue };
        if let (Value::String(key), Value::Function(f)) = (key, value) {
            if Value::Function(f) == Value::Function(func.clone()) {
                return Some(key.to_string_lossy().to_string());
            }
        }
    }
    None
}
