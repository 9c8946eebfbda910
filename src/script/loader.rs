//! Script discovery and execution.

use std::fs;
use std::path::{Path, PathBuf};

use mlua::Lua;

use crate::error::LoadError;
use crate::script::ScriptHost;

/// Default filenames probed in the project directory, in precedence order.
pub const DEFAULT_SCRIPT_NAMES: &[&str] = &["probescript_user.lua", ".probescript_user.lua"];

/// Name of the session option holding a configured script path.
pub const USER_SCRIPT_OPTION: &str = "user_script";

/// A located script: resolved path plus its text.
#[derive(Debug, Clone)]
pub(crate) struct ScriptSource {
    pub path: PathBuf,
    pub text: String,
}

/// Locate the session's script, if any.
///
/// Precedence: explicit path (command-line flag) > `user_script` option >
/// default filenames in the project directory. Relative paths resolve
/// against the project directory. Finding nothing is not an error; a named
/// script that cannot be read is.
pub(crate) fn discover(
    host: &ScriptHost,
    explicit: Option<&Path>,
) -> Result<Option<ScriptSource>, LoadError> {
    if let Some(path) = explicit {
        return read(resolve(host, path)).map(Some);
    }

    let configured = host
        .options
        .borrow()
        .get_str(USER_SCRIPT_OPTION)
        .map(PathBuf::from);
    if let Some(path) = configured {
        return read(resolve(host, &path)).map(Some);
    }

    for name in DEFAULT_SCRIPT_NAMES {
        let candidate = host.project_dir.join(name);
        if candidate.is_file() {
            return read(candidate).map(Some);
        }
    }
    Ok(None)
}

fn resolve(host: &ScriptHost, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        host.project_dir.join(path)
    }
}

fn read(path: PathBuf) -> Result<ScriptSource, LoadError> {
    match fs::read_to_string(&path) {
        Ok(text) => Ok(ScriptSource { path, text }),
        Err(source) => Err(LoadError::Unreadable { path, source }),
    }
}

/// Run the script body in the prepared namespace.
pub(crate) fn execute(lua: &Lua, source: &ScriptSource) -> Result<(), LoadError> {
    log::info!("loading user script {}", source.path.display());
    lua.load(source.text.as_str())
        .set_name(format!("@{}", source.path.display()))
        .exec()
        .map_err(|e| LoadError::Execution {
            path: source.path.clone(),
            source: e,
        })
}
