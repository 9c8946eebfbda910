//! Script discovery, loading, and namespace behavior.

mod common;

use std::fs;

use probescript::{LoadError, Options};

use common::{harness, harness_with_options, harness_with_script};

#[test]
fn no_script_is_not_an_error() {
    let mut h = harness();
    assert!(!h.session.load_user_script(None).unwrap());
    assert!(h.session.user_script().is_none());

    // lifecycle still runs, defaults only
    h.session.connect().unwrap();
    h.session.reset(0, probescript::ResetType::Sw).unwrap();
    assert_eq!(h.events.snapshot(), ["target:connect", "core:reset sw"]);
}

#[test]
fn default_filename_is_probed() {
    let h = harness_with_script("function ping() return \"pong\" end\ncommand { ping }\n");
    assert_eq!(
        h.session.run_command("ping", &[]).unwrap(),
        Some("pong".to_string())
    );
}

#[test]
fn dotted_fallback_filename() {
    let mut h = harness();
    fs::write(
        h.dir.path().join(".probescript_user.lua"),
        "function which() return \"dotted\" end\ncommand { which }\n",
    )
    .unwrap();
    assert!(h.session.load_user_script(None).unwrap());
    assert_eq!(
        h.session.run_command("which", &[]).unwrap(),
        Some("dotted".to_string())
    );
}

#[test]
fn first_default_filename_wins() {
    let mut h = harness();
    fs::write(
        h.dir.path().join("probescript_user.lua"),
        "function which() return \"plain\" end\ncommand { which }\n",
    )
    .unwrap();
    fs::write(
        h.dir.path().join(".probescript_user.lua"),
        "function which() return \"dotted\" end\ncommand { which }\n",
    )
    .unwrap();
    h.session.load_user_script(None).unwrap();
    assert_eq!(
        h.session.run_command("which", &[]).unwrap(),
        Some("plain".to_string())
    );
}

#[test]
fn option_path_beats_defaults() {
    let mut options = Options::new();
    options.set("user_script", "scripts/custom.lua");
    let mut h = harness_with_options(options);

    fs::write(
        h.dir.path().join("probescript_user.lua"),
        "function which() return \"default\" end\ncommand { which }\n",
    )
    .unwrap();
    fs::create_dir(h.dir.path().join("scripts")).unwrap();
    fs::write(
        h.dir.path().join("scripts/custom.lua"),
        "function which() return \"option\" end\ncommand { which }\n",
    )
    .unwrap();

    h.session.load_user_script(None).unwrap();
    assert_eq!(
        h.session.run_command("which", &[]).unwrap(),
        Some("option".to_string())
    );
}

#[test]
fn explicit_path_beats_option_and_defaults() {
    let mut options = Options::new();
    options.set("user_script", "from_option.lua");
    let mut h = harness_with_options(options);

    for (file, tag) in [
        ("probescript_user.lua", "default"),
        ("from_option.lua", "option"),
        ("from_flag.lua", "flag"),
    ] {
        fs::write(
            h.dir.path().join(file),
            format!("function which() return \"{tag}\" end\ncommand {{ which }}\n"),
        )
        .unwrap();
    }

    h.session
        .load_user_script(Some("from_flag.lua".as_ref()))
        .unwrap();
    assert_eq!(
        h.session.run_command("which", &[]).unwrap(),
        Some("flag".to_string())
    );
    assert!(h
        .session
        .user_script()
        .unwrap()
        .path()
        .ends_with("from_flag.lua"));
}

#[test]
fn missing_explicit_script_is_fatal() {
    let mut h = harness();
    let err = h
        .session
        .load_user_script(Some("nope.lua".as_ref()))
        .unwrap_err();
    assert!(matches!(err, LoadError::Unreadable { .. }));
}

#[test]
fn top_level_failure_is_fatal() {
    let mut h = harness();
    fs::write(
        h.dir.path().join("probescript_user.lua"),
        "local x = nil\nreturn x.field\n",
    )
    .unwrap();
    let err = h.session.load_user_script(None).unwrap_err();
    match err {
        LoadError::Execution { path, .. } => {
            assert!(path.ends_with("probescript_user.lua"))
        }
        other => panic!("unexpected: {other}"),
    }
}

#[test]
fn injected_namespace_contract() {
    // The script asserts the whole injected surface at load time; a missing
    // or misbehaving symbol fails the load.
    harness_with_script(
        r#"
assert(type(log) == "table")
assert(type(log.debug) == "function" and type(log.info) == "function")
assert(type(log.warning) == "function" and type(log.error) == "function")
log.info("namespace looks sane")

assert(session.project_dir ~= nil)
assert(session.target == target and session.probe == probe)
assert(session.board == board and session.options == options)

assert(probe.unique_id == "E00DBEEF")
assert(board.name == "generic")
assert(board.target_type == "mock_target")
assert(board.description == "Mock UltraProbe [mock_target]")
assert(board.unique_id == "E00DBEEF")

assert(options:get("missing") == nil)
assert(options:get("missing", 7) == 7)
options:set("from_script", true)
assert(options:get("from_script") == true)

assert(ResetType.HW == 0 and ResetType.SW == 1)
assert(MemoryType.FLASH == "flash")

local flash = FlashRegion { start = 0x08000000, length = 0x100000, sector_size = 0x4000 }
assert(flash.kind == "flash" and flash.start == 0x08000000)
assert(flash.sector_size == 0x4000)
assert(flash:contains(0x08000000) and not flash:contains(0x09000000))
target:add_memory_region(flash)

local regions = target:memory_regions()
assert(#regions == 2 and regions[2].kind == "flash")

assert(type(command) == "function")
"#,
    );
}

#[test]
fn error_classes_classify_script_and_host_errors() {
    let h = harness_with_script(
        r#"
function classify()
    -- script-raised error values classify by class chain
    local ok, err = pcall(function() error(TransferTimeoutError("too slow")) end)
    assert(not ok)
    assert(TransferTimeoutError.is(err))
    assert(TransferError.is(err))
    assert(Error.is(err))
    assert(not TransferFaultError.is(err))
    assert(tostring(err) == "TransferTimeoutError: too slow")

    -- host faults classify through their rendered form
    local ok2, fault = pcall(function() return target:read32(0x1000) end)
    assert(not ok2)
    assert(TransferFaultError.is(fault))
    assert(TransferError.is(fault))
    assert(not TransferTimeoutError.is(fault))
    return "classified"
end
command { classify }
"#,
    );
    assert_eq!(
        h.session.run_command("classify", &[]).unwrap(),
        Some("classified".to_string())
    );
}

#[test]
fn sessions_do_not_share_namespaces() {
    let script = "counter = 0\nfunction bump() counter = counter + 1 return counter end\ncommand { bump }\n";
    let a = harness_with_script(script);
    let b = harness_with_script(script);

    assert_eq!(a.session.run_command("bump", &[]).unwrap(), Some("1".into()));
    assert_eq!(a.session.run_command("bump", &[]).unwrap(), Some("2".into()));
    // the other session's namespace is untouched
    assert_eq!(b.session.run_command("bump", &[]).unwrap(), Some("1".into()));
}

#[test]
fn options_are_shared_between_host_and_script() {
    let h = harness_with_script(
        r#"
options:set("resume_on_disconnect", false)
"#,
    );
    assert!(!h.session.options().get_bool("resume_on_disconnect", true));
}
