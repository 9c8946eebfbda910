//! Command registration and invocation.

mod common;

use probescript::{CommandDefinitionError, CommandError};

use common::harness_with_script;

#[test]
fn registration_captures_the_signature() {
    let h = harness_with_script(
        r#"
function erase(start, length)
    return string.format("erase %d+%d", start, length)
end
command { erase, types = { "int", "int" }, help = "Erase a flash range" }
"#,
    );
    let script = h.session.user_script().unwrap();
    let registry = script.commands();
    assert_eq!(registry.len(), 1);

    let cmd = registry.get("erase").unwrap();
    assert_eq!(cmd.help(), Some("Erase a flash range"));
    assert_eq!(cmd.usage(), "erase start:int length:int");
    assert_eq!(cmd.params().len(), 2);
}

#[test]
fn int_tokens_accept_radixes_signs_and_separators() {
    let h = harness_with_script(
        r#"
function add(a, b) return a + b end
command { add, types = { "int", "int" } }
"#,
    );
    let run = |a: &str, b: &str| h.session.run_command("add", &[a, b]).unwrap().unwrap();
    assert_eq!(run("0x10", "0b101"), "21");
    assert_eq!(run("1_000", "-7"), "993");
    assert_eq!(run("+2", "0X1F"), "33");
}

#[test]
fn bad_int_token_is_an_argument_error() {
    let h = harness_with_script(
        r#"
function poke(addr) end
command { poke, types = { "int" } }
"#,
    );
    let err = h.session.run_command("poke", &["abc"]).unwrap_err();
    match err {
        CommandError::Invalid {
            command,
            parameter,
            token,
            ..
        } => {
            assert_eq!(command, "poke");
            assert_eq!(parameter, "addr");
            assert_eq!(token, "abc");
        }
        other => panic!("unexpected: {other}"),
    }
}

#[test]
fn float_and_str_parameters() {
    let h = harness_with_script(
        r#"
function scale(factor, label) return label .. "=" .. tostring(factor * 2) end
command { scale, types = { "float", "str" } }
"#,
    );
    assert_eq!(
        h.session.run_command("scale", &["2.5e1", "gain"]).unwrap(),
        Some("gain=50.0".to_string())
    );
    // str tokens pass through uncoerced
    let h2 = harness_with_script(
        r#"
function echo(s) return s end
command { echo, types = { "str" } }
"#,
    );
    assert_eq!(
        h2.session.run_command("echo", &["0x10"]).unwrap(),
        Some("0x10".to_string())
    );
}

#[test]
fn variadic_tail_takes_remaining_tokens_verbatim() {
    let h = harness_with_script(
        r#"
function probe_cmd(base, ...)
    return string.format("%d:%s", base, table.concat({ ... }, ","))
end
command { probe_cmd, types = { "int" } }
"#,
    );
    assert_eq!(
        h.session
            .run_command("probe_cmd", &["0x20", "a", "b"])
            .unwrap(),
        Some("32:a,b".to_string())
    );
    // the variadic tail may be empty
    assert_eq!(
        h.session.run_command("probe_cmd", &["1"]).unwrap(),
        Some("1:".to_string())
    );
}

#[test]
fn token_count_mismatches() {
    let h = harness_with_script(
        r#"
function pair(a, b) return a + b end
command { pair, types = { "int", "int" } }
"#,
    );
    assert!(matches!(
        h.session.run_command("pair", &["1"]).unwrap_err(),
        CommandError::TooFew {
            expected: 2,
            actual: 1,
            ..
        }
    ));
    assert!(matches!(
        h.session.run_command("pair", &["1", "2", "3"]).unwrap_err(),
        CommandError::TooMany {
            expected: 2,
            actual: 3,
            ..
        }
    ));
}

#[test]
fn callee_errors_propagate_unmodified() {
    let h = harness_with_script(
        r#"
function explode() error("boom from script") end
command { explode }
"#,
    );
    match h.session.run_command("explode", &[]).unwrap_err() {
        CommandError::Failed { command, source } => {
            assert_eq!(command, "explode");
            assert!(source.to_string().contains("boom from script"));
        }
        other => panic!("unexpected: {other}"),
    }
}

#[test]
fn unknown_command() {
    let h = harness_with_script("");
    assert!(matches!(
        h.session.run_command("nope", &[]).unwrap_err(),
        CommandError::Unknown(_)
    ));
}

#[test]
fn no_script_means_no_commands() {
    let h = common::harness();
    assert!(matches!(
        h.session.run_command("anything", &[]).unwrap_err(),
        CommandError::Unknown(_)
    ));
}

#[test]
fn name_defaults_to_the_global_binding() {
    let h = harness_with_script(
        r#"
function status() return "ok" end
command { status }
"#,
    );
    assert_eq!(
        h.session.run_command("status", &[]).unwrap(),
        Some("ok".to_string())
    );
}

#[test]
fn explicit_name_wins_and_function_stays_callable() {
    let h = harness_with_script(
        r#"
function internal_impl() return "impl" end
command { name = "st", fn = internal_impl }
-- the original binding is untouched by registration
assert(internal_impl() == "impl")
"#,
    );
    assert_eq!(
        h.session.run_command("st", &[]).unwrap(),
        Some("impl".to_string())
    );
    assert!(matches!(
        h.session.run_command("internal_impl", &[]).unwrap_err(),
        CommandError::Unknown(_)
    ));
}

#[test]
fn rejected_registration_leaves_the_function_usable() {
    let h = harness_with_script(
        r#"
function broken(x) return x * 2 end
command { broken, types = { "matrix" } }

-- still an ordinary function in the namespace
doubled = broken(21)

function check() return doubled end
command { check }
"#,
    );
    let script = h.session.user_script().unwrap();
    {
        let registry = script.commands();
        assert!(registry.get("broken").is_none());
        assert_eq!(registry.rejections().len(), 1);
        assert!(matches!(
            registry.rejections()[0],
            CommandDefinitionError::UnsupportedType { ref ty, .. } if ty == "matrix"
        ));
    }
    assert_eq!(
        h.session.run_command("check", &[]).unwrap(),
        Some("42".to_string())
    );
}

#[test]
fn type_count_must_match_the_signature() {
    let h = harness_with_script(
        r#"
function two(a, b) end
command { two, types = { "int" } }
"#,
    );
    let script = h.session.user_script().unwrap();
    let registry = script.commands();
    assert!(registry.get("two").is_none());
    assert!(matches!(
        registry.rejections()[0],
        CommandDefinitionError::TypeCount {
            declared: 1,
            takes: 2,
            ..
        }
    ));
}

#[test]
fn anonymous_function_needs_an_explicit_name() {
    let h = harness_with_script(
        r#"
command { function() return 1 end }
"#,
    );
    let script = h.session.user_script().unwrap();
    let registry = script.commands();
    assert!(registry.is_empty());
    assert!(matches!(
        registry.rejections()[0],
        CommandDefinitionError::NoName
    ));
}

#[test]
fn duplicate_names_last_registration_wins() {
    let h = harness_with_script(
        r#"
function first() return "first" end
function second() return "second" end
command { name = "dup", fn = first }
command { name = "dup", fn = second }
"#,
    );
    assert_eq!(
        h.session.run_command("dup", &[]).unwrap(),
        Some("second".to_string())
    );
    assert_eq!(h.session.user_script().unwrap().commands().len(), 1);
}

#[test]
fn multiple_return_values_are_joined() {
    let h = harness_with_script(
        r#"
function multi() return 1, "two", nil, true end
command { multi }
"#,
    );
    assert_eq!(
        h.session.run_command("multi", &[]).unwrap(),
        Some("1\ttwo\ttrue".to_string())
    );
}

#[test]
fn nil_result_renders_as_no_output() {
    let h = harness_with_script(
        r#"
function quiet() end
command { quiet }
"#,
    );
    assert_eq!(h.session.run_command("quiet", &[]).unwrap(), None);
}

#[test]
fn commands_drive_the_target() {
    let h = harness_with_script(
        r#"
function poke(addr, value)
    target:write32(addr, value)
    return string.format("0x%08x", target:read32(addr))
end
command { poke, types = { "int", "int" }, help = "Write then read back a word" }
"#,
    );
    assert_eq!(
        h.session
            .run_command("poke", &["0x20000010", "0xdeadbeef"])
            .unwrap(),
        Some("0xdeadbeef".to_string())
    );
    assert!(h.events.contains("target:write 0x20000010"));
}

#[test]
fn listing_is_sorted_for_help() {
    let h = harness_with_script(
        r#"
function zz() end
function aa() end
command { zz }
command { aa }
"#,
    );
    let script = h.session.user_script().unwrap();
    let names: Vec<String> = script
        .commands()
        .commands()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    assert_eq!(names, ["aa", "zz"]);
}
