//! Raw-token coercion for command arguments.

/// Parse an integer command token.
///
/// Accepts decimal, `0x`/`0X` hexadecimal, and `0b`/`0B` binary, with an
/// optional leading sign and `_` digit-group separators. Separators are
/// only legal between digits.
pub(crate) fn parse_int(token: &str) -> Option<i64> {
    let (sign, rest) = match token.as_bytes().first()? {
        b'+' => ("", &token[1..]),
        b'-' => ("-", &token[1..]),
        _ => ("", token),
    };

    let (radix, digits) = match rest.as_bytes() {
        [b'0', b'x' | b'X', ..] => (16, &rest[2..]),
        [b'0', b'b' | b'B', ..] => (2, &rest[2..]),
        _ => (10, rest),
    };

    if digits.is_empty()
        || digits.starts_with('_')
        || digits.ends_with('_')
        || digits.contains("__")
    {
        return None;
    }
    if !digits.chars().all(|c| c == '_' || c.is_digit(radix)) {
        return None;
    }

    let cleaned: String = digits.chars().filter(|&c| c != '_').collect();
    i64::from_str_radix(&format!("{sign}{cleaned}"), radix).ok()
}

/// Parse a float command token: standard decimal/exponential literals.
pub(crate) fn parse_float(token: &str) -> Option<f64> {
    token.parse().ok()
}
