//! Textual constant literals.
//!
//! Field constants and annotation values are kept in the modern textual form
//! (`5`, `"text"`, `'c'`, `true`). The oldest formats stored them as
//! `<constant> <value="...">` with a type-dependent encoding; the two
//! conversions live here.

/// Java-style escaping: quotes, backslashes, the usual control escapes, and
/// `\uXXXX` for everything outside printable ASCII.
pub fn escape_java(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            c => push_unicode_escape(&mut out, c),
        }
    }
    out
}

fn push_unicode_escape(out: &mut String, c: char) {
    let mut units = [0u16; 2];
    for unit in c.encode_utf16(&mut units) {
        out.push_str(&format!("\\u{unit:04x}"));
    }
}

/// Reverses [`escape_java`]; also accepts octal escapes and UTF-16
/// surrogate pairs written as two `\uXXXX` escapes.
pub fn unescape_java(text: &str) -> Result<String, String> {
    let mut units: Vec<u16> = Vec::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u16; 2];
            units.extend_from_slice(c.encode_utf16(&mut buf));
            continue;
        }
        let esc = chars.next().ok_or_else(|| "dangling backslash".to_string())?;
        let unit = match esc {
            'n' => '\n' as u16,
            't' => '\t' as u16,
            'r' => '\r' as u16,
            'b' => 0x8,
            'f' => 0xc,
            's' => ' ' as u16,
            '\\' | '"' | '\'' => esc as u16,
            'u' => {
                while chars.peek() == Some(&'u') {
                    chars.next();
                }
                let hex: String = chars.by_ref().take(4).collect();
                if hex.len() != 4 {
                    return Err(format!("short unicode escape \\u{hex}"));
                }
                u16::from_str_radix(&hex, 16).map_err(|_| format!("bad unicode escape \\u{hex}"))?
            }
            '0'..='7' => {
                let mut value = esc.to_digit(8).unwrap_or_default();
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) if value * 8 + d <= 0o377 => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        _ => break,
                    }
                }
                value as u16
            }
            other => return Err(format!("unknown escape \\{other}")),
        };
        units.push(unit);
    }
    String::from_utf16(&units).map_err(|_| "unpaired surrogate in escape".to_string())
}

pub fn string_literal(text: &str) -> String {
    format!("\"{}\"", escape_java(text, '"'))
}

pub fn char_literal(c: char) -> String {
    format!("'{}'", escape_java(&c.to_string(), '\''))
}

/// `Float.toString`/`Double.toString` shaped rendering.
pub fn float_literal(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e7 {
        return format!("{value:.1}");
    }
    format!("{value}")
}

/// Like [`float_literal`] but keeps the shortest `f32` digits.
pub fn float32_literal(value: f32) -> String {
    if value.is_finite() && value.fract() != 0.0 {
        return format!("{value}");
    }
    float_literal(f64::from(value))
}

/// The legacy `<value="...">` payload for a modern constant of `field_type`.
pub fn encode_legacy(field_type: &str, modern: &str) -> String {
    match field_type {
        "java.lang.String" => match modern
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .map(unescape_java)
        {
            Some(Ok(text)) => legacy_escape(&text),
            _ => modern.to_string(),
        },
        "char" => match modern
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .map(unescape_java)
        {
            Some(Ok(text)) => text
                .encode_utf16()
                .next()
                .map(|u| u.to_string())
                .unwrap_or_default(),
            _ => modern.to_string(),
        },
        _ => modern.to_string(),
    }
}

/// The modern constant for a legacy `<value="...">` payload.
pub fn decode_legacy(field_type: &str, encoded: &str) -> Result<String, String> {
    match field_type {
        "java.lang.String" => Ok(string_literal(&unescape_java(encoded)?)),
        "char" => {
            let code: u32 = encoded
                .trim()
                .parse()
                .map_err(|_| format!("bad char constant {encoded:?}"))?;
            let text = String::from_utf16(&[code as u16])
                .map_err(|_| format!("char constant {code} is a lone surrogate"))?;
            Ok(char_literal(text.chars().next().unwrap_or_default()))
        }
        _ => Ok(encoded.to_string()),
    }
}

fn legacy_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' | '\\' => push_unicode_escape(&mut out, c),
            ' '..='~' => out.push(c),
            c => push_unicode_escape(&mut out, c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_and_unescape_agree() {
        let raw = "tab\there \"quoted\" caf\u{e9} \u{1F600}";
        let escaped = escape_java(raw, '"');
        assert!(escaped.is_ascii());
        assert_eq!(unescape_java(&escaped).unwrap(), raw);
    }

    #[test]
    fn unescape_handles_octal_and_repeated_u() {
        assert_eq!(unescape_java("\\101\\uu0042").unwrap(), "AB");
        assert!(unescape_java("\\q").is_err());
        assert!(unescape_java("\\u12").is_err());
    }

    #[test]
    fn legacy_string_and_char_constants() {
        assert_eq!(
            decode_legacy("java.lang.String", "a\\u0022b\\u00e9").unwrap(),
            "\"a\\\"b\\u00e9\""
        );
        assert_eq!(decode_legacy("char", "65").unwrap(), "'A'");
        assert_eq!(decode_legacy("int", "5").unwrap(), "5");
        assert_eq!(encode_legacy("char", "'A'"), "65");
        assert_eq!(encode_legacy("java.lang.String", "\"a\\\"b\""), "a\\u0022b");
    }

    #[test]
    fn floats_look_like_java() {
        assert_eq!(float_literal(1.0), "1.0");
        assert_eq!(float_literal(0.25), "0.25");
        assert_eq!(float_literal(f64::NEG_INFINITY), "-Infinity");
    }
}
