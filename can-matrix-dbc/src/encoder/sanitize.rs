//! ASCII post-processing of generated text
//!
//! DBC tools expect plain ASCII with LF line endings. Matrices often carry
//! localized descriptions and unit symbols, so the encoder output goes through
//! this pass before it is written.

/// Substitutions for common non-ASCII unit symbols
pub const TRANSLITERATIONS: &[(char, &str)] = &[
    ('Ω', "Ohm"),
    ('\u{2126}', "Ohm"),
    ('°', "deg"),
    ('µ', "u"),
    ('μ', "u"),
    ('²', "2"),
    ('³', "3"),
    ('±', "+/-"),
    ('×', "x"),
];

/// Replace CRLF and lone CR sequences with LF
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Reduce text to printable ASCII plus LF
///
/// Characters in the substitution table are transliterated, every other
/// character outside the printable range is dropped.
pub fn to_ascii(text: &str) -> String {
    let normalized = normalize_line_endings(text);
    let mut out = String::with_capacity(normalized.len());

    for c in normalized.chars() {
        match c {
            '\n' | ' '..='~' => out.push(c),
            _ => {
                if let Some((_, replacement)) = TRANSLITERATIONS.iter().find(|(from, _)| *from == c) {
                    out.push_str(replacement);
                }
            }
        }
    }

    out
}

/// Reduce a message or signal name to a DBC identifier
///
/// The name goes through the ASCII pass, then every character other than a
/// letter, digit or underscore becomes `_`. A leading digit gets an `_`
/// prefix. Returns `None` when no letter or digit is left.
pub fn to_identifier(name: &str) -> Option<String> {
    let ascii = to_ascii(name);
    let ident: String = ascii
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    if !ident.chars().any(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        return Some(format!("_{}", ident));
    }
    Some(ident)
}
