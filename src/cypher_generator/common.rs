//! Common utilities for Cypher text generation

/// Indentation applied to the body of a `CALL { ... }` subquery
pub const INDENT: &str = "    ";

/// Quote a Cypher identifier (label, relationship type, property key) if it
/// is not a plain identifier.
///
/// Embedded backticks are doubled.
///
/// # Examples
/// ```
/// use cypher_compiler::cypher_generator::common::quote_identifier;
/// assert_eq!(quote_identifier("title"), "title");
/// assert_eq!(quote_identifier("ACTED_IN"), "ACTED_IN");
/// assert_eq!(quote_identifier("first name"), "`first name`");
/// assert_eq!(quote_identifier("2fa"), "`2fa`");
/// ```
pub fn quote_identifier(name: &str) -> String {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if plain {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

/// Render a string literal with double quotes, escaping as Cypher requires.
pub fn string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Indent every line of a rendered block.
pub fn indent(block: &str) -> String {
    block
        .lines()
        .map(|line| format!("{}{}", INDENT, line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("screenTime"), "screenTime");
        assert_eq!(quote_identifier("_private"), "_private");
        assert_eq!(quote_identifier("weird`name"), "`weird``name`");
        assert_eq!(quote_identifier(""), "``");
    }

    #[test]
    fn test_string_literal_escapes() {
        assert_eq!(string_literal("Movie"), "\"Movie\"");
        assert_eq!(string_literal("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }

    #[test]
    fn test_indent_multiline() {
        assert_eq!(indent("WITH this\nRETURN this"), "    WITH this\n    RETURN this");
    }
}
