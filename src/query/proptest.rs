//! Property-Based Tests for Selector Escaping
//!
//! 1. **Literal integrity**: an escaped value, read back the way the PromQL
//!    lexer reads a double-quoted string, is the original value.
//! 2. **Union arity**: joining N escaped ids never yields more than N
//!    unescaped `|` alternatives.

#![cfg(test)]

use proptest::prelude::*;

use super::builder::{check_identifier, escape_regex, escape_string, Selector};

/// Undo PromQL string-literal escaping; `None` on a dangling backslash or a
/// bare quote, either of which would end the literal early.
fn unquote(escaped: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                other => out.push(other),
            },
            '"' => return None,
            c => out.push(c),
        }
    }
    Some(out)
}

/// Count `|` not preceded by an escaping backslash.
fn unescaped_pipes(regex: &str) -> usize {
    let mut count = 0;
    let mut escaped = false;
    for c in regex.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '|' {
            count += 1;
        }
    }
    count
}

fn identifier_strategy() -> impl Strategy<Value = String> {
    "[^\\p{Cc}]{1,32}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_string_literal_preserves_value(value in any::<String>()) {
        let escaped = escape_string(&value);
        prop_assert_eq!(unquote(&escaped), Some(value));
    }

    #[test]
    fn prop_identifiers_pass_check(value in identifier_strategy()) {
        prop_assert!(check_identifier("label", &value).is_ok());
    }

    #[test]
    fn prop_union_has_one_alternative_per_id(
        ids in prop::collection::vec(identifier_strategy(), 1..6)
    ) {
        let union = ids.iter().map(|id| escape_regex(id)).collect::<Vec<_>>().join("|");
        prop_assert_eq!(unescaped_pipes(&union), ids.len() - 1);
    }

    #[test]
    fn prop_selector_stays_one_matcher(value in identifier_strategy()) {
        let rendered = Selector::new("up").eq("job", &value).to_string();
        let inner = rendered
            .strip_prefix("up{job=\"")
            .and_then(|s| s.strip_suffix("\"}"));
        prop_assert!(inner.is_some());
        prop_assert_eq!(unquote(inner.unwrap_or_default()), Some(value));
    }
}
