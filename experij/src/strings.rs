//! Name templating and validation.

use std::fmt::{Display, Write};

use crate::error::ExperimentError;

const PLACEHOLDER: &str = "{}";

/// Replaces successive `{}` in `template` with `args`, in order.
///
/// Placeholders without a matching argument are left in place and surplus
/// arguments are ignored.
pub fn format_template(template: &str, args: &[&dyn Display]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    for arg in args {
        let Some(at) = rest.find(PLACEHOLDER) else {
            break;
        };
        out.push_str(&rest[..at]);
        let _ = write!(out, "{arg}");
        rest = &rest[at + PLACEHOLDER.len()..];
    }
    out.push_str(rest);
    out
}

/// Whether `name` has at least one non-whitespace character.
pub fn is_usable(name: &str) -> bool {
    name.chars().any(|c| c > ' ')
}

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '$' || c == '_'
}

/// Checks that `name` can be spliced into a generated method name.
pub fn confirm_safe(name: &str) -> Result<&str, ExperimentError> {
    if !is_usable(name) {
        return Err(ExperimentError::InvalidName {
            name: name.to_owned(),
            reason: "name must not be empty".into(),
        });
    }
    if let Some((index, c)) = name.char_indices().find(|&(_, c)| !is_safe_char(c)) {
        return Err(ExperimentError::InvalidName {
            name: name.to_owned(),
            reason: format!("invalid character '{c}' at {index}"),
        });
    }
    Ok(name)
}

/// Checks that `name` is a class name in internal form, e.g.
/// `java/lang/String`: `/`-separated, non-empty segments without `.`, `;`,
/// `[`, `(`, `)` or whitespace.
pub fn confirm_internal_name(name: &str) -> Result<&str, ExperimentError> {
    let invalid = |reason: String| ExperimentError::InvalidName {
        name: name.to_owned(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("class name must not be empty".into()));
    }
    let mut start = 0;
    for segment in name.split('/') {
        if segment.is_empty() {
            return Err(invalid(format!("empty package segment at {start}")));
        }
        if let Some((index, c)) = segment
            .char_indices()
            .find(|&(_, c)| matches!(c, '.' | ';' | '[' | '(' | ')') || c.is_whitespace())
        {
            return Err(invalid(format!(
                "invalid character '{c}' at {}",
                start + index
            )));
        }
        start += segment.len() + 1;
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_placeholders_in_order() {
        assert_eq!(format_template("{}${}", &[&"a", &7]), "a$7");
        assert_eq!(format_template("experij$entry${}", &[&"sum"]), "experij$entry$sum");
    }

    #[test]
    fn missing_and_surplus_arguments() {
        assert_eq!(format_template("{} and {}", &[&"x"]), "x and {}");
        assert_eq!(format_template("plain", &[&"x", &"y"]), "plain");
        assert_eq!(format_template("", &[&"x"]), "");
        assert_eq!(format_template("{}", &[]), "{}");
    }

    #[test]
    fn argument_containing_placeholder_is_not_rescanned() {
        assert_eq!(format_template("{}-{}", &[&"{}", &"b"]), "{}-b");
    }

    #[test]
    fn safe_names() {
        assert_eq!(confirm_safe("fast_Path$2").unwrap(), "fast_Path$2");
        assert!(confirm_safe("Optimized").is_ok());
    }

    #[test]
    fn blank_names_are_rejected() {
        for name in ["", "   ", "\t"] {
            assert!(matches!(
                confirm_safe(name),
                Err(ExperimentError::InvalidName { .. })
            ));
        }
    }

    #[test]
    fn unsafe_character_is_reported() {
        let err = confirm_safe("my-exp").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid name \"my-exp\": invalid character '-' at 2"
        );
        assert!(confirm_safe("naïve").is_err());
    }

    #[test]
    fn internal_class_names() {
        assert_eq!(confirm_internal_name("demo/Calc").unwrap(), "demo/Calc");
        assert!(confirm_internal_name("Calc").is_ok());
        assert!(confirm_internal_name("a/b/Outer$Inner").is_ok());
    }

    #[test]
    fn malformed_class_names_are_rejected() {
        assert_eq!(
            confirm_internal_name("demo.Calc").unwrap_err().to_string(),
            "invalid name \"demo.Calc\": invalid character '.' at 4"
        );
        assert_eq!(
            confirm_internal_name("demo//Calc").unwrap_err().to_string(),
            "invalid name \"demo//Calc\": empty package segment at 5"
        );
        for name in ["", "/Calc", "demo/", "[I", "Ljava/lang/String;", "a b"] {
            assert!(
                matches!(
                    confirm_internal_name(name),
                    Err(ExperimentError::InvalidName { .. })
                ),
                "{name:?} accepted"
            );
        }
    }
}
