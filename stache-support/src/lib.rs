use std::borrow::Cow;
use std::fmt;

fn escape_single_quotes(input: &str) -> Cow<'_, str> {
    if input.contains('\'') {
        Cow::Owned(input.replace('\'', "\\'"))
    } else {
        Cow::Borrowed(input)
    }
}

fn format_operation_error(
    scope: &str,
    operation: &str,
    target: Option<&str>,
    error: impl fmt::Display,
) -> String {
    match target {
        Some(target) => {
            let escaped = escape_single_quotes(target);
            format!("{scope}.{operation}('{}') failed: {error}", escaped)
        }
        None => format!("{scope}.{operation} failed: {error}"),
    }
}

/// Failure while loading or compiling a template file.
pub fn template_error(operation: &str, path: &str, error: impl fmt::Display) -> String {
    format_operation_error("stache.template", operation, Some(path), error)
}

/// Failure while loading the data a template is rendered against.
pub fn data_error(operation: &str, path: &str, error: impl fmt::Display) -> String {
    format_operation_error("stache.data", operation, Some(path), error)
}

pub fn config_error(operation: &str, path: &str, error: impl fmt::Display) -> String {
    format_operation_error("stache.config", operation, Some(path), error)
}

/// Failure raised from inside a helper body, e.g. bad arguments.
pub fn helper_error(helper: &str, operation: &str, error: impl fmt::Display) -> String {
    format_operation_error(helper, operation, None, error)
}

pub fn io_error(operation: &str, error: impl fmt::Display) -> String {
    format_operation_error("stache.io", operation, None, error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_in_targets() {
        let message = template_error("read", "it's.hbs", "missing");
        assert_eq!(message, "stache.template.read('it\\'s.hbs') failed: missing");
    }

    #[test]
    fn omits_target_when_absent() {
        assert_eq!(
            helper_error("each", "iterate", "not a list"),
            "each.iterate failed: not a list"
        );
    }
}
