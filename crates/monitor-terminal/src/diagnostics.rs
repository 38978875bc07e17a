//! Printing failures of commands and of the tokenizer.

use monitor_types::error::MonitorError;
use monitor_types::token::TokenizationResult;

use crate::interaction::CommandInteraction;

/// Report a failed invocation of `command`.
///
/// Lookup failures are printed as their bare message. Anything else gets a
/// header line, then every inner failure, tab-indented by nesting depth.
pub fn print_error(command: &str, error: &MonitorError, out: &mut dyn CommandInteraction) {
    if matches!(
        error,
        MonitorError::NoSuchCommandOrDevice { .. } | MonitorError::NoSuchVariable(_)
    ) {
        out.write_error(&error.to_string());
        return;
    }
    out.write_error(&format!("There was an error executing command '{command}'"));
    write_details(error, 0, out);
}

fn write_details(error: &MonitorError, depth: usize, out: &mut dyn CommandInteraction) {
    match error {
        MonitorError::Aggregate(inner) => {
            for e in inner {
                write_details(e, depth, out);
            }
        }
        MonitorError::Wrapped {
            message: None,
            inner,
        } => write_details(inner, depth, out),
        MonitorError::Wrapped {
            message: Some(message),
            inner,
        } => {
            out.write_error(&format!("{}{message}", "\t".repeat(depth)));
            write_details(inner, depth + 1, out);
        }
        other => out.write_error(&format!("{}{other}", "\t".repeat(depth))),
    }
}

/// Report a line the tokenizer could not consume, with a caret under the
/// first unconsumed character.
pub fn print_tokenization_error(
    line: &str,
    result: &TokenizationResult,
    out: &mut dyn CommandInteraction,
) {
    let consumed = line.chars().count().saturating_sub(result.unmatched);
    out.write_error("Could not tokenize here:");
    out.write_error(line);
    out.write_error(&format!("{}^", " ".repeat(consumed)));
    if let Some(error) = &result.error {
        out.write_error(&error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::interaction::BufferInteraction;
    use crate::tokenizer::tokenize;

    #[test]
    fn nested_failures_are_indented() {
        let error = MonitorError::Aggregate(vec![
            MonitorError::wrap(
                "Loading firmware failed",
                MonitorError::Wrapped {
                    message: None,
                    inner: Box::new(MonitorError::recoverable("file not found")),
                },
            ),
            MonitorError::recoverable("second"),
        ]);
        let mut out = BufferInteraction::new();
        print_error("sysbus LoadELF @fw.elf", &error, &mut out);
        assert_eq!(
            out.errors(),
            "There was an error executing command 'sysbus LoadELF @fw.elf'\n\
             Loading firmware failed\n\
             \tfile not found\n\
             second\n"
        );
    }

    #[test]
    fn lookup_failures_print_bare_message() {
        let mut out = BufferInteraction::new();
        print_error("$x", &MonitorError::NoSuchVariable("x".into()), &mut out);
        assert_eq!(out.errors(), "No such variable: $x\n");
    }

    #[test]
    fn caret_points_at_failure() {
        let line = "mach set <5,-6>";
        let result = tokenize(line);
        let mut out = BufferInteraction::new();
        print_tokenization_error(line, &result, &mut out);
        let lines: Vec<&str> = out.errors().lines().collect();
        assert_eq!(lines[0], "Could not tokenize here:");
        assert_eq!(lines[1], line);
        assert_eq!(lines[2], "         ^");
        assert_eq!(lines.len(), 4);
    }
}
