//! Rendering action results and member listings.

use monitor_types::config::NumberMode;
use monitor_types::member::{IntKind, MethodDescriptor, TypeInfo, ValueType};
use monitor_types::value::Value;

use crate::interaction::CommandInteraction;
use crate::invoker::ActionResult;

/// Format an integer of the given width according to `mode`.
pub fn format_int(value: i64, kind: IntKind, mode: NumberMode) -> String {
    let width = kind.bytes() * 2;
    let bits = if kind.bytes() >= 8 {
        value as u64
    } else {
        (value as u64) & ((1u64 << (kind.bytes() * 8)) - 1)
    };
    match mode {
        NumberMode::Hexadecimal => format!("0x{bits:0width$X}"),
        NumberMode::Decimal => decimal(value, kind),
        NumberMode::Both => format!("0x{bits:0width$X} ({})", decimal(value, kind)),
    }
}

fn decimal(value: i64, kind: IntKind) -> String {
    if kind == IntKind::U64 {
        (value as u64).to_string()
    } else {
        value.to_string()
    }
}

fn int_kind(ty: &ValueType) -> IntKind {
    match ty {
        ValueType::Int(kind) => *kind,
        ValueType::Nullable(inner) | ValueType::Array(inner) => int_kind(inner),
        _ => IntKind::I64,
    }
}

/// Render a single value on one line.
pub fn format_value(value: &Value, ty: &ValueType, mode: NumberMode) -> String {
    match value {
        Value::Int(i) => format_int(*i, int_kind(ty), mode),
        Value::Enum { spec, value } => spec.describe(*value),
        Value::List(items) => {
            let items: Vec<String> = items.iter().map(|v| format_value(v, ty, mode)).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Range { start, end } => format!(
            "<{}, {}>",
            format_int(*start as i64, IntKind::U64, mode),
            format_int(*end as i64, IntKind::U64, mode)
        ),
        Value::Object(object) => object.label(),
        other => other.to_string(),
    }
}

/// Print the result of an action. Unit results print nothing.
pub fn print_result(result: &ActionResult, mode: NumberMode, out: &mut dyn CommandInteraction) {
    match &result.value {
        Value::Null => {}
        Value::Enum { spec, value } => {
            out.write_line(&spec.describe(*value));
            out.write_line("");
            out.write_line("Possible values are:");
            for (name, _) in &spec.variants {
                out.write_line(&format!("\t{name}"));
            }
            out.write_line("");
        }
        Value::List(items) => {
            out.write_line("[");
            let rendered: Vec<String> = items
                .iter()
                .map(|v| format_value(v, &result.ty, mode))
                .collect();
            out.write_line(&rendered.join(", "));
            out.write_line("]");
        }
        Value::Map(rows) => {
            let width = rows.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
            for (key, value) in rows {
                out.write_line(&format!(
                    "{key:<width$} : {}",
                    format_value(value, &ValueType::Any, mode)
                ));
            }
        }
        Value::Table(rows) => print_table(rows, out),
        value => out.write_line(&format_value(value, &result.ty, mode)),
    }
}

/// Print rows of cells with `-`/`|` borders; the first row is the header.
pub fn print_table(rows: &[Vec<String>], out: &mut dyn CommandInteraction) {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    if columns == 0 {
        return;
    }
    let widths: Vec<usize> = (0..columns)
        .map(|c| {
            rows.iter()
                .filter_map(|r| r.get(c))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();
    let border = format!(
        "-{}-",
        widths
            .iter()
            .map(|w| "-".repeat(*w + 2))
            .collect::<Vec<_>>()
            .join("-")
    );
    let line = |row: &Vec<String>| {
        let cells: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(c, &w)| format!(" {:<w$} ", row.get(c).map_or("", String::as_str)))
            .collect();
        format!("|{}|", cells.join("|"))
    };

    out.write_line(&border);
    for (i, row) in rows.iter().enumerate() {
        out.write_line(&line(row));
        if i == 0 {
            out.write_line(&border);
        }
    }
    out.write_line(&border);
}

// ---------------------------------------------------------------------------
// Member listings
// ---------------------------------------------------------------------------

fn access(get: bool, set: bool) -> &'static str {
    match (get, set) {
        (true, true) => "available for 'get' and 'set'",
        (true, false) => "available for 'get'",
        (false, true) => "available for 'set'",
        (false, false) => "not available",
    }
}

/// The listing printed for a device action without arguments.
pub fn print_members(
    target: &str,
    info: Option<&TypeInfo>,
    extensions: &[MethodDescriptor],
    out: &mut dyn CommandInteraction,
) {
    let Some(info) = info else {
        out.write_line(&format!("{target} does not expose any members."));
        return;
    };
    out.write_line(&format!("{target} is of type {}", info.name));
    out.write_line("");

    let mut methods: Vec<&MethodDescriptor> = info.methods.iter().chain(extensions).collect();
    methods.sort_by(|a, b| a.name.cmp(&b.name));
    if !methods.is_empty() {
        out.write_line("The following methods are available:");
        for method in &methods {
            out.write_line(&format!(" - {method}"));
        }
        out.write_line("");
        out.write_line("Usage:");
        out.write_line(&format!(" {target} MethodName param1 param2 ..."));
        out.write_line("");
    }

    if !info.properties.is_empty() {
        out.write_line("The following properties are available:");
        for property in &info.properties {
            out.write_line(&format!(" - {} {}", property.ty, property.name));
            out.write_line(&format!(
                "     {}",
                access(property.get.is_some(), property.set.is_some())
            ));
        }
        out.write_line("Usage:");
        out.write_line(&format!(" - get: {target} PropertyName"));
        out.write_line(&format!(" - set: {target} PropertyName Value"));
        out.write_line("");
    }

    if !info.indexers.is_empty() {
        out.write_line("The following indexers are available:");
        for indexer in &info.indexers {
            let params: Vec<String> = indexer.params.iter().map(ToString::to_string).collect();
            out.write_line(&format!(
                " - {} {}[{}]",
                indexer.ty,
                indexer.name,
                params.join(", ")
            ));
            out.write_line(&format!(
                "     {}",
                access(indexer.get.is_some(), indexer.set.is_some())
            ));
        }
        out.write_line("Usage:");
        out.write_line(&format!(" - get: {target} IndexerName [index]"));
        out.write_line(&format!(" - set: {target} IndexerName [index] Value"));
        out.write_line("");
    }

    if !info.fields.is_empty() {
        out.write_line("The following fields are available:");
        for field in &info.fields {
            let read_only = if field.is_read_only() { " (read only)" } else { "" };
            out.write_line(&format!(" - {} {}{read_only}", field.ty, field.name));
        }
        out.write_line("Usage:");
        out.write_line(&format!(" - get: {target} FieldName"));
        out.write_line(&format!(" - set: {target} FieldName Value"));
        out.write_line("");
    }
}

/// Overloads of one member, shown after its parameters failed to match.
pub fn print_member_help(
    target: &str,
    member: &str,
    info: Option<&TypeInfo>,
    extensions: &[MethodDescriptor],
    out: &mut dyn CommandInteraction,
) {
    let methods: Vec<&MethodDescriptor> = info
        .map(|i| i.methods.iter())
        .into_iter()
        .flatten()
        .chain(extensions)
        .filter(|m| m.name == member)
        .collect();
    if !methods.is_empty() {
        out.write_line(&format!("The following overloads of {member} are available:"));
        for method in methods {
            out.write_line(&format!(" - {method}"));
        }
        out.write_line("");
        out.write_line("Usage:");
        out.write_line(&format!(" {target} {member} param1 param2 ..."));
        return;
    }
    if let Some(indexer) = info.and_then(|i| i.indexers_named(member).next()) {
        out.write_line(&format!(
            "Indexer {member} takes {} index value(s).",
            indexer.params.len()
        ));
        out.write_line(&format!("Usage: {target} {member} [index] [value]"));
    }
}
