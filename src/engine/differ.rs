//! Plan display

use colored::{ColoredString, Colorize};
use declarative::{
    Action, AttributeChange, Diagnostic, DiffSummary, ExecutionPlan, PlannedChange, Schema, Value,
};
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeMap;

/// Display the plan in a box, grouped by kind
pub fn display_plan(plan: &ExecutionPlan) {
    let pending: Vec<&PlannedChange> = plan.pending().collect();
    if pending.is_empty() {
        println!();
        println!(
            "  {} No changes. {} resources match the configuration.",
            "✓".green(),
            plan.total_resources()
        );
        return;
    }

    let mut by_kind: BTreeMap<&str, Vec<&PlannedChange>> = BTreeMap::new();
    for change in &pending {
        by_kind.entry(change.resource_type()).or_default().push(change);
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Execution Plan".bold()
    );
    println!("│");

    for (kind, changes) in &by_kind {
        println!("│ {}", kind.bold());
        for change in changes {
            display_change(change);
        }
        println!("│");
    }

    let summary = DiffSummary::from_diffs(plan.diffs());
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Plan: {} to create, {} to update, {} to replace, {} to destroy",
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow(),
        summary.replacements.to_string().magenta(),
        summary.removals.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

fn symbol(action: Action) -> ColoredString {
    match action {
        Action::Create => action.symbol().green(),
        Action::Update => action.symbol().yellow(),
        Action::Replace => action.symbol().magenta(),
        Action::Destroy => action.symbol().red(),
        Action::NoOp => action.symbol().dimmed(),
    }
}

fn display_change(change: &PlannedChange) {
    let action = change.action();
    let key = change
        .prior
        .as_ref()
        .or(change.desired.as_ref())
        .map(|attrs| change.reconciler.import_id(attrs))
        .unwrap_or_default();
    println!(
        "│   {} {:<40} {}",
        symbol(action),
        change.address,
        format!("({key})").dimmed()
    );

    if action == Action::Destroy {
        println!("│       {}", "(will remove)".dimmed());
        return;
    }

    let schema = change.reconciler.schema();
    for attribute in &change.diff.changes {
        for line in render_attribute(&schema, attribute) {
            println!("│       {line}");
        }
    }
}

/// Lines describing one attribute change
fn render_attribute(schema: &Schema, change: &AttributeChange) -> Vec<String> {
    let marker = if change.forces_replacement {
        format!(" {}", "# forces replacement".red())
    } else {
        String::new()
    };

    let multiline = |v: &Option<Value>| v.as_ref().and_then(Value::as_str).is_some_and(|s| s.contains('\n'));
    if !change.sensitive && (multiline(&change.from) || multiline(&change.to)) {
        let old = change.from.as_ref().and_then(Value::as_str).unwrap_or_default();
        let new = change.to.as_ref().and_then(Value::as_str).unwrap_or_default();
        let mut lines = vec![format!("{}:{marker}", change.name)];
        lines.extend(text_changes(old, new).into_iter().map(|(tag, text)| match tag {
            ChangeTag::Delete => format!("  {}", format!("- {text}").red()),
            ChangeTag::Insert => format!("  {}", format!("+ {text}").green()),
            ChangeTag::Equal => format!("  {}", format!("  {text}").dimmed()),
        }));
        return lines;
    }

    let show = |v: &Option<Value>| match v {
        Some(value) => schema.display_value(&change.name, value),
        None => "(unset)".to_string(),
    };
    let line = match (&change.from, &change.to) {
        (None, Some(_)) => format!("{} = {}", change.name, show(&change.to)),
        _ => format!(
            "{}: {} → {}",
            change.name,
            show(&change.from).dimmed(),
            show(&change.to)
        ),
    };
    vec![format!("{line}{marker}")]
}

/// Line-level changes between two multi-line values
fn text_changes(old: &str, new: &str) -> Vec<(ChangeTag, String)> {
    TextDiff::from_lines(old, new)
        .iter_all_changes()
        .map(|change| (change.tag(), change.value().trim_end_matches('\n').to_string()))
        .collect()
}

/// Print diagnostics, errors first
pub fn display_diagnostics(diagnostics: &[Diagnostic]) {
    let (errors, warnings): (Vec<&Diagnostic>, Vec<&Diagnostic>) =
        diagnostics.iter().partition(|d| d.is_error());
    for diagnostic in errors {
        eprintln!("  {} {}", "✗".red(), diagnostic);
    }
    for diagnostic in warnings {
        eprintln!("  {} {}", "⚠".yellow(), diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::AttributeSpec;

    const SPECS: &[AttributeSpec] = &[
        AttributeSpec::string("script"),
        AttributeSpec::string("secret").sensitive(),
        AttributeSpec::integer("port"),
    ];
    const SCHEMA: Schema = Schema::new("test", SPECS);

    fn change(name: &str, from: Option<Value>, to: Option<Value>) -> AttributeChange {
        AttributeChange {
            name: name.to_string(),
            from,
            to,
            sensitive: SCHEMA.get(name).is_some_and(|s| s.sensitive),
            forces_replacement: false,
        }
    }

    #[test]
    fn test_text_changes() {
        let changes = text_changes("a\nb\nc\n", "a\nB\nc\n");
        assert_eq!(
            changes,
            vec![
                (ChangeTag::Equal, "a".to_string()),
                (ChangeTag::Delete, "b".to_string()),
                (ChangeTag::Insert, "B".to_string()),
                (ChangeTag::Equal, "c".to_string()),
            ]
        );
    }

    #[test]
    fn test_sensitive_values_are_masked() {
        colored::control::set_override(false);
        let lines = render_attribute(
            &SCHEMA,
            &change("secret", Some("old-secret".into()), Some("line1\nline2".into())),
        );
        assert_eq!(lines, vec!["secret: (sensitive) → (sensitive)".to_string()]);
    }

    #[test]
    fn test_multiline_values_render_line_diff() {
        colored::control::set_override(false);
        let lines = render_attribute(
            &SCHEMA,
            &change("script", Some("function a() {}\n".into()), Some("function b() {}\n".into())),
        );
        assert_eq!(lines[0], "script:");
        assert!(lines.contains(&"  - function a() {}".to_string()));
        assert!(lines.contains(&"  + function b() {}".to_string()));
    }

    #[test]
    fn test_new_attribute_line() {
        colored::control::set_override(false);
        let lines = render_attribute(&SCHEMA, &change("port", None, Some(Value::Int(9200))));
        assert_eq!(lines, vec!["port = 9200".to_string()]);
    }
}
