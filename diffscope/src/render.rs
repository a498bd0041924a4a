//! Text rendering for diffscope output.

use console::Style;
use diffscopelib::{BlameResult, ChangeKind, DiffEntry, Edit, EditKind};

const SHORT_ID: usize = 8;

/// Styles used by the text renderer.
struct Theme {
    header: Style,
    added: Style,
    deleted: Style,
    modified: Style,
    dim: Style,
}

impl Theme {
    fn new() -> Self {
        Self {
            header: Style::new().bold(),
            added: Style::new().green(),
            deleted: Style::new().red(),
            modified: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    fn change(&self, change: ChangeKind) -> String {
        match change {
            ChangeKind::Add => self.added.apply_to("A").to_string(),
            ChangeKind::Delete => self.deleted.apply_to("D").to_string(),
            ChangeKind::Modify => self.modified.apply_to("M").to_string(),
            ChangeKind::Rename => self.modified.apply_to("R").to_string(),
            ChangeKind::Copy => self.added.apply_to("C").to_string(),
        }
    }
}

fn short(id: &str) -> &str {
    &id[..id.len().min(SHORT_ID)]
}

fn edit_kind(kind: EditKind) -> &'static str {
    match kind {
        EditKind::Insert => "INSERT",
        EditKind::Delete => "DELETE",
        EditKind::Replace => "REPLACE",
        EditKind::Empty => "EMPTY",
    }
}

fn format_edit(edit: &Edit) -> String {
    format!(
        "    {:<7} -{},{} +{},{}",
        edit_kind(edit.kind()),
        edit.begin_a,
        edit.end_a,
        edit.begin_b,
        edit.end_b
    )
}

/// Render diff entries, one path line followed by its edits.
pub fn render_entries(entries: &[DiffEntry], from: &str, to: &str) -> String {
    let theme = Theme::new();
    let mut out = String::new();

    out.push_str(&format!(
        "{}\n",
        theme
            .header
            .apply_to(format!("Diff: {} \u{2192} {}", short(from), short(to)))
    ));

    if entries.is_empty() {
        out.push_str(&format!("{}\n", theme.dim.apply_to("no changes")));
        return out;
    }

    for entry in entries {
        let path = match (entry.change, &entry.old_path, &entry.new_path) {
            (ChangeKind::Rename | ChangeKind::Copy, Some(old), Some(new)) => {
                format!("{} \u{2192} {}", old, new)
            }
            _ => entry.path().to_string(),
        };
        out.push_str(&format!("{} {}\n", theme.change(entry.change), path));
        for edit in &entry.edits {
            out.push_str(&format_edit(edit));
            out.push('\n');
        }
    }

    out.push_str(&format!(
        "{}\n",
        theme.dim.apply_to(format!("{} files changed", entries.len()))
    ));
    out
}

/// Render blame results, one row per line.
pub fn render_blame(results: &[BlameResult]) -> String {
    let theme = Theme::new();
    let mut out = String::new();

    for result in results {
        out.push_str(&format!("{}\n", theme.header.apply_to(&result.path)));
        if result.is_empty() {
            out.push_str(&format!("{}\n", theme.dim.apply_to("  (not found)")));
            continue;
        }

        for (index, line) in result.lines.iter().enumerate() {
            let author = line
                .author
                .as_ref()
                .map(|identity| match &identity.email {
                    Some(email) => format!("{} <{}>", identity.name, email),
                    None => identity.name.clone(),
                })
                .unwrap_or_default();
            let origin = if line.source_path != result.path {
                format!(" ({}:{})", line.source_path, line.source_line + 1)
            } else {
                String::new()
            };
            out.push_str(&format!(
                "{:>6} {} {}{}\n",
                index + 1,
                theme.dim.apply_to(short(&line.commit)),
                author,
                origin
            ));
        }
    }
    out
}
