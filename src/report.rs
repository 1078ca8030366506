//! Rendering of extracted digram snapshots.
//!
//! Everything here is a pure function from `(total, rows)` to text; the
//! rows come from [`CounterStore::extract_sorted`] after reduction to
//! plain digrams. Hosts that want their own layout supply a per-row
//! closure via [`render_with`].
//!
//! [`CounterStore::extract_sorted`]: crate::store::CounterStore::extract_sorted

use crate::types::{CommandName, Digram};

/// Resolves a command to a short annotation, typically the key it is
/// bound to in the host editor.
pub type BindingResolver<'a> = dyn Fn(&CommandName) -> Option<String> + 'a;

/// Built-in report layouts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Count and digram in aligned columns.
    #[default]
    Plain,
    /// Like `Plain` plus each row's share of the total, and an optional
    /// binding annotation when a resolver is supplied.
    Percentage,
    /// Machine-readable: `count predecessor command`, single spaces.
    Raw,
}

/// Renders rows in one of the built-in layouts, one line per row.
///
/// The `bindings` resolver is only consulted for [`ReportFormat::Percentage`];
/// rows whose command resolves to `None` carry no annotation.
///
/// ```
/// use digram_stats::report::{render, ReportFormat};
/// use digram_stats::types::{CommandName, Digram};
///
/// let rows = vec![(
///     Digram::new(
///         CommandName::parse("backward-char").unwrap(),
///         CommandName::parse("forward-char").unwrap(),
///     ),
///     12,
/// )];
/// let text = render(14, &rows, ReportFormat::Plain, None);
/// assert_eq!(text, "     12  backward-char -> forward-char\n");
/// ```
pub fn render(
    total: u64,
    rows: &[(Digram, u64)],
    format: ReportFormat,
    bindings: Option<&BindingResolver>,
) -> String {
    let mut out = String::new();
    for (digram, count) in rows {
        let line = match format {
            ReportFormat::Plain => format!(
                "{count:>7}  {} -> {}",
                digram.predecessor, digram.command
            ),
            ReportFormat::Percentage => {
                let mut line = format!(
                    "{count:>7}  {:>6.2}%  {} -> {}",
                    percentage(*count, total),
                    digram.predecessor,
                    digram.command
                );
                if let Some(resolve) = bindings {
                    if let Some(annotation) = resolve(&digram.command) {
                        line.push_str(&format!("  [{annotation}]"));
                    }
                }
                line
            }
            ReportFormat::Raw => {
                format!("{count} {} {}", digram.predecessor, digram.command)
            }
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Renders rows through a caller-supplied formatter receiving the
/// count, its share of the total, and both command names.
pub fn render_with<F>(total: u64, rows: &[(Digram, u64)], mut row: F) -> String
where
    F: FnMut(u64, f64, &CommandName, &CommandName) -> String,
{
    let mut out = String::new();
    for (digram, count) in rows {
        out.push_str(&row(
            *count,
            percentage(*count, total),
            &digram.predecessor,
            &digram.command,
        ));
        out.push('\n');
    }
    out
}

/// Share of `total` as a percentage. An empty store has no shares, so
/// a zero total yields 0 rather than a division error.
fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}
