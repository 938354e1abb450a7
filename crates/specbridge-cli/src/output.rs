use serde::Serialize;

/// User-facing output. Built once in `main` and handed to each command.
///
/// In JSON mode the human-readable lines are suppressed so stdout carries a
/// single JSON document; warnings still go to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct Printer {
    pub verbose: bool,
    pub json: bool,
}

impl Printer {
    pub fn new(verbose: bool, json: bool) -> Self {
        Self { verbose, json }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        if !self.json {
            println!("{}", msg.as_ref());
        }
    }

    pub fn success(&self, msg: impl AsRef<str>) {
        if !self.json {
            println!("✓ {}", msg.as_ref());
        }
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        eprintln!("warning: {}", msg.as_ref());
    }

    /// Printed only with `--verbose`.
    pub fn detail(&self, msg: impl AsRef<str>) {
        if self.verbose && !self.json {
            println!("  {}", msg.as_ref());
        }
    }

    pub fn table(&self, headers: &[&str], rows: Vec<Vec<String>>) {
        if !self.json {
            print_table(headers, rows);
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let widths = column_widths(headers, &rows);

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  ").trim_end());

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  ").trim_end());
    }
}

fn column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }
    widths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_fit_longest_cell() {
        let widths = column_widths(
            &["ITEM", "ISSUE"],
            &[
                vec!["spec:auth:1.1".into(), "#12".into()],
                vec!["spec:auth:req-1".into(), "#3".into()],
            ],
        );
        assert_eq!(widths, vec![15, 5]);
    }

    #[test]
    fn extra_cells_are_ignored_for_width() {
        let widths = column_widths(&["A"], &[vec!["xy".into(), "ignored".into()]]);
        assert_eq!(widths, vec![2]);
    }
}
