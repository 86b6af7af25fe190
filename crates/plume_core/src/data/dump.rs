// dump.rs - Diagnostic table of every variable for a range of instances

use super::data_set::{BufferSelect, DataSet};
use super::iter::DataSetVariableIterator;
use tracing::info;

impl DataSet {
    /// Render every live instance of the selected buffer as a table.
    pub fn dump(&self, select: BufferSelect) -> String {
        self.dump_range(select, 0, self.buffer(select).num_instances())
    }

    /// Render `count` instances starting at `start`, clamped to the live
    /// range and to `dump_max_rows`. Each line is also logged at `info`.
    pub fn dump_range(&self, select: BufferSelect, start: usize, count: usize) -> String {
        let live = self.buffer(select).num_instances();
        let start = start.min(live);
        let mut end = start.saturating_add(count).min(live);
        if let Some(max) = self.settings().dump_max_rows {
            end = end.min(start.saturating_add(max));
        }

        let separator = "=".repeat(self.settings().dump_separator_width);
        let mut lines = Vec::with_capacity(end - start + 4);
        lines.push(separator.clone());
        lines.push(format!(
            "{} | {:?} ({:?}) | instances {}..{} of {}",
            self.id(),
            select,
            self.slot_of(select),
            start,
            end,
            live
        ));
        lines.push(row(self.variables().iter().map(|v| v.name().to_string())));

        let mut it = DataSetVariableIterator::new(self, start, select);
        it.add_variables(self.variables());
        while it.is_valid() && it.index() < end {
            lines.push(row(it.values().iter().map(|v| v.to_string())));
            it.advance();
        }
        lines.push(separator);

        for line in &lines {
            info!("{}", line);
        }
        lines.join("\n")
    }
}

fn row(cells: impl Iterator<Item = String>) -> String {
    let mut out = String::from("|");
    for cell in cells {
        out.push(' ');
        out.push_str(&cell);
        out.push_str(" |");
    }
    out
}
