//! Row distribution for the session grid.
//!
//! The grid never leaves holes: every row is filled, and rows differ in
//! length by at most one pane. The first rows take the extra panes.

/// Distribute `count` panes over rows.
///
/// Rules:
/// - 0 panes: no rows
/// - 1 pane: `[1]`
/// - 2 panes: `[2]` (side by side)
/// - 3..=6 panes: 2 rows
/// - 7+ panes: 3 rows (the pool cap of 12 never needs more)
pub fn rows_for(count: usize) -> Vec<usize> {
    match count {
        0 => Vec::new(),
        1 => vec![1],
        2 => vec![2],
        _ => {
            let num_rows = if count <= 6 { 2 } else { 3 };
            let base = count / num_rows;
            let remainder = count % num_rows;
            (0..num_rows)
                .map(|row| if row < remainder { base + 1 } else { base })
                .collect()
        }
    }
}

/// A pane's position inside a row distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSlot {
    pub row: usize,
    pub col: usize,
    /// Number of panes sharing this slot's row
    pub cols_in_row: usize,
}

/// Map every pane index (in order) to its slot in the `rows` distribution.
pub fn grid_slots(rows: &[usize]) -> Vec<GridSlot> {
    rows.iter()
        .enumerate()
        .flat_map(|(row, &cols_in_row)| {
            (0..cols_in_row).map(move |col| GridSlot {
                row,
                col,
                cols_in_row,
            })
        })
        .collect()
}
