//! Source line lookup over the sorted line-info table.

use crate::image::LineEntry;
use crate::Cursor;

/// Find the breakpoint active at `position`: the entry with the greatest
/// `bytecode_start <= position`.
///
/// The table must be non-empty; an empty table is a broken image, not a
/// runtime condition, so this panics. Positions before the first entry
/// resolve to the first entry.
pub fn locate_line(position: Cursor, line_info: &[LineEntry]) -> &LineEntry {
    assert!(!line_info.is_empty(), "line info table must not be empty");
    let pos = position as i64;
    let mut start = 0;
    let mut size = line_info.len();
    while size > 1 {
        let half = size / 2;
        if i64::from(line_info[start + half].bytecode_start) <= pos {
            start += half;
            size -= half;
        } else {
            size = half;
        }
    }
    &line_info[start]
}
