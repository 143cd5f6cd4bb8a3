// SPDX-License-Identifier: MIT
//
// ScreenBuffer: the cell grid the widget layer paints into.
//
// Design:
//
//   - Flat `Vec<Cell>` with row-major indexing. A row's cells are
//     contiguous, so the left-to-right render scan is linear.
//
//   - Dirty tracking at two levels. Each cell carries a dirty flag and
//     each row a "has dirty cells" flag, so render skips clean rows
//     without touching their cells. A cell is dirty when its content
//     differs from what the terminal was last sent; writing the same
//     content to a clean cell leaves it clean.
//
//   - Render coalesces contiguous dirty cells of one attribute into a
//     run: one cursor move (skipped when the cursor is already there),
//     one color change (skipped when already active), then the text.
//     The whole frame is assembled in an `OutputBuffer` and handed to
//     the writer in one call.
//
//   - Wide characters occupy two columns: the rune, then a padding cell
//     the renderer never emits. Zero-width runes, and runes above U+FFFF
//     when the terminal cannot draw them, are stored as the placeholder
//     so the grid never disagrees with the terminal about column counts.

use std::io::{self, Write};

use unicode_width::UnicodeWidthChar;

use crate::ansi;
use crate::backend::Size;
use crate::capabilities::Capabilities;
use crate::cell::{Attribute, Cell, PADDING};
use crate::output::{CellWriter, OutputBuffer};

/// Cursor visibility and position as last sent to the terminal.
type CursorState = Option<(u16, u16)>;

/// The screen grid with dirty tracking and run-coalescing render.
pub struct ScreenBuffer {
    cols: u16,
    rows: u16,
    cells: Vec<Cell>,
    dirty_rows: Vec<bool>,
    caps: Capabilities,
    placeholder: char,
    writer: CellWriter,
    out: OutputBuffer,
    /// `None` until the first frame, or after invalidation.
    cursor: Option<CursorState>,
}

impl ScreenBuffer {
    /// A grid of blank cells, all queued for drawing.
    ///
    /// `placeholder` must be a single-column character; anything else is
    /// replaced by `?`.
    #[must_use]
    pub fn new(size: Size, caps: Capabilities, placeholder: char) -> Self {
        let placeholder = if placeholder.width() == Some(1) {
            placeholder
        } else {
            '?'
        };
        let mut screen = Self {
            cols: 0,
            rows: 0,
            cells: Vec::new(),
            dirty_rows: Vec::new(),
            caps,
            placeholder,
            writer: CellWriter::new(),
            out: OutputBuffer::new(),
            cursor: None,
        };
        screen.resize(size);
        screen
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub const fn cols(&self) -> u16 {
        self.cols
    }

    #[inline]
    #[must_use]
    pub const fn rows(&self) -> u16 {
        self.rows
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        Size {
            cols: self.cols,
            rows: self.rows,
        }
    }

    #[inline]
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    #[inline]
    #[must_use]
    pub const fn placeholder(&self) -> char {
        self.placeholder
    }

    #[inline]
    const fn in_bounds(&self, row: u16, col: u16) -> bool {
        row < self.rows && col < self.cols
    }

    #[inline]
    const fn index(&self, row: u16, col: u16) -> usize {
        row as usize * self.cols as usize + col as usize
    }

    /// The cell at `(row, col)`, or `None` if out of bounds.
    #[must_use]
    pub fn get(&self, row: u16, col: u16) -> Option<&Cell> {
        self.in_bounds(row, col).then(|| &self.cells[self.index(row, col)])
    }

    /// Whether any cell is queued for drawing.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty_rows.iter().any(|&d| d)
    }

    // ─── Resize / Invalidate ─────────────────────────────────────────────

    /// Reallocate for a new size. All content is discarded; every cell is
    /// blank and dirty.
    pub fn resize(&mut self, size: Size) {
        self.cols = size.cols;
        self.rows = size.rows;
        let len = usize::from(size.cols) * usize::from(size.rows);
        self.cells = vec![Cell::BLANK; len];
        self.dirty_rows = vec![true; usize::from(size.rows)];
        self.invalidate_state();
    }

    /// Blank every cell.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell = Cell::BLANK;
        }
        self.dirty_rows.fill(true);
    }

    /// Force a full redraw on the next render.
    pub fn invalidate(&mut self) {
        for cell in &mut self.cells {
            cell.dirty = true;
        }
        self.dirty_rows.fill(true);
        self.invalidate_state();
    }

    fn invalidate_state(&mut self) {
        self.writer.reset_state();
        self.cursor = None;
    }

    // ─── Painting ────────────────────────────────────────────────────────

    /// Map a rune to what the grid stores and how many columns it takes.
    fn resolve(&self, rune: char, col: u16) -> (char, u16) {
        if !self.caps.non_bmp && u32::from(rune) > 0xFFFF {
            return (self.placeholder, 1);
        }
        match rune.width() {
            Some(2) if col + 1 < self.cols => (rune, 2),
            Some(2) | Some(0) | None => (self.placeholder, 1),
            Some(_) => (rune, 1),
        }
    }

    /// Store `rune` with `attr`, marking the cell dirty if it changed.
    fn put(&mut self, row: u16, col: u16, rune: char, attr: Attribute) {
        let idx = self.index(row, col);
        let cell = &mut self.cells[idx];
        if cell.rune != rune || cell.attr != attr {
            *cell = Cell::new(rune, attr);
            self.dirty_rows[usize::from(row)] = true;
        }
    }

    /// Break any wide character that touches `(row, col)`.
    ///
    /// - If `(row, col)` is padding, the owner at `col - 1` becomes a space.
    /// - If the next cell is padding, it belonged to a wide character
    ///   starting here and becomes a space.
    fn break_wide_char_at(&mut self, row: u16, col: u16) {
        let here = self.cells[self.index(row, col)];
        if here.is_padding() && col > 0 {
            let owner = self.cells[self.index(row, col - 1)];
            self.put(row, col - 1, ' ', owner.attr);
        }
        if col + 1 < self.cols {
            let next = self.cells[self.index(row, col + 1)];
            if next.is_padding() {
                self.put(row, col + 1, ' ', next.attr);
            }
        }
    }

    /// Write one rune. Returns the columns it occupies (0 when out of
    /// bounds, 2 for a wide character, 1 otherwise).
    pub fn set_cell(&mut self, row: u16, col: u16, rune: char, attr: Attribute) -> u16 {
        if !self.in_bounds(row, col) {
            return 0;
        }
        let (rune, width) = self.resolve(rune, col);
        self.break_wide_char_at(row, col);
        if width == 2 {
            self.break_wide_char_at(row, col + 1);
        }
        self.put(row, col, rune, attr);
        if width == 2 {
            self.put(row, col + 1, PADDING, attr);
        }
        width
    }

    /// Fill the whole grid with `rune` in `attr`.
    pub fn fill(&mut self, rune: char, attr: Attribute) {
        for row in 0..self.rows {
            let mut col = 0;
            while col < self.cols {
                col += self.set_cell(row, col, rune, attr).max(1);
            }
        }
    }

    // ─── Render ──────────────────────────────────────────────────────────

    /// Emit every dirty cell to `w`, then place the cursor.
    ///
    /// `cursor` is where the cursor should be shown, `None` to hide it.
    /// Returns the number of bytes written. Nothing dirty and no cursor
    /// change writes nothing at all.
    ///
    /// # Errors
    ///
    /// Returns the writer's error. The frame is then considered lost and
    /// the whole screen is queued for the next render.
    pub fn render(&mut self, w: &mut (impl Write + ?Sized), cursor: CursorState) -> io::Result<usize> {
        self.out.clear();
        let wrote_cells = self.emit_runs()?;

        let cursor = cursor.filter(|&(row, col)| self.in_bounds(row, col));
        if wrote_cells || self.cursor != Some(cursor) {
            self.emit_cursor(cursor)?;
        }

        let len = self.out.len();
        if let Err(err) = self.out.flush_to(w) {
            self.invalidate();
            return Err(err);
        }
        Ok(len)
    }

    fn emit_runs(&mut self) -> io::Result<bool> {
        let mut wrote = false;
        for row in 0..self.rows {
            if !self.dirty_rows[usize::from(row)] {
                continue;
            }
            let mut col = 0;
            while col < self.cols {
                let idx = self.index(row, col);
                let cell = self.cells[idx];
                if !cell.dirty || cell.is_padding() {
                    self.cells[idx].dirty = false;
                    col += 1;
                    continue;
                }

                self.writer.move_to(&mut self.out, row, col)?;
                self.writer.set_attr(&mut self.out, cell.attr)?;
                wrote = true;
                col = self.emit_run(row, col, cell.attr);
            }
            self.dirty_rows[usize::from(row)] = false;
        }
        Ok(wrote)
    }

    /// Write the run of dirty `attr` cells starting at `col`. Returns the
    /// first column after the run.
    fn emit_run(&mut self, row: u16, mut col: u16, attr: Attribute) -> u16 {
        while col < self.cols {
            let idx = self.index(row, col);
            let cell = self.cells[idx];
            if !cell.dirty || cell.attr != attr {
                break;
            }
            self.cells[idx].dirty = false;
            col += 1;
            if cell.is_padding() {
                continue;
            }
            self.out.push_char(cell.rune);
            let width = if cell.rune.width() == Some(2) { 2 } else { 1 };
            self.writer.advance(width);
        }
        col
    }

    fn emit_cursor(&mut self, cursor: CursorState) -> io::Result<()> {
        let was_visible = matches!(self.cursor, Some(Some(_)));
        match cursor {
            Some((row, col)) => {
                self.writer.move_to(&mut self.out, row, col)?;
                if !was_visible {
                    ansi::cursor_show(&mut self.out)?;
                }
            }
            None => {
                if self.cursor != Some(None) {
                    ansi::cursor_hide(&mut self.out)?;
                }
            }
        }
        self.cursor = Some(cursor);
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use pretty_assertions::assert_eq;

    fn screen(cols: u16, rows: u16) -> ScreenBuffer {
        ScreenBuffer::new(Size { cols, rows }, Capabilities::headless(), '?')
    }

    fn render(screen: &mut ScreenBuffer, cursor: Option<(u16, u16)>) -> String {
        let mut out = Vec::new();
        screen.render(&mut out, cursor).unwrap();
        String::from_utf8(out).unwrap()
    }

    /// A screen whose initial blank frame has already gone out.
    fn drawn(cols: u16, rows: u16) -> ScreenBuffer {
        let mut s = screen(cols, rows);
        render(&mut s, None);
        s
    }

    #[test]
    fn new_screen_is_all_dirty() {
        let s = screen(4, 2);
        assert!(s.is_dirty());
        assert_eq!(s.get(1, 3), Some(&Cell::BLANK));
        assert_eq!(s.get(2, 0), None);
    }

    #[test]
    fn first_render_draws_every_row() {
        let mut s = screen(3, 2);
        let out = render(&mut s, None);
        assert_eq!(out, "\x1b[1;1H\x1b[39;49m   \x1b[2;1H   \x1b[?25l");
        assert!(!s.is_dirty());
    }

    #[test]
    fn second_render_writes_nothing() {
        let mut s = drawn(10, 3);
        s.set_cell(1, 1, 'x', Attribute::DEFAULT);
        assert!(!render(&mut s, None).is_empty());
        assert_eq!(render(&mut s, None), "");
    }

    #[test]
    fn unchanged_content_stays_clean() {
        let mut s = drawn(5, 1);
        s.set_cell(0, 2, ' ', Attribute::DEFAULT);
        assert!(!s.is_dirty());
    }

    #[test]
    fn overwrite_before_render_collapses() {
        let mut s = drawn(10, 1);
        s.set_cell(0, 4, 'a', Attribute::DEFAULT);
        s.set_cell(0, 4, 'b', Attribute::DEFAULT);
        assert_eq!(render(&mut s, None), "\x1b[1;5Hb");
    }

    #[test]
    fn same_attribute_cells_form_one_run() {
        let mut s = drawn(10, 1);
        let red = Attribute::new(Color::RED, Color::Default, 0);
        for (i, ch) in "abc".chars().enumerate() {
            s.set_cell(0, 2 + i as u16, ch, red);
        }
        assert_eq!(render(&mut s, None), "\x1b[1;3H\x1b[31;49mabc");
    }

    #[test]
    fn attribute_change_splits_run_without_move() {
        let mut s = drawn(10, 1);
        let red = Attribute::new(Color::RED, Color::Default, 0);
        s.set_cell(0, 0, 'a', Attribute::DEFAULT);
        s.set_cell(0, 1, 'b', red);
        assert_eq!(render(&mut s, None), "\x1b[1;1Ha\x1b[31;49mb");
    }

    #[test]
    fn gap_costs_a_cursor_move() {
        let mut s = drawn(10, 1);
        s.set_cell(0, 0, 'a', Attribute::DEFAULT);
        s.set_cell(0, 5, 'b', Attribute::DEFAULT);
        assert_eq!(render(&mut s, None), "\x1b[1;1Ha\x1b[1;6Hb");
    }

    #[test]
    fn cursor_placed_after_runs() {
        let mut s = drawn(10, 2);
        s.set_cell(0, 0, 'a', Attribute::DEFAULT);
        assert_eq!(
            render(&mut s, Some((1, 3))),
            "\x1b[1;1Ha\x1b[2;4H\x1b[?25h"
        );
        // Same cursor, nothing dirty: silence.
        assert_eq!(render(&mut s, Some((1, 3))), "");
        // Moving the cursor alone is a change.
        assert_eq!(render(&mut s, Some((1, 4))), "\x1b[2;5H");
        assert_eq!(render(&mut s, None), "\x1b[?25l");
    }

    #[test]
    fn wide_rune_takes_two_columns() {
        let mut s = drawn(6, 1);
        assert_eq!(s.set_cell(0, 1, '中', Attribute::DEFAULT), 2);
        assert!(s.get(0, 2).unwrap().is_padding());
        assert_eq!(render(&mut s, None), "\x1b[1;2H中");
    }

    #[test]
    fn wide_rune_at_last_column_becomes_placeholder() {
        let mut s = drawn(3, 1);
        assert_eq!(s.set_cell(0, 2, '中', Attribute::DEFAULT), 1);
        assert_eq!(s.get(0, 2).unwrap().rune, '?');
    }

    #[test]
    fn overwriting_half_of_wide_rune_clears_the_other_half() {
        let mut s = drawn(6, 1);
        s.set_cell(0, 1, '中', Attribute::DEFAULT);
        render(&mut s, None);
        s.set_cell(0, 2, 'x', Attribute::DEFAULT);
        assert_eq!(s.get(0, 1).unwrap().rune, ' ');
        assert_eq!(render(&mut s, None), "\x1b[1;2H x");
    }

    #[test]
    fn combining_mark_uses_placeholder() {
        let mut s = drawn(4, 1);
        s.set_cell(0, 0, '\u{0301}', Attribute::DEFAULT);
        assert_eq!(s.get(0, 0).unwrap().rune, '?');
    }

    #[test]
    fn non_bmp_follows_capability() {
        let mut caps = Capabilities::headless();
        caps.non_bmp = false;
        let mut s = ScreenBuffer::new(Size { cols: 4, rows: 1 }, caps, '?');
        s.set_cell(0, 0, '𝔸', Attribute::DEFAULT);
        assert_eq!(s.get(0, 0).unwrap().rune, '?');

        let mut s = screen(4, 1);
        s.set_cell(0, 0, '𝔸', Attribute::DEFAULT);
        assert_eq!(s.get(0, 0).unwrap().rune, '𝔸');
    }

    #[test]
    fn out_of_bounds_is_ignored() {
        let mut s = drawn(2, 2);
        assert_eq!(s.set_cell(2, 0, 'x', Attribute::DEFAULT), 0);
        assert_eq!(s.set_cell(0, 2, 'x', Attribute::DEFAULT), 0);
        assert!(!s.is_dirty());
    }

    #[test]
    fn invalidate_redraws_everything() {
        let mut s = drawn(2, 1);
        s.invalidate();
        assert_eq!(render(&mut s, None), "\x1b[1;1H\x1b[39;49m  \x1b[?25l");
    }

    #[test]
    fn resize_reallocates_blank() {
        let mut s = drawn(2, 1);
        s.set_cell(0, 0, 'x', Attribute::DEFAULT);
        s.resize(Size { cols: 3, rows: 2 });
        assert_eq!(s.size(), Size { cols: 3, rows: 2 });
        assert_eq!(s.get(0, 0), Some(&Cell::BLANK));
        assert!(s.is_dirty());
    }

    #[test]
    fn failed_write_forces_full_redraw() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut s = drawn(2, 1);
        s.set_cell(0, 0, 'x', Attribute::DEFAULT);
        assert!(s.render(&mut Broken, None).is_err());
        assert_eq!(render(&mut s, None), "\x1b[1;1H\x1b[39;49mx \x1b[?25l");
    }

    #[test]
    fn wide_placeholder_is_rejected() {
        let s = ScreenBuffer::new(Size { cols: 1, rows: 1 }, Capabilities::headless(), '中');
        assert_eq!(s.placeholder(), '?');
    }

    #[test]
    fn fill_covers_grid() {
        let mut s = drawn(3, 2);
        s.fill('#', Attribute::DEFAULT);
        assert!((0..2).all(|r| (0..3).all(|c| s.get(r, c).unwrap().rune == '#')));
    }
}
