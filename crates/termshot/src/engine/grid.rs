//! Character grid for the default engine.
//!
//! Stores one [`Cell`] per screen position in row-major order, plus the
//! cursor and scroll region. Wide characters occupy their own cell followed
//! by a [`Cell::Continuation`].

/// A single cell in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    /// Nothing has been drawn here, or it was erased.
    #[default]
    Blank,
    /// A printed character.
    Char(char),
    /// The right half of a double-width character.
    Continuation,
}

/// Cursor position plus the deferred-wrap flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Cursor {
    row: usize,
    col: usize,
    /// Set after printing in the last column; the next printable wraps.
    pending_wrap: bool,
}

/// A 2D character grid with cursor and scroll region.
#[derive(Clone)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
    cursor: Cursor,
    saved_cursor: Option<Cursor>,
    /// Inclusive scroll region rows.
    scroll_top: usize,
    scroll_bottom: usize,
}

impl std::fmt::Debug for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grid")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl Grid {
    /// Create a blank grid. Dimensions must be non-zero.
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![Cell::Blank; rows * cols],
            cursor: Cursor::default(),
            saved_cursor: None,
            scroll_top: 0,
            scroll_bottom: rows.saturating_sub(1),
        }
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// The cell at a position, or `None` outside the grid.
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        (row < self.rows && col < self.cols).then(|| self.cells[row * self.cols + col])
    }

    /// Cursor position as (row, col).
    #[must_use]
    pub const fn cursor(&self) -> (usize, usize) {
        (self.cursor.row, self.cursor.col)
    }

    fn row_mut(&mut self, row: usize) -> &mut [Cell] {
        let start = row * self.cols;
        &mut self.cells[start..start + self.cols]
    }

    /// Drop the half of a wide character that a write at `col` would orphan.
    fn split_wide_at(&mut self, row: usize, col: usize) {
        let cols = self.cols;
        let line = self.row_mut(row);
        match line[col] {
            Cell::Continuation if col > 0 => line[col - 1] = Cell::Blank,
            Cell::Char(_) if col + 1 < cols && line[col + 1] == Cell::Continuation => {
                line[col + 1] = Cell::Blank;
            }
            _ => {}
        }
    }

    /// Print a character of the given display width at the cursor.
    ///
    /// Zero-width characters are dropped.
    pub fn put(&mut self, c: char, width: usize) {
        if width == 0 {
            return;
        }
        let width = width.min(self.cols);

        if self.cursor.pending_wrap {
            self.wrap();
        }
        if width > 1 && self.cursor.col + width > self.cols {
            self.wrap();
        }

        let (row, col) = (self.cursor.row, self.cursor.col);
        for offset in 0..width {
            self.split_wide_at(row, col + offset);
        }
        let line = self.row_mut(row);
        line[col] = Cell::Char(c);
        for cell in &mut line[col + 1..col + width] {
            *cell = Cell::Continuation;
        }

        if col + width >= self.cols {
            self.cursor.col = self.cols - 1;
            self.cursor.pending_wrap = true;
        } else {
            self.cursor.col = col + width;
        }
    }

    fn wrap(&mut self) {
        self.carriage_return();
        self.line_feed();
    }

    /// Move to column 0.
    pub const fn carriage_return(&mut self) {
        self.cursor.col = 0;
        self.cursor.pending_wrap = false;
    }

    /// Move down one row, scrolling at the bottom of the scroll region.
    pub fn line_feed(&mut self) {
        self.cursor.pending_wrap = false;
        if self.cursor.row == self.scroll_bottom {
            self.scroll_up(1);
        } else if self.cursor.row + 1 < self.rows {
            self.cursor.row += 1;
        }
    }

    /// Move up one row, scrolling at the top of the scroll region.
    pub fn reverse_index(&mut self) {
        self.cursor.pending_wrap = false;
        if self.cursor.row == self.scroll_top {
            self.scroll_down(1);
        } else if self.cursor.row > 0 {
            self.cursor.row -= 1;
        }
    }

    /// Move left one column.
    pub const fn backspace(&mut self) {
        self.cursor.pending_wrap = false;
        self.cursor.col = self.cursor.col.saturating_sub(1);
    }

    /// Advance to the next tab stop (every 8 columns).
    pub fn tab(&mut self) {
        self.cursor.pending_wrap = false;
        self.cursor.col = ((self.cursor.col / 8 + 1) * 8).min(self.cols - 1);
    }

    /// Move the cursor to an absolute position, clamped to the grid.
    pub fn goto(&mut self, row: usize, col: usize) {
        self.cursor = Cursor {
            row: row.min(self.rows - 1),
            col: col.min(self.cols - 1),
            pending_wrap: false,
        };
    }

    /// Move the cursor relative to its position, clamped to the grid.
    pub fn move_by(&mut self, rows: isize, cols: isize) {
        let row = self.cursor.row.saturating_add_signed(rows);
        let col = self.cursor.col.saturating_add_signed(cols);
        self.goto(row, col);
    }

    /// Erase in display: 0 below, 1 above, 2 or 3 everything.
    pub fn erase_display(&mut self, mode: u16) {
        let here = self.cursor.row * self.cols + self.cursor.col;
        let range = match mode {
            0 => here..self.cells.len(),
            1 => 0..here + 1,
            _ => 0..self.cells.len(),
        };
        self.cells[range].fill(Cell::Blank);
    }

    /// Erase in line: 0 right of cursor, 1 left of cursor, 2 whole line.
    pub fn erase_line(&mut self, mode: u16) {
        let col = self.cursor.col;
        let row = self.cursor.row;
        let line = self.row_mut(row);
        let range = match mode {
            0 => col..line.len(),
            1 => 0..col + 1,
            _ => 0..line.len(),
        };
        line[range].fill(Cell::Blank);
    }

    /// Blank `n` cells starting at the cursor without moving anything.
    pub fn erase_chars(&mut self, n: usize) {
        let (row, col) = (self.cursor.row, self.cursor.col);
        let end = col.saturating_add(n).min(self.cols);
        self.row_mut(row)[col..end].fill(Cell::Blank);
    }

    /// Insert `n` blanks at the cursor, shifting the rest of the line right.
    pub fn insert_blanks(&mut self, n: usize) {
        let (row, col) = (self.cursor.row, self.cursor.col);
        let n = n.min(self.cols - col);
        let line = self.row_mut(row);
        let len = line.len();
        line.copy_within(col..len - n, col + n);
        line[col..col + n].fill(Cell::Blank);
    }

    /// Delete `n` cells at the cursor, shifting the rest of the line left.
    pub fn delete_chars(&mut self, n: usize) {
        let (row, col) = (self.cursor.row, self.cursor.col);
        let n = n.min(self.cols - col);
        let line = self.row_mut(row);
        let len = line.len();
        line.copy_within(col + n..len, col);
        line[len - n..].fill(Cell::Blank);
    }

    /// Move rows `top..=bottom` up by `n`, blanking the vacated rows.
    fn shift_up(&mut self, top: usize, bottom: usize, n: usize) {
        let n = n.min(bottom + 1 - top);
        let region = &mut self.cells[top * self.cols..(bottom + 1) * self.cols];
        let len = region.len();
        region.copy_within(n * self.cols.., 0);
        region[len - n * self.cols..].fill(Cell::Blank);
    }

    /// Move rows `top..=bottom` down by `n`, blanking the vacated rows.
    fn shift_down(&mut self, top: usize, bottom: usize, n: usize) {
        let n = n.min(bottom + 1 - top);
        let region = &mut self.cells[top * self.cols..(bottom + 1) * self.cols];
        let len = region.len();
        region.copy_within(..len - n * self.cols, n * self.cols);
        region[..n * self.cols].fill(Cell::Blank);
    }

    /// Scroll the scroll region up by `n` rows.
    pub fn scroll_up(&mut self, n: usize) {
        self.shift_up(self.scroll_top, self.scroll_bottom, n);
    }

    /// Scroll the scroll region down by `n` rows.
    pub fn scroll_down(&mut self, n: usize) {
        self.shift_down(self.scroll_top, self.scroll_bottom, n);
    }

    /// Insert `n` blank lines at the cursor row, within the scroll region.
    pub fn insert_lines(&mut self, n: usize) {
        let row = self.cursor.row;
        if row < self.scroll_top || row > self.scroll_bottom {
            return;
        }
        self.shift_down(row, self.scroll_bottom, n);
        self.carriage_return();
    }

    /// Delete `n` lines at the cursor row, within the scroll region.
    pub fn delete_lines(&mut self, n: usize) {
        let row = self.cursor.row;
        if row < self.scroll_top || row > self.scroll_bottom {
            return;
        }
        self.shift_up(row, self.scroll_bottom, n);
        self.carriage_return();
    }

    /// Set the scroll region (0-based, inclusive) and home the cursor.
    pub fn set_scroll_region(&mut self, top: usize, bottom: usize) {
        let bottom = bottom.min(self.rows - 1);
        if top >= bottom {
            return;
        }
        self.scroll_top = top;
        self.scroll_bottom = bottom;
        self.goto(0, 0);
    }

    /// Save the cursor position.
    pub const fn save_cursor(&mut self) {
        self.saved_cursor = Some(self.cursor);
    }

    /// Restore the saved cursor position, clamped to the current size.
    pub fn restore_cursor(&mut self) {
        if let Some(saved) = self.saved_cursor {
            self.goto(saved.row, saved.col);
            self.cursor.pending_wrap = saved.pending_wrap;
        }
    }

    /// Change the geometry.
    ///
    /// Content keeps its top-left anchor, except that when the cursor would
    /// fall off the bottom the grid first drops enough rows from the top to
    /// keep the cursor's line visible.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        let drop = (self.cursor.row + 1).saturating_sub(rows);
        let mut cells = vec![Cell::Blank; rows * cols];
        for row in 0..rows.min(self.rows - drop) {
            let src = (row + drop) * self.cols;
            let keep = cols.min(self.cols);
            cells[row * cols..row * cols + keep].copy_from_slice(&self.cells[src..src + keep]);
        }

        self.rows = rows;
        self.cols = cols;
        self.cells = cells;
        self.scroll_top = 0;
        self.scroll_bottom = rows - 1;
        self.saved_cursor = None;
        self.goto(self.cursor.row - drop, self.cursor.col);
    }
}
