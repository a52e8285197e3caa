/// Braille dot canvas. Each terminal cell holds a 2x4 dot grid, so a canvas of
/// `cols x rows` cells addresses `cols*2 x rows*4` dots.
#[derive(Clone, Debug)]
pub struct BrailleCanvas {
    cols: usize,
    rows: usize,
    cells: Vec<u8>,
}

/// Bit for each dot position, indexed `[y % 4][x % 2]`
const DOT_BITS: [[u8; 2]; 4] = [[0x01, 0x08], [0x02, 0x10], [0x04, 0x20], [0x40, 0x80]];

impl BrailleCanvas {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            cells: vec![0; cols * rows],
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Dot resolution
    pub fn dot_size(&self) -> (usize, usize) {
        (self.cols * 2, self.rows * 4)
    }

    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Set one dot; out-of-range (including negative) is ignored
    pub fn set(&mut self, x: i32, y: i32) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        let (cx, cy) = (x / 2, y / 4);
        if cx >= self.cols || cy >= self.rows {
            return;
        }
        self.cells[cy * self.cols + cx] |= DOT_BITS[y % 4][x % 2];
    }

    pub fn glyph(&self, col: usize, row: usize) -> Option<char> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        char::from_u32(0x2800 + self.cells[row * self.cols + col] as u32)
    }

    /// Non-blank cells as `(col, row, glyph)`
    pub fn lit(&self) -> impl Iterator<Item = (usize, usize, char)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, bits)| **bits != 0)
            .filter_map(move |(i, bits)| {
                char::from_u32(0x2800 + *bits as u32).map(|ch| (i % self.cols, i / self.cols, ch))
            })
    }

    #[cfg(test)]
    pub fn render_text(&self) -> String {
        (0..self.rows)
            .map(|row| {
                (0..self.cols)
                    .filter_map(|col| self.glyph(col, row))
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_layout() {
        let mut canvas = BrailleCanvas::new(2, 1);
        canvas.set(0, 0);
        canvas.set(1, 3);
        canvas.set(2, 1);
        assert_eq!(canvas.render_text(), "⢁⠂");
    }

    #[test]
    fn test_full_cell() {
        let mut canvas = BrailleCanvas::new(1, 1);
        for x in 0..2 {
            for y in 0..4 {
                canvas.set(x, y);
            }
        }
        assert_eq!(canvas.glyph(0, 0), Some('⣿'));
    }

    #[test]
    fn test_out_of_range_ignored() {
        let mut canvas = BrailleCanvas::new(1, 1);
        canvas.set(-1, 0);
        canvas.set(2, 0);
        canvas.set(0, 4);
        assert_eq!(canvas.lit().count(), 0);
        canvas.set(1, 1);
        assert_eq!(canvas.lit().collect::<Vec<_>>(), vec![(0, 0, '⠐')]);
    }
}
