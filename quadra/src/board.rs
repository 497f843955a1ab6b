//! The per-frame board draw: one blit of the cached grid, the settled and falling blocks,
//! and canvas chrome written only when the level changes.

use engine::canvas::{Canvas2d, Path, Raster, Rgba};
use engine::surface::SurfaceSize;
use log::debug;

use crate::settings::BoardSettings;
use crate::theme::ThemeError;

pub const HIDDEN_ROWS: u32 = 4;

const GRID_LINE: Rgba = Rgba::new(255, 255, 255, 0.05);
const BLOCK_EDGE: Rgba = Rgba::new(0, 0, 0, 0.7);
const GHOST: Rgba = Rgba::new(255, 255, 255, 0.2);
const EDGE_WIDTH: f32 = 2.0;

// ── Chrome ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelTier {
    Calm,
    Warning,
    Danger,
}

impl LevelTier {
    pub fn from_level(level: u32) -> Self {
        if level >= 10 {
            LevelTier::Danger
        } else if level >= 5 {
            LevelTier::Warning
        } else {
            LevelTier::Calm
        }
    }

    pub fn chrome(self) -> ChromeStyle {
        match self {
            LevelTier::Danger => ChromeStyle {
                border_color: "#ef4444",
                box_shadow: "0 0 30px rgba(239, 68, 68, 0.6), 0 0 60px rgba(239, 68, 68, 0.4)",
            },
            LevelTier::Warning => ChromeStyle {
                border_color: "#fbbf24",
                box_shadow: "0 0 30px rgba(251, 191, 36, 0.6), 0 0 60px rgba(251, 191, 36, 0.4)",
            },
            LevelTier::Calm => ChromeStyle {
                border_color: "#8b5cf6",
                box_shadow: "0 0 30px rgba(139, 92, 246, 0.5), 0 0 60px rgba(139, 92, 246, 0.3)",
            },
        }
    }
}

/// Border and glow of the board canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromeStyle {
    pub border_color: &'static str,
    pub box_shadow: &'static str,
}

/// Whatever displays the board's border. Every call is one style write.
pub trait ChromeSink {
    fn apply_chrome(&mut self, style: &ChromeStyle);
}

/// Keeps every write, for tests and for the native window title.
#[derive(Debug, Default)]
pub struct RecordedChrome {
    pub writes: Vec<ChromeStyle>,
}

impl RecordedChrome {
    pub fn current(&self) -> Option<&ChromeStyle> {
        self.writes.last()
    }
}

impl ChromeSink for RecordedChrome {
    fn apply_chrome(&mut self, style: &ChromeStyle) {
        self.writes.push(*style);
    }
}

// ── Board state seen by the renderer ────────────────────────────────

/// Signals the game logic hands over every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSignals {
    pub level: u32,
    pub board_dimensions_changed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceKind {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

impl PieceKind {
    pub const ALL: [PieceKind; 7] = [
        PieceKind::I,
        PieceKind::O,
        PieceKind::T,
        PieceKind::S,
        PieceKind::Z,
        PieceKind::J,
        PieceKind::L,
    ];

    pub fn color(self) -> Rgba {
        match self {
            PieceKind::I => Rgba::hex(0x00FF00),
            PieceKind::O => Rgba::hex(0xFF9900),
            PieceKind::T => Rgba::hex(0x0000FF),
            PieceKind::S => Rgba::hex(0x00FFFF),
            PieceKind::Z => Rgba::hex(0xFF0000),
            PieceKind::J => Rgba::hex(0xFFFF00),
            PieceKind::L => Rgba::hex(0xCC00CC),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardCell {
    /// Cells of one settled piece share an id; outlines are drawn between different ids.
    pub piece_id: u32,
    pub color: Rgba,
}

/// The falling piece, in board rows including the hidden ones.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivePiece {
    pub x: i32,
    pub y: i32,
    pub shape: Vec<Vec<bool>>,
    pub color: Rgba,
    /// Row the piece would land on, computed by the game logic.
    pub ghost_y: i32,
}

impl ActivePiece {
    fn filled(&self, sx: i32, sy: i32) -> bool {
        if sx < 0 || sy < 0 {
            return false;
        }
        self.shape
            .get(sy as usize)
            .and_then(|row| row.get(sx as usize))
            .copied()
            .unwrap_or(false)
    }
}

/// Settled cells row-major over `rows + hidden_rows` rows, plus the falling piece.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardSnapshot {
    pub cols: u32,
    pub rows: u32,
    pub hidden_rows: u32,
    pub cells: Vec<Option<BoardCell>>,
    pub active: Option<ActivePiece>,
}

impl BoardSnapshot {
    pub fn empty(cols: u32, rows: u32, hidden_rows: u32) -> Self {
        Self {
            cols,
            rows,
            hidden_rows,
            cells: vec![None; (cols * (rows + hidden_rows)) as usize],
            active: None,
        }
    }

    pub fn total_rows(&self) -> u32 {
        self.rows + self.hidden_rows
    }

    pub fn cell(&self, col: i32, row: i32) -> Option<&BoardCell> {
        if col < 0 || row < 0 || col as u32 >= self.cols || row as u32 >= self.total_rows() {
            return None;
        }
        self.cells
            .get(row as usize * self.cols as usize + col as usize)
            .and_then(Option::as_ref)
    }

    pub fn set(&mut self, col: u32, row: u32, cell: Option<BoardCell>) {
        if col >= self.cols || row >= self.total_rows() {
            return;
        }
        let i = (row * self.cols + col) as usize;
        if let Some(slot) = self.cells.get_mut(i) {
            *slot = cell;
        }
    }

    fn inside(&self, col: i32, row: i32) -> bool {
        col >= 0 && row >= 0 && (col as u32) < self.cols && (row as u32) < self.total_rows()
    }
}

// ── Grid cache ──────────────────────────────────────────────────────

/// The pre-drawn grid lines, regenerated only when the board's pixel size changes.
#[derive(Debug, Default)]
pub struct GridRasterCache {
    canvas: Option<Canvas2d>,
    generations: u64,
}

impl GridRasterCache {
    pub fn canvas(&self) -> Option<&Canvas2d> {
        self.canvas.as_ref()
    }

    pub fn generations(&self) -> u64 {
        self.generations
    }

    fn regenerate(&mut self, cols: u32, rows: u32, cell: u32) -> Result<(), ThemeError> {
        let size = SurfaceSize::new(cols * cell, rows * cell);
        let mut canvas = Canvas2d::new(size)?;
        let (w, h) = (canvas.width(), canvas.height());
        canvas.set_stroke(GRID_LINE);
        canvas.set_line_width(1.0);
        for x in 0..=cols {
            let px = (x * cell) as f32;
            canvas.stroke_path(&Path::segment(px, 0.0, px, h));
        }
        for y in 0..=rows {
            let py = (y * cell) as f32;
            canvas.stroke_path(&Path::segment(0.0, py, w, py));
        }
        self.canvas = Some(canvas);
        self.generations += 1;
        debug!("grid raster regenerated at {size} ({cell}px cells)");
        Ok(())
    }
}

// ── Renderer ────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct BoardRenderer {
    settings: BoardSettings,
    available: SurfaceSize,
    cell_px: u32,
    grid: GridRasterCache,
    frame: Option<Canvas2d>,
    output: Option<Raster>,
    /// Level the chrome was last written for; 0 never matches a real level.
    last_rendered_level: u32,
    chrome_writes: u64,
}

impl BoardRenderer {
    pub fn new(settings: BoardSettings, available: SurfaceSize) -> Self {
        Self {
            settings,
            available,
            cell_px: 0,
            grid: GridRasterCache::default(),
            frame: None,
            output: None,
            last_rendered_level: 0,
            chrome_writes: 0,
        }
    }

    /// Records the space the board may use. Takes effect on the next frame whose signals
    /// report a dimension change.
    pub fn set_available(&mut self, available: SurfaceSize) {
        self.available = available;
    }

    pub fn cell_px(&self) -> u32 {
        self.cell_px
    }

    pub fn last_rendered_level(&self) -> u32 {
        self.last_rendered_level
    }

    pub fn chrome_writes(&self) -> u64 {
        self.chrome_writes
    }

    pub fn grid_generations(&self) -> u64 {
        self.grid.generations()
    }

    /// Forces the next frame to rewrite the chrome.
    pub fn reset_game(&mut self) {
        self.last_rendered_level = 0;
    }

    fn cell_size(&self) -> u32 {
        let cols = self.settings.cols.max(1);
        let rows = self.settings.rows.max(1);
        (self.available.width / cols)
            .min(self.available.height / rows)
            .max(self.settings.min_cell_px)
            .max(1)
    }

    fn resize_board(&mut self) -> Result<(), ThemeError> {
        let cell = self.cell_size();
        let (cols, rows) = (self.settings.cols, self.settings.rows);
        self.grid.regenerate(cols, rows, cell)?;
        let size = SurfaceSize::new(cols * cell, rows * cell);
        self.frame = Some(Canvas2d::new(size)?);
        self.output = Some(Raster::new(size)?);
        self.cell_px = cell;
        Ok(())
    }

    /// Renders one frame of the board.
    pub fn draw(
        &mut self,
        signals: FrameSignals,
        board: &BoardSnapshot,
        chrome: &mut dyn ChromeSink,
    ) -> Result<&Raster, ThemeError> {
        if signals.board_dimensions_changed || self.frame.is_none() {
            self.resize_board()?;
        }
        if signals.level != self.last_rendered_level {
            chrome.apply_chrome(&LevelTier::from_level(signals.level).chrome());
            self.last_rendered_level = signals.level;
            self.chrome_writes += 1;
        }

        let cell = self.cell_px as f32;
        let (Some(frame), Some(output)) = (self.frame.as_mut(), self.output.as_mut()) else {
            return Err(ThemeError::MissingField("board frame"));
        };
        frame.clear();
        if let Some(grid) = self.grid.canvas() {
            frame.draw_canvas(grid, 0, 0);
        }

        let mut blocks = Blocks {
            canvas: frame,
            cell,
            hidden: board.hidden_rows as i32,
        };
        for row in board.hidden_rows as i32..board.total_rows() as i32 {
            for col in 0..board.cols as i32 {
                if let Some(settled) = board.cell(col, row) {
                    blocks.settled(board, col, row, settled);
                }
            }
        }
        if let Some(piece) = &board.active {
            blocks.active(piece);
        }
        frame.read_into(output);
        Ok(output)
    }
}

struct Blocks<'a> {
    canvas: &'a mut Canvas2d,
    cell: f32,
    hidden: i32,
}

impl Blocks<'_> {
    fn fill(&mut self, col: i32, row: i32, color: Rgba) {
        let c = self.cell;
        let y = (row - self.hidden) as f32;
        self.canvas.set_fill(color);
        self.canvas.fill_rect(col as f32 * c, y * c, c, c);
    }

    /// Strokes the requested edges of a block as `[top, bottom, left, right]`.
    fn edges(&mut self, col: i32, row: i32, edges: [bool; 4]) {
        let c = self.cell;
        let (x0, y0) = (col as f32 * c, (row - self.hidden) as f32 * c);
        let (x1, y1) = (x0 + c, y0 + c);
        let lines = [
            (x0, y0, x1, y0),
            (x0, y1, x1, y1),
            (x0, y0, x0, y1),
            (x1, y0, x1, y1),
        ];
        self.canvas.set_stroke(BLOCK_EDGE);
        self.canvas.set_line_width(EDGE_WIDTH);
        for ((ax, ay, bx, by), draw) in lines.into_iter().zip(edges) {
            if draw {
                self.canvas.stroke_path(&Path::segment(ax, ay, bx, by));
            }
        }
    }

    fn settled(&mut self, board: &BoardSnapshot, col: i32, row: i32, cell: &BoardCell) {
        self.fill(col, row, cell.color);
        let differs = |c: i32, r: i32| {
            !board.inside(c, r)
                || board
                    .cell(c, r)
                    .is_none_or(|other| other.piece_id != cell.piece_id)
        };
        self.edges(
            col,
            row,
            [
                differs(col, row - 1),
                differs(col, row + 1),
                differs(col - 1, row),
                differs(col + 1, row),
            ],
        );
    }

    fn active(&mut self, piece: &ActivePiece) {
        for (sy, line) in piece.shape.iter().enumerate() {
            for (sx, &filled) in line.iter().enumerate() {
                if !filled {
                    continue;
                }
                let (sx, sy) = (sx as i32, sy as i32);
                let col = piece.x + sx;
                if piece.ghost_y + sy >= self.hidden {
                    self.fill(col, piece.ghost_y + sy, GHOST);
                }
                let row = piece.y + sy;
                if row >= self.hidden {
                    self.fill(col, row, piece.color);
                    self.edges(
                        col,
                        row,
                        [
                            !piece.filled(sx, sy - 1),
                            !piece.filled(sx, sy + 1),
                            !piece.filled(sx - 1, sy),
                            !piece.filled(sx + 1, sy),
                        ],
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> BoardRenderer {
        BoardRenderer::new(BoardSettings::default(), SurfaceSize::new(200, 400))
    }

    fn signals(level: u32) -> FrameSignals {
        FrameSignals {
            level,
            board_dimensions_changed: false,
        }
    }

    #[test]
    fn tiers_follow_thresholds() {
        assert_eq!(LevelTier::from_level(1), LevelTier::Calm);
        assert_eq!(LevelTier::from_level(4), LevelTier::Calm);
        assert_eq!(LevelTier::from_level(5), LevelTier::Warning);
        assert_eq!(LevelTier::from_level(9), LevelTier::Warning);
        assert_eq!(LevelTier::from_level(10), LevelTier::Danger);
        assert_eq!(LevelTier::from_level(42), LevelTier::Danger);
    }

    #[test]
    fn cell_size_fits_the_available_space() {
        let mut r = renderer();
        let board = BoardSnapshot::empty(10, 20, HIDDEN_ROWS);
        let frame = r.draw(signals(1), &board, &mut RecordedChrome::default()).expect("draw");
        assert_eq!(frame.size(), SurfaceSize::new(200, 400));
        assert_eq!(r.cell_px(), 20);

        r.set_available(SurfaceSize::new(30, 30));
        let resized = FrameSignals {
            level: 1,
            board_dimensions_changed: true,
        };
        r.draw(resized, &board, &mut RecordedChrome::default()).expect("draw");
        assert_eq!(r.cell_px(), BoardSettings::default().min_cell_px);
    }

    #[test]
    fn settled_outline_skips_edges_inside_a_piece() {
        let mut r = renderer();
        let mut board = BoardSnapshot::empty(10, 20, HIDDEN_ROWS);
        let red = Rgba::hex(0xFF0000);
        let row = HIDDEN_ROWS + 19;
        board.set(0, row, Some(BoardCell { piece_id: 1, color: red }));
        board.set(1, row, Some(BoardCell { piece_id: 1, color: red }));
        board.set(2, row, Some(BoardCell { piece_id: 2, color: red }));
        let frame = r.draw(signals(1), &board, &mut RecordedChrome::default()).expect("draw");

        let y = 19 * 20 + 10;
        let shared = frame.pixel(20, y).expect("pixel");
        assert_eq!(shared, [255, 0, 0, 255], "no outline between cells of one piece");
        let boundary = frame.pixel(40, y).expect("pixel");
        assert!(boundary[0] < 120, "outline between different pieces: {boundary:?}");
    }

    #[test]
    fn ghost_has_no_outline_and_hidden_rows_are_not_drawn() {
        let mut r = renderer();
        let mut board = BoardSnapshot::empty(10, 20, HIDDEN_ROWS);
        board.active = Some(ActivePiece {
            x: 4,
            y: 0,
            shape: vec![vec![true]],
            color: PieceKind::T.color(),
            ghost_y: (HIDDEN_ROWS + 19) as i32,
        });
        let frame = r.draw(signals(1), &board, &mut RecordedChrome::default()).expect("draw");
        assert_eq!(frame.pixel(90, 5).map(|p| p[2]), Some(0), "piece is still hidden");
        let ghost = frame.pixel(81, 19 * 20 + 1).expect("pixel");
        assert_eq!(ghost[3], 51);
    }
}
