//! Native showcase: the software-composited theme, the rain overlay and a demo board.
//!
//! Keys: `T` next theme, `R` reset, `Up`/`Down` shift the level, `Esc` quit.

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::error::Error;
    use std::time::{Duration, Instant};

    use engine::app::{AppConfig, AppContext, AppHandler, run_app};
    use engine::compositor::Compositor;
    use engine::graphics::Color;
    use engine::soft_gl::SoftGl;
    use engine::surface::SurfaceSize;
    use engine::ui::Rect;
    use log::{error, info};
    use winit::dpi::PhysicalSize;
    use winit::event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent};
    use winit::event_loop::ControlFlow;

    use quadra::board::{
        ActivePiece, BoardCell, BoardRenderer, BoardSnapshot, FrameSignals, HIDDEN_ROWS, PieceKind,
        RecordedChrome,
    };
    use quadra::dom::RetainedHost;
    use quadra::settings::{RenderSettings, SettingsStore};
    use quadra::{ThemeId, ThemeManager};

    const BACKDROP: Color = [8, 8, 18, 255];
    const LEVEL_STEP: Duration = Duration::from_secs(20);
    const DROP_STEP: Duration = Duration::from_millis(400);

    struct Showcase {
        manager: ThemeManager<SoftGl, RetainedHost>,
        theme: ThemeId,
        board: BoardRenderer,
        snapshot: BoardSnapshot,
        chrome: RecordedChrome,
        board_dirty: bool,
        started: Instant,
        level_offset: i64,
    }

    impl Showcase {
        fn new(settings: &RenderSettings, viewport: SurfaceSize) -> Self {
            let compositor = if settings.gpu.enabled {
                Compositor::new(Some(SoftGl::new()), viewport)
            } else {
                Compositor::disabled(viewport)
            };
            let b = settings.board;
            Self {
                manager: ThemeManager::new(compositor, RetainedHost::new(), viewport),
                theme: settings.theme,
                board: BoardRenderer::new(b, board_area(viewport)),
                snapshot: demo_board(b.cols, b.rows),
                chrome: RecordedChrome::default(),
                board_dirty: true,
                started: Instant::now(),
                level_offset: 0,
            }
        }

        fn level(&self) -> u32 {
            let climbed = (self.started.elapsed().as_secs() / LEVEL_STEP.as_secs()) as i64;
            (1 + climbed + self.level_offset).max(1) as u32
        }

        fn advance_demo_piece(&mut self) {
            let ticks = (self.started.elapsed().as_millis() / DROP_STEP.as_millis()) as i32;
            if let Some(piece) = self.snapshot.active.as_mut() {
                let span = (piece.ghost_y + 1).max(1);
                piece.y = ticks % span;
            }
        }

        fn on_key(&mut self, key: VirtualKeyCode, control_flow: &mut ControlFlow) {
            match key {
                VirtualKeyCode::T => {
                    let next = self.theme.next();
                    if self.manager.switch_theme(next) {
                        self.theme = next;
                    }
                }
                VirtualKeyCode::R => {
                    self.started = Instant::now();
                    self.level_offset = 0;
                    self.board.reset_game();
                }
                VirtualKeyCode::Up => self.level_offset += 1,
                VirtualKeyCode::Down => self.level_offset -= 1,
                VirtualKeyCode::Escape => *control_flow = ControlFlow::Exit,
                _ => {}
            }
        }

        fn redraw(&mut self, ctx: &mut AppContext) {
            self.manager.animate_frame();
            self.advance_demo_piece();
            let signals = FrameSignals {
                level: self.level(),
                board_dimensions_changed: std::mem::take(&mut self.board_dirty),
            };
            let board = match self.board.draw(signals, &self.snapshot, &mut self.chrome) {
                Ok(raster) => Some(raster),
                Err(err) => {
                    error!("board draw failed: {err}");
                    None
                }
            };
            let border = self
                .chrome
                .current()
                .and_then(|style| parse_hex(style.border_color));
            let manager = &self.manager;

            ctx.renderer.draw_frame(|gfx| {
                gfx.clear(BACKDROP);
                for (_, image) in manager.host().backgrounds() {
                    gfx.blit_raster(0, 0, &image.raster);
                }
                if let Some(frame) = manager.compositor().gl().and_then(SoftGl::frame) {
                    gfx.blit_raster(0, 0, frame);
                }
                if let Some(rain) = manager.rain_overlay() {
                    gfx.blit_raster(0, 0, rain);
                }
                if let Some(board) = board {
                    let size = gfx.size();
                    let rect = Rect::from_size(size.width, size.height)
                        .centered(board.width(), board.height());
                    gfx.blend_rect(rect, [0, 0, 0, 255], 160);
                    if let Some(color) = border {
                        let frame = Rect::new(
                            rect.x.saturating_sub(2),
                            rect.y.saturating_sub(2),
                            rect.w + 4,
                            rect.h + 4,
                        );
                        gfx.rect_outline(frame, color);
                    }
                    gfx.blit_raster(rect.x, rect.y, board);
                }
            });
            if let Err(err) = ctx.renderer.present() {
                error!("present failed: {err}");
            }
        }

        fn resize(&mut self, ctx: &mut AppContext, size: PhysicalSize<u32>) {
            let viewport = SurfaceSize::new(size.width, size.height);
            if viewport.is_empty() {
                return;
            }
            if let Err(err) = ctx.renderer.resize(viewport) {
                error!("surface resize failed: {err}");
            }
            ctx.surface_size = viewport;
            if let Err(err) = self.manager.resize(viewport) {
                error!("theme regeneration after resize failed: {err}");
            }
            self.board.set_available(board_area(viewport));
            self.board_dirty = true;
        }
    }

    impl AppHandler for Showcase {
        fn init(&mut self, ctx: &mut AppContext) -> Result<(), Box<dyn Error>> {
            // The window may have been clamped to the monitor.
            self.manager.resize(ctx.surface_size)?;
            self.board.set_available(board_area(ctx.surface_size));
            self.manager.activate(self.theme)?;
            Ok(())
        }

        fn handle_event(&mut self, event: Event<()>, control_flow: &mut ControlFlow, ctx: &mut AppContext) {
            *control_flow = ControlFlow::Poll;
            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,
                    WindowEvent::Resized(size) => self.resize(ctx, size),
                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        self.resize(ctx, *new_inner_size)
                    }
                    WindowEvent::KeyboardInput {
                        input:
                            KeyboardInput {
                                state: ElementState::Pressed,
                                virtual_keycode: Some(key),
                                ..
                            },
                        ..
                    } => self.on_key(key, control_flow),
                    _ => {}
                },
                Event::MainEventsCleared => ctx.window.request_redraw(),
                Event::RedrawRequested(_) => self.redraw(ctx),
                _ => {}
            }
        }
    }

    /// The board gets the central 80% of the window height.
    fn board_area(viewport: SurfaceSize) -> SurfaceSize {
        SurfaceSize::new(viewport.width, viewport.height * 4 / 5)
    }

    fn parse_hex(css: &str) -> Option<Color> {
        let hex = css.strip_prefix('#')?;
        let rgb = u32::from_str_radix(hex, 16).ok()?;
        Some([(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 255])
    }

    /// A settled pile along the bottom and one falling T piece.
    fn demo_board(cols: u32, rows: u32) -> BoardSnapshot {
        let mut board = BoardSnapshot::empty(cols, rows, HIDDEN_ROWS);
        let bottom = board.total_rows() - 1;
        for col in 0..cols {
            let kind = PieceKind::ALL[(col / 2) as usize % PieceKind::ALL.len()];
            let cell = BoardCell {
                piece_id: col / 2 + 1,
                color: kind.color(),
            };
            if col != cols / 2 {
                board.set(col, bottom, Some(cell));
            }
            if col % 3 != 0 {
                board.set(col, bottom - 1, Some(cell));
            }
        }
        board.active = Some(ActivePiece {
            x: cols as i32 / 2 - 1,
            y: 0,
            shape: vec![vec![true, true, true], vec![false, true, false]],
            color: PieceKind::T.color(),
            ghost_y: bottom as i32 - 3,
        });
        board
    }

    pub fn main() -> Result<(), Box<dyn Error>> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

        let store = SettingsStore::from_env();
        let settings = store.load().with_env_overrides();
        info!("settings from {}: theme {}", store.path().display(), settings.theme);

        let window = settings.window;
        let viewport = SurfaceSize::new(window.width, window.height);
        let config = AppConfig {
            title: "Quadra".to_string(),
            desired_size: viewport,
            clamp_to_monitor: true,
            vsync: true,
        };
        run_app(config, Showcase::new(&settings, viewport))
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    native::main()
}

#[cfg(target_arch = "wasm32")]
fn main() {}
