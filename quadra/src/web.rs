//! Browser entry: a WebGL1 compositor, a DOM-backed scene host and the animation loop.
//!
//! Page contract: `#theme-canvas` (WebGL), `#game-canvas` (board, 2D), `#rain-overlay`
//! (2D, optional) and one element per scene container id.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use engine::canvas::{Raster, Rgba};
use engine::compositor::Compositor;
use engine::glow_backend::GlowApi;
use engine::surface::SurfaceSize;
use log::{error, info, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::{Clamped, JsCast};
use web_sys as web;

use crate::board::{
    BoardCell, BoardRenderer, BoardSnapshot, ChromeSink, ChromeStyle, FrameSignals, HIDDEN_ROWS,
};
use crate::dom::{BackgroundImage, ElementId, SceneHost, VisualElement};
use crate::manager::ThemeManager;
use crate::settings::RenderSettings;
use crate::theme::ThemeId;

const THEME_CANVAS: &str = "theme-canvas";
const BOARD_CANVAS: &str = "game-canvas";
const RAIN_CANVAS: &str = "rain-overlay";

// ── DOM host ────────────────────────────────────────────────────────

/// Applies element descriptions to real nodes. Nodes are kept by id and moved on reattach.
struct DomHost {
    document: web::Document,
    nodes: HashMap<ElementId, web::HtmlElement>,
    data_urls: HashMap<usize, String>,
}

impl DomHost {
    fn new(document: web::Document) -> Self {
        Self {
            document,
            nodes: HashMap::new(),
            data_urls: HashMap::new(),
        }
    }

    fn container(&self, id: &str) -> Option<web::HtmlElement> {
        let found = self
            .document
            .get_element_by_id(id)
            .and_then(|el| el.dyn_into::<web::HtmlElement>().ok());
        if found.is_none() {
            warn!("missing container #{id}");
        }
        found
    }

    fn node(&mut self, element: &VisualElement) -> Result<web::HtmlElement, JsValue> {
        if let Some(node) = self.nodes.get(&element.id) {
            return Ok(node.clone());
        }
        let node: web::HtmlElement = self.document.create_element("div")?.dyn_into()?;
        node.set_class_name(&element.class);
        let style = node.style();
        for (property, value) in &element.style {
            style.set_property(property, value)?;
        }
        if let Some(svg) = &element.svg {
            node.set_inner_html(svg);
        }
        self.nodes.insert(element.id, node.clone());
        Ok(node)
    }

    fn data_url(&mut self, raster: &Raster, key: usize) -> Result<String, JsValue> {
        if let Some(url) = self.data_urls.get(&key) {
            return Ok(url.clone());
        }
        let url = raster_data_url(&self.document, raster)?;
        self.data_urls.insert(key, url.clone());
        Ok(url)
    }
}

impl SceneHost for DomHost {
    fn attach(&mut self, container: &str, elements: &[VisualElement]) {
        let Some(parent) = self.container(container) else {
            return;
        };
        for element in elements {
            let attached = self
                .node(element)
                .and_then(|node| parent.append_child(&node).map(|_| ()));
            if let Err(err) = attached {
                error!("attaching to #{container} failed: {err:?}");
            }
        }
    }

    fn set_layer_background(&mut self, container: &str, image: &BackgroundImage) {
        let Some(target) = self.container(container) else {
            return;
        };
        let key = std::sync::Arc::as_ptr(&image.raster) as usize;
        let applied = self.data_url(&image.raster, key).and_then(|url| {
            let style = target.style();
            style.set_property("background-image", &format!("url({url})"))?;
            style.set_property("background-size", &image.css_size())?;
            style.set_property("background-repeat", "repeat-x")
        });
        if let Err(err) = applied {
            error!("background for #{container} failed: {err:?}");
        }
    }

    fn clear_container(&mut self, container: &str) {
        let Some(target) = self.container(container) else {
            return;
        };
        target.set_inner_html("");
        if let Err(err) = target.style().remove_property("background-image") {
            error!("clearing #{container} failed: {err:?}");
        }
    }
}

fn canvas_2d(
    canvas: &web::HtmlCanvasElement,
) -> Result<web::CanvasRenderingContext2d, JsValue> {
    canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
        .dyn_into::<web::CanvasRenderingContext2d>()
        .map_err(JsValue::from)
}

fn put_raster(ctx: &web::CanvasRenderingContext2d, raster: &Raster) -> Result<(), JsValue> {
    let image = web::ImageData::new_with_u8_clamped_array_and_sh(
        Clamped(raster.pixels()),
        raster.width(),
        raster.height(),
    )?;
    ctx.put_image_data(&image, 0.0, 0.0)
}

fn raster_data_url(document: &web::Document, raster: &Raster) -> Result<String, JsValue> {
    let canvas: web::HtmlCanvasElement = document.create_element("canvas")?.dyn_into()?;
    canvas.set_width(raster.width());
    canvas.set_height(raster.height());
    put_raster(&canvas_2d(&canvas)?, raster)?;
    canvas.to_data_url()
}

// ── Chrome ──────────────────────────────────────────────────────────

struct CanvasChrome {
    canvas: web::HtmlCanvasElement,
}

impl ChromeSink for CanvasChrome {
    fn apply_chrome(&mut self, style: &ChromeStyle) {
        let css = self.canvas.style();
        let written = css
            .set_property("border-color", style.border_color)
            .and_then(|()| css.set_property("box-shadow", style.box_shadow));
        if let Err(err) = written {
            error!("chrome write failed: {err:?}");
        }
    }
}

// ── App ─────────────────────────────────────────────────────────────

struct WebApp {
    manager: ThemeManager<GlowApi, DomHost>,
    board: BoardRenderer,
    snapshot: BoardSnapshot,
    board_ctx: web::CanvasRenderingContext2d,
    rain_ctx: Option<web::CanvasRenderingContext2d>,
    chrome: CanvasChrome,
    level: u32,
    board_dirty: bool,
}

impl WebApp {
    fn frame(&mut self) {
        self.manager.animate_frame();
        if let (Some(ctx), Some(rain)) = (&self.rain_ctx, self.manager.rain_overlay()) {
            if let Err(err) = put_raster(ctx, rain) {
                error!("rain overlay failed: {err:?}");
            }
        }
        let signals = FrameSignals {
            level: self.level,
            board_dimensions_changed: std::mem::take(&mut self.board_dirty),
        };
        match self.board.draw(signals, &self.snapshot, &mut self.chrome) {
            Ok(raster) => {
                if let Err(err) = put_raster(&self.board_ctx, raster) {
                    error!("board blit failed: {err:?}");
                }
            }
            Err(err) => error!("board draw failed: {err}"),
        }
    }
}

thread_local! {
    static APP: RefCell<Option<WebApp>> = const { RefCell::new(None) };
}

fn with_app<R>(f: impl FnOnce(&mut WebApp) -> R) -> Option<R> {
    APP.with(|app| app.borrow_mut().as_mut().map(f))
}

fn viewport(window: &web::Window) -> SurfaceSize {
    let dim = |v: Result<JsValue, JsValue>| v.ok().and_then(|v| v.as_f64()).unwrap_or(0.0) as u32;
    SurfaceSize::new(dim(window.inner_width()), dim(window.inner_height()))
}

fn canvas_by_id(document: &web::Document, id: &str) -> Result<web::HtmlCanvasElement, JsValue> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("missing #{id}")))?
        .dyn_into::<web::HtmlCanvasElement>()
        .map_err(JsValue::from)
}

fn webgl_api(document: &web::Document) -> Option<GlowApi> {
    let canvas = canvas_by_id(document, THEME_CANVAS).ok()?;
    let context = canvas
        .get_context("webgl")
        .ok()
        .flatten()?
        .dyn_into::<web::WebGlRenderingContext>()
        .ok()?;
    Some(GlowApi::new(glow::Context::from_webgl1_context(context)))
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();

    let window = web::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let size = viewport(&window);
    let settings = RenderSettings::default();

    let compositor = Compositor::new(webgl_api(&document), size);
    let board_canvas = canvas_by_id(&document, BOARD_CANVAS)?;
    let board_ctx = canvas_2d(&board_canvas)?;
    let rain_ctx = canvas_by_id(&document, RAIN_CANVAS)
        .and_then(|c| canvas_2d(&c))
        .ok();
    let available = SurfaceSize::new(board_canvas.width(), board_canvas.height());

    let b = settings.board;
    let mut app = WebApp {
        manager: ThemeManager::new(compositor, DomHost::new(document), size),
        board: BoardRenderer::new(b, available),
        snapshot: BoardSnapshot::empty(b.cols, b.rows, HIDDEN_ROWS),
        board_ctx,
        rain_ctx,
        chrome: CanvasChrome {
            canvas: board_canvas,
        },
        level: 1,
        board_dirty: true,
    };
    app.manager.switch_theme(settings.theme);
    info!("quadra themes ready at {size}");
    APP.with(|slot| *slot.borrow_mut() = Some(app));

    start_loop();
    Ok(())
}

fn start_loop() {
    let tick: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
    let tick_clone = tick.clone();
    *tick.borrow_mut() = Some(Closure::wrap(Box::new(move || {
        with_app(WebApp::frame);
        if let (Some(w), Some(cb)) = (web::window(), tick_clone.borrow().as_ref()) {
            _ = w.request_animation_frame(cb.as_ref().unchecked_ref());
        }
    }) as Box<dyn FnMut()>));
    if let (Some(w), Some(cb)) = (web::window(), tick.borrow().as_ref()) {
        _ = w.request_animation_frame(cb.as_ref().unchecked_ref());
    }
}

// ── Game-logic boundary ─────────────────────────────────────────────

#[wasm_bindgen]
pub fn set_level(level: u32) {
    with_app(|app| app.level = level);
}

#[wasm_bindgen]
pub fn reset_game() {
    with_app(|app| app.board.reset_game());
}

/// Places a settled cell; `rgb` is `0xRRGGBB`, and a `piece_id` of 0 empties the cell.
#[wasm_bindgen]
pub fn set_cell(col: u32, row: u32, piece_id: u32, rgb: u32) {
    with_app(|app| {
        let cell = (piece_id != 0).then(|| BoardCell {
            piece_id,
            color: Rgba::hex(rgb),
        });
        app.snapshot.set(col, row, cell);
    });
}

#[wasm_bindgen]
pub fn switch_theme(name: &str) -> bool {
    let Ok(theme) = name.parse::<ThemeId>() else {
        warn!("unknown theme {name}");
        return false;
    };
    with_app(|app| app.manager.switch_theme(theme)).unwrap_or(false)
}

/// Called by the page after a window resize.
#[wasm_bindgen]
pub fn resize() {
    let Some(window) = web::window() else {
        return;
    };
    let size = viewport(&window);
    with_app(|app| {
        if let Err(err) = app.manager.resize(size) {
            error!("theme regeneration after resize failed: {err}");
        }
        let canvas = &app.chrome.canvas;
        app.board
            .set_available(SurfaceSize::new(canvas.width(), canvas.height()));
        app.board_dirty = true;
    });
}
