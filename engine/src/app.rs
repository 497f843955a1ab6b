//! Native window bootstrap: a `winit` event loop presenting through `pixels`.

use std::error::Error;

use log::info;
use pixels::{PixelsBuilder, SurfaceTexture};
use winit::dpi::PhysicalSize;
use winit::event::Event;
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use crate::pixels_renderer::PixelsRenderer2d;
use crate::surface::SurfaceSize;

pub struct AppConfig {
    pub title: String,
    pub desired_size: SurfaceSize,
    /// Shrink the window to the primary monitor when it would not fit.
    pub clamp_to_monitor: bool,
    pub vsync: bool,
}

pub struct AppContext {
    pub window: Window,
    pub renderer: PixelsRenderer2d,
    /// Inner size actually granted by the window system.
    pub surface_size: SurfaceSize,
}

pub trait AppHandler {
    fn init(&mut self, _ctx: &mut AppContext) -> Result<(), Box<dyn Error>> {
        Ok(())
    }

    fn handle_event(
        &mut self,
        event: Event<()>,
        control_flow: &mut ControlFlow,
        ctx: &mut AppContext,
    );
}

/// Opens the window, builds the `pixels` surface and hands every event to `handler`.
///
/// Never returns on success: the event loop owns the thread until the window closes.
pub fn run_app<H: AppHandler + 'static>(config: AppConfig, mut handler: H) -> Result<(), Box<dyn Error>> {
    let event_loop = EventLoop::new();
    let mut size = config.desired_size;
    if config.clamp_to_monitor {
        if let Some(monitor) = event_loop.primary_monitor() {
            let bound = monitor.size();
            size = size.clamped_to(SurfaceSize::new(bound.width, bound.height));
        }
    }
    let window = WindowBuilder::new()
        .with_title(config.title)
        .with_inner_size(PhysicalSize::new(size.width, size.height))
        .build(&event_loop)?;

    let inner = window.inner_size();
    let surface_size = SurfaceSize::new(inner.width, inner.height);
    info!("window opened at {surface_size} (asked for {})", config.desired_size);

    let surface_texture = SurfaceTexture::new(surface_size.width, surface_size.height, &window);
    let pixels = PixelsBuilder::new(surface_size.width, surface_size.height, surface_texture)
        .enable_vsync(config.vsync)
        .build()?;
    let renderer = PixelsRenderer2d::new(pixels, surface_size)?;

    let mut ctx = AppContext {
        window,
        renderer,
        surface_size,
    };
    handler.init(&mut ctx)?;

    event_loop.run(move |event, _, control_flow| {
        handler.handle_event(event, control_flow, &mut ctx);
    });
}
