//! Theme activation: generate every artifact through the caches, then hand them to the
//! compositor and the scene host in one commit.

use engine::canvas::Raster;
use engine::compositor::Compositor;
use engine::gl::{GlApi, GlError};
use engine::surface::SurfaceSize;
use log::{error, info, warn};

use crate::dom::SceneHost;
use crate::scenes::rain::RainSimulation;
use crate::scenes::{self, GenerationContext, SceneCaches, SceneOutput, SceneReport};
use crate::theme::{ThemeDefinition, ThemeError, ThemeId};

const WINDOW_DROPS: &str = "window-drops";

pub struct ThemeManager<G: GlApi, H: SceneHost> {
    compositor: Compositor<G>,
    host: H,
    caches: SceneCaches,
    viewport: SurfaceSize,
    active: Option<ThemeId>,
    active_containers: Vec<&'static str>,
    rain: Option<RainSimulation>,
    last_report: Option<SceneReport>,
}

impl<G: GlApi, H: SceneHost> ThemeManager<G, H> {
    pub fn new(compositor: Compositor<G>, host: H, viewport: SurfaceSize) -> Self {
        Self {
            compositor,
            host,
            caches: SceneCaches::default(),
            viewport,
            active: None,
            active_containers: Vec::new(),
            rain: None,
            last_report: None,
        }
    }

    pub fn compositor(&self) -> &Compositor<G> {
        &self.compositor
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn caches(&self) -> &SceneCaches {
        &self.caches
    }

    pub fn viewport(&self) -> SurfaceSize {
        self.viewport
    }

    pub fn active(&self) -> Option<ThemeId> {
        self.active
    }

    pub fn last_report(&self) -> Option<SceneReport> {
        self.last_report
    }

    /// The rain overlay of the last animated frame, while the rainy window is active.
    pub fn rain_overlay(&self) -> Option<&Raster> {
        self.rain.as_ref().map(RainSimulation::frame)
    }

    /// Generates `theme` at the current viewport and replaces the displayed scene with it.
    ///
    /// Nothing is committed unless generation succeeds. A GPU failure while uploading leaves
    /// the compositor empty and the host untouched.
    pub fn activate(&mut self, theme: ThemeId) -> Result<SceneReport, ThemeError> {
        let def = ThemeDefinition::for_theme(theme)?;
        let mut ctx = GenerationContext {
            viewport: self.viewport,
            gpu_enabled: self.compositor.is_enabled(),
            caches: &mut self.caches,
        };
        let output = scenes::generate(&def, &mut ctx)?;
        let rain = match def.decoration(WINDOW_DROPS) {
            Some(group) => Some(RainSimulation::new(self.viewport, group.seed, group.count)?),
            None => None,
        };

        self.commit_compositor(&output)?;
        self.commit_host(&output);
        self.rain = rain;
        self.active = Some(theme);
        self.last_report = Some(output.report);

        let r = &output.report;
        info!(
            "activated {theme}: {} layers generated, {} cached, {} skipped; {} elements created, {} reattached",
            r.layers_generated, r.layers_cached, r.layers_skipped, r.elements_created, r.elements_reattached
        );
        Ok(output.report)
    }

    /// Like [`ThemeManager::activate`], but a failure is logged and the previous scene stays up.
    pub fn switch_theme(&mut self, theme: ThemeId) -> bool {
        match self.activate(theme) {
            Ok(_) => true,
            Err(err) => {
                error!("failed to activate {theme}: {err}");
                false
            }
        }
    }

    fn commit_compositor(&mut self, output: &SceneOutput) -> Result<(), ThemeError> {
        self.compositor.clear_scene();
        if let Err(err) = self.upload(output) {
            warn!("compositor upload failed, clearing GPU layers: {err}");
            self.compositor.clear_scene();
            return Err(err.into());
        }
        Ok(())
    }

    fn upload(&mut self, output: &SceneOutput) -> Result<(), GlError> {
        for layer in &output.layers {
            self.compositor.add_layer(&layer.raster, layer.z_index)?;
        }
        for config in &output.particles {
            self.compositor.add_particles(*config)?;
        }
        Ok(())
    }

    fn commit_host(&mut self, output: &SceneOutput) {
        for container in self.active_containers.drain(..) {
            self.host.clear_container(container);
        }
        for (container, image) in &output.backgrounds {
            self.host.set_layer_background(container, image);
        }
        for (container, elements) in &output.attachments {
            self.host.attach(container, elements);
        }
        self.active_containers = output.containers();
    }

    /// Renders one compositor frame and advances the rain overlay.
    pub fn animate_frame(&mut self) {
        self.compositor.render_frame();
        if let Some(rain) = self.rain.as_mut() {
            rain.step();
        }
    }

    /// Follows a viewport change. The active theme is regenerated under new cache keys, which
    /// also rebuilds the rain overlay at the new size; an empty viewport (a minimized window)
    /// is ignored.
    pub fn resize(&mut self, viewport: SurfaceSize) -> Result<Option<SceneReport>, ThemeError> {
        if viewport == self.viewport || viewport.is_empty() {
            return Ok(None);
        }
        self.viewport = viewport;
        self.compositor.resize(viewport);
        match self.active {
            Some(theme) => self.activate(theme).map(Some),
            None => Ok(None),
        }
    }
}
