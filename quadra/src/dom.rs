//! Retained visual elements and the host that displays them.
//!
//! Scenes never touch a real document. They describe elements as class plus inline style,
//! and a [`SceneHost`] owns attaching those descriptions to containers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use engine::canvas::Raster;
use engine::surface::SurfaceSize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

/// A styled element description. Identity survives detach and reattach.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualElement {
    pub id: ElementId,
    pub class: String,
    pub style: BTreeMap<String, String>,
    /// Inline SVG body, for elements drawn from a path.
    pub svg: Option<String>,
}

impl VisualElement {
    pub fn set(&mut self, property: &str, value: impl Into<String>) -> &mut Self {
        self.style.insert(property.to_string(), value.into());
        self
    }

    pub fn set_percent(&mut self, property: &str, value: f64) -> &mut Self {
        self.set(property, format!("{value}%"))
    }

    pub fn set_px(&mut self, property: &str, value: f64) -> &mut Self {
        self.set(property, format!("{value}px"))
    }

    pub fn set_seconds(&mut self, property: &str, value: f64) -> &mut Self {
        self.set(property, format!("{value}s"))
    }

    pub fn set_deg(&mut self, property: &str, value: f64) -> &mut Self {
        self.set(property, format!("{value}deg"))
    }

    pub fn add_class(&mut self, class: &str) -> &mut Self {
        self.class.push(' ');
        self.class.push_str(class);
        self
    }

    pub fn style(&self, property: &str) -> Option<&str> {
        self.style.get(property).map(String::as_str)
    }
}

/// Mints elements with fresh identities and counts them.
#[derive(Debug, Default)]
pub struct ElementFactory {
    next: u64,
}

impl ElementFactory {
    pub fn create(&mut self, class: &str) -> VisualElement {
        self.next += 1;
        VisualElement {
            id: ElementId(self.next),
            class: class.to_string(),
            style: BTreeMap::new(),
            svg: None,
        }
    }

    pub fn created(&self) -> u64 {
        self.next
    }
}

/// A generated raster shown as a CSS-style background of a layer container.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundImage {
    pub raster: Arc<Raster>,
    /// Displayed size; the raster may be wider than the viewport and tiled horizontally.
    pub size: SurfaceSize,
}

impl BackgroundImage {
    pub fn css_size(&self) -> String {
        format!("{}px {}px", self.size.width, self.size.height)
    }
}

/// The externally owned surface that scene elements and backgrounds are applied to.
pub trait SceneHost {
    /// Appends `elements` to `container`. Already-known ids are moved, not duplicated.
    fn attach(&mut self, container: &str, elements: &[VisualElement]);
    fn set_layer_background(&mut self, container: &str, image: &BackgroundImage);
    /// Detaches every element and background of `container`.
    fn clear_container(&mut self, container: &str);
}

/// In-memory host that remembers what is attached where.
#[derive(Debug, Default)]
pub struct RetainedHost {
    containers: HashMap<String, Vec<VisualElement>>,
    backgrounds: HashMap<String, BackgroundImage>,
    attach_calls: u64,
}

impl RetainedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn children(&self, container: &str) -> &[VisualElement] {
        self.containers
            .get(container)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn background(&self, container: &str) -> Option<&BackgroundImage> {
        self.backgrounds.get(container)
    }

    /// Backgrounds in container-name order.
    pub fn backgrounds(&self) -> Vec<(&str, &BackgroundImage)> {
        let mut all: Vec<_> = self
            .backgrounds
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        all.sort_by(|a, b| a.0.cmp(b.0));
        all
    }

    pub fn attached_count(&self) -> usize {
        self.containers.values().map(Vec::len).sum()
    }

    pub fn attach_calls(&self) -> u64 {
        self.attach_calls
    }
}

impl SceneHost for RetainedHost {
    fn attach(&mut self, container: &str, elements: &[VisualElement]) {
        self.attach_calls += 1;
        let children = self.containers.entry(container.to_string()).or_default();
        for el in elements {
            children.retain(|c| c.id != el.id);
            children.push(el.clone());
        }
    }

    fn set_layer_background(&mut self, container: &str, image: &BackgroundImage) {
        self.backgrounds.insert(container.to_string(), image.clone());
    }

    fn clear_container(&mut self, container: &str) {
        self.containers.remove(container);
        self.backgrounds.remove(container);
    }
}
