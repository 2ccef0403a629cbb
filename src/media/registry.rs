use std::sync::Arc;

use super::external::ExternalAcquirer;
use super::gallery::GalleryAcquirer;
use super::image::ImageAcquirer;
use super::mux::Muxer;
use super::text::SelfAcquirer;
use super::traits::MediaAcquirer;
use super::video::VideoAcquirer;
use crate::classify::MediaKind;

/// Dispatch table from [`MediaKind`] to its acquirer.
pub struct AcquirerRegistry {
    acquirers: Vec<Box<dyn MediaAcquirer>>,
}

impl AcquirerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            acquirers: Vec::new(),
        }
    }

    /// Registry with one acquirer per kind; video merges through `muxer`.
    #[must_use]
    pub fn with_defaults(muxer: Arc<dyn Muxer>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(GalleryAcquirer));
        registry.register(Box::new(VideoAcquirer::new(muxer)));
        registry.register(Box::new(ImageAcquirer));
        registry.register(Box::new(SelfAcquirer));
        registry.register(Box::new(ExternalAcquirer));
        registry
    }

    /// Register an acquirer, replacing any existing one for the same kind.
    pub fn register(&mut self, acquirer: Box<dyn MediaAcquirer>) {
        self.acquirers.retain(|a| a.kind() != acquirer.kind());
        self.acquirers.push(acquirer);
    }

    #[must_use]
    pub fn find(&self, kind: MediaKind) -> Option<&dyn MediaAcquirer> {
        self.acquirers
            .iter()
            .find(|a| a.kind() == kind)
            .map(AsRef::as_ref)
    }

    #[must_use]
    pub fn acquirers(&self) -> &[Box<dyn MediaAcquirer>] {
        &self.acquirers
    }
}

impl Default for AcquirerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
