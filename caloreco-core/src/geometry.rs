//! Read-only geometry constant lookup.

use std::collections::HashMap;

/// Named numeric constants of the detector description.
///
/// Implementations are shared between event threads and must be safe for
/// concurrent reads. Any caching is the implementation's own business.
pub trait GeometryService: Send + Sync {
    /// Value of the named constant, if defined.
    fn constant(&self, name: &str) -> Option<f64>;
}

/// In-memory constant table.
#[derive(Debug, Clone, Default)]
pub struct ConstantTable {
    constants: HashMap<String, f64>,
}

impl ConstantTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a constant.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.constants.insert(name.into(), value);
        self
    }
}

impl GeometryService for ConstantTable {
    fn constant(&self, name: &str) -> Option<f64> {
        self.constants.get(name).copied()
    }
}

impl<S: GeometryService + ?Sized> GeometryService for &S {
    fn constant(&self, name: &str) -> Option<f64> {
        (**self).constant(name)
    }
}

impl<S: GeometryService + ?Sized> GeometryService for std::sync::Arc<S> {
    fn constant(&self, name: &str) -> Option<f64> {
        (**self).constant(name)
    }
}
