//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use optimizer_bo::backend::{
    Backend, BackendOptimizer, BackendOptions, BackendValue, Dimension, Point,
};
use parking_lot::Mutex;

/// What a [`RecordingBackend`] saw.
#[derive(Debug, Default)]
pub struct Log {
    pub constructed: Vec<Vec<Dimension>>,
    pub options: Vec<BackendOptions>,
    pub told: Vec<(Vec<Point>, Vec<f64>)>,
}

/// Backend that records every call and always proposes the midpoint of the
/// box (the last category for categorical dimensions).
#[derive(Clone, Default)]
pub struct RecordingBackend {
    pub log: Arc<Mutex<Log>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn probe(&self) -> Result<(), String> {
        Ok(())
    }

    fn construct(
        &self,
        dimensions: Vec<Dimension>,
        options: &BackendOptions,
    ) -> optimizer_bo::Result<Box<dyn BackendOptimizer>> {
        let mut log = self.log.lock();
        log.constructed.push(dimensions.clone());
        log.options.push(options.clone());
        Ok(Box::new(Midpoint {
            dimensions,
            log: Arc::clone(&self.log),
        }))
    }
}

struct Midpoint {
    dimensions: Vec<Dimension>,
    log: Arc<Mutex<Log>>,
}

impl BackendOptimizer for Midpoint {
    fn tell(&mut self, points: Vec<Point>, objectives: Vec<f64>) -> optimizer_bo::Result<()> {
        self.log.lock().told.push((points, objectives));
        Ok(())
    }

    fn ask(&mut self) -> optimizer_bo::Result<Point> {
        Ok(self
            .dimensions
            .iter()
            .map(|dimension| match dimension {
                Dimension::Real { low, high, .. } => BackendValue::Real((low + high) / 2.0),
                Dimension::Integer { low, high } => BackendValue::Integer((low + high) / 2),
                Dimension::Categorical { categories } => {
                    BackendValue::Category(categories[categories.len() - 1].clone())
                }
            })
            .collect())
    }
}

/// Backend whose availability probe always fails.
pub struct MissingBackend;

impl Backend for MissingBackend {
    fn name(&self) -> &str {
        "missing"
    }

    fn probe(&self) -> Result<(), String> {
        Err("shared library not found".to_string())
    }

    fn construct(
        &self,
        _dimensions: Vec<Dimension>,
        _options: &BackendOptions,
    ) -> optimizer_bo::Result<Box<dyn BackendOptimizer>> {
        Err(optimizer_bo::Error::Backend("not loaded".to_string()))
    }
}
