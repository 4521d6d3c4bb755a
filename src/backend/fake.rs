//! Recording backend used by unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use super::{Backend, BackendOptimizer, BackendOptions, BackendValue, Dimension, Point};
use crate::error::Result;

#[derive(Debug, Default)]
pub(crate) struct Calls {
    pub(crate) constructed: Vec<(Vec<Dimension>, BackendOptions)>,
    pub(crate) told: Vec<(Vec<Point>, Vec<f64>)>,
    pub(crate) asked: usize,
}

/// Records every call and answers `ask` from a script, falling back to the
/// lower corner of the box.
#[derive(Clone, Default)]
pub(crate) struct FakeBackend {
    calls: Arc<Mutex<Calls>>,
    answers: Arc<Mutex<VecDeque<Point>>>,
    unavailable: Option<String>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn answering(points: Vec<Point>) -> Self {
        Self {
            answers: Arc::new(Mutex::new(points.into())),
            ..Self::default()
        }
    }

    pub(crate) fn unavailable(reason: &str) -> Self {
        Self {
            unavailable: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> MutexGuard<'_, Calls> {
        self.calls.lock()
    }
}

impl Backend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    fn probe(&self) -> core::result::Result<(), String> {
        self.unavailable.clone().map_or(Ok(()), Err)
    }

    fn construct(
        &self,
        dimensions: Vec<Dimension>,
        options: &BackendOptions,
    ) -> Result<Box<dyn BackendOptimizer>> {
        self.calls
            .lock()
            .constructed
            .push((dimensions.clone(), options.clone()));
        Ok(Box::new(FakeOptimizer {
            dimensions,
            calls: Arc::clone(&self.calls),
            answers: Arc::clone(&self.answers),
        }))
    }
}

struct FakeOptimizer {
    dimensions: Vec<Dimension>,
    calls: Arc<Mutex<Calls>>,
    answers: Arc<Mutex<VecDeque<Point>>>,
}

impl BackendOptimizer for FakeOptimizer {
    fn tell(&mut self, points: Vec<Point>, objectives: Vec<f64>) -> Result<()> {
        self.calls.lock().told.push((points, objectives));
        Ok(())
    }

    fn ask(&mut self) -> Result<Point> {
        self.calls.lock().asked += 1;
        if let Some(point) = self.answers.lock().pop_front() {
            return Ok(point);
        }
        Ok(self
            .dimensions
            .iter()
            .map(|d| match d {
                Dimension::Real { low, .. } => BackendValue::Real(*low),
                Dimension::Integer { low, .. } => BackendValue::Integer(*low),
                Dimension::Categorical { categories } => {
                    BackendValue::Category(categories[0].clone())
                }
            })
            .collect())
    }
}
