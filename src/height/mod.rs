//! Height model transformers
//!
//! Converting between ellipsoidal height and a named vertical datum is
//! a pluggable capability: implementations register themselves for a
//! [`HeightModel`] in a process-wide table and are tried in
//! registration order until one succeeds. The ellipsoid model itself
//! needs no transformer; it is the analytic identity.

pub mod egm;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;

use crate::coordinate::types::LatPos;
use crate::errors::{CoordError, CoordResult};
use crate::geodesy::datum::HeightModel;
use crate::geodesy::ellipsoid::Ellipsoid;

pub use egm::{GeoidFile, GeoidLookup};

/// Converts a geodetic position's altitude between a height model and
/// the ellipsoid, in place
pub trait HeightModelTransformer: Send + Sync {
    /// Reinterpret the stored altitude, given in `model`, as height
    /// above the ellipsoid
    fn height_to_ellipsoid(
        &self,
        pos: &mut LatPos,
        model: HeightModel,
        ellipsoid: Ellipsoid,
    ) -> CoordResult<()>;

    /// The inverse: express an ellipsoidal altitude in `model`
    fn ellipsoid_to_height(
        &self,
        pos: &mut LatPos,
        model: HeightModel,
        ellipsoid: Ellipsoid,
    ) -> CoordResult<()>;
}

lazy_static! {
    // Ranked per-model transformer lists; first registered is tried first
    static ref REGISTRY: Mutex<HashMap<HeightModel, Vec<Arc<dyn HeightModelTransformer>>>> =
        Mutex::new(HashMap::new());
}

// The registry is process global; unit tests touching it serialize on
// this lock so they can reset it safely
#[cfg(test)]
pub(crate) static REGISTRY_TEST_LOCK: Mutex<()> = Mutex::new(());

/// Register a transformer for a height model
///
/// Registering the same instance twice is a no-op, and ranking follows
/// registration order.
pub fn register_transformer(model: HeightModel, transformer: Arc<dyn HeightModelTransformer>) {
    let mut registry = REGISTRY.lock().unwrap();
    let entries = registry.entry(model).or_default();
    if entries.iter().any(|t| Arc::ptr_eq(t, &transformer)) {
        return;
    }
    entries.push(transformer);
}

/// Remove a previously registered transformer; unknown instances are a
/// no-op
pub fn unregister_transformer(model: HeightModel, transformer: &Arc<dyn HeightModelTransformer>) {
    let mut registry = REGISTRY.lock().unwrap();
    if let Some(entries) = registry.get_mut(&model) {
        entries.retain(|t| !Arc::ptr_eq(t, transformer));
        if entries.is_empty() {
            registry.remove(&model);
        }
    }
}

/// Drop every registered transformer; tests reset the table with this
pub fn clear_transformers() {
    REGISTRY.lock().unwrap().clear();
}

/// Number of transformers registered for a model
pub fn transformer_count(model: HeightModel) -> usize {
    REGISTRY.lock().unwrap().get(&model).map(|v| v.len()).unwrap_or(0)
}

fn transformers_for(model: HeightModel) -> Vec<Arc<dyn HeightModelTransformer>> {
    // Clone the ranked list so grid I/O happens outside the table lock
    REGISTRY.lock().unwrap().get(&model).cloned().unwrap_or_default()
}

/// Convert a position's altitude from `model` to ellipsoidal height
///
/// The ellipsoid model is the identity; other models dispatch to the
/// registered transformers, first success wins. Fails when no
/// registered transformer can resolve the position.
pub fn height_to_ellipsoid(
    pos: &mut LatPos,
    model: HeightModel,
    ellipsoid: Ellipsoid,
) -> CoordResult<()> {
    if model == HeightModel::Ellipsoid {
        return Ok(());
    }

    let mut candidate;
    for transformer in transformers_for(model) {
        candidate = *pos;
        if transformer.height_to_ellipsoid(&mut candidate, model, ellipsoid).is_ok() {
            *pos = candidate;
            return Ok(());
        }
    }
    Err(CoordError::NoHeightTransformer(model.table_key().to_string()))
}

/// Convert a position's ellipsoidal altitude into `model`
pub fn ellipsoid_to_height(
    pos: &mut LatPos,
    model: HeightModel,
    ellipsoid: Ellipsoid,
) -> CoordResult<()> {
    if model == HeightModel::Ellipsoid {
        return Ok(());
    }

    let mut candidate;
    for transformer in transformers_for(model) {
        candidate = *pos;
        if transformer.ellipsoid_to_height(&mut candidate, model, ellipsoid).is_ok() {
            *pos = candidate;
            return Ok(());
        }
    }
    Err(CoordError::NoHeightTransformer(model.table_key().to_string()))
}

/// The analytic pass-through used for ellipsoid-only height models
pub struct EllipsoidIdentity;

impl HeightModelTransformer for EllipsoidIdentity {
    fn height_to_ellipsoid(
        &self,
        _pos: &mut LatPos,
        _model: HeightModel,
        _ellipsoid: Ellipsoid,
    ) -> CoordResult<()> {
        Ok(())
    }

    fn ellipsoid_to_height(
        &self,
        _pos: &mut LatPos,
        _model: HeightModel,
        _ellipsoid: Ellipsoid,
    ) -> CoordResult<()> {
        Ok(())
    }
}
