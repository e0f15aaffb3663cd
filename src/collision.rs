//! Query hit structures.
//!
//! These hold the results of the physics queries (sphere casts and rays)
//! issued by the geometry probes.

use bevy::prelude::*;

/// Information about a ray or sphere-cast hit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollisionData {
    /// Distance travelled along the cast direction before the hit.
    pub distance: f32,
    /// Normal of the surface at the hit point.
    pub normal: Vec3,
    /// World position of the hit point.
    pub point: Vec3,
    /// Collider entity that was hit (if known).
    pub entity: Option<Entity>,
    /// Rigid body the hit collider is attached to (if any).
    pub body: Option<Entity>,
}

impl CollisionData {
    /// Create a hit result.
    pub fn new(distance: f32, normal: Vec3, point: Vec3, entity: Option<Entity>) -> Self {
        Self {
            distance,
            normal,
            point,
            entity,
            body: None,
        }
    }

    /// Attach the rigid body that owns the hit collider.
    pub fn with_body(mut self, body: Option<Entity>) -> Self {
        self.body = body;
        self
    }

    /// Whether two hits landed on the same collider.
    ///
    /// Hits without collider information never compare equal.
    pub fn same_collider(&self, other: &CollisionData) -> bool {
        matches!((self.entity, other.entity), (Some(a), Some(b)) if a == b)
    }
}
