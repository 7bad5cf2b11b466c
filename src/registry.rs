use chrono::Utc;
use rand::Rng;

use crate::constants::{MOVE_ACCELERATION, SPAWN_MARGIN};
use crate::physics;
use crate::types::{Body, Bounds, ShapeKind, Snapshot, Vec2};

/// Every body in the arena, kept in creation order. Pair resolution order
/// and "latest bot" both follow that order.
#[derive(Clone, Debug, Default)]
pub struct SessionRegistry {
    bodies: Vec<Body>,
    next_sequence: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot::new(&self.bodies)
    }

    pub fn get(&self, id: &str) -> Option<&Body> {
        self.bodies.iter().find(|body| body.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Body> {
        self.bodies.iter_mut().find(|body| body.id == id)
    }

    /// Creates the body owned by a controller connection. Registering an id
    /// twice returns the existing body untouched.
    pub fn register_controller<R: Rng>(
        &mut self,
        id: &str,
        bounds: Bounds,
        rng: &mut R,
    ) -> &Body {
        if let Some(index) = self.index_of(id) {
            return &self.bodies[index];
        }
        let sequence = self.next_sequence();
        let position = spawn_position(bounds, rng);
        self.insert(Body::new(
            id.to_string(),
            sequence,
            format!("Player {sequence}"),
            position,
            false,
        ))
    }

    pub fn spawn_bot<R: Rng>(&mut self, bounds: Bounds, rng: &mut R) -> &Body {
        let id = loop {
            let candidate = format!(
                "bot-{}-{}",
                Utc::now().timestamp_millis(),
                rng.random_range(0..1000)
            );
            if !self.contains(&candidate) {
                break candidate;
            }
        };
        let sequence = self.next_sequence();
        let position = spawn_position(bounds, rng);
        self.insert(Body::new(
            id,
            sequence,
            format!("Bubble {sequence}"),
            position,
            true,
        ))
    }

    /// Removes the most recently created bot.
    pub fn despawn_latest_bot(&mut self) -> Option<String> {
        let index = self.bodies.iter().rposition(|body| body.is_bot)?;
        Some(self.bodies.remove(index).id)
    }

    /// Removes every bot, returning their ids in creation order.
    pub fn clear_bots(&mut self) -> Vec<String> {
        let mut removed = Vec::new();
        self.bodies.retain(|body| {
            if body.is_bot {
                removed.push(body.id.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn remove(&mut self, id: &str) -> Option<Body> {
        let index = self.index_of(id)?;
        Some(self.bodies.remove(index))
    }

    pub fn set_name(&mut self, id: &str, name: String) -> bool {
        let Some(body) = self.get_mut(id) else {
            return false;
        };
        body.name = name;
        true
    }

    pub fn set_shape(&mut self, id: &str, shape: ShapeKind) -> bool {
        let Some(body) = self.get_mut(id) else {
            return false;
        };
        body.shape = shape;
        true
    }

    /// Adds `direction * MOVE_ACCELERATION` to the body's velocity. The
    /// speed cap is applied by the next tick, not here.
    pub fn apply_move_input(&mut self, id: &str, direction: Vec2) -> bool {
        let Some(body) = self.get_mut(id) else {
            return false;
        };
        body.velocity += direction * MOVE_ACCELERATION;
        true
    }

    /// Teleports a body and zeroes its velocity.
    pub fn reposition(&mut self, id: &str, position: Vec2) -> bool {
        let Some(body) = self.get_mut(id) else {
            return false;
        };
        body.position = position;
        body.velocity = Vec2::ZERO;
        true
    }

    pub fn reclamp(&mut self, bounds: Bounds) {
        for body in &mut self.bodies {
            body.position = physics::clamp_position(body.position, bounds);
        }
    }

    pub fn step(&mut self, bounds: Bounds) {
        physics::step(&mut self.bodies, bounds);
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.bodies.iter().position(|body| body.id == id)
    }

    fn next_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    fn insert(&mut self, body: Body) -> &Body {
        self.bodies.push(body);
        let last = self.bodies.len() - 1;
        &self.bodies[last]
    }
}

/// Uniform point inside the arena inset by `SPAWN_MARGIN` on every side.
pub fn spawn_position<R: Rng>(bounds: Bounds, rng: &mut R) -> Vec2 {
    let x = rng.random::<f64>() * (bounds.width - SPAWN_MARGIN * 2.0) + SPAWN_MARGIN;
    let y = rng.random::<f64>() * (bounds.height - SPAWN_MARGIN * 2.0) + SPAWN_MARGIN;
    Vec2::new(x, y)
}
