use crate::constants::{
    BALL_RADIUS, BOT_DAMPING, BOUNCE_DAMPING, COLLISION_ELASTICITY, FRICTION, MAX_VELOCITY,
};
use crate::types::{Body, Bounds, Vec2};

/// Advances every body by one tick, then resolves overlapping pairs in
/// registry order. A body touched by several neighbours accumulates each
/// pair's correction in turn.
pub fn step(bodies: &mut [Body], bounds: Bounds) {
    for body in bodies.iter_mut() {
        integrate(body);
        bounce_off_walls(body, bounds);
    }

    let count = bodies.len();
    for i in 0..count {
        for j in (i + 1)..count {
            let (head, tail) = bodies.split_at_mut(j);
            let (first, second) = (&mut head[i], &mut tail[0]);
            if is_colliding(first, second) {
                resolve_collision(first, second);
            }
        }
    }
}

pub fn integrate(body: &mut Body) {
    body.velocity *= FRICTION;
    if body.is_bot {
        body.velocity *= BOT_DAMPING;
    }
    body.velocity = clamp_speed(body.velocity, MAX_VELOCITY);
    body.position += body.velocity;
}

pub fn clamp_speed(velocity: Vec2, max_speed: f64) -> Vec2 {
    let speed = velocity.length();
    if speed > max_speed {
        velocity * (max_speed / speed)
    } else {
        velocity
    }
}

/// Inelastic wall bounce. Velocity on a touched axis always points back
/// into the arena afterwards.
pub fn bounce_off_walls(body: &mut Body, bounds: Bounds) {
    if body.position.x - BALL_RADIUS < 0.0 {
        body.position.x = BALL_RADIUS;
        body.velocity.x = body.velocity.x.abs() * BOUNCE_DAMPING;
    }
    if body.position.x + BALL_RADIUS > bounds.width {
        body.position.x = bounds.width - BALL_RADIUS;
        body.velocity.x = -body.velocity.x.abs() * BOUNCE_DAMPING;
    }
    if body.position.y - BALL_RADIUS < 0.0 {
        body.position.y = BALL_RADIUS;
        body.velocity.y = body.velocity.y.abs() * BOUNCE_DAMPING;
    }
    if body.position.y + BALL_RADIUS > bounds.height {
        body.position.y = bounds.height - BALL_RADIUS;
        body.velocity.y = -body.velocity.y.abs() * BOUNCE_DAMPING;
    }
}

/// Position-only clamp used when the arena is resized.
pub fn clamp_position(position: Vec2, bounds: Bounds) -> Vec2 {
    Vec2::new(
        BALL_RADIUS.max((bounds.width - BALL_RADIUS).min(position.x)),
        BALL_RADIUS.max((bounds.height - BALL_RADIUS).min(position.y)),
    )
}

pub fn is_colliding(a: &Body, b: &Body) -> bool {
    a.position.distance(b.position) < BALL_RADIUS * 2.0
}

/// Equal-mass impulse resolution along the centre line.
pub fn resolve_collision(a: &mut Body, b: &mut Body) {
    let delta = b.position - a.position;
    let distance = delta.length();
    if distance == 0.0 {
        return;
    }
    let normal = delta * (1.0 / distance);

    let overlap = BALL_RADIUS * 2.0 - distance;
    if overlap > 0.0 {
        let separation = normal * (overlap * 0.5);
        a.position -= separation;
        b.position += separation;
    }

    let approach = (b.velocity - a.velocity).dot(normal);
    if approach > 0.0 {
        return;
    }

    let impulse = normal * (-(1.0 + COLLISION_ELASTICITY) * approach);
    a.velocity -= impulse * 0.5;
    b.velocity += impulse * 0.5;
}
