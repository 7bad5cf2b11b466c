use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::constants::{BALL_RADIUS, BODY_COLOR, DEFAULT_HEIGHT, DEFAULT_WIDTH};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn distance(self, other: Self) -> f64 {
        (other - self).length()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f64> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl std::ops::MulAssign<f64> for Vec2 {
    fn mul_assign(&mut self, rhs: f64) {
        self.x *= rhs;
        self.y *= rhs;
    }
}

/// Arena rectangle. The origin is the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Finite and wide enough on both axes for one body to sit between the
    /// walls.
    pub fn is_valid(self) -> bool {
        let min_side = BALL_RADIUS * 2.0;
        self.width.is_finite()
            && self.height.is_finite()
            && self.width >= min_side
            && self.height >= min_side
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

/// Cosmetic only; collision always treats bodies as circles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    #[default]
    Circle,
    Square,
    Triangle,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Body {
    pub id: String,
    #[serde(rename = "playerNumber")]
    pub sequence: u64,
    pub name: String,
    pub shape: ShapeKind,
    pub position: Vec2,
    pub velocity: Vec2,
    pub color: &'static str,
    #[serde(rename = "isBot")]
    pub is_bot: bool,
}

impl Body {
    pub fn new(id: String, sequence: u64, name: String, position: Vec2, is_bot: bool) -> Self {
        Self {
            id,
            sequence,
            name,
            shape: ShapeKind::Circle,
            position,
            velocity: Vec2::ZERO,
            color: BODY_COLOR,
            is_bot,
        }
    }
}

/// Whole-registry view keyed by body id, serialized in registry order.
#[derive(Clone, Copy, Debug)]
pub struct Snapshot<'a> {
    bodies: &'a [Body],
}

impl<'a> Snapshot<'a> {
    pub fn new(bodies: &'a [Body]) -> Self {
        Self { bodies }
    }
}

impl Serialize for Snapshot<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.bodies.len()))?;
        for body in self.bodies {
            map.serialize_entry(&body.id, body)?;
        }
        map.end()
    }
}
