use std::time::Duration;

pub const TICK_RATE: u32 = 60;
pub const TICK_INTERVAL: Duration = Duration::from_micros(1_000_000 / TICK_RATE as u64);

pub const BALL_RADIUS: f64 = 30.0;
pub const FRICTION: f64 = 0.95;
pub const BOT_DAMPING: f64 = 0.9;
pub const BOUNCE_DAMPING: f64 = 0.8;
pub const COLLISION_ELASTICITY: f64 = 0.7;
pub const MAX_VELOCITY: f64 = 15.0;

pub const MOVE_ACCELERATION: f64 = 1.2;
pub const SPAWN_MARGIN: f64 = 100.0;

pub const DEFAULT_WIDTH: f64 = 1920.0;
pub const DEFAULT_HEIGHT: f64 = 1080.0;

pub const BODY_COLOR: &str = "#ffffff";

pub const GENRE_COUNT: usize = 8;
pub const ZONE_COLUMNS: usize = 4;
pub const ZONE_ROWS: usize = 2;

pub const DEFAULT_GENRES: [&str; GENRE_COUNT] = [
    "TECHNO",
    "ELECTRO",
    "JAZZ",
    "HIP HOP",
    "CLASSICAL",
    "HOUSE",
    "AMBIENT",
    "DRUM & BASS",
];

pub fn default_genres() -> Vec<String> {
    DEFAULT_GENRES.iter().map(|genre| genre.to_string()).collect()
}
