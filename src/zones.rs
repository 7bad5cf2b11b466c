use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::constants::{GENRE_COUNT, ZONE_COLUMNS, ZONE_ROWS};
use crate::types::{Body, Bounds};

/// Index of the genre zone containing `(x, y)`. Zones form a 4x2 grid
/// numbered row-major from the top-left.
pub fn zone_index(x: f64, y: f64, bounds: Bounds) -> Option<usize> {
    let section_width = bounds.width / ZONE_COLUMNS as f64;
    let section_height = bounds.height / ZONE_ROWS as f64;
    let col = (x / section_width).floor();
    let row = (y / section_height).floor();
    if !(col >= 0.0 && col < ZONE_COLUMNS as f64 && row >= 0.0 && row < ZONE_ROWS as f64) {
        return None;
    }
    Some(row as usize * ZONE_COLUMNS + col as usize)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ZoneOccupancy {
    pub counts: [usize; GENRE_COUNT],
    pub total: usize,
}

impl ZoneOccupancy {
    pub fn measure(bodies: &[Body], bounds: Bounds) -> Self {
        let mut occupancy = Self::default();
        for body in bodies {
            if let Some(index) = zone_index(body.position.x, body.position.y, bounds) {
                occupancy.counts[index] += 1;
                occupancy.total += 1;
            }
        }
        occupancy
    }

    pub fn percentages(&self) -> [f64; GENRE_COUNT] {
        let mut out = [0.0; GENRE_COUNT];
        if self.total == 0 {
            return out;
        }
        for (slot, count) in out.iter_mut().zip(self.counts) {
            *slot = count as f64 / self.total as f64 * 100.0;
        }
        out
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ZoneReport {
    #[serde(rename = "generatedAtIso")]
    pub generated_at_iso: String,
    pub bounds: Bounds,
    pub genres: Vec<String>,
    pub counts: [usize; GENRE_COUNT],
    pub percentages: [f64; GENRE_COUNT],
    pub total: usize,
}

impl ZoneReport {
    pub fn build(bodies: &[Body], bounds: Bounds, genres: &[String]) -> Self {
        let occupancy = ZoneOccupancy::measure(bodies, bounds);
        Self {
            generated_at_iso: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            bounds,
            genres: genres.to_vec(),
            counts: occupancy.counts,
            percentages: occupancy.percentages(),
            total: occupancy.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vec2;

    fn body_at(id: &str, x: f64, y: f64) -> Body {
        Body::new(id.to_string(), 1, id.to_string(), Vec2::new(x, y), false)
    }

    #[test]
    fn zone_grid_is_row_major_four_by_two() {
        let bounds = Bounds::new(1920.0, 1080.0);
        assert_eq!(zone_index(10.0, 10.0, bounds), Some(0));
        assert_eq!(zone_index(1910.0, 10.0, bounds), Some(3));
        assert_eq!(zone_index(10.0, 1000.0, bounds), Some(4));
        assert_eq!(zone_index(1000.0, 600.0, bounds), Some(6));
        assert_eq!(zone_index(1919.0, 1079.0, bounds), Some(7));
    }

    #[test]
    fn positions_outside_arena_have_no_zone() {
        let bounds = Bounds::new(1920.0, 1080.0);
        assert_eq!(zone_index(-1.0, 10.0, bounds), None);
        assert_eq!(zone_index(1920.0, 10.0, bounds), None);
        assert_eq!(zone_index(10.0, 1080.0, bounds), None);
    }

    #[test]
    fn occupancy_counts_and_percentages() {
        let bounds = Bounds::new(800.0, 400.0);
        let bodies = vec![
            body_at("a", 50.0, 50.0),
            body_at("b", 60.0, 60.0),
            body_at("c", 750.0, 350.0),
            body_at("d", 5000.0, 50.0),
        ];
        let occupancy = ZoneOccupancy::measure(&bodies, bounds);
        assert_eq!(occupancy.total, 3);
        assert_eq!(occupancy.counts[0], 2);
        assert_eq!(occupancy.counts[7], 1);

        let percentages = occupancy.percentages();
        assert!((percentages[0] - 200.0 / 3.0).abs() < 1e-9);
        assert!((percentages.iter().sum::<f64>() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_arena_reports_zero_percentages() {
        let occupancy = ZoneOccupancy::measure(&[], Bounds::default());
        assert_eq!(occupancy.percentages(), [0.0; GENRE_COUNT]);
    }
}
