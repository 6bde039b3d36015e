//! Distance calculations between node positions.
//!
//! Positions come straight from the node-info table, so the result is in
//! whatever unit the site survey used (millimetres in the 2019 field tests).

use super::site::Position;

/// Squared Euclidean distance (dx² + dy² + dz²).
pub fn distance2(a: &Position, b: &Position) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let dz = a.z - b.z;
    dx * dx + dy * dy + dz * dz
}

/// Euclidean distance between two positions.
pub fn distance(a: &Position, b: &Position) -> f64 {
    distance2(a, b).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Position {
        Position { x, y, z }
    }

    #[test]
    fn geometry_distance_3d() {
        assert_eq!(distance(&p(0.0, 0.0, 0.0), &p(3.0, 4.0, 12.0)), 13.0);
        assert_eq!(distance2(&p(1.0, 1.0, 1.0), &p(2.0, 2.0, 2.0)), 3.0);
    }

    #[test]
    fn geometry_distance_is_symmetric_and_zero_on_self() {
        let a = p(-5.0, 2.5, 10.0);
        let b = p(7.0, -1.5, 0.0);
        assert_eq!(distance(&a, &b), distance(&b, &a));
        assert_eq!(distance(&a, &a), 0.0);
    }
}
