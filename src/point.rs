//! Closed-form constructions backing the triangulation stack.
//!
//! Each primitive locates one point from already-known pivots and scalar
//! parameters. An unreachable construction (circles that never meet, a
//! degenerate line) yields NaN coordinates instead of an error, and the NaN
//! rides through the rest of the stack.

/// A planar coordinate.
pub type Coord = [f64; 2];

const UNREACHABLE: Coord = [f64::NAN; 2];

/// Locate a point one length and one absolute angle away from `c1`.
pub fn pla(c1: Coord, d0: f64, a0: f64) -> Coord {
    [c1[0] + d0 * a0.cos(), c1[1] + d0 * a0.sin()]
}

/// Locate a point a length away from `c1`, at an angle relative to the
/// bearing from `c1` toward `c2`.
pub fn plap(c1: Coord, d0: f64, a0: f64, c2: Coord) -> Coord {
    pla(c1, d0, (c2[1] - c1[1]).atan2(c2[0] - c1[0]) + a0)
}

/// Locate a point on both circles `(c1, d0)` and `(c2, d1)`.
///
/// The circles generally meet twice; `inv` selects the root on the far side
/// of the center line.
pub fn pllp(c1: Coord, d0: f64, d1: f64, c2: Coord, inv: bool) -> Coord {
    let dx = c2[0] - c1[0];
    let dy = c2[1] - c1[1];
    let d = dx.hypot(dy);
    if d > d0 + d1 || d < (d0 - d1).abs() || (d < 1e-20 && (d0 - d1).abs() < 1e-20) {
        return UNREACHABLE;
    }
    // Chord midpoint along the center line, half-chord across it
    let a = (d0 * d0 - d1 * d1 + d * d) / (2. * d);
    let h = (d0 * d0 - a * a).max(0.).sqrt();
    let mx = c1[0] + a * dx / d;
    let my = c1[1] + a * dy / d;
    if inv {
        [mx + h * dy / d, my - h * dx / d]
    } else {
        [mx - h * dy / d, my + h * dx / d]
    }
}

/// Locate a point on the circle `(c1, d0)` and on the line through `c2` and
/// `c3`, with `inv` choosing between the two crossings along the line
/// direction.
pub fn plpp(c1: Coord, d0: f64, c2: Coord, c3: Coord, inv: bool) -> Coord {
    let dx = c3[0] - c2[0];
    let dy = c3[1] - c2[1];
    let mag2 = dx * dx + dy * dy;
    if mag2 < 1e-20 {
        return UNREACHABLE;
    }
    // Foot of the perpendicular from the circle center
    let u = ((c1[0] - c2[0]) * dx + (c1[1] - c2[1]) * dy) / mag2;
    let fx = c2[0] + u * dx;
    let fy = c2[1] + u * dy;
    let d = (c1[0] - fx).hypot(c1[1] - fy);
    if d > d0 {
        return UNREACHABLE;
    }
    let t = (d0 * d0 - d * d).max(0.).sqrt() / mag2.sqrt();
    if inv {
        [fx - t * dx, fy - t * dy]
    } else {
        [fx + t * dx, fy + t * dy]
    }
}

/// Locate a point two axial offsets away from `c1`.
pub fn pxy(c1: Coord, dx: f64, dy: f64) -> Coord {
    [c1[0] + dx, c1[1] + dy]
}
