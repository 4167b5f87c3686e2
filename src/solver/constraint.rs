//! Constraint records over pooled scalars, with residuals and analytic
//! gradients.

const EPSILON: f64 = 1e-12;

/// Index of one scalar cell. Pools are append-only, so a handle stays valid
/// for the whole lifetime of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Var {
    /// Free parameter, movable by the minimizer.
    Param(usize),
    /// Fixed scalar.
    Constant(usize),
    /// Externally supplied known value.
    Data(usize),
}

/// A point view: two scalar cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PointVar {
    pub(crate) x: Var,
    pub(crate) y: Var,
}

/// A line view between two points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LineVar {
    pub(crate) p1: PointVar,
    pub(crate) p2: PointVar,
}

/// Scalar pools backing the constraint system.
#[derive(Debug, Clone, Default)]
pub(crate) struct Pools {
    pub(crate) params: Vec<f64>,
    pub(crate) constants: Vec<f64>,
    pub(crate) data_values: Vec<f64>,
}

impl Pools {
    pub(crate) fn push_param(&mut self, v: f64) -> Var {
        self.params.push(v);
        Var::Param(self.params.len() - 1)
    }

    pub(crate) fn push_constant(&mut self, v: f64) -> Var {
        self.constants.push(v);
        Var::Constant(self.constants.len() - 1)
    }

    pub(crate) fn push_data(&mut self, v: f64) -> Var {
        self.data_values.push(v);
        Var::Data(self.data_values.len() - 1)
    }

    /// Read a cell, taking free parameters from `x` instead of the pool.
    fn value(&self, var: Var, x: &[f64]) -> f64 {
        match var {
            Var::Param(i) => x[i],
            Var::Constant(i) => self.constants[i],
            Var::Data(i) => self.data_values[i],
        }
    }

    fn point(&self, p: PointVar, x: &[f64]) -> [f64; 2] {
        [self.value(p.x, x), self.value(p.y, x)]
    }

    /// Read a cell against the pool's own parameter values.
    pub(crate) fn read(&self, var: Var) -> f64 {
        self.value(var, &self.params)
    }

    /// Read a point against the pool's own parameter values.
    pub(crate) fn read_point(&self, p: PointVar) -> [f64; 2] {
        [self.read(p.x), self.read(p.y)]
    }
}

/// One geometric constraint over pooled cells.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Constraint {
    /// Two points coincide.
    PointOnPoint(PointVar, PointVar),
    /// Two points keep the distance stored in the cell.
    P2PDistance(PointVar, PointVar, Var),
    /// A point lies on a line.
    PointOnLine(PointVar, LineVar),
    /// The angle from the first line to the second is the cell value.
    InternalAngle(LineVar, LineVar, Var),
    /// The angle of a line from horizontal is the cell value.
    LineInternalAngle(LineVar, Var),
}

impl Constraint {
    /// Squared-residual contribution at `x`.
    pub(crate) fn cost(&self, pools: &Pools, x: &[f64]) -> f64 {
        match *self {
            Self::PointOnPoint(p1, p2) => {
                let [x1, y1] = pools.point(p1, x);
                let [x2, y2] = pools.point(p2, x);
                (x1 - x2) * (x1 - x2) + (y1 - y2) * (y1 - y2)
            }
            Self::P2PDistance(p1, p2, d) => {
                // Squared form keeps the residual smooth at zero distance
                // and indifferent to the sign of the stored value
                let [x1, y1] = pools.point(p1, x);
                let [x2, y2] = pools.point(p2, x);
                let d = pools.value(d, x);
                let r = (x1 - x2) * (x1 - x2) + (y1 - y2) * (y1 - y2) - d * d;
                r * r
            }
            Self::PointOnLine(p, line) => {
                let r = cross_residual(pools, x, p, line);
                r * r
            }
            Self::InternalAngle(l1, l2, a) => {
                let Some(a1) = line_angle(pools, x, l1) else {
                    return 0.;
                };
                let Some(a2) = line_angle(pools, x, l2) else {
                    return 0.;
                };
                let r = wrap_angle(a2 - a1 - pools.value(a, x));
                r * r
            }
            Self::LineInternalAngle(line, a) => {
                let Some(cur) = line_angle(pools, x, line) else {
                    return 0.;
                };
                let r = wrap_angle(cur - pools.value(a, x));
                r * r
            }
        }
    }

    /// Accumulate the gradient of [`cost`](Self::cost) into `grad`.
    pub(crate) fn grad(&self, pools: &Pools, x: &[f64], grad: &mut [f64]) {
        match *self {
            Self::PointOnPoint(p1, p2) => {
                let [x1, y1] = pools.point(p1, x);
                let [x2, y2] = pools.point(p2, x);
                add(grad, p1.x, 2. * (x1 - x2));
                add(grad, p2.x, -2. * (x1 - x2));
                add(grad, p1.y, 2. * (y1 - y2));
                add(grad, p2.y, -2. * (y1 - y2));
            }
            Self::P2PDistance(p1, p2, d) => {
                let [x1, y1] = pools.point(p1, x);
                let [x2, y2] = pools.point(p2, x);
                let d = pools.value(d, x);
                let dx = x1 - x2;
                let dy = y1 - y2;
                let r = dx * dx + dy * dy - d * d;
                add(grad, p1.x, 4. * r * dx);
                add(grad, p2.x, -4. * r * dx);
                add(grad, p1.y, 4. * r * dy);
                add(grad, p2.y, -4. * r * dy);
            }
            Self::PointOnLine(p, line) => {
                // r = (x2-x1)(py-y1) - (y2-y1)(px-x1)
                let [px, py] = pools.point(p, x);
                let [x1, y1] = pools.point(line.p1, x);
                let [x2, y2] = pools.point(line.p2, x);
                let r = cross_residual(pools, x, p, line);
                add(grad, p.x, 2. * r * (y1 - y2));
                add(grad, p.y, 2. * r * (x2 - x1));
                add(grad, line.p1.x, 2. * r * (y2 - py));
                add(grad, line.p1.y, 2. * r * (px - x2));
                add(grad, line.p2.x, 2. * r * (py - y1));
                add(grad, line.p2.y, 2. * r * (x1 - px));
            }
            Self::InternalAngle(l1, l2, a) => {
                let (Some(a1), Some(a2)) =
                    (line_angle(pools, x, l1), line_angle(pools, x, l2))
                else {
                    return;
                };
                let r = wrap_angle(a2 - a1 - pools.value(a, x));
                line_angle_grad(pools, x, l2, 2. * r, grad);
                line_angle_grad(pools, x, l1, -2. * r, grad);
            }
            Self::LineInternalAngle(line, a) => {
                let Some(cur) = line_angle(pools, x, line) else {
                    return;
                };
                let r = wrap_angle(cur - pools.value(a, x));
                line_angle_grad(pools, x, line, 2. * r, grad);
            }
        }
    }
}

fn add(grad: &mut [f64], var: Var, v: f64) {
    if let Var::Param(i) = var {
        grad[i] += v;
    }
}

fn cross_residual(pools: &Pools, x: &[f64], p: PointVar, line: LineVar) -> f64 {
    let [px, py] = pools.point(p, x);
    let [x1, y1] = pools.point(line.p1, x);
    let [x2, y2] = pools.point(line.p2, x);
    (x2 - x1) * (py - y1) - (y2 - y1) * (px - x1)
}

fn line_angle(pools: &Pools, x: &[f64], line: LineVar) -> Option<f64> {
    let [x1, y1] = pools.point(line.p1, x);
    let [x2, y2] = pools.point(line.p2, x);
    let vx = x2 - x1;
    let vy = y2 - y1;
    (vx * vx + vy * vy >= EPSILON).then(|| vy.atan2(vx))
}

/// Accumulate `scale` times the partials of the line's angle.
fn line_angle_grad(pools: &Pools, x: &[f64], line: LineVar, scale: f64, grad: &mut [f64]) {
    let [x1, y1] = pools.point(line.p1, x);
    let [x2, y2] = pools.point(line.p2, x);
    let vx = x2 - x1;
    let vy = y2 - y1;
    let mag2 = vx * vx + vy * vy;
    if mag2 < EPSILON {
        return;
    }
    add(grad, line.p1.x, scale * vy / mag2);
    add(grad, line.p1.y, -scale * vx / mag2);
    add(grad, line.p2.x, -scale * vy / mag2);
    add(grad, line.p2.y, scale * vx / mag2);
}

/// Wrap an angle difference into `(-pi, pi]`.
fn wrap_angle(a: f64) -> f64 {
    a.sin().atan2(a.cos())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pools_of(params: &[f64]) -> Pools {
        Pools {
            params: params.to_vec(),
            constants: vec![],
            data_values: vec![],
        }
    }

    fn pvar(i: usize) -> PointVar {
        PointVar {
            x: Var::Param(2 * i),
            y: Var::Param(2 * i + 1),
        }
    }

    #[test]
    fn gradients_match_finite_differences() {
        let x = [0.3, -0.7, 2.1, 0.9, -1.2, 1.8];
        let pools = pools_of(&x);
        let line = LineVar {
            p1: pvar(1),
            p2: pvar(2),
        };
        let mut constants = pools.clone();
        constants.constants.push(0.8);
        let cons = [
            Constraint::PointOnPoint(pvar(0), pvar(1)),
            Constraint::P2PDistance(pvar(0), pvar(2), Var::Constant(0)),
            Constraint::PointOnLine(pvar(0), line),
            Constraint::LineInternalAngle(line, Var::Constant(0)),
            Constraint::InternalAngle(
                LineVar {
                    p1: pvar(0),
                    p2: pvar(1),
                },
                line,
                Var::Constant(0),
            ),
        ];
        let h = 1e-6;
        for c in cons {
            let mut grad = vec![0.; x.len()];
            c.grad(&constants, &x, &mut grad);
            for i in 0..x.len() {
                let mut hi = x;
                hi[i] += h;
                let mut lo = x;
                lo[i] -= h;
                let fd = (c.cost(&constants, &hi) - c.cost(&constants, &lo)) / (2. * h);
                approx::assert_abs_diff_eq!(grad[i], fd, epsilon = 1e-5);
            }
        }
    }
}
