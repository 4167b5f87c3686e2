//! Replay a construction stack against concrete joint data.
use crate::point::{pla, plap, pllp, plpp, pxy, Coord};
use crate::{EStack, Error, Expr, JointType, Sym, VPoint};
use std::collections::BTreeMap;

/// A construction with its symbols bound to plain numbers.
enum Formula {
    Pla(usize, f64, f64, usize),
    Plap(usize, f64, f64, usize, usize),
    Pllp(usize, f64, f64, usize, bool, usize),
    Plpp(usize, f64, usize, usize, bool, usize),
    Pxy(usize, f64, f64, usize),
}

impl Formula {
    fn apply(&self, joints: &mut [Coord]) {
        match *self {
            Self::Pla(c1, d0, a0, t) => {
                joints[t] = pla(joints[c1], d0, a0);
            }
            Self::Plap(c1, d0, a0, c2, t) => {
                joints[t] = plap(joints[c1], d0, a0, joints[c2]);
            }
            Self::Pllp(c1, d0, d1, c2, inv, t) => {
                joints[t] = pllp(joints[c1], d0, d1, joints[c2], inv);
            }
            Self::Plpp(c1, d0, c2, c3, inv, t) => {
                joints[t] = plpp(joints[c1], d0, joints[c2], joints[c3], inv);
            }
            Self::Pxy(c1, dx, dy, t) => {
                joints[t] = pxy(joints[c1], dx, dy);
            }
        }
    }
}

/// Geometry constraint solver for a compiled construction stack.
///
/// Binds the symbols of an [`EStack`] to numbers taken from the mechanism's
/// design geometry, then replays the stack for commanded input angles. This
/// is the cheap repeated-evaluation path; topologies the compiler cannot
/// reach belong to [`SolverSystem`](crate::SolverSystem).
pub struct Mechanism {
    joints: Vec<Coord>,
    seeds: Vec<Coord>,
    n_points: usize,
    formulas: Vec<Formula>,
    drivers: Vec<Option<usize>>,
    base_angles: Vec<f64>,
}

impl Mechanism {
    /// Bind `stack` to the design geometry of `vpoints`.
    ///
    /// `inputs` must be the `(driver, driven)` pairs the stack was compiled
    /// with; their order defines the order of the angles fed to
    /// [`apply_angles`](Self::apply_angles).
    pub fn new(
        vpoints: &[VPoint],
        stack: &EStack,
        inputs: &[(usize, usize)],
    ) -> Result<Self, Error> {
        let mut seeds = vpoints
            .iter()
            .map(|vp| match vp.ty() {
                JointType::R => vp.c()[0],
                _ => vp.c()[1],
            })
            .collect::<Vec<_>>();
        let n_points = seeds.len();
        let mut synthetic = BTreeMap::<usize, usize>::new();
        let mut slot = |sym: Sym, seeds: &mut Vec<Coord>| -> Result<usize, Error> {
            match sym {
                Sym::P(n) if n < n_points => Ok(n),
                Sym::S(n) if n < n_points => Ok(*synthetic.entry(n).or_insert_with(|| {
                    let theta = vpoints[n].angle().to_radians();
                    let [x, y] = seeds[n];
                    seeds.push([x + theta.cos(), y + theta.sin()]);
                    seeds.len() - 1
                })),
                _ => Err(Error::MalformedJoint("construction operand is not a point")),
            }
        };
        let mut formulas = Vec::with_capacity(stack.len());
        for e in stack.exprs() {
            let formula = match *e {
                Expr::Pla(c1, _, _, t) => {
                    let c1 = slot(c1, &mut seeds)?;
                    let t = slot(t, &mut seeds)?;
                    let d0 = dist(vpoints, &seeds, c1, t);
                    let a0 = angle_of(&seeds, c1, t);
                    Formula::Pla(c1, d0, a0, t)
                }
                Expr::Plap(c1, _, _, c2, t) => {
                    let c1 = slot(c1, &mut seeds)?;
                    let c2 = slot(c2, &mut seeds)?;
                    let t = slot(t, &mut seeds)?;
                    let d0 = dist(vpoints, &seeds, c1, t);
                    let a0 = angle_of(&seeds, c1, t) - angle_of(&seeds, c1, c2);
                    Formula::Plap(c1, d0, a0, c2, t)
                }
                Expr::Pllp(c1, _, _, c2, t) => {
                    let c1 = slot(c1, &mut seeds)?;
                    let c2 = slot(c2, &mut seeds)?;
                    let t = slot(t, &mut seeds)?;
                    let d0 = dist(vpoints, &seeds, c1, t);
                    let d1 = dist(vpoints, &seeds, c2, t);
                    Formula::Pllp(c1, d0, d1, c2, false, t)
                }
                Expr::Plpp(c1, _, c2, c3, t, op) => {
                    let c1 = slot(c1, &mut seeds)?;
                    let c2 = slot(c2, &mut seeds)?;
                    let c3 = slot(c3, &mut seeds)?;
                    let t = slot(t, &mut seeds)?;
                    let d0 = dist(vpoints, &seeds, c1, t);
                    Formula::Plpp(c1, d0, c2, c3, op, t)
                }
                Expr::Pxy(c1, _, _, t) => {
                    let c1 = slot(c1, &mut seeds)?;
                    let t = slot(t, &mut seeds)?;
                    let [x1, y1] = seeds[c1];
                    let [x2, y2] = seeds[t];
                    Formula::Pxy(c1, x2 - x1, y2 - y1, t)
                }
            };
            formulas.push(formula);
        }
        // Tie every input pair to its driver construction
        let mut drivers = Vec::with_capacity(inputs.len());
        let mut base_angles = Vec::with_capacity(inputs.len());
        for &(base, node) in inputs {
            let found = formulas.iter().position(|f| {
                matches!(*f, Formula::Pla(c1, _, _, t) if c1 == base && t == node)
            });
            base_angles.push(match found {
                Some(i) => match formulas[i] {
                    Formula::Pla(_, _, a0, _) => a0,
                    _ => unreachable!(),
                },
                None => angle_of(&seeds, base, node),
            });
            drivers.push(found);
        }
        Ok(Self {
            joints: seeds.clone(),
            seeds,
            n_points,
            formulas,
            drivers,
            base_angles,
        })
    }

    /// Replay the stack with the driver angles in degrees, one per input
    /// pair, and return the joint positions.
    ///
    /// Unreachable configurations come back as NaN coordinates.
    pub fn apply_angles(&mut self, angles_deg: &[f64]) -> Result<&[Coord], Error> {
        if angles_deg.len() != self.drivers.len() {
            return Err(Error::UnsupportedEdit);
        }
        for (&driver, &deg) in self.drivers.iter().zip(angles_deg) {
            if let Some(i) = driver {
                if let Formula::Pla(_, _, ref mut a0, _) = self.formulas[i] {
                    *a0 = deg.to_radians();
                }
            }
        }
        self.apply();
        Ok(self.joints())
    }

    fn apply(&mut self) {
        self.joints.copy_from_slice(&self.seeds);
        for f in &self.formulas {
            f.apply(&mut self.joints);
        }
    }

    /// The joint positions of the last replay.
    pub fn joints(&self) -> &[Coord] {
        &self.joints[..self.n_points]
    }

    /// Sweep the first driver through a full turn and collect the path of
    /// `node`. The other drivers hold their bound angles.
    pub fn curve(&mut self, node: usize, res: usize) -> Result<Vec<Coord>, Error> {
        let mut angles = self
            .base_angles
            .iter()
            .map(|a| a.to_degrees())
            .collect::<Vec<_>>();
        if angles.is_empty() || node >= self.n_points {
            return Err(Error::UnsupportedEdit);
        }
        let mut path = vec![[0.; 2]; res];
        for (i, c) in path.iter_mut().enumerate() {
            angles[0] = i as f64 / res as f64 * 360.;
            self.apply_angles(&angles)?;
            *c = self.joints[node];
        }
        Ok(path)
    }
}

fn dist(vpoints: &[VPoint], seeds: &[Coord], a: usize, b: usize) -> f64 {
    if a < vpoints.len() && b < vpoints.len() {
        vpoints[a].distance(&vpoints[b])
    } else {
        let [x1, y1] = seeds[a];
        let [x2, y2] = seeds[b];
        (x1 - x2).hypot(y1 - y2)
    }
}

fn angle_of(seeds: &[Coord], from: usize, to: usize) -> f64 {
    let [x1, y1] = seeds[from];
    let [x2, y2] = seeds[to];
    (y2 - y1).atan2(x2 - x1)
}
