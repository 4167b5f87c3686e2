//! Mechanism lowering and the user-facing solver.
use super::constraint::{Constraint, LineVar, PointVar, Pools};
use super::driver::{minimize, Precision};
use crate::{Error, JointType, VLink, VPoint};
use std::collections::BTreeMap;

/// Externally supplied known data for the builder.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataEntry {
    /// A known joint coordinate, keyed by joint index.
    Coord(usize, [f64; 2]),
    /// A known distance between an unordered pair of joints.
    Length(usize, usize, f64),
}

/// Canonical key of a known-data entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DataKey {
    /// Joint index.
    Point(usize),
    /// Unordered joint pair, stored sorted.
    Pair(usize, usize),
}

impl DataKey {
    /// Canonicalize an unordered pair.
    pub fn pair(a: usize, b: usize) -> Self {
        if a <= b {
            Self::Pair(a, b)
        } else {
            Self::Pair(b, a)
        }
    }
}

/// Solved coordinates of one joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SolvedPoint {
    /// A revolute joint position.
    R([f64; 2]),
    /// Slider slot anchor and pin positions.
    Slider([f64; 2], [f64; 2]),
}

impl SolvedPoint {
    /// The pin (visible) position of the joint.
    pub fn pos(&self) -> [f64; 2] {
        match *self {
            Self::R(c) | Self::Slider(_, c) => c,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Slider {
    base: PointVar,
    slot: PointVar,
}

#[derive(Debug)]
enum DataBinding {
    /// Index of the x cell; y lives right behind it.
    Coord(usize),
    /// Every distance cell bound to this pair.
    Length(Vec<usize>),
}

/// Translate a mechanism into a pooled constraint system and drive the
/// minimizer over it.
///
/// The pools are append-only while building and keep their layout afterward,
/// so every constraint handle stays valid for the lifetime of the system and
/// repeated [`solve`](Self::solve) calls re-use the whole build.
#[derive(Debug)]
pub struct SolverSystem {
    vpoints: Vec<VPoint>,
    pools: Pools,
    cons: Vec<Constraint>,
    points: Vec<PointVar>,
    sliders: BTreeMap<usize, Slider>,
    /// Input pair to the constants index of its radian cell, in build order.
    inputs: Vec<((usize, usize), usize)>,
    data: BTreeMap<DataKey, DataBinding>,
}

impl SolverSystem {
    /// Build the constraint system of `vpoints`.
    ///
    /// `inputs` maps ordered `(driver, driven)` pairs to driver angles in
    /// degrees; `data` pins known coordinates and link lengths.
    pub fn new(
        vpoints: &[VPoint],
        inputs: &[((usize, usize), f64)],
        data: &[DataEntry],
    ) -> Result<Self, Error> {
        let mut sys = Self {
            vpoints: vpoints.to_vec(),
            pools: Pools::default(),
            cons: Vec::new(),
            points: Vec::new(),
            sliders: BTreeMap::new(),
            inputs: Vec::new(),
            data: BTreeMap::new(),
        };
        let n = sys.vpoints.len();
        // Canonicalize the known data up front
        let mut known_coords = BTreeMap::<usize, [f64; 2]>::new();
        let mut known_lengths = BTreeMap::<(usize, usize), f64>::new();
        for &entry in data {
            match entry {
                DataEntry::Coord(i, c) => {
                    if i >= n {
                        return Err(Error::MalformedJoint("data key out of range"));
                    }
                    known_coords.insert(i, c);
                }
                DataEntry::Length(a, b, d) => {
                    if a >= n || b >= n || a == b {
                        return Err(Error::MalformedJoint("data key out of range"));
                    }
                    if d < 0. {
                        return Err(Error::MalformedJoint("negative link length"));
                    }
                    known_lengths.insert(if a <= b { (a, b) } else { (b, a) }, d);
                }
            }
        }
        sys.allocate(&known_coords);
        let mut vlinks = BTreeMap::<String, Vec<usize>>::new();
        for (i, vp) in sys.vpoints.iter().enumerate() {
            for link in vp.links() {
                vlinks.entry(link.clone()).or_default().push(i);
            }
        }
        // Distance constraints per link: the first two joints anchor every
        // further joint on it
        for (name, members) in &vlinks {
            if name == VLink::FRAME || members.len() < 2 {
                continue;
            }
            let (a, b) = (members[0], members[1]);
            sys.link_length(a, b, name, &known_coords, &mut known_lengths);
            for &c in &members[2..] {
                sys.link_length(c, a, name, &known_coords, &mut known_lengths);
                sys.link_length(c, b, name, &known_coords, &mut known_lengths);
            }
        }
        let slider_keys = sys.sliders.keys().copied().collect::<Vec<_>>();
        for a in slider_keys {
            sys.slider_constraints(a, &vlinks);
        }
        for &((b, d), deg) in inputs {
            if b == d {
                return Err(Error::MalformedJoint("input pair drives itself"));
            }
            if b >= n || d >= n {
                return Err(Error::MalformedJoint("input joint out of range"));
            }
            if sys.inputs.iter().any(|&(key, _)| key == (b, d)) {
                return Err(Error::MalformedJoint("duplicate input pair"));
            }
            let idx = sys.pools.constants.len();
            let cell = sys.pools.push_constant(deg.to_radians());
            sys.inputs.push(((b, d), idx));
            let line = LineVar {
                p1: sys.points[b],
                p2: sys.points[d],
            };
            sys.cons.push(Constraint::LineInternalAngle(line, cell));
        }
        log::debug!(
            "built {} constraints over {} free parameters",
            sys.cons.len(),
            sys.pools.params.len(),
        );
        Ok(sys)
    }

    /// Scalar allocation, one joint at a time, in index order.
    fn allocate(&mut self, known_coords: &BTreeMap<usize, [f64; 2]>) {
        for i in 0..self.vpoints.len() {
            let vp = self.vpoints[i].clone();
            if vp.no_link() {
                // Free floating joints are rigid
                let [cx, cy] = vp.c()[0];
                let x = self.pools.push_constant(cx);
                let y = self.pools.push_constant(cy);
                self.points.push(PointVar { x, y });
                continue;
            }
            if let Some(&[cx, cy]) = known_coords.get(&i) {
                let idx = self.pools.data_values.len();
                let x = self.pools.push_data(cx);
                let y = self.pools.push_data(cy);
                self.data.insert(DataKey::Point(i), DataBinding::Coord(idx));
                self.points.push(PointVar { x, y });
                continue;
            }
            let grounded = vp.grounded();
            if vp.ty() == JointType::R {
                let [cx, cy] = vp.c()[0];
                let (x, y) = if grounded {
                    (self.pools.push_constant(cx), self.pools.push_constant(cy))
                } else {
                    (self.pools.push_param(cx), self.pools.push_param(cy))
                };
                self.points.push(PointVar { x, y });
                continue;
            }
            // Sliders carry a slot line besides the visible pin
            let [bx, by] = vp.c()[0];
            let base = if grounded {
                PointVar {
                    x: self.pools.push_constant(bx),
                    y: self.pools.push_constant(by),
                }
            } else {
                PointVar {
                    x: self.pools.push_param(bx),
                    y: self.pools.push_param(by),
                }
            };
            let theta = vp.angle().to_radians();
            let slot = PointVar {
                x: self.pools.push_param(bx + theta.cos()),
                y: self.pools.push_param(by + theta.sin()),
            };
            self.sliders.insert(i, Slider { base, slot });
            let pin = if !grounded && vp.pin_grounded() {
                let [px, py] = vp.c()[1];
                PointVar {
                    x: self.pools.push_constant(px),
                    y: self.pools.push_constant(py),
                }
            } else {
                let [px, py] = pin_seed(&vp);
                PointVar {
                    x: self.pools.push_param(px),
                    y: self.pools.push_param(py),
                }
            };
            self.points.push(pin);
        }
    }

    /// The point standing for joint `n` on `link`: sliders contribute their
    /// slot anchor to their own slot link.
    fn link_point(&self, n: usize, link: &str) -> PointVar {
        match self.sliders.get(&n) {
            Some(slider) if self.vpoints[n].is_slot_link(link) => slider.base,
            _ => self.points[n],
        }
    }

    fn link_length(
        &mut self,
        a: usize,
        b: usize,
        link: &str,
        known_coords: &BTreeMap<usize, [f64; 2]>,
        known_lengths: &mut BTreeMap<(usize, usize), f64>,
    ) {
        if known_coords.contains_key(&a) && known_coords.contains_key(&b) {
            return;
        }
        let key = if a <= b { (a, b) } else { (b, a) };
        let d = *known_lengths
            .entry(key)
            .or_insert_with(|| self.vpoints[a].distance(&self.vpoints[b]));
        let idx = self.pools.data_values.len();
        let cell = self.pools.push_data(d);
        if let DataBinding::Length(cells) = self
            .data
            .entry(DataKey::Pair(key.0, key.1))
            .or_insert_with(|| DataBinding::Length(Vec::new()))
        {
            cells.push(idx);
        }
        let p1 = self.link_point(a, link);
        let p2 = self.link_point(b, link);
        self.cons.push(Constraint::P2PDistance(p1, p2, cell));
    }

    fn slider_constraints(&mut self, a: usize, vlinks: &BTreeMap<String, Vec<usize>>) {
        let Slider { base, slot } = self.sliders[&a];
        let slot_line = LineVar { p1: base, p2: slot };
        let vp1 = self.vpoints[a].clone();
        let pin = self.points[a];
        if vp1.grounded() {
            let cell = self.pools.push_constant(vp1.angle().to_radians());
            self.cons.push(Constraint::LineInternalAngle(slot_line, cell));
        } else if let Some(&c) = vlinks
            .get(&vp1.links()[0])
            .and_then(|members| members.iter().find(|&&c| c != a))
        {
            // A floating slot keeps its design-time bearing toward a mate on
            // the slot link
            let theta = (vp1.slope_angle(&self.vpoints[c], 2, 2) - vp1.angle()).to_radians();
            let cell = self.pools.push_constant(theta);
            let mate = LineVar {
                p1: self.points[c],
                p2: base,
            };
            self.cons.push(Constraint::InternalAngle(slot_line, mate, cell));
        }
        self.cons.push(Constraint::PointOnLine(pin, slot_line));
        if vp1.has_offset() {
            if vp1.offset() != 0. {
                let cell = self.pools.push_constant(vp1.offset());
                self.cons.push(Constraint::P2PDistance(base, pin, cell));
            } else {
                self.cons.push(Constraint::PointOnPoint(base, pin));
            }
        }
        if vp1.ty() == JointType::P {
            // A pure prismatic pair locks the pin-side orientation as well;
            // RP leaves the pin free to turn about the slot
            for link in &vp1.links()[1..] {
                let Some(&c) = vlinks
                    .get(link)
                    .and_then(|members| members.iter().find(|&&c| c != a))
                else {
                    continue;
                };
                let theta =
                    (vp1.slope_angle(&self.vpoints[c], 2, 2) - vp1.angle()).to_radians();
                let cell = self.pools.push_constant(theta);
                let mate = LineVar {
                    p1: self.points[c],
                    p2: pin,
                };
                self.cons.push(Constraint::InternalAngle(slot_line, mate, cell));
            }
        }
    }

    /// Solve the system with the [`Precision::Rough`] preset.
    pub fn solve(&mut self) -> Result<Vec<SolvedPoint>, Error> {
        self.solve_with(Precision::Rough)
    }

    /// Solve the system and return every joint position.
    ///
    /// The solved free parameters stay in the pool, so consecutive calls on
    /// slowly moving inputs start warm.
    pub fn solve_with(&mut self, precision: Precision) -> Result<Vec<SolvedPoint>, Error> {
        let x0 = self.pools.params.clone();
        let best = minimize(&self.pools, &self.cons, x0, precision)?;
        self.pools.params = best;
        let mut out = Vec::with_capacity(self.vpoints.len());
        for (i, vp) in self.vpoints.iter().enumerate() {
            let pin = self.pools.read_point(self.points[i]);
            match vp.ty() {
                JointType::R => out.push(SolvedPoint::R(pin)),
                _ => {
                    let base = self
                        .sliders
                        .get(&i)
                        .map(|slider| self.pools.read_point(slider.base))
                        .unwrap_or(pin);
                    out.push(SolvedPoint::Slider(base, pin));
                }
            }
        }
        log::debug!("solved {} joints", out.len());
        Ok(out)
    }

    /// Update driver angles, in degrees.
    ///
    /// Every key must be one of the input pairs the system was built with.
    pub fn set_inputs(&mut self, inputs: &[((usize, usize), f64)]) -> Result<(), Error> {
        for &(key, deg) in inputs {
            let idx = self
                .inputs
                .iter()
                .find(|&&(k, _)| k == key)
                .map(|&(_, idx)| idx)
                .ok_or(Error::UnsupportedEdit)?;
            self.pools.constants[idx] = deg.to_radians();
        }
        Ok(())
    }

    /// Update known data, including link lengths cached during the build.
    ///
    /// Every key must already be part of the system.
    pub fn set_data(&mut self, data: &[DataEntry]) -> Result<(), Error> {
        for &entry in data {
            match entry {
                DataEntry::Coord(i, [x, y]) => match self.data.get(&DataKey::Point(i)) {
                    Some(&DataBinding::Coord(idx)) => {
                        self.pools.data_values[idx] = x;
                        self.pools.data_values[idx + 1] = y;
                    }
                    _ => return Err(Error::UnsupportedEdit),
                },
                DataEntry::Length(a, b, d) => {
                    if d < 0. {
                        return Err(Error::MalformedJoint("negative link length"));
                    }
                    match self.data.get(&DataKey::pair(a, b)) {
                        Some(DataBinding::Length(cells)) => {
                            for &idx in cells {
                                self.pools.data_values[idx] = d;
                            }
                        }
                        _ => return Err(Error::UnsupportedEdit),
                    }
                }
            }
        }
        Ok(())
    }

    /// Whether `vpoints` has the same link topology as the built system.
    ///
    /// Coordinates are ignored, so a positive answer means the system can be
    /// re-used across iterations.
    pub fn same_points(&self, vpoints: &[VPoint]) -> bool {
        vpoints.len() == self.vpoints.len()
            && vpoints
                .iter()
                .zip(&self.vpoints)
                .all(|(a, b)| a.links() == b.links())
    }

    /// The declared input pairs, in build order.
    pub fn show_inputs(&self) -> Vec<(usize, usize)> {
        self.inputs.iter().map(|&(key, _)| key).collect()
    }

    /// The known-data keys, including cached link lengths.
    pub fn show_data(&self) -> Vec<DataKey> {
        self.data.keys().copied().collect()
    }
}

/// Pin seed, nudged off the slot anchor when an active offset would start
/// the minimizer on a singularity.
fn pin_seed(vp: &VPoint) -> [f64; 2] {
    let [x, y] = vp.c()[1];
    if vp.has_offset() && vp.true_offset() <= 0.1 {
        if vp.offset() > 0. {
            [x + 0.1, y + 0.1]
        } else {
            [x - 0.1, y - 0.1]
        }
    } else {
        [x, y]
    }
}
