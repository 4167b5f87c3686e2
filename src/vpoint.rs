//! Joint model of the mechanism expression.
use crate::{Error, VLink};
use std::fmt;

/// Type tag of a kinematic pair.
#[allow(clippy::upper_case_acronyms)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointType {
    /// Revolute pair (pin).
    R,
    /// Prismatic pair (slider locked to its slot orientation).
    P,
    /// Combined revolute-prismatic pair (pin riding a slot).
    RP,
}

impl fmt::Display for JointType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::R => write!(f, "R"),
            Self::P => write!(f, "P"),
            Self::RP => write!(f, "RP"),
        }
    }
}

/// A joint of the mechanism, connecting one or more links.
///
/// The first link is the base; for slider joints it is the slot link.
/// Revolute joints track a single current coordinate, slider joints track a
/// slot anchor and a pin.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct VPoint {
    links: Vec<String>,
    ty: JointType,
    angle: f64,
    x: f64,
    y: f64,
    c: [[f64; 2]; 2],
    offset: Option<f64>,
    /// Color name of the joint. Visual metadata only.
    pub color_str: String,
    /// RGB color of the joint. Visual metadata only.
    pub color: Option<[u8; 3]>,
}

impl VPoint {
    pub(crate) fn from_parts(
        links: Vec<String>,
        ty: JointType,
        angle: f64,
        x: f64,
        y: f64,
    ) -> Self {
        Self {
            links,
            ty,
            angle,
            x,
            y,
            c: [[x, y]; 2],
            offset: None,
            color_str: String::new(),
            color: None,
        }
    }

    /// Create a revolute joint from a comma-separated link list.
    pub fn r_joint(links: &str, x: f64, y: f64) -> Self {
        Self::from_parts(parse_links(links), JointType::R, 0., x, y)
    }

    /// Create a slider joint (P or RP) with its slot orientation in degrees.
    pub fn slider_joint(
        links: &str,
        ty: JointType,
        angle: f64,
        x: f64,
        y: f64,
    ) -> Result<Self, Error> {
        if ty == JointType::R {
            return Err(Error::MalformedJoint("a slider joint must be P or RP"));
        }
        let links = parse_links(links);
        if links.is_empty() {
            return Err(Error::MalformedJoint("a slider joint requires a slot link"));
        }
        Ok(Self::from_parts(links, ty, angle, x, y))
    }

    /// Link membership; the first entry is the base (slot) link.
    pub fn links(&self) -> &[String] {
        &self.links
    }

    /// Joint type tag.
    pub fn ty(&self) -> JointType {
        self.ty
    }

    /// Slot orientation in degrees. Only meaningful for P/RP joints.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Design-time x coordinate.
    pub fn x(&self) -> f64 {
        self.x
    }

    /// Design-time y coordinate.
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Current coordinates: one point for R joints, slot anchor then pin for
    /// slider joints.
    pub fn c(&self) -> &[[f64; 2]] {
        match self.ty {
            JointType::R => &self.c[..1],
            _ => &self.c,
        }
    }

    /// Overwrite the current coordinates.
    ///
    /// For slider joints a missing `c2` moves the pin together with the slot
    /// anchor; for R joints `c2` is ignored.
    pub fn move_to(&mut self, c1: [f64; 2], c2: Option<[f64; 2]>) {
        self.c[0] = c1;
        if self.ty != JointType::R {
            self.c[1] = c2.unwrap_or(c1);
        }
    }

    /// Set the slot orientation, normalized into `[0, 180)` degrees.
    pub fn rotate(&mut self, angle: f64) {
        self.angle = angle.rem_euclid(180.);
    }

    /// Pin the offset to a signed slot distance.
    pub fn set_offset(&mut self, offset: f64) {
        self.offset = Some(offset);
    }

    /// Drop the offset constraint.
    pub fn disable_offset(&mut self) {
        self.offset = None;
    }

    /// Whether the offset constraint is active.
    pub fn has_offset(&self) -> bool {
        self.offset.is_some()
    }

    /// The offset value, zero when disabled.
    pub fn offset(&self) -> f64 {
        self.offset.unwrap_or(0.)
    }

    /// Distance between the current slot anchor and pin.
    pub fn true_offset(&self) -> f64 {
        let [ax, ay] = self.c[0];
        let [px, py] = self.c[1];
        (px - ax).hypot(py - ay)
    }

    /// Distance between two joints, measured from the contact end of any
    /// shared link.
    ///
    /// A slider measures from its pin unless the shared link is its slot
    /// link; unrelated joints measure anchor to anchor.
    pub fn distance(&self, rhs: &Self) -> f64 {
        let shared = self.links.iter().find(|l| rhs.links.contains(l));
        let [x1, y1] = self.contact_end(shared.map(String::as_str));
        let [x2, y2] = rhs.contact_end(shared.map(String::as_str));
        (x1 - x2).hypot(y1 - y2)
    }

    fn contact_end(&self, shared: Option<&str>) -> [f64; 2] {
        match shared {
            Some(link) if self.ty != JointType::R && !self.is_slot_link(link) => self.c[1],
            _ => self.c[0],
        }
    }

    /// Angle from horizontal of the vector `rhs` to `self`, in degrees.
    ///
    /// `num1` / `num2` select the measuring end of `self` / `rhs`: 0 is the
    /// slot anchor, 1 is the pin, anything larger the design coordinates.
    pub fn slope_angle(&self, rhs: &Self, num1: u8, num2: u8) -> f64 {
        let sel = |vp: &Self, num: u8| match num {
            0 => vp.c[0],
            1 => vp.c[1],
            _ => [vp.x, vp.y],
        };
        let [x1, y1] = sel(self, num1);
        let [x2, y2] = sel(rhs, num2);
        (y1 - y2).atan2(x1 - x2).to_degrees()
    }

    /// Whether the joint is connected to the frame.
    ///
    /// Slider joints are grounded through their slot link only.
    pub fn grounded(&self) -> bool {
        match self.ty {
            JointType::R => self.links.iter().any(|l| l == VLink::FRAME),
            _ => self.links.first().map(String::as_str) == Some(VLink::FRAME),
        }
    }

    /// Whether the pin side of the joint is connected to the frame.
    pub fn pin_grounded(&self) -> bool {
        self.links.iter().skip(1).any(|l| l == VLink::FRAME)
    }

    /// Whether `name` is the slot (base) link of this slider joint.
    pub fn is_slot_link(&self, name: &str) -> bool {
        match self.ty {
            JointType::R => false,
            _ => self.links.first().map(String::as_str) == Some(name),
        }
    }

    /// Whether the two joints share a link.
    pub fn same_link(&self, rhs: &Self) -> bool {
        self.links.iter().any(|l| rhs.links.contains(l))
    }

    /// Whether the joint is free floating.
    pub fn no_link(&self) -> bool {
        self.links.is_empty()
    }

    /// The visible x coordinate: slot anchor for R, pin for P/RP.
    pub fn cx(&self) -> f64 {
        match self.ty {
            JointType::R => self.c[0][0],
            _ => self.c[1][0],
        }
    }

    /// The visible y coordinate: slot anchor for R, pin for P/RP.
    pub fn cy(&self) -> f64 {
        match self.ty {
            JointType::R => self.c[0][1],
            _ => self.c[1][1],
        }
    }

    /// Whether the visible coordinate is NaN.
    pub fn is_nan(&self) -> bool {
        self.cx().is_nan() || self.cy().is_nan()
    }

    /// The expression string form of the joint.
    pub fn expr(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for VPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "J[{}", self.ty)?;
        if self.ty != JointType::R {
            write!(f, ", A[{}]", self.angle)?;
        }
        if !self.color_str.is_empty() {
            write!(f, ", color[{}]", self.color_str)?;
        }
        write!(f, ", P[{}, {}]", self.x, self.y)?;
        write!(f, ", L[{}]]", self.links.join(", "))
    }
}

impl PartialEq for VPoint {
    fn eq(&self, rhs: &Self) -> bool {
        self.links == rhs.links
            && self.c() == rhs.c()
            && self.ty == rhs.ty
            && self.x == rhs.x
            && self.y == rhs.y
            && self.angle == rhs.angle
    }
}

fn parse_links(links: &str) -> Vec<String> {
    let mut list = Vec::<String>::new();
    for name in links.split(',') {
        let name = name.trim();
        if !name.is_empty() && !list.iter().any(|n| n == name) {
            list.push(name.to_string());
        }
    }
    list
}
