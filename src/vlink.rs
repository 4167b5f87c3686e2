//! Link model of the mechanism expression.

/// A rigid body: a named group of joints.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct VLink {
    /// Name of the link.
    pub name: String,
    /// Color name of the link. Visual metadata only.
    pub color_str: String,
    /// RGB color of the link. Visual metadata only.
    pub color: Option<[u8; 3]>,
    points: Vec<usize>,
}

impl VLink {
    /// Reserved name of the inertial frame.
    pub const FRAME: &'static str = "ground";

    /// Create a link from its joint indices.
    pub fn new(name: impl Into<String>, points: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            color_str: String::new(),
            color: None,
            points,
        }
    }

    /// Joint indices belonging to this link.
    pub fn points(&self) -> &[usize] {
        &self.points
    }

    /// Replace the joint indices.
    pub fn set_points(&mut self, points: Vec<usize>) {
        self.points = points;
    }

    /// Whether this link is the inertial frame.
    pub fn is_frame(&self) -> bool {
        self.name == Self::FRAME
    }
}

impl PartialEq for VLink {
    fn eq(&self, rhs: &Self) -> bool {
        self.name == rhs.name && self.points == rhs.points
    }
}
