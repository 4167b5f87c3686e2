//! Symbolic construction records produced by the triangulation compiler.
use std::fmt;

/// A typed symbol of the construction stack.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sym {
    /// Joint position.
    P(usize),
    /// Length parameter.
    L(usize),
    /// Angle parameter.
    A(usize),
    /// Synthetic slider slot endpoint, keyed by its joint index.
    S(usize),
}

impl fmt::Display for Sym {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::P(n) => write!(f, "P{n}"),
            Self::L(n) => write!(f, "L{n}"),
            Self::A(n) => write!(f, "A{n}"),
            Self::S(n) => write!(f, "S{n}"),
        }
    }
}

/// A parametric geometric construction.
///
/// Operand order matches the execution signature of the construction
/// primitives ([`pla`](crate::pla) through [`pxy`](crate::pxy)).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expr {
    /// Point from a length and an absolute angle.
    Pla(Sym, Sym, Sym, Sym),
    /// Point from a length and an angle relative to a pivot.
    Plap(Sym, Sym, Sym, Sym, Sym),
    /// Point from two lengths and two pivots (circle intersection).
    Pllp(Sym, Sym, Sym, Sym, Sym),
    /// Point from a length and a projected line, with a branch selector.
    Plpp(Sym, Sym, Sym, Sym, Sym, bool),
    /// Point from two axial offsets.
    Pxy(Sym, Sym, Sym, Sym),
}

impl Expr {
    /// The target symbol of the construction.
    pub fn target(&self) -> Sym {
        match *self {
            Self::Pla(.., t)
            | Self::Plap(.., t)
            | Self::Pllp(.., t)
            | Self::Pxy(.., t) => t,
            Self::Plpp(_, _, _, _, t, _) => t,
        }
    }

    fn as_strings(&self) -> Vec<String> {
        macro_rules! tuple {
            ($tag:literal $(, $sym:expr)+) => {
                vec![$tag.to_string() $(, $sym.to_string())+]
            };
        }
        match *self {
            // A PLA record renders with the PLAP tag; only the arity tells
            // them apart downstream.
            Self::Pla(c1, l0, a0, t) => tuple!("PLAP", c1, l0, a0, t),
            Self::Plap(c1, l0, a0, c2, t) => tuple!("PLAP", c1, l0, a0, c2, t),
            Self::Pllp(c1, l0, l1, c2, t) => tuple!("PLLP", c1, l0, l1, c2, t),
            Self::Plpp(c1, l0, c2, c3, t, _) => tuple!("PLPP", c1, l0, c2, c3, t),
            Self::Pxy(c1, lx, ly, t) => tuple!("PXY", c1, lx, ly, t),
        }
    }
}

/// An ordered stack of constructions with its symbol allocator.
///
/// Lengths and angles draw from independent monotone counters; the numeric
/// meaning of every symbol is attached by the consumer that replays the
/// stack.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EStack {
    exprs: Vec<Expr>,
    lengths: usize,
    angles: usize,
}

impl EStack {
    /// Push a PLA driver construction, allocating a length and an angle.
    pub fn add_pla(&mut self, c1: Sym, target: Sym) {
        let l0 = self.push_length();
        let a0 = self.push_angle();
        self.exprs.push(Expr::Pla(c1, l0, a0, target));
    }

    /// Push a PLAP construction, allocating a length and an angle.
    pub fn add_plap(&mut self, c1: Sym, c2: Sym, target: Sym) {
        let l0 = self.push_length();
        let a0 = self.push_angle();
        self.exprs.push(Expr::Plap(c1, l0, a0, c2, target));
    }

    /// Push a PLLP construction, allocating two lengths.
    pub fn add_pllp(&mut self, c1: Sym, c2: Sym, target: Sym) {
        let l0 = self.push_length();
        let l1 = self.push_length();
        self.exprs.push(Expr::Pllp(c1, l0, l1, c2, target));
    }

    /// Push a PLPP construction, allocating one length.
    pub fn add_plpp(&mut self, c1: Sym, c2: Sym, c3: Sym, target: Sym, op: bool) {
        let l0 = self.push_length();
        self.exprs.push(Expr::Plpp(c1, l0, c2, c3, target, op));
    }

    /// Push a PXY construction, allocating two axial lengths.
    pub fn add_pxy(&mut self, c1: Sym, target: Sym) {
        let lx = self.push_length();
        let ly = self.push_length();
        self.exprs.push(Expr::Pxy(c1, lx, ly, target));
    }

    fn push_length(&mut self) -> Sym {
        let sym = Sym::L(self.lengths);
        self.lengths += 1;
        sym
    }

    fn push_angle(&mut self) -> Sym {
        let sym = Sym::A(self.angles);
        self.angles += 1;
        sym
    }

    /// The constructions in execution order.
    pub fn exprs(&self) -> &[Expr] {
        &self.exprs
    }

    /// Number of constructions.
    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    /// Whether the stack is empty.
    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// Render the stack as symbol tuples.
    pub fn as_list(&self) -> Vec<Vec<String>> {
        self.exprs.iter().map(Expr::as_strings).collect()
    }
}
