//! Compile a mechanism into an ordered stack of closed-form constructions.
use crate::{EStack, JointType, Sym, VPoint};
use std::collections::BTreeMap;

type VLinks = BTreeMap<String, Vec<usize>>;

/// Compile `vpoints` with driver `inputs` into a construction stack.
///
/// `inputs` is an ordered list of `(driver, driven)` joint pairs. Joints the
/// compiler cannot reach are simply left out of the stack; use
/// [`t_config_status`] to observe them and fall back to the numerical solver.
pub fn t_config(vpoints: &[VPoint], inputs: &[(usize, usize)]) -> EStack {
    t_config_status(vpoints, inputs, &mut BTreeMap::new())
}

/// Same as [`t_config`], recording into `status` whether each joint index
/// ended up solved.
pub fn t_config_status(
    vpoints: &[VPoint],
    inputs: &[(usize, usize)],
    status: &mut BTreeMap<usize, bool>,
) -> EStack {
    status.clear();
    let mut vpoints = vpoints.to_vec();
    // Link name to joint indices, in ascending joint order
    let mut vlinks = VLinks::new();
    for (node, vp) in vpoints.iter().enumerate() {
        status.insert(
            node,
            vp.no_link() || (vp.ty() == JointType::R && vp.grounded()),
        );
        for link in vp.links() {
            vlinks.entry(link.clone()).or_default().push(node);
        }
    }
    // Grounded P joints carry their pin links as a translating body, so the
    // R joints riding those links become RP joints on the same slot.
    for base in 0..vpoints.len() {
        let vp = vpoints[base].clone();
        if vp.ty() != JointType::P || !vp.grounded() {
            continue;
        }
        for link in &vp.links()[1..] {
            let Some(members) = vlinks.get(link) else {
                continue;
            };
            for &node in members {
                if node == base || vpoints[node].ty() != JointType::R {
                    continue;
                }
                let links = std::iter::once(vp.links()[0].clone())
                    .chain(
                        vpoints[node]
                            .links()
                            .iter()
                            .filter(|l| !vp.links().contains(l))
                            .cloned(),
                    )
                    .collect();
                let (x, y) = (vpoints[node].x(), vpoints[node].y());
                vpoints[node] = VPoint::from_parts(links, JointType::RP, vp.angle(), x, y);
            }
        }
    }
    // Seed positions for the orientation tests
    let pos = vpoints
        .iter()
        .map(|vp| match vp.ty() {
            JointType::R => vp.c()[0],
            _ => vp.c()[1],
        })
        .collect::<Vec<_>>();
    let input_targets = inputs
        .iter()
        .map(|&(base, node)| (node, base))
        .collect::<BTreeMap<_, _>>();
    let mut exprs = EStack::default();
    // Drivers whose base is already in place
    for &(base, node) in inputs {
        if status[&base] {
            exprs.add_pla(Sym::P(base), Sym::P(node));
            status.insert(node, true);
        }
    }
    // Round-robin sweep; one full unproductive lap terminates it
    let n_status = status.len();
    let mut node = 0;
    let mut skip_times = 0;
    while status.values().any(|solved| !solved) {
        if node >= vpoints.len() {
            node = 0;
            continue;
        }
        if skip_times >= n_status {
            break;
        }
        if status[&node] {
            node += 1;
            continue;
        }
        let solved = match vpoints[node].ty() {
            JointType::R => {
                solve_r(node, &vpoints, &vlinks, status, &input_targets, &pos, &mut exprs)
            }
            JointType::P => solve_p(node, &vpoints, &vlinks, status, &mut exprs),
            JointType::RP => solve_rp(node, &vpoints, &vlinks, status, &pos, &mut exprs),
        };
        if solved {
            skip_times = 0;
        } else {
            skip_times += 1;
        }
        node += 1;
    }
    log::debug!(
        "triangulated {} of {} joints into {} constructions",
        status.values().filter(|solved| **solved).count(),
        status.len(),
        exprs.len(),
    );
    exprs
}

/// Orientation test used for branch selection on triangles.
/// Zero (collinear) counts as clockwise.
fn clockwise(c1: [f64; 2], c2: [f64; 2], c3: [f64; 2]) -> bool {
    let ux = c2[0] - c1[0];
    let uy = c2[1] - c1[1];
    let vx = c3[0] - c2[0];
    let vy = c3[1] - c2[1];
    ux * vy - uy * vx >= 0.
}

/// Solved joints joined to `node` through any of its links.
fn reliable_friends(
    node: usize,
    vpoints: &[VPoint],
    vlinks: &VLinks,
    status: &BTreeMap<usize, bool>,
) -> Vec<usize> {
    let mut friends = Vec::new();
    for link in vpoints[node].links() {
        let Some(members) = vlinks.get(link) else {
            continue;
        };
        if members.len() < 2 {
            continue;
        }
        for &friend in members {
            if friend != node && status[&friend] && !friends.contains(&friend) {
                friends.push(friend);
            }
        }
    }
    friends
}

/// First solved joint on the slot link of a slider.
fn base_friend(
    node: usize,
    vpoints: &[VPoint],
    vlinks: &VLinks,
    status: &BTreeMap<usize, bool>,
) -> Option<usize> {
    let link = vpoints[node].links().first()?;
    vlinks
        .get(link)?
        .iter()
        .copied()
        .find(|&friend| friend != node && status[&friend])
}

/// First solved joint on any pin link of a slider.
fn notbase_friend(
    node: usize,
    vpoints: &[VPoint],
    vlinks: &VLinks,
    status: &BTreeMap<usize, bool>,
) -> Option<usize> {
    for link in vpoints[node].links().get(1..)? {
        let Some(members) = vlinks.get(link) else {
            continue;
        };
        if let Some(friend) = members
            .iter()
            .copied()
            .find(|&friend| friend != node && status[&friend])
        {
            return Some(friend);
        }
    }
    None
}

fn solve_r(
    node: usize,
    vpoints: &[VPoint],
    vlinks: &VLinks,
    status: &mut BTreeMap<usize, bool>,
    input_targets: &BTreeMap<usize, usize>,
    pos: &[[f64; 2]],
    exprs: &mut EStack,
) -> bool {
    if let Some(&base) = input_targets.get(&node) {
        // A driver target waits for its own base
        if !status[&base] {
            return false;
        }
        exprs.add_pla(Sym::P(base), Sym::P(node));
        status.insert(node, true);
        return true;
    }
    let friends = reliable_friends(node, vpoints, vlinks, status);
    let [mut fa, mut fb] = match friends[..] {
        [fa, fb, ..] => [fa, fb],
        _ => return false,
    };
    if clockwise(pos[fa], pos[node], pos[fb]) {
        std::mem::swap(&mut fa, &mut fb);
    }
    log::trace!("P{node} <- PLLP(P{fa}, P{fb})");
    exprs.add_pllp(Sym::P(fa), Sym::P(fb), Sym::P(node));
    status.insert(node, true);
    true
}

fn solve_p(
    node: usize,
    vpoints: &[VPoint],
    vlinks: &VLinks,
    status: &mut BTreeMap<usize, bool>,
    exprs: &mut EStack,
) -> bool {
    let vp = &vpoints[node];
    if !vp.grounded() || vp.pin_grounded() || vp.has_offset() {
        return false;
    }
    let Some(fa) = notbase_friend(node, vpoints, vlinks, status) else {
        return false;
    };
    log::trace!("P{node} <- PXY(P{fa})");
    exprs.add_pxy(Sym::P(fa), Sym::P(node));
    status.insert(node, true);
    // The rigid slide carries the rest of the pin-side joints along
    for link in &vp.links()[1..] {
        let Some(members) = vlinks.get(link) else {
            continue;
        };
        for &friend in members {
            if friend != node && !status[&friend] {
                exprs.add_pxy(Sym::P(node), Sym::P(friend));
                status.insert(friend, true);
            }
        }
    }
    true
}

fn solve_rp(
    node: usize,
    vpoints: &[VPoint],
    vlinks: &VLinks,
    status: &mut BTreeMap<usize, bool>,
    pos: &[[f64; 2]],
    exprs: &mut EStack,
) -> bool {
    let vp = &vpoints[node];
    if !vp.grounded() || vp.pin_grounded() || vp.has_offset() {
        return false;
    }
    let Some(fa) = notbase_friend(node, vpoints, vlinks, status) else {
        return false;
    };
    let Some(fb) = base_friend(node, vpoints, vlinks, status) else {
        return false;
    };
    // Synthetic slot endpoint one unit along the slot direction. The joint's
    // own symbol denotes the grounded slot anchor here, so it pairs with the
    // base friend as a second known pivot.
    let theta = vp.angle().to_radians();
    let slot_end = [pos[node][0] + theta.cos(), pos[node][1] + theta.sin()];
    let mut pair = [(Sym::P(fb), pos[fb]), (Sym::P(node), pos[node])];
    if clockwise(pair[0].1, slot_end, pair[1].1) {
        pair.swap(0, 1);
    }
    log::trace!("S{node} <- PLLP({}, {}); P{node} <- PLPP(P{fa})", pair[0].0, pair[1].0);
    exprs.add_pllp(pair[0].0, pair[1].0, Sym::S(node));
    let op = (pos[fa][0] - pos[node][0] > 0.) != (vp.angle() > 90.);
    exprs.add_plpp(Sym::P(fa), Sym::P(node), Sym::S(node), Sym::P(node), op);
    status.insert(node, true);
    true
}
