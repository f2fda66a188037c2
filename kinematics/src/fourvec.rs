use std::f64::consts::{PI, TAU};
use std::ops::Add;

use crate::Ragged;

/// Four-momentum stored in cartesian components, so that composing decay
/// products is plain addition. Collider-frame accessors (pt, eta, phi)
/// are derived on demand.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FourVec {
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub e:  f64,
}

impl FourVec {
    pub fn new(px: f64, py: f64, pz: f64, e: f64) -> Self { Self { px, py, pz, e } }

    /// Build from collider coordinates and energy.
    pub fn from_ptetaphie(pt: f64, eta: f64, phi: f64, e: f64) -> Self {
        Self {
            px: pt * phi.cos(),
            py: pt * phi.sin(),
            pz: pt * eta.sinh(),
            e,
        }
    }

    /// Build from collider coordinates and mass.
    pub fn from_ptetaphim(pt: f64, eta: f64, phi: f64, m: f64) -> Self {
        let pz = pt * eta.sinh();
        let p2 = pt * pt + pz * pz;
        Self {
            px: pt * phi.cos(),
            py: pt * phi.sin(),
            pz,
            e: (m * m + p2).sqrt(),
        }
    }

    pub fn pt (&self) -> f64 { self.px.hypot(self.py) }
    pub fn phi(&self) -> f64 { self.py.atan2(self.px) }

    pub fn eta(&self) -> f64 {
        let pt = self.pt();
        if pt == 0.0 {
            // straight down the beampipe
            if self.pz > 0.0 { f64::INFINITY } else if self.pz < 0.0 { f64::NEG_INFINITY } else { 0.0 }
        } else {
            (self.pz / pt).asinh()
        }
    }

    /// Invariant mass. Rounding can push e² − p² marginally below zero for
    /// massless particles; clamp rather than return NaN.
    pub fn mass(&self) -> f64 {
        let p2 = self.px * self.px + self.py * self.py + self.pz * self.pz;
        (self.e * self.e - p2).max(0.0).sqrt()
    }

    /// Angular separation √(Δη² + Δφ²) from `other`.
    pub fn delta_r(&self, other: &FourVec) -> f64 {
        delta_r(self.eta(), self.phi(), other.eta(), other.phi())
    }
}

impl Add for FourVec {
    type Output = FourVec;
    fn add(self, rhs: Self) -> Self {
        Self {
            px: self.px + rhs.px,
            py: self.py + rhs.py,
            pz: self.pz + rhs.pz,
            e:  self.e  + rhs.e,
        }
    }
}

/// Azimuthal difference a − b wrapped to (-π, π].
pub fn delta_phi(a: f64, b: f64) -> f64 {
    let mut d = (a - b) % TAU;
    if      d >   PI { d -= TAU }
    else if d <= -PI { d += TAU }
    d
}

/// √(Δη² + Δφ²) with Δφ wrapped to (-π, π].
pub fn delta_r(eta1: f64, phi1: f64, eta2: f64, phi2: f64) -> f64 {
    let deta = eta1 - eta2;
    let dphi = delta_phi(phi1, phi2);
    (deta * deta + dphi * dphi).sqrt()
}

fn check_parallel(what: &str, a: &Ragged<f64>, b: &Ragged<f64>) {
    assert!(a.same_shape(b),
            "parallel kinematic branches disagree in shape while zipping {what}");
}

/// Zip parallel (pt, eta, phi, energy) branches into one vector sequence.
/// The branches must agree in shape event by event; disagreement means the
/// input tables were not produced together and is fatal.
pub fn zip_with_energy(pt: &Ragged<f64>, eta: &Ragged<f64>, phi: &Ragged<f64>, energy: &Ragged<f64>) -> Ragged<FourVec> {
    check_parallel("pt/eta", pt, eta);
    check_parallel("pt/phi", pt, phi);
    check_parallel("pt/energy", pt, energy);
    let vecs = zip4(pt, eta, phi, energy)
        .map(|(pt, eta, phi, e)| FourVec::from_ptetaphie(pt, eta, phi, e));
    Ragged::from_flat(vecs.collect(), pt.offsets().to_vec())
}

/// Zip parallel (pt, eta, phi, mass) branches into one vector sequence.
pub fn zip_with_mass(pt: &Ragged<f64>, eta: &Ragged<f64>, phi: &Ragged<f64>, mass: &Ragged<f64>) -> Ragged<FourVec> {
    check_parallel("pt/eta", pt, eta);
    check_parallel("pt/phi", pt, phi);
    check_parallel("pt/mass", pt, mass);
    let vecs = zip4(pt, eta, phi, mass)
        .map(|(pt, eta, phi, m)| FourVec::from_ptetaphim(pt, eta, phi, m));
    Ragged::from_flat(vecs.collect(), pt.offsets().to_vec())
}

/// Zip (pt, eta, phi) branches with one shared mass, e.g. reconstructed
/// leptons whose mass is known from the particle species.
pub fn zip_with_const_mass(pt: &Ragged<f64>, eta: &Ragged<f64>, phi: &Ragged<f64>, m: f64) -> Ragged<FourVec> {
    check_parallel("pt/eta", pt, eta);
    check_parallel("pt/phi", pt, phi);
    let vecs = pt.flat().iter().zip(eta.flat()).zip(phi.flat())
        .map(|((&pt, &eta), &phi)| FourVec::from_ptetaphim(pt, eta, phi, m));
    Ragged::from_flat(vecs.collect(), pt.offsets().to_vec())
}

fn zip4<'a>(
    a: &'a Ragged<f64>, b: &'a Ragged<f64>, c: &'a Ragged<f64>, d: &'a Ragged<f64>,
) -> impl Iterator<Item = (f64, f64, f64, f64)> + 'a {
    a.flat().iter().zip(b.flat()).zip(c.flat()).zip(d.flat())
        .map(|(((&a, &b), &c), &d)| (a, b, c, d))
}
