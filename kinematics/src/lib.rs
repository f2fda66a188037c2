mod fourvec;
mod ragged;

pub use fourvec::{FourVec, delta_phi, delta_r, zip_with_energy, zip_with_mass, zip_with_const_mass};
pub use ragged::Ragged;
