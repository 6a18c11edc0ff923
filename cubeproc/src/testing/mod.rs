//! Testing utilities: seeded Gaussian noise and synthetic cubes.

#![allow(dead_code)]

pub mod engine;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cube::{Beam, CubeHeader, ImageCube};

/// Deterministic Gaussian generator (Box–Muller over a seeded `StdRng`).
pub struct TestRng {
    rng: StdRng,
    spare: Option<f64>,
}

impl TestRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            spare: None,
        }
    }

    pub fn next_gaussian(&mut self) -> f64 {
        if let Some(spare) = self.spare.take() {
            return spare;
        }
        let u1: f64 = self.rng.random::<f64>().max(f64::MIN_POSITIVE);
        let u2: f64 = self.rng.random::<f64>();
        let radius = (-2.0 * u1.ln()).sqrt();
        let angle = std::f64::consts::TAU * u2;
        self.spare = Some(radius * angle.sin());
        radius * angle.cos()
    }

    pub fn gaussian_samples(&mut self, count: usize, sigma: f64) -> Vec<f32> {
        (0..count)
            .map(|_| (self.next_gaussian() * sigma) as f32)
            .collect()
    }
}

/// Header for an `nx × ny × nchan` cube near RA 150, Dec 2 with 1" pixels
/// and a 3" round beam.
pub fn cube_header(name: &str, nx: usize, ny: usize, nchan: usize) -> CubeHeader {
    CubeHeader::sky(name, (nx, ny), (150.0, 2.0), 1.0)
        .with_frequency_axis(nchan, 230.538e9, -0.5e6)
        .with_beam(Beam::round_arcsec(3.0))
        .with_rest_frequency(230.538e9)
}

/// Pure Gaussian noise cube.
pub fn noise_cube(name: &str, shape: (usize, usize, usize), sigma: f64, seed: u64) -> ImageCube {
    let (nx, ny, nchan) = shape;
    let mut rng = TestRng::new(seed);
    let data = rng.gaussian_samples(nx * ny * nchan, sigma);
    ImageCube::from_data(cube_header(name, nx, ny, nchan), data).unwrap()
}

/// Flat index of `(x, y, channel)` in a 3-D cube.
pub fn idx3(shape: (usize, usize, usize), x: usize, y: usize, c: usize) -> usize {
    x + shape.0 * (y + shape.1 * c)
}
