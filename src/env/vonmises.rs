//! Von Mises distribution on the circle.

use rand::Rng;
use std::f64::consts::PI;

/// Von Mises distribution with location `loc` and concentration `concentration`.
///
/// Samples lie in `[-π, π)` around `loc`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VonMises {
    pub loc: f64,
    pub concentration: f64,
}

impl VonMises {
    pub fn new(loc: f64, concentration: f64) -> Self {
        Self { loc, concentration }
    }

    /// Log-density at `x`.
    pub fn log_prob(&self, x: f64) -> f64 {
        self.concentration * (x - self.loc).cos()
            - (2.0 * PI).ln()
            - log_bessel_i0(self.concentration)
    }

    /// Draw one sample with the Best-Fisher rejection sampler.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let kappa = self.concentration;
        if kappa < 1e-6 {
            return wrap_centered(self.loc + rng.gen_range(-PI..PI));
        }

        let tau = 1.0 + (1.0 + 4.0 * kappa * kappa).sqrt();
        let rho = (tau - (2.0 * tau).sqrt()) / (2.0 * kappa);
        let r = (1.0 + rho * rho) / (2.0 * rho);

        loop {
            let u1: f64 = rng.gen();
            let u2: f64 = rng.gen();
            let u3: f64 = rng.gen();

            let z = (PI * u1).cos();
            let f = (1.0 + r * z) / (r + z);
            let c = kappa * (r - f);

            if c * (2.0 - c) - u2 > 0.0 || (c / u2).ln() + 1.0 - c >= 0.0 {
                let theta = if u3 > 0.5 { f.acos() } else { -f.acos() };
                return wrap_centered(theta + self.loc);
            }
        }
    }
}

/// Wrap an angle into `[-π, π)`.
fn wrap_centered(x: f64) -> f64 {
    (x + PI).rem_euclid(2.0 * PI) - PI
}

/// `ln I0(x)` via the Abramowitz-Stegun polynomial approximations (9.8.1, 9.8.2).
pub fn log_bessel_i0(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 3.75 {
        let y = (ax / 3.75).powi(2);
        let poly = 1.0
            + y * (3.5156229
                + y * (3.0899424
                    + y * (1.2067492 + y * (0.2659732 + y * (0.0360768 + y * 0.0045813)))));
        poly.ln()
    } else {
        let y = 3.75 / ax;
        let poly = 0.39894228
            + y * (0.01328592
                + y * (0.00225319
                    + y * (-0.00157565
                        + y * (0.00916281
                            + y * (-0.02057706
                                + y * (0.02635537 + y * (-0.01647633 + y * 0.00392377)))))));
        ax - 0.5 * ax.ln() + poly.ln()
    }
}
