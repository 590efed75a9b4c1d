//! Plane and Gaussian laser pulse injection.
//!
//! A laser is summed into the self-consistent field state once, at
//! construction time, as an initial condition. There is no per-step
//! re-injection; a laser that should appear to enter the box over time is
//! expressed by its spatial envelope directly, the way a `t=0` snapshot of
//! a traveling wave would look.

use crate::field::EmfField;
use crate::vecfield::Vec3;
use crate::Float;

/// Transverse profile of the pulse.
#[derive(Debug, Clone, Copy)]
pub enum Profile {
    Plane,
    Gaussian { w0: Float, focus: Float },
}

/// A plane or Gaussian laser pulse, propagating along axis 0.
#[derive(Debug, Clone, Copy)]
pub struct Laser {
    pub a0: Float,
    pub omega0: Float,
    pub polarization: Float,
    pub start: Float,
    pub rise: Float,
    pub flat: Float,
    pub fall: Float,
    pub profile: Profile,
}

impl Laser {
    /// Builds a plane-wave pulse from an explicit rise/flat/fall envelope.
    pub fn plane(
        a0: Float,
        omega0: Float,
        polarization: Float,
        start: Float,
        rise: Float,
        flat: Float,
        fall: Float,
    ) -> crate::Result<Laser> {
        Laser::new(a0, omega0, polarization, start, rise, flat, fall, Profile::Plane)
    }

    /// Builds a plane-wave pulse from a FWHM, matching the reference
    /// convention of a pure `sin²` lobe with no flat top: `rise = fall =
    /// fwhm`, `flat = 0`.
    pub fn plane_fwhm(a0: Float, omega0: Float, polarization: Float, start: Float, fwhm: Float) -> crate::Result<Laser> {
        if fwhm <= 0.0 {
            bail!(crate::ErrorKind::Configuration(format!(
                "laser fwhm = {} must be positive",
                fwhm
            )));
        }
        Laser::plane(a0, omega0, polarization, start, fwhm, 0.0, fwhm)
    }

    /// Builds a focused Gaussian pulse with waist `w0` centered on
    /// `focus` (physical position along axis 1).
    #[allow(clippy::too_many_arguments)]
    pub fn gaussian(
        a0: Float,
        omega0: Float,
        polarization: Float,
        start: Float,
        rise: Float,
        flat: Float,
        fall: Float,
        w0: Float,
        focus: Float,
    ) -> crate::Result<Laser> {
        if w0 <= 0.0 {
            bail!(crate::ErrorKind::Configuration(format!(
                "laser waist w0 = {} must be positive",
                w0
            )));
        }
        Laser::new(
            a0,
            omega0,
            polarization,
            start,
            rise,
            flat,
            fall,
            Profile::Gaussian { w0, focus },
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn new(
        a0: Float,
        omega0: Float,
        polarization: Float,
        start: Float,
        rise: Float,
        flat: Float,
        fall: Float,
        profile: Profile,
    ) -> crate::Result<Laser> {
        if rise < 0.0 || flat < 0.0 || fall < 0.0 {
            bail!(crate::ErrorKind::Configuration(
                "laser rise/flat/fall must be non-negative".into()
            ));
        }
        if omega0 <= 0.0 {
            bail!(crate::ErrorKind::Configuration(format!(
                "laser omega0 = {} must be positive",
                omega0
            )));
        }
        Ok(Laser {
            a0,
            omega0,
            polarization,
            start,
            rise,
            flat,
            fall,
            profile,
        })
    }

    /// `sin²`-ramped envelope: zero before `start` and after the fall
    /// section, `sin²` on rise/fall, unity on the flat top.
    fn envelope(&self, xi: Float) -> Float {
        if xi < 0.0 {
            0.0
        } else if xi < self.rise {
            if self.rise == 0.0 {
                1.0
            } else {
                (crate::consts::TWOPI / 4.0 * xi / self.rise).sin().powi(2)
            }
        } else if xi < self.rise + self.flat {
            1.0
        } else if xi < self.rise + self.flat + self.fall {
            let tail = self.rise + self.flat + self.fall - xi;
            if self.fall == 0.0 {
                0.0
            } else {
                (crate::consts::TWOPI / 4.0 * tail / self.fall).sin().powi(2)
            }
        } else {
            0.0
        }
    }

    fn transverse(&self, y: Float) -> Float {
        match self.profile {
            Profile::Plane => 1.0,
            Profile::Gaussian { w0, focus } => {
                let r = y - focus;
                (-(r * r) / (w0 * w0)).exp()
            }
        }
    }

    /// Evaluates the pulse's `(E, B)` at a physical position, as it looks
    /// at `t = 0`: a plane wave travelling in `+x` with `k = omega0` (since
    /// `c = 1`), transverse-polarized at `self.polarization` between the
    /// `z` and `y` axes.
    pub fn fields_at(&self, x: Float, y: Float) -> (Vec3, Vec3) {
        let xi = x - self.start;
        let amplitude = self.a0 * self.omega0 * self.envelope(xi) * self.transverse(y);
        let phase = self.omega0 * xi;
        let carrier = phase.cos();

        let ez = amplitude * carrier * self.polarization.cos();
        let ey = amplitude * carrier * self.polarization.sin();

        // Vacuum plane wave propagating in +x: B = x_hat x E.
        let by = -ez;
        let bz = ey;

        (Vec3::new(0.0, ey, ez), Vec3::new(0.0, by, bz))
    }

    /// Sums this pulse's fields directly into `field`'s self-consistent
    /// state, as an initial condition.
    pub fn inject_into(&self, field: &mut EmfField) {
        field.add_laser_fields(|x, y| self.fields_at(x, y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_fwhm() {
        assert!(Laser::plane_fwhm(0.1, 2.0, 0.0, 0.0, 0.0).is_err());
        assert!(Laser::plane_fwhm(0.1, 2.0, 0.0, 0.0, -1.0).is_err());
    }

    #[test]
    fn rejects_negative_rise_flat_fall() {
        assert!(Laser::plane(0.1, 2.0, 0.0, 0.0, -1.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn envelope_is_zero_before_start_and_after_the_pulse() {
        let laser = Laser::plane(0.1, 2.0, 0.0, 5.0, 1.0, 1.0, 1.0).unwrap();
        assert_eq!(laser.envelope(-1.0), 0.0);
        assert_eq!(laser.envelope(10.0), 0.0);
    }

    #[test]
    fn envelope_is_unity_on_the_flat_top() {
        let laser = Laser::plane(0.1, 2.0, 0.0, 0.0, 1.0, 2.0, 1.0).unwrap();
        assert!((laser.envelope(1.5) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn gaussian_transverse_factor_peaks_at_focus() {
        let laser = Laser::gaussian(0.1, 2.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 3.2).unwrap();
        assert!((laser.transverse(3.2) - 1.0).abs() < 1e-12);
        assert!(laser.transverse(3.2 + 5.0) < laser.transverse(3.2));
    }

    #[test]
    fn vacuum_plane_wave_has_matched_e_and_b_magnitude() {
        let laser = Laser::plane(0.2, 1.5, 0.3, 0.0, 1.0, 1.0, 1.0).unwrap();
        let (e, b) = laser.fields_at(0.5, 0.0);
        assert!((e.norm_sq() - b.norm_sq()).abs() < 1e-10);
    }
}
