//! TOML-backed configuration, mirroring the programmatic constructor
//! arguments exposed by each module. Follows the same
//! `deny_unknown_fields` + `error-chain` idiom the reference CLI driver
//! uses for its parameter file.

use crate::grid::AxisBoundary;
use crate::laser::Laser;
use crate::smoothing::Smoothing;
use crate::species::{Boundary, DensityProfile, Species};
use crate::vecfield::Vec3;
use crate::Float;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryName {
    Periodic,
    Open,
    MovingWindow,
}

impl BoundaryName {
    fn to_axis_boundary(self) -> AxisBoundary {
        match self {
            BoundaryName::Periodic => AxisBoundary::Periodic,
            BoundaryName::Open => AxisBoundary::Open,
            BoundaryName::MovingWindow => AxisBoundary::MovingWindow,
        }
    }

    fn to_particle_boundary(self) -> crate::Result<Boundary> {
        match self {
            BoundaryName::Periodic => Ok(Boundary::Periodic),
            BoundaryName::Open => Ok(Boundary::Open),
            BoundaryName::MovingWindow => bail!(crate::ErrorKind::Configuration(
                "`moving_window` is not a valid per-particle boundary; use `periodic` or `open`"
                    .into()
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridSettings {
    pub nx: [usize; 2],
    pub box_size: [Float; 2],
    pub dt: Float,
    pub boundary: [BoundaryName; 2],
}

impl GridSettings {
    pub fn dx(&self) -> [Float; 2] {
        [
            self.box_size[0] / self.nx[0] as Float,
            self.box_size[1] / self.nx[1] as Float,
        ]
    }

    pub fn boundary(&self) -> [AxisBoundary; 2] {
        [self.boundary[0].to_axis_boundary(), self.boundary[1].to_axis_boundary()]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DensitySettings {
    Uniform { n: Float },
    Step { n: Float, start: Float },
    Slab { n: Float, start: Float, end: Float },
    Ramp { n: Float, start: Float, end: Float, ramp: Float },
}

impl DensitySettings {
    pub fn build(&self) -> DensityProfile {
        match *self {
            DensitySettings::Uniform { n } => DensityProfile::Uniform { n },
            DensitySettings::Step { n, start } => DensityProfile::Step { n, start },
            DensitySettings::Slab { n, start, end } => DensityProfile::Slab { n, start, end },
            DensitySettings::Ramp { n, start, end, ramp } => {
                DensityProfile::Ramp { n, start, end, ramp }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpeciesSettings {
    pub name: String,
    pub m_q: Float,
    pub charge: Float,
    pub ppc: [usize; 2],
    #[serde(default)]
    pub ufl: [Float; 3],
    #[serde(default)]
    pub uth: [Float; 3],
    pub density: DensitySettings,
    #[serde(default = "default_species_boundary")]
    pub boundary: [BoundaryName; 2],
    #[serde(default)]
    pub n_sort: u64,
}

fn default_species_boundary() -> [BoundaryName; 2] {
    [BoundaryName::Periodic, BoundaryName::Periodic]
}

impl SpeciesSettings {
    pub fn build(&self) -> crate::Result<Species> {
        let mut species = Species::new(
            self.name.clone(),
            self.m_q,
            self.charge,
            self.ppc,
            Vec3::new(self.ufl[0], self.ufl[1], self.ufl[2]),
            Vec3::new(self.uth[0], self.uth[1], self.uth[2]),
            self.density.build(),
        )?;
        species.boundary = [
            self.boundary[0].to_particle_boundary()?,
            self.boundary[1].to_particle_boundary()?,
        ];
        species.n_sort = self.n_sort;
        Ok(species)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "profile", rename_all = "lowercase")]
pub enum LaserSettings {
    Plane {
        a0: Float,
        omega0: Float,
        #[serde(default)]
        polarization: Float,
        #[serde(default)]
        start: Float,
        rise: Float,
        flat: Float,
        fall: Float,
    },
    PlaneFwhm {
        a0: Float,
        omega0: Float,
        #[serde(default)]
        polarization: Float,
        #[serde(default)]
        start: Float,
        fwhm: Float,
    },
    Gaussian {
        a0: Float,
        omega0: Float,
        #[serde(default)]
        polarization: Float,
        #[serde(default)]
        start: Float,
        rise: Float,
        flat: Float,
        fall: Float,
        w0: Float,
        focus: Float,
    },
}

impl LaserSettings {
    pub fn build(&self) -> crate::Result<Laser> {
        match *self {
            LaserSettings::Plane {
                a0,
                omega0,
                polarization,
                start,
                rise,
                flat,
                fall,
            } => Laser::plane(a0, omega0, polarization, start, rise, flat, fall),
            LaserSettings::PlaneFwhm {
                a0,
                omega0,
                polarization,
                start,
                fwhm,
            } => Laser::plane_fwhm(a0, omega0, polarization, start, fwhm),
            LaserSettings::Gaussian {
                a0,
                omega0,
                polarization,
                start,
                rise,
                flat,
                fall,
                w0,
                focus,
            } => Laser::gaussian(a0, omega0, polarization, start, rise, flat, fall, w0, focus),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmoothingSettings {
    #[serde(default)]
    pub xlevel: u32,
    #[serde(default)]
    pub ylevel: u32,
    #[serde(default)]
    pub compensated: bool,
}

impl SmoothingSettings {
    pub fn build(&self) -> Smoothing {
        Smoothing {
            xlevel: self.xlevel,
            ylevel: self.ylevel,
            compensated: self.compensated,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentSettings {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    pub seed: [u32; 2],
    #[serde(default)]
    pub n_steps: u64,
}

fn default_prefix() -> String {
    "zigzag-pic".to_string()
}

/// Top-level simulation configuration, one TOML file per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub grid: GridSettings,
    pub species: Vec<SpeciesSettings>,
    #[serde(default)]
    pub laser: Vec<LaserSettings>,
    #[serde(default)]
    pub smoothing: SmoothingSettings,
    #[serde(default)]
    pub moving_window: bool,
    pub environment: EnvironmentSettings,
}

impl Settings {
    pub fn from_str(toml_string: &str) -> crate::Result<Settings> {
        let settings: Settings = toml::from_str(toml_string)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn read_parameter_file(path: &str) -> crate::Result<Settings> {
        let mut file = File::open(path)?;
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        Settings::from_str(&content)
    }

    fn validate(&self) -> crate::Result<()> {
        if self.grid.nx[0] < 2 || self.grid.nx[1] < 2 {
            bail!(crate::ErrorKind::Configuration(
                "grid.nx must be at least 2 on each axis".into()
            ));
        }
        if self.grid.box_size[0] <= 0.0 || self.grid.box_size[1] <= 0.0 {
            bail!(crate::ErrorKind::Configuration(
                "grid.box_size must be positive on each axis".into()
            ));
        }
        if self.grid.dt <= 0.0 {
            bail!(crate::ErrorKind::Configuration("grid.dt must be positive".into()));
        }
        if self.species.is_empty() {
            bail!(crate::ErrorKind::Configuration(
                "at least one species must be configured".into()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [grid]
        nx = [16, 16]
        box_size = [1.6, 1.6]
        dt = 0.05
        boundary = ["periodic", "periodic"]

        [[species]]
        name = "electrons"
        m_q = 1.0
        charge = -1.0
        ppc = [2, 2]

        [species.density]
        kind = "uniform"
        n = 1.0

        [environment]
        seed = [1, 2]
        n_steps = 100
    "#;

    #[test]
    fn parses_a_minimal_configuration() {
        let settings = Settings::from_str(MINIMAL).unwrap();
        assert_eq!(settings.species.len(), 1);
        assert_eq!(settings.grid.nx, [16, 16]);
        assert_eq!(settings.environment.n_steps, 100);
    }

    #[test]
    fn rejects_unknown_fields() {
        let bad = MINIMAL.replace("[environment]", "[environment]\nbogus = 1");
        assert!(Settings::from_str(&bad).is_err());
    }

    #[test]
    fn rejects_empty_species_list() {
        const NO_SPECIES: &str = r#"
            [grid]
            nx = [16, 16]
            box_size = [1.6, 1.6]
            dt = 0.05
            boundary = ["periodic", "periodic"]

            [environment]
            seed = [1, 2]
        "#;
        assert!(Settings::from_str(NO_SPECIES).is_err());
    }

    #[test]
    fn species_builds_into_a_working_species() {
        let settings = Settings::from_str(MINIMAL).unwrap();
        let species = settings.species[0].build().unwrap();
        assert_eq!(species.name, "electrons");
    }
}
