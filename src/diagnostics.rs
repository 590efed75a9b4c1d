//! Diagnostics output through a narrow writer interface.
//!
//! The on-disk format ("ZDF") is self-describing: a magic header, a
//! version, the iteration/time the record was taken at, per-axis label/
//! units/range metadata, a data type and shape, then a raw little-endian
//! `f32` payload. The exact byte layout is this crate's own concern; what
//! matters for callers is the narrow [`ZdfWriter`] trait.

use crate::species::Species;
use crate::Float;
use ndarray::Array2;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

const MAGIC: &[u8; 4] = b"ZDF1";
const FORMAT_VERSION: u32 = 1;

/// Label, units and sampled range for one axis of a grid or histogram
/// record.
#[derive(Debug, Clone)]
pub struct AxisMeta {
    pub label: String,
    pub units: String,
    pub min: Float,
    pub max: Float,
}

impl AxisMeta {
    pub fn new(label: impl Into<String>, units: impl Into<String>, min: Float, max: Float) -> AxisMeta {
        AxisMeta {
            label: label.into(),
            units: units.into(),
            min,
            max,
        }
    }
}

/// Narrow interface every diagnostic record is emitted through. Callers
/// depend only on this trait, never on the concrete on-disk layout.
pub trait ZdfWriter {
    fn write_grid(
        &mut self,
        name: &str,
        iteration: u64,
        time: Float,
        data: &Array2<Float>,
        axes: &[AxisMeta; 2],
    ) -> crate::Result<()>;

    fn write_vector_grid(
        &mut self,
        name: &str,
        iteration: u64,
        time: Float,
        component: usize,
        data: &Array2<Float>,
        axes: &[AxisMeta; 2],
    ) -> crate::Result<()>;

    fn write_particles(&mut self, name: &str, iteration: u64, time: Float, species: &Species) -> crate::Result<()>;

    fn write_phasespace(
        &mut self,
        name: &str,
        iteration: u64,
        time: Float,
        hist: &Array2<Float>,
        axes: &[AxisMeta; 2],
    ) -> crate::Result<()>;
}

/// Discards every record. Useful when diagnostics are disabled or for
/// tests that only care about simulation state.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWriter;

impl ZdfWriter for NullWriter {
    fn write_grid(&mut self, _: &str, _: u64, _: Float, _: &Array2<Float>, _: &[AxisMeta; 2]) -> crate::Result<()> {
        Ok(())
    }

    fn write_vector_grid(
        &mut self,
        _: &str,
        _: u64,
        _: Float,
        _: usize,
        _: &Array2<Float>,
        _: &[AxisMeta; 2],
    ) -> crate::Result<()> {
        Ok(())
    }

    fn write_particles(&mut self, _: &str, _: u64, _: Float, _: &Species) -> crate::Result<()> {
        Ok(())
    }

    fn write_phasespace(&mut self, _: &str, _: u64, _: Float, _: &Array2<Float>, _: &[AxisMeta; 2]) -> crate::Result<()> {
        Ok(())
    }
}

/// Writes each record to its own file under a fixed output directory, in
/// the ZDF-like format described above. A failure here is surfaced to the
/// caller without touching simulation state.
pub struct ZdfFileWriter {
    dir: PathBuf,
}

impl ZdfFileWriter {
    pub fn new(dir: impl Into<PathBuf>) -> crate::Result<ZdfFileWriter> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(ZdfFileWriter { dir })
    }

    fn create(&self, name: &str, iteration: u64) -> crate::Result<File> {
        let path = self.dir.join(format!("{}-{:06}.zdf", name, iteration));
        Ok(File::create(path)?)
    }

    fn write_preamble(w: &mut File, iteration: u64, time: Float) -> crate::Result<()> {
        w.write_all(MAGIC)?;
        w.write_all(&FORMAT_VERSION.to_le_bytes())?;
        w.write_all(&iteration.to_le_bytes())?;
        w.write_all(&(time as f64).to_le_bytes())?;
        Ok(())
    }

    fn write_axis(w: &mut File, axis: &AxisMeta) -> crate::Result<()> {
        write_string(w, &axis.label)?;
        write_string(w, &axis.units)?;
        w.write_all(&(axis.min as f64).to_le_bytes())?;
        w.write_all(&(axis.max as f64).to_le_bytes())?;
        Ok(())
    }

    fn write_shape(w: &mut File, shape: &[usize]) -> crate::Result<()> {
        w.write_all(&(shape.len() as u32).to_le_bytes())?;
        for &d in shape {
            w.write_all(&(d as u32).to_le_bytes())?;
        }
        Ok(())
    }

    fn write_f32_payload(w: &mut File, data: impl Iterator<Item = Float>) -> crate::Result<()> {
        for v in data {
            w.write_all(&(v as f32).to_le_bytes())?;
        }
        Ok(())
    }
}

fn write_string(w: &mut File, s: &str) -> crate::Result<()> {
    w.write_all(&(s.len() as u32).to_le_bytes())?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

impl ZdfWriter for ZdfFileWriter {
    fn write_grid(
        &mut self,
        name: &str,
        iteration: u64,
        time: Float,
        data: &Array2<Float>,
        axes: &[AxisMeta; 2],
    ) -> crate::Result<()> {
        let mut f = self.create(name, iteration)?;
        Self::write_preamble(&mut f, iteration, time)?;
        write_string(&mut f, "scalar_grid")?;
        Self::write_axis(&mut f, &axes[0])?;
        Self::write_axis(&mut f, &axes[1])?;
        Self::write_shape(&mut f, data.shape())?;
        Self::write_f32_payload(&mut f, data.iter().copied())?;
        Ok(())
    }

    fn write_vector_grid(
        &mut self,
        name: &str,
        iteration: u64,
        time: Float,
        component: usize,
        data: &Array2<Float>,
        axes: &[AxisMeta; 2],
    ) -> crate::Result<()> {
        let mut f = self.create(name, iteration)?;
        Self::write_preamble(&mut f, iteration, time)?;
        write_string(&mut f, "vector_grid")?;
        f.write_all(&(component as u32).to_le_bytes())?;
        Self::write_axis(&mut f, &axes[0])?;
        Self::write_axis(&mut f, &axes[1])?;
        Self::write_shape(&mut f, data.shape())?;
        Self::write_f32_payload(&mut f, data.iter().copied())?;
        Ok(())
    }

    fn write_particles(&mut self, name: &str, iteration: u64, time: Float, species: &Species) -> crate::Result<()> {
        let mut f = self.create(name, iteration)?;
        Self::write_preamble(&mut f, iteration, time)?;
        write_string(&mut f, "particles")?;
        let live: Vec<_> = species.particles.iter().filter(|p| p.is_live()).collect();
        f.write_all(&(live.len() as u64).to_le_bytes())?;
        for p in &live {
            Self::write_f32_payload(
                &mut f,
                [
                    p.ix as Float + p.x,
                    p.iy as Float + p.y,
                    p.ux,
                    p.uy,
                    p.uz,
                ]
                .into_iter(),
            )?;
        }
        Ok(())
    }

    fn write_phasespace(
        &mut self,
        name: &str,
        iteration: u64,
        time: Float,
        hist: &Array2<Float>,
        axes: &[AxisMeta; 2],
    ) -> crate::Result<()> {
        let mut f = self.create(name, iteration)?;
        Self::write_preamble(&mut f, iteration, time)?;
        write_string(&mut f, "phasespace")?;
        Self::write_axis(&mut f, &axes[0])?;
        Self::write_axis(&mut f, &axes[1])?;
        Self::write_shape(&mut f, hist.shape())?;
        Self::write_f32_payload(&mut f, hist.iter().copied())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_writer_never_fails() {
        let mut w = NullWriter;
        let axes = [AxisMeta::new("x", "c/omega0", 0.0, 1.0), AxisMeta::new("y", "c/omega0", 0.0, 1.0)];
        let grid = Array2::<Float>::zeros((2, 2));
        assert!(w.write_grid("ex", 0, 0.0, &grid, &axes).is_ok());
    }

    #[test]
    fn file_writer_creates_a_record_per_call() {
        let tmp = std::env::temp_dir().join(format!("zigzag-pic-test-{:?}", std::thread::current().id()));
        let mut w = ZdfFileWriter::new(&tmp).unwrap();
        let axes = [AxisMeta::new("x", "c/omega0", 0.0, 1.0), AxisMeta::new("y", "c/omega0", 0.0, 1.0)];
        let grid = Array2::<Float>::zeros((3, 3));
        w.write_grid("ex", 7, 0.35, &grid, &axes).unwrap();
        let path = tmp.join("ex-000007.zdf");
        assert!(path.exists());
        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], MAGIC);
        fs::remove_dir_all(&tmp).ok();
    }
}
