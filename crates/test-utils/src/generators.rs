//! Generators for synthetic UCLALES-style block output.
//!
//! The LES writes one NetCDF file per process, each covering a rectangular
//! sub-domain of the horizontal grid. [`LesRun`] writes a complete set of such
//! files with predictable values, so tests can check that reassembled domains
//! contain exactly what the blocks held.
//!
//! Every gridded value is a function of its global position, see
//! [`block_value`]. After reassembly, the value at global cell `(gx, gy)`
//! must equal `block_value(t, gx, gy, z)` no matter which block it came from.

use std::path::{Path, PathBuf};

/// Horizontal grid spacing of the synthetic runs (metres).
pub const DX: f64 = 25.0;

/// Vertical grid spacing of the synthetic runs (metres).
pub const DZ: f64 = 10.0;

/// Value of a volumetric field at time index `t`, global cell `(gx, gy)` and level `z`.
///
/// Exactly representable as `f32` for the grid sizes used in tests.
///
/// # Example
///
/// ```
/// use test_utils::block_value;
///
/// assert_eq!(block_value(0, 0, 0, 0), 0.0);
/// assert_eq!(block_value(1, 2, 3, 1), 1_002_003.5);
/// ```
pub fn block_value(t: usize, gx: usize, gy: usize, z: usize) -> f32 {
    (t * 1_000_000 + gx * 1000 + gy) as f32 + z as f32 * 0.5
}

/// Value of a 2D cross-section field at time index `t` and global cell `(gx, gy)`.
pub fn surface_value(t: usize, gx: usize, gy: usize) -> f32 {
    (t * 1_000_000 + gx * 1000 + gy) as f32
}

/// Value of the per-block scalar diagnostic of block `(i, j)`.
pub fn block_scalar(t: usize, i: usize, j: usize) -> f32 {
    (t * 100 + i * 10 + j) as f32
}

/// Cell-centre coordinate of global index `g`.
pub fn centre_coordinate(g: usize) -> f64 {
    DX * (g as f64 + 0.5)
}

/// Cell-face coordinate of global index `g`.
pub fn face_coordinate(g: usize) -> f64 {
    DX * (g as f64 + 1.0)
}

/// A synthetic LES run: a grid of `nx × ny` blocks of `block_nx × block_ny` cells.
///
/// 3D block files hold `w(time, xt, yt, zm)`, `q(time, xt, yt, zt)` and
/// `u(time, xm, yt, zt)`; 2D cross-section files hold `lwp(time, xt, yt)` and
/// the per-block scalar `lcl(time)`.
#[derive(Debug, Clone)]
pub struct LesRun {
    pub prefix: String,
    pub nx: usize,
    pub ny: usize,
    pub block_nx: usize,
    pub block_ny: usize,
    pub nz: usize,
    pub nt: usize,
}

impl LesRun {
    pub fn new(prefix: &str, nx: usize, ny: usize, block_nx: usize, block_ny: usize) -> Self {
        Self {
            prefix: prefix.to_string(),
            nx,
            ny,
            block_nx,
            block_ny,
            nz: 3,
            nt: 2,
        }
    }

    pub fn with_levels(mut self, nz: usize) -> Self {
        self.nz = nz;
        self
    }

    pub fn with_timesteps(mut self, nt: usize) -> Self {
        self.nt = nt;
        self
    }

    /// Path of 3D block `(i, j)` inside `dir`.
    pub fn block_path_3d(&self, dir: &Path, i: usize, j: usize) -> PathBuf {
        dir.join(format!("{}.{:04}{:04}.nc", self.prefix, i, j))
    }

    /// Path of 2D cross-section block `(i, j)` inside `dir`.
    pub fn block_path_2d(&self, dir: &Path, orientation: &str, i: usize, j: usize) -> PathBuf {
        dir.join(format!(
            "{}.out.{}.{:04}.{:04}.nc",
            self.prefix, orientation, i, j
        ))
    }

    /// Write every 3D block of the run into `dir`.
    pub fn write_3d(&self, dir: &Path) -> Vec<PathBuf> {
        self.blocks()
            .map(|(i, j)| {
                let path = self.block_path_3d(dir, i, j);
                self.write_3d_block(&path, i, j);
                path
            })
            .collect()
    }

    /// Write every 2D cross-section block of the run into `dir`.
    pub fn write_2d(&self, dir: &Path, orientation: &str) -> Vec<PathBuf> {
        self.blocks()
            .map(|(i, j)| {
                let path = self.block_path_2d(dir, orientation, i, j);
                self.write_2d_block(&path, i, j);
                path
            })
            .collect()
    }

    pub fn write_3d_block(&self, path: &Path, i: usize, j: usize) {
        self.write_3d_block_sized(path, i, j, self.block_nx, self.block_ny);
    }

    /// Write 3D block `(i, j)` with a non-standard extent, e.g. to simulate a
    /// truncated process output.
    pub fn write_3d_block_sized(
        &self,
        path: &Path,
        i: usize,
        j: usize,
        block_nx: usize,
        block_ny: usize,
    ) {
        let x0 = i * self.block_nx;
        let y0 = j * self.block_ny;

        let mut file = netcdf::create(path).expect("Failed to create block file");
        self.add_horizontal(&mut file, x0, y0, block_nx, block_ny);
        add_dimension_coordinate(
            &mut file,
            "zt",
            (0..self.nz).map(|z| DZ * (z as f64 + 0.5)).collect(),
            "m",
        );
        add_dimension_coordinate(
            &mut file,
            "zm",
            (0..self.nz).map(|z| DZ * (z as f64 + 1.0)).collect(),
            "m",
        );

        let volumetric = |offset: f32| {
            let mut data = Vec::with_capacity(self.nt * block_nx * block_ny * self.nz);
            for t in 0..self.nt {
                for lx in 0..block_nx {
                    for ly in 0..block_ny {
                        for z in 0..self.nz {
                            data.push(block_value(t, x0 + lx, y0 + ly, z) + offset);
                        }
                    }
                }
            }
            data
        };

        add_data_variable(&mut file, "w", &["time", "xt", "yt", "zm"], &volumetric(0.0), "m/s");
        add_data_variable(&mut file, "q", &["time", "xt", "yt", "zt"], &volumetric(0.25), "kg/kg");
        add_data_variable(&mut file, "u", &["time", "xm", "yt", "zt"], &volumetric(0.125), "m/s");
    }

    pub fn write_2d_block(&self, path: &Path, i: usize, j: usize) {
        let x0 = i * self.block_nx;
        let y0 = j * self.block_ny;

        let mut file = netcdf::create(path).expect("Failed to create block file");
        self.add_horizontal(&mut file, x0, y0, self.block_nx, self.block_ny);

        let mut lwp = Vec::with_capacity(self.nt * self.block_nx * self.block_ny);
        for t in 0..self.nt {
            for lx in 0..self.block_nx {
                for ly in 0..self.block_ny {
                    lwp.push(surface_value(t, x0 + lx, y0 + ly));
                }
            }
        }
        add_data_variable(&mut file, "lwp", &["time", "xt", "yt"], &lwp, "kg/m^2");

        let lcl: Vec<f32> = (0..self.nt).map(|t| block_scalar(t, i, j)).collect();
        add_data_variable(&mut file, "lcl", &["time"], &lcl, "m");
    }

    fn blocks(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.nx).flat_map(move |i| (0..self.ny).map(move |j| (i, j)))
    }

    fn add_horizontal(
        &self,
        file: &mut netcdf::FileMut,
        x0: usize,
        y0: usize,
        block_nx: usize,
        block_ny: usize,
    ) {
        add_dimension_coordinate(
            file,
            "time",
            (0..self.nt).map(|t| 60.0 * (t as f64 + 1.0)).collect(),
            "s",
        );
        add_dimension_coordinate(file, "xt", (x0..x0 + block_nx).map(centre_coordinate).collect(), "m");
        add_dimension_coordinate(file, "xm", (x0..x0 + block_nx).map(face_coordinate).collect(), "m");
        add_dimension_coordinate(file, "yt", (y0..y0 + block_ny).map(centre_coordinate).collect(), "m");
        add_dimension_coordinate(file, "ym", (y0..y0 + block_ny).map(face_coordinate).collect(), "m");
    }
}

fn add_dimension_coordinate(file: &mut netcdf::FileMut, name: &str, values: Vec<f64>, units: &str) {
    file.add_dimension(name, values.len())
        .expect("Failed to add dimension");
    let mut var = file
        .add_variable::<f64>(name, &[name])
        .expect("Failed to add coordinate variable");
    var.put_attribute("units", units)
        .expect("Failed to write units");
    var.put_values(&values, ..)
        .expect("Failed to write coordinate values");
}

fn add_data_variable(file: &mut netcdf::FileMut, name: &str, dims: &[&str], data: &[f32], units: &str) {
    let mut var = file
        .add_variable::<f32>(name, dims)
        .expect("Failed to add data variable");
    var.put_attribute("units", units)
        .expect("Failed to write units");
    var.put_attribute("longname", format!("synthetic {}", name))
        .expect("Failed to write longname");
    var.put_values(data, ..)
        .expect("Failed to write data values");
}
