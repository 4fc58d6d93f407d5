use crate::{Error, Result};
use ndarray::{Array2, Axis};
use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Centered, unitary 2-D FFT pair over zero-frequency-centered grids.
///
/// Both directions apply ifftshift, the per-axis transform, fftshift,
/// and a 1/sqrt(N) scale per axis, so `inverse(forward(x)) == x` up to
/// floating-point noise.
pub struct CenteredFft2 {
    nx: usize,
    ny: usize,
    fwd_x: Arc<dyn Fft<f32>>,
    fwd_y: Arc<dyn Fft<f32>>,
    inv_x: Arc<dyn Fft<f32>>,
    inv_y: Arc<dyn Fft<f32>>,
}

impl CenteredFft2 {
    pub fn new(nx: usize, ny: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            nx,
            ny,
            fwd_x: planner.plan_fft_forward(nx),
            fwd_y: planner.plan_fft_forward(ny),
            inv_x: planner.plan_fft_inverse(nx),
            inv_y: planner.plan_fft_inverse(ny),
        }
    }

    pub fn forward(&self, grid: &mut Array2<Complex32>) -> Result<()> {
        self.check_shape(grid)?;
        ifftshift2(grid);
        transform_axis(grid, Axis(0), &self.fwd_x);
        transform_axis(grid, Axis(1), &self.fwd_y);
        fftshift2(grid);
        self.rescale(grid);
        Ok(())
    }

    pub fn inverse(&self, grid: &mut Array2<Complex32>) -> Result<()> {
        self.check_shape(grid)?;
        ifftshift2(grid);
        transform_axis(grid, Axis(0), &self.inv_x);
        transform_axis(grid, Axis(1), &self.inv_y);
        fftshift2(grid);
        self.rescale(grid);
        Ok(())
    }

    fn check_shape(&self, grid: &Array2<Complex32>) -> Result<()> {
        if grid.dim() != (self.nx, self.ny) {
            return Err(Error::Dimension(format!(
                "grid is {:?}, transform planned for ({}, {})",
                grid.dim(),
                self.nx,
                self.ny
            )));
        }
        Ok(())
    }

    fn rescale(&self, grid: &mut Array2<Complex32>) {
        let scale = 1.0 / ((self.nx * self.ny) as f32).sqrt();
        grid.mapv_inplace(|z| z * scale);
    }
}

fn transform_axis(grid: &mut Array2<Complex32>, axis: Axis, plan: &Arc<dyn Fft<f32>>) {
    for mut lane in grid.lanes_mut(axis) {
        let mut line: Vec<Complex32> = lane.iter().copied().collect();
        plan.process(&mut line);
        for (dst, src) in lane.iter_mut().zip(line) {
            *dst = src;
        }
    }
}

fn shift_axis(grid: &mut Array2<Complex32>, axis: Axis, toward_origin: bool) {
    let half = grid.len_of(axis) / 2;
    if half == 0 {
        return;
    }
    for mut lane in grid.lanes_mut(axis) {
        let mut line: Vec<Complex32> = lane.iter().copied().collect();
        if toward_origin {
            line.rotate_left(half);
        } else {
            line.rotate_right(half);
        }
        for (dst, src) in lane.iter_mut().zip(line) {
            *dst = src;
        }
    }
}

/// Moves the zero-frequency sample from index 0 to the grid center.
fn fftshift2(grid: &mut Array2<Complex32>) {
    shift_axis(grid, Axis(0), false);
    shift_axis(grid, Axis(1), false);
}

/// Inverse of `fftshift2`; identical for even lengths, off by one for odd.
fn ifftshift2(grid: &mut Array2<Complex32>) {
    shift_axis(grid, Axis(0), true);
    shift_axis(grid, Axis(1), true);
}
