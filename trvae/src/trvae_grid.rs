use crate::trvae_config::DataDim;
use candle_core::{Device, Result, Tensor};
use special::Error;

/// Reference grid of normalized spatial coordinates in `[-1, 1]`.
///
/// * 2D: `(H*W, 2)` mesh in row-major order, first column running along
///   the height axis
/// * 1D: `(L, 1)` positions
///
/// Pure function of `data_dim`; the model computes it once and keeps it
/// immutable afterwards.
pub fn reference_grid(data_dim: &DataDim, device: &Device) -> Result<Tensor> {
    match *data_dim {
        DataDim::OneD { length } => {
            Tensor::from_vec(linspace(-1., 1., length), (length, 1), device)
        }
        DataDim::TwoD { height, width } => {
            let xs = linspace(-1., 1., height);
            let ys = linspace(-1., 1., width);
            let mut buf = Vec::with_capacity(height * width * 2);
            for &x in xs.iter() {
                for &y in ys.iter() {
                    buf.push(x);
                    buf.push(y);
                }
            }
            Tensor::from_vec(buf, (height * width, 2), device)
        }
    }
}

/// `d x d` grid of 2D latent points placed at probit values of evenly
/// spaced quantiles in `[0.05, 0.95]`, row-major over the two axes.
pub fn latent_grid(d: usize, device: &Device) -> Result<Tensor> {
    let quantiles: Vec<f64> = linspace(0.05, 0.95, d).iter().map(|&p| p as f64).collect();
    let probits: Vec<f32> = quantiles.iter().map(|&p| probit(p) as f32).collect();
    let mut buf = Vec::with_capacity(d * d * 2);
    for &gx in probits.iter() {
        for &gy in probits.iter() {
            buf.push(gx);
            buf.push(gy);
        }
    }
    Tensor::from_vec(buf, (d * d, 2), device)
}

/// Inverse standard-normal CDF via the inverse error function.
pub fn probit(p: f64) -> f64 {
    std::f64::consts::SQRT_2 * (2. * p - 1.).inv_error()
}

fn linspace(start: f32, stop: f32, steps: usize) -> Vec<f32> {
    if steps < 2 {
        return vec![start; steps];
    }
    let delta = (stop - start) / (steps - 1) as f32;
    (0..steps).map(|i| start + delta * i as f32).collect()
}
