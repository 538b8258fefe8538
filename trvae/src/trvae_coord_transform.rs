use candle_core::{Result, Tensor};

/// Broadcast the fixed reference grid `(m x c)` to a batch of `n`
/// per-sample copies `(n x m x c)`.
pub fn broadcast_grid(grid_mc: &Tensor, n: usize) -> Result<Tensor> {
    let (m, c) = grid_mc.dims2()?;
    grid_mc.unsqueeze(0)?.expand((n, m, c))?.contiguous()
}

/// Apply per-sample rotation and translation to a batch of coordinate
/// grids.
///
/// new = coord @ [[cos phi, sin phi], [-sin phi, cos phi]] + dx
///
/// * `coords_nmc` - per-sample grid coordinates (n x m x c)
/// * `phi_n` - rotation angle per sample (n); identity when absent
/// * `dx_nc` - translation offset per sample (n x c), already rescaled
///   by the translation prior; skipped when absent or when its absolute
///   sum is zero
pub fn transform_coordinates(
    coords_nmc: &Tensor,
    phi_n: Option<&Tensor>,
    dx_nc: Option<&Tensor>,
) -> Result<Tensor> {
    let rotated_nmc = match phi_n {
        Some(phi_n) => {
            let cos_n = phi_n.cos()?;
            let sin_n = phi_n.sin()?;
            let row1_n2 = Tensor::stack(&[&cos_n, &sin_n], 1)?;
            let row2_n2 = Tensor::stack(&[&sin_n.neg()?, &cos_n], 1)?;
            let rot_n22 = Tensor::stack(&[&row1_n2, &row2_n2], 1)?;
            coords_nmc.contiguous()?.matmul(&rot_n22)?
        }
        None => coords_nmc.clone(),
    };

    match dx_nc {
        Some(dx_nc) if dx_nc.abs()?.sum_all()?.to_scalar::<f32>()? != 0. => {
            rotated_nmc.broadcast_add(&dx_nc.unsqueeze(1)?)
        }
        _ => Ok(rotated_nmc),
    }
}
