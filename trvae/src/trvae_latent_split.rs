use crate::trvae_config::DataDim;
use candle_core::{Result, Tensor};
use log::info;

/// Latent decomposition mode, resolved once at construction from the
/// data dimensionality and the requested `coord` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatentLayout {
    /// vanilla VAE, no geometric part
    Plain,
    /// 1D translation: `dx = z[:, 0:1]`
    Shift1d,
    /// 2D rotation: `phi = z[:, 0]`
    Rotation,
    /// 2D translation: `dx = z[:, 0:2]`
    Shift2d,
    /// 2D rotation + translation: `phi = z[:, 0]`, `dx = z[:, 1:3]`
    RotationShift2d,
}

/// Geometric and content slices of a sampled latent batch.
pub struct LatentParts {
    pub phi_n: Option<Tensor>,
    pub dx_nc: Option<Tensor>,
    pub content_nk: Tensor,
}

impl LatentLayout {
    pub fn resolve(data_dim: &DataDim, coord: usize) -> anyhow::Result<Self> {
        if coord > 3 {
            anyhow::bail!("'coord' must be 0, 1, 2 or 3 (got {})", coord);
        }
        Ok(match (data_dim.ndim(), coord) {
            (_, 0) => LatentLayout::Plain,
            (1, requested) => {
                if requested > 1 {
                    info!(
                        "1D data supports translation only; coord {} collapsed to 1",
                        requested
                    );
                }
                LatentLayout::Shift1d
            }
            (_, 1) => LatentLayout::Rotation,
            (_, 2) => LatentLayout::Shift2d,
            _ => LatentLayout::RotationShift2d,
        })
    }

    /// number of leading latent dimensions reserved for geometry
    pub fn coord_dims(&self) -> usize {
        match self {
            LatentLayout::Plain => 0,
            LatentLayout::Shift1d | LatentLayout::Rotation => 1,
            LatentLayout::Shift2d => 2,
            LatentLayout::RotationShift2d => 3,
        }
    }

    /// Split `z_nk` into rotation angle, translation offset, and content
    /// code. Pure slicing; the widths always add up to `z_dim`.
    pub fn split(&self, z_nk: &Tensor) -> Result<LatentParts> {
        let z_dim = z_nk.dim(1)?;
        let rest = z_dim - self.coord_dims();
        let parts = match self {
            LatentLayout::Plain => LatentParts {
                phi_n: None,
                dx_nc: None,
                content_nk: z_nk.clone(),
            },
            LatentLayout::Shift1d => LatentParts {
                phi_n: None,
                dx_nc: Some(z_nk.narrow(1, 0, 1)?),
                content_nk: z_nk.narrow(1, 1, rest)?,
            },
            LatentLayout::Rotation => LatentParts {
                phi_n: Some(z_nk.narrow(1, 0, 1)?.squeeze(1)?),
                dx_nc: None,
                content_nk: z_nk.narrow(1, 1, rest)?,
            },
            LatentLayout::Shift2d => LatentParts {
                phi_n: None,
                dx_nc: Some(z_nk.narrow(1, 0, 2)?),
                content_nk: z_nk.narrow(1, 2, rest)?,
            },
            LatentLayout::RotationShift2d => LatentParts {
                phi_n: Some(z_nk.narrow(1, 0, 1)?.squeeze(1)?),
                dx_nc: Some(z_nk.narrow(1, 1, 2)?),
                content_nk: z_nk.narrow(1, 3, rest)?,
            },
        };
        Ok(parts)
    }
}
