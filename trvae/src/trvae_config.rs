use crate::trvae_aux_layers::Nonlinearity;
use crate::trvae_loss_functions::OutputSampler;

/// Spatial shape of one data sample, resolved once from the raw
/// `data_dim` list at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDim {
    OneD { length: usize },
    TwoD { height: usize, width: usize },
}

impl DataDim {
    /// * `dims` - `[length]` for spectra or `[height, width]` for images
    pub fn from_slice(dims: &[usize]) -> anyhow::Result<Self> {
        match *dims {
            [length] if length > 1 => Ok(DataDim::OneD { length }),
            [height, width] if height > 1 && width > 1 => Ok(DataDim::TwoD { height, width }),
            _ => Err(anyhow::anyhow!(
                "'data_dim' must be [length] or [height, width] with every axis > 1 (got {:?})",
                dims
            )),
        }
    }

    pub fn ndim(&self) -> usize {
        match self {
            DataDim::OneD { .. } => 1,
            DataDim::TwoD { .. } => 2,
        }
    }

    /// number of spatial positions (L, or H*W)
    pub fn num_points(&self) -> usize {
        match *self {
            DataDim::OneD { length } => length,
            DataDim::TwoD { height, width } => height * width,
        }
    }

    /// number of coordinate channels per position
    pub fn coord_channels(&self) -> usize {
        self.ndim()
    }
}

/// Configuration surface of the invariant VAE.
///
/// `coord` selects which geometric nuisances are encoded as explicit
/// latent dimensions: 0 none, 1 rotation (2D) or translation (1D),
/// 2 translation (2D), 3 rotation + translation (2D). For 1D data any
/// `coord > 0` collapses to the width-1 translation mode.
///
/// Class labels are always supplied pre-encoded as one-hot rows of
/// width `num_classes`; no label conversion happens inside the model.
#[derive(Debug, Clone)]
pub struct TrVaeConfig {
    pub data_dim: Vec<usize>,
    pub latent_dim: usize,
    pub coord: usize,
    pub num_classes: usize,
    pub hidden_dim_e: usize,
    pub hidden_dim_d: usize,
    pub num_layers_e: usize,
    pub num_layers_d: usize,
    pub activation: Nonlinearity,
    pub sampler: OutputSampler,
    pub sigmoid_d: bool,
    /// translation prior scale along the first axis
    pub dx_prior: f32,
    /// translation prior scale along the second axis; falls back to `dx_prior`
    pub dy_prior: Option<f32>,
    /// chunk size used by the batch encode/decode drivers
    pub chunk_size: usize,
    pub seed: u64,
}

impl Default for TrVaeConfig {
    fn default() -> Self {
        Self {
            data_dim: vec![],
            latent_dim: 2,
            coord: 3,
            num_classes: 0,
            hidden_dim_e: 128,
            hidden_dim_d: 128,
            num_layers_e: 2,
            num_layers_d: 2,
            activation: Nonlinearity::Tanh,
            sampler: OutputSampler::Bernoulli,
            sigmoid_d: true,
            dx_prior: 0.1,
            dy_prior: None,
            chunk_size: 100,
            seed: 1,
        }
    }
}

impl TrVaeConfig {
    pub fn validate(&self) -> anyhow::Result<DataDim> {
        if self.latent_dim == 0 {
            anyhow::bail!("'latent_dim' must be positive");
        }
        if self.num_layers_e == 0 || self.num_layers_d == 0 {
            anyhow::bail!("encoder and decoder need at least one hidden layer");
        }
        DataDim::from_slice(&self.data_dim)
    }
}
