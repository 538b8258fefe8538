use crate::trvae_config::{DataDim, TrVaeConfig};
use crate::trvae_coord_transform::{broadcast_grid, transform_coordinates};
use crate::trvae_decoder::{DecoderNet, FcDecoder, SpatialDecoder};
use crate::trvae_encoder::FcEncoder;
use crate::trvae_grid::{latent_grid, reference_grid};
use crate::trvae_latent_split::LatentLayout;
use crate::trvae_loss_functions::{gaussian_log_prob, std_normal_log_prob};
use crate::trvae_model_traits::{DecoderModuleT, EncoderModuleT};

use candle_core::{DType, Device, Result, Tensor, Var};
use candle_nn::{VarBuilder, VarMap};
use log::debug;

/// One draw from the approximate posterior, the pairing handle between
/// `guide` and `model`: the SVI driver feeds the trace returned by
/// `guide` back into `model` so both programs share the same latent
/// sample.
pub struct GuideTrace {
    pub z_nk: Tensor,
    pub z_loc_nk: Tensor,
    pub z_scale_nk: Tensor,
    /// log q(z|x), already scaled by the KL weight
    pub log_qz_n: Tensor,
}

/// Generative-side trace: reconstruction location plus the per-sample
/// log-probability terms entering the ELBO.
pub struct ModelTrace {
    pub recon_nd: Tensor,
    /// log p(z) under the standard-normal prior, scaled by the KL weight
    pub log_pz_n: Tensor,
    /// log p(x|z) under the configured output sampler
    pub llik_n: Tensor,
}

/// Variational autoencoder with explicit rotational and/or translational
/// invariances.
///
/// The latent vector factors into geometric nuisance dimensions (per the
/// resolved [`LatentLayout`]) and a content code; the decoder sees the
/// content code together with a per-sample transformed coordinate grid,
/// so pose is explained by the transform instead of the content.
///
/// Every instance owns its parameter store (`VarMap`), so two models
/// never share or clobber each other's weights.
pub struct TrVae {
    config: TrVaeConfig,
    data_dim: DataDim,
    layout: LatentLayout,
    encoder: FcEncoder,
    decoder: DecoderNet,
    grid_mc: Tensor,
    t_prior_c: Option<Tensor>,
    varmap: VarMap,
    device: Device,
}

impl TrVae {
    pub fn new(config: TrVaeConfig, device: &Device) -> anyhow::Result<Self> {
        let data_dim = config.validate()?;
        let layout = LatentLayout::resolve(&data_dim, config.coord)?;

        if device.is_cpu() {
            debug!("cpu backend draws from the thread-local rng; seed not applied");
        } else {
            device.set_seed(config.seed)?;
        }

        let varmap = VarMap::new();
        let vs = VarBuilder::from_varmap(&varmap, DType::F32, device);

        let z_dim = config.latent_dim + layout.coord_dims();
        let encoder = FcEncoder::new(
            data_dim.num_points(),
            z_dim,
            config.hidden_dim_e,
            config.num_layers_e,
            config.activation,
            vs.pp("encoder"),
        )?;

        let n_content = config.latent_dim + config.num_classes;
        let decoder = match layout {
            LatentLayout::Plain => DecoderNet::Fc(FcDecoder::new(
                data_dim.num_points(),
                n_content,
                config.hidden_dim_d,
                config.num_layers_d,
                config.activation,
                config.sigmoid_d,
                vs.pp("decoder"),
            )?),
            _ => DecoderNet::Spatial(SpatialDecoder::new(
                data_dim.num_points(),
                data_dim.coord_channels(),
                n_content,
                config.hidden_dim_d,
                config.num_layers_d,
                config.activation,
                config.sigmoid_d,
                vs.pp("decoder"),
            )?),
        };

        let grid_mc = reference_grid(&data_dim, device)?;

        let t_prior_c = match layout {
            LatentLayout::Shift1d => Some(Tensor::from_vec(vec![config.dx_prior], 1, device)?),
            LatentLayout::Shift2d | LatentLayout::RotationShift2d => {
                let dy_prior = config.dy_prior.unwrap_or(config.dx_prior);
                Some(Tensor::from_vec(vec![config.dx_prior, dy_prior], 2, device)?)
            }
            _ => None,
        };

        Ok(Self {
            config,
            data_dim,
            layout,
            encoder,
            decoder,
            grid_mc,
            t_prior_c,
            varmap,
            device: device.clone(),
        })
    }

    pub fn z_dim(&self) -> usize {
        self.config.latent_dim + self.layout.coord_dims()
    }

    pub fn latent_dim(&self) -> usize {
        self.config.latent_dim
    }

    pub fn layout(&self) -> LatentLayout {
        self.layout
    }

    pub fn data_dim(&self) -> DataDim {
        self.data_dim
    }

    pub fn config(&self) -> &TrVaeConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn reference_grid(&self) -> &Tensor {
        &self.grid_mc
    }

    /// all trainable variables, for the optimizer
    pub fn all_vars(&self) -> Vec<Var> {
        self.varmap.all_vars()
    }

    /// The generative program p(x|z) p(z).
    ///
    /// With a guide trace the latent site replays the guide's sample
    /// (the shared-site pairing an SVI engine relies on); without one,
    /// `z` is drawn fresh from the prior. `beta` rescales the latent
    /// site's loss contribution only, never the sampled value.
    pub fn model(
        &self,
        x: &Tensor,
        y: Option<&Tensor>,
        guide: Option<&GuideTrace>,
        beta: f64,
    ) -> Result<ModelTrace> {
        let n = x.dim(0)?;

        let z_nk = match guide {
            Some(trace) => trace.z_nk.clone(),
            None => Tensor::randn(0f32, 1f32, (n, self.z_dim()), &self.device)?,
        };
        let log_pz_n = (std_normal_log_prob(&z_nk)? * beta)?;

        let (coords_nmc, content_nk) = match self.layout {
            LatentLayout::Plain => (None, z_nk),
            layout => {
                let parts = layout.split(&z_nk)?;
                let dx_nc = match (&parts.dx_nc, &self.t_prior_c) {
                    (Some(dx_nc), Some(t_prior_c)) => Some(dx_nc.broadcast_mul(t_prior_c)?),
                    _ => None,
                };
                let grid_nmc = broadcast_grid(&self.grid_mc, n)?;
                let coords_nmc =
                    transform_coordinates(&grid_nmc, parts.phi_n.as_ref(), dx_nc.as_ref())?;
                (Some(coords_nmc), parts.content_nk)
            }
        };

        let content_nk = match y {
            Some(y_nc) => Tensor::cat(&[&content_nk, y_nc], 1)?,
            None => content_nk,
        };

        let loc_nd = self
            .decoder
            .forward_t(coords_nmc.as_ref(), &content_nk, true)?;

        let x_nd = x.reshape((n, self.data_dim.num_points()))?;
        let llik_n = self.config.sampler.log_likelihood(&x_nd, &loc_nd)?;

        Ok(ModelTrace {
            recon_nd: loc_nd,
            log_pz_n,
            llik_n,
        })
    }

    /// The inference program q(z|x): encode, then draw a reparameterized
    /// sample from the diagonal normal.
    pub fn guide(&self, x: &Tensor, _y: Option<&Tensor>, beta: f64) -> Result<GuideTrace> {
        let (z_loc_nk, z_scale_nk) = self.encoder.forward_t(x, true)?;
        let eps_nk = z_loc_nk.randn_like(0., 1.)?;
        let z_nk = (&z_loc_nk + z_scale_nk.mul(&eps_nk)?)?;
        let log_qz_n = (gaussian_log_prob(&z_nk, &z_loc_nk, &z_scale_nk)? * beta)?;

        Ok(GuideTrace {
            z_nk,
            z_loc_nk,
            z_scale_nk,
            log_qz_n,
        })
    }

    /// Encode data with the trained inference network, chunk by chunk,
    /// without retaining any gradient graph.
    ///
    /// # Returns `(z_loc, z_scale)`, each `(n x z_dim)`
    pub fn encode(&self, x: &Tensor) -> Result<(Tensor, Tensor)> {
        self.encode_in_chunks(x, self.config.chunk_size)
    }

    pub fn encode_in_chunks(&self, x: &Tensor, chunk_size: usize) -> Result<(Tensor, Tensor)> {
        let n = x.dim(0)?;
        let chunk_size = chunk_size.max(1);

        let mut z_loc = Vec::with_capacity(n.div_ceil(chunk_size));
        let mut z_scale = Vec::with_capacity(n.div_ceil(chunk_size));

        let mut lb = 0;
        while lb < n {
            // the final chunk may be partial; it is processed, not dropped
            let len = chunk_size.min(n - lb);
            let x_b = x.narrow(0, lb, len)?;
            let (loc_bk, scale_bk) = self.encoder.forward_t(&x_b, false)?;
            z_loc.push(loc_bk.detach());
            z_scale.push(scale_bk.detach());
            lb += len;
        }

        Ok((Tensor::cat(&z_loc, 0)?, Tensor::cat(&z_scale, 0)?))
    }

    /// Decode latent content codes (optionally with one-hot labels
    /// appended) back to data space, chunk by chunk, gradient-free.
    /// Under an invariant layout the decoder sees the untransformed
    /// reference grid, so reconstructions come out in canonical pose.
    pub fn decode(&self, z: &Tensor, y: Option<&Tensor>) -> Result<Tensor> {
        self.decode_in_chunks(z, y, self.config.chunk_size)
    }

    pub fn decode_in_chunks(
        &self,
        z: &Tensor,
        y: Option<&Tensor>,
        chunk_size: usize,
    ) -> Result<Tensor> {
        let z_nk = match y {
            Some(y_nc) => Tensor::cat(&[z, y_nc], 1)?,
            None => z.clone(),
        };
        let n = z_nk.dim(0)?;
        let chunk_size = chunk_size.max(1);

        let mut decoded = Vec::with_capacity(n.div_ceil(chunk_size));
        let mut lb = 0;
        while lb < n {
            let len = chunk_size.min(n - lb);
            let z_bk = z_nk.narrow(0, lb, len)?;
            let coords_bmc = match self.layout {
                LatentLayout::Plain => None,
                _ => Some(broadcast_grid(&self.grid_mc, len)?),
            };
            let loc_bd = self.decoder.forward_t(coords_bmc.as_ref(), &z_bk, false)?;
            decoded.push(loc_bd.detach());
            lb += len;
        }

        let loc_nd = Tensor::cat(&decoded, 0)?;
        match self.data_dim {
            DataDim::OneD { length } => loc_nd.reshape((n, length)),
            DataDim::TwoD { height, width } => loc_nd.reshape((n, height, width)),
        }
    }

    /// Decode a `d x d` probit-spaced traversal of a two-dimensional
    /// content space, in row-major order. Deterministic given `d` and
    /// the current weights.
    pub fn manifold2d(&self, d: usize, y: Option<&Tensor>) -> anyhow::Result<Tensor> {
        if self.config.latent_dim != 2 {
            anyhow::bail!(
                "manifold2d needs a 2-dimensional content code (latent_dim = {})",
                self.config.latent_dim
            );
        }
        let z_nk = latent_grid(d, &self.device)?;
        let y_nc = match y {
            Some(y_c) => Some(
                y_c.reshape((1, self.config.num_classes))?
                    .expand((d * d, self.config.num_classes))?
                    .contiguous()?,
            ),
            None => None,
        };
        Ok(self.decode(&z_nk, y_nc.as_ref())?)
    }

    /// Saves trained weights of encoder and decoder networks
    pub fn save_weights<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        self.varmap.save(path)?;
        Ok(())
    }

    /// Loads saved weights onto the current architecture; a structural
    /// mismatch fails the whole load, nothing is partially restored
    pub fn load_weights<P: AsRef<std::path::Path>>(&mut self, path: P) -> anyhow::Result<()> {
        self.varmap.load(path)?;
        Ok(())
    }
}
