use crate::trvae_aux_layers::{softplus, Nonlinearity, StackLayers};
use crate::trvae_model_traits::EncoderModuleT;
use candle_core::{Result, Tensor};
use candle_nn::{Linear, Module, VarBuilder};

/// Fully-connected inference network producing the location and scale
/// of the approximate posterior q(z|x).
pub struct FcEncoder {
    n_features: usize,
    z_dim: usize,
    fc: StackLayers<Linear>,
    z_loc: Linear,
    z_scale: Linear,
}

impl FcEncoder {
    /// Will create a new encoder module with these variables:
    ///
    /// * `nn.enc.fc.{}.weight` where {} is the layer index
    /// * `nn.enc.z.loc.weight`
    /// * `nn.enc.z.scale.weight`
    pub fn new(
        n_features: usize,
        z_dim: usize,
        hidden_dim: usize,
        num_layers: usize,
        activation: Nonlinearity,
        vs: VarBuilder,
    ) -> Result<Self> {
        let mut fc = StackLayers::<Linear>::new();
        let mut prev_dim = n_features;
        for j in 0..num_layers {
            let _name = format!("nn.enc.fc.{}", j);
            fc.push_with_act(
                candle_nn::linear(prev_dim, hidden_dim, vs.pp(_name))?,
                activation,
            );
            prev_dim = hidden_dim;
        }

        let z_loc = candle_nn::linear(prev_dim, z_dim, vs.pp("nn.enc.z.loc"))?;
        let z_scale = candle_nn::linear(prev_dim, z_dim, vs.pp("nn.enc.z.scale"))?;

        Ok(Self {
            n_features,
            z_dim,
            fc,
            z_loc,
            z_scale,
        })
    }
}

impl EncoderModuleT for FcEncoder {
    fn forward_t(&self, x_nd: &Tensor, _train: bool) -> Result<(Tensor, Tensor)> {
        let n = x_nd.dim(0)?;
        let h_nl = self.fc.forward(&x_nd.reshape((n, self.n_features))?)?;
        let z_loc_nk = self.z_loc.forward(&h_nl)?;
        // softplus keeps the scale positive; the floor keeps log q finite
        let z_scale_nk = softplus(&self.z_scale.forward(&h_nl)?)?.clamp(1e-5, f64::INFINITY)?;
        Ok((z_loc_nk, z_scale_nk))
    }

    fn dim_obs(&self) -> usize {
        self.n_features
    }

    fn dim_latent(&self) -> usize {
        self.z_dim
    }
}
