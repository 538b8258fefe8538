use crate::trvae_aux_layers::{Nonlinearity, StackLayers};
use crate::trvae_model_traits::DecoderModuleT;
use candle_core::{Result, Tensor};
use candle_nn::{ops, Linear, Module, VarBuilder};

//////////////////////////////////
// Plain (coord = 0) generator  //
//////////////////////////////////

/// Fully-connected generator mapping a latent code straight to the
/// flattened data location parameter.
pub struct FcDecoder {
    n_features: usize,
    n_latent: usize,
    fc: StackLayers<Linear>,
    out: Linear,
    sigmoid_out: bool,
}

impl FcDecoder {
    /// Will create a new decoder module with these variables:
    ///
    /// * `nn.dec.fc.{}.weight` where {} is the layer index
    /// * `nn.dec.out.weight`
    pub fn new(
        n_features: usize,
        n_latent: usize,
        hidden_dim: usize,
        num_layers: usize,
        activation: Nonlinearity,
        sigmoid_out: bool,
        vs: VarBuilder,
    ) -> Result<Self> {
        let mut fc = StackLayers::<Linear>::new();
        let mut prev_dim = n_latent;
        for j in 0..num_layers {
            let _name = format!("nn.dec.fc.{}", j);
            fc.push_with_act(
                candle_nn::linear(prev_dim, hidden_dim, vs.pp(_name))?,
                activation,
            );
            prev_dim = hidden_dim;
        }
        let out = candle_nn::linear(prev_dim, n_features, vs.pp("nn.dec.out"))?;

        Ok(Self {
            n_features,
            n_latent,
            fc,
            out,
            sigmoid_out,
        })
    }

    fn forward(&self, z_nk: &Tensor) -> Result<Tensor> {
        let h_nl = self.fc.forward(z_nk)?;
        let loc_nd = self.out.forward(&h_nl)?;
        if self.sigmoid_out {
            ops::sigmoid(&loc_nd)
        } else {
            Ok(loc_nd)
        }
    }
}

//////////////////////////////////////
// Spatial (coord > 0) generator    //
//////////////////////////////////////

/// Coordinate-conditioned generator: every grid point is decoded from
/// the concatenation of its (transformed) coordinates with the latent
/// content code, making the output equivariant to the coordinate
/// transform rather than to the raw pixel order.
pub struct SpatialDecoder {
    n_points: usize,
    coord_channels: usize,
    n_latent: usize,
    fc: StackLayers<Linear>,
    out: Linear,
    sigmoid_out: bool,
}

impl SpatialDecoder {
    pub fn new(
        n_points: usize,
        coord_channels: usize,
        n_latent: usize,
        hidden_dim: usize,
        num_layers: usize,
        activation: Nonlinearity,
        sigmoid_out: bool,
        vs: VarBuilder,
    ) -> Result<Self> {
        let mut fc = StackLayers::<Linear>::new();
        let mut prev_dim = coord_channels + n_latent;
        for j in 0..num_layers {
            let _name = format!("nn.dec.fc.{}", j);
            fc.push_with_act(
                candle_nn::linear(prev_dim, hidden_dim, vs.pp(_name))?,
                activation,
            );
            prev_dim = hidden_dim;
        }
        let out = candle_nn::linear(prev_dim, 1, vs.pp("nn.dec.out"))?;

        Ok(Self {
            n_points,
            coord_channels,
            n_latent,
            fc,
            out,
            sigmoid_out,
        })
    }

    fn forward(&self, coords_nmc: &Tensor, z_nk: &Tensor) -> Result<Tensor> {
        let (n, m, c) = coords_nmc.dims3()?;
        debug_assert_eq!(c, self.coord_channels);
        let k = z_nk.dim(1)?;
        let z_nmk = z_nk.unsqueeze(1)?.expand((n, m, k))?.contiguous()?;
        let h_nml = Tensor::cat(&[&coords_nmc.contiguous()?, &z_nmk], 2)?;
        let h_nml = self.fc.forward(&h_nml)?;
        let loc_nm = self.out.forward(&h_nml)?.squeeze(2)?;
        if self.sigmoid_out {
            ops::sigmoid(&loc_nm)
        } else {
            Ok(loc_nm)
        }
    }
}

/// Generator network variant, fixed at construction by the invariance
/// mode: plain for coord = 0, spatial otherwise.
pub enum DecoderNet {
    Fc(FcDecoder),
    Spatial(SpatialDecoder),
}

impl DecoderModuleT for DecoderNet {
    fn forward_t(
        &self,
        coords_nmc: Option<&Tensor>,
        z_nk: &Tensor,
        _train: bool,
    ) -> Result<Tensor> {
        match self {
            DecoderNet::Fc(decoder) => decoder.forward(z_nk),
            DecoderNet::Spatial(decoder) => match coords_nmc {
                Some(coords_nmc) => decoder.forward(coords_nmc, z_nk),
                None => candle_core::bail!("spatial decoder needs grid coordinates"),
            },
        }
    }

    fn dim_obs(&self) -> usize {
        match self {
            DecoderNet::Fc(decoder) => decoder.n_features,
            DecoderNet::Spatial(decoder) => decoder.n_points,
        }
    }

    fn dim_latent(&self) -> usize {
        match self {
            DecoderNet::Fc(decoder) => decoder.n_latent,
            DecoderNet::Spatial(decoder) => decoder.n_latent,
        }
    }
}
