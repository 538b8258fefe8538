use candle_core::{Result, Tensor};

pub trait EncoderModuleT {
    /// An inference network that maps observations to the parameters of
    /// a diagonal-normal posterior
    ///
    /// # Arguments
    /// * `x_nd` - input data (n x d), or (n x H x W) to be flattened
    /// * `train` - whether gradients will flow through the call
    ///
    /// # Returns `(z_loc_nk, z_scale_nk)`
    /// * `z_loc_nk` - posterior location (n x z_dim)
    /// * `z_scale_nk` - posterior scale (n x z_dim), strictly positive
    fn forward_t(&self, x_nd: &Tensor, train: bool) -> Result<(Tensor, Tensor)>;

    fn dim_obs(&self) -> usize;

    fn dim_latent(&self) -> usize;
}

pub trait DecoderModuleT {
    /// A generator network that maps a latent code (plus optional
    /// per-sample coordinates) to a reconstruction location parameter
    ///
    /// * `coords_nmc` - transformed grid coordinates (n x m x c); only
    ///   consumed by spatial decoders
    /// * `z_nk` - latent content code, with any class label appended
    fn forward_t(&self, coords_nmc: Option<&Tensor>, z_nk: &Tensor, train: bool) -> Result<Tensor>;

    fn dim_obs(&self) -> usize;

    fn dim_latent(&self) -> usize;
}
