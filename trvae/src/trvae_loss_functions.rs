#![allow(dead_code)]

use core::f64;

use candle_core::{Result, Tensor};

const EPS: f64 = 1e-6;
const HALF_LN_2PI: f64 = 0.9189385332046727;

/// KL divergence loss between two Gaussian distributions
///
/// -0.5 * (1 + log(sigma^2) - mu^2 - sigma^2)
///
/// * `z_mean` - mean of Gaussian distribution
/// * `z_lnvar` - log variance of Gaussian distribution
///
pub fn gaussian_kl_loss(z_mean: &Tensor, z_lnvar: &Tensor) -> Result<Tensor> {
    let z_var = z_lnvar.exp()?;
    (z_var - 1. + z_mean.powf(2.)? - z_lnvar)?.sum(z_mean.rank() - 1)? * 0.5
}

/// Diagonal-Gaussian log density of `z`, summed over the event dimension
///
/// log q(z) = sum_k -0.5 * [ (z - mu)^2 / sigma^2 + 2 log(sigma) + log(2 pi) ]
///
pub fn gaussian_log_prob(z_nk: &Tensor, loc_nk: &Tensor, scale_nk: &Tensor) -> Result<Tensor> {
    let u2_nk = (z_nk - loc_nk)?.div(scale_nk)?.powf(2.)?;
    let lp_nk = ((u2_nk * 0.5)? + scale_nk.log()?)? + HALF_LN_2PI;
    lp_nk?.sum(z_nk.rank() - 1)?.neg()
}

/// Standard-normal log density, summed over the event dimension
pub fn std_normal_log_prob(z_nk: &Tensor) -> Result<Tensor> {
    ((z_nk.powf(2.)? * 0.5)? + HALF_LN_2PI)?
        .sum(z_nk.rank() - 1)?
        .neg()
}

/// Output distribution used to score reconstructions against flattened
/// observations, selectable by name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputSampler {
    Bernoulli,
    ContinuousBernoulli,
    Gaussian { sigma: f64 },
}

impl OutputSampler {
    /// * `name` - one of `bernoulli`, `continuous_bernoulli`, `gaussian`
    /// * `decoder_sig` - spread of the Gaussian sampler (default 0.5)
    pub fn from_name(name: &str, decoder_sig: Option<f64>) -> anyhow::Result<Self> {
        match name {
            "bernoulli" => Ok(OutputSampler::Bernoulli),
            "continuous_bernoulli" => Ok(OutputSampler::ContinuousBernoulli),
            "gaussian" => Ok(OutputSampler::Gaussian {
                sigma: decoder_sig.unwrap_or(0.5),
            }),
            _ => Err(anyhow::anyhow!(
                "unknown sampler '{}'; expected bernoulli, continuous_bernoulli, or gaussian",
                name
            )),
        }
    }

    /// Per-sample observation log-likelihood
    ///
    /// * `x_nd` - flattened observations (n x d)
    /// * `loc_nd` - reconstruction location parameter (n x d)
    pub fn log_likelihood(&self, x_nd: &Tensor, loc_nd: &Tensor) -> Result<Tensor> {
        match *self {
            OutputSampler::Bernoulli => bernoulli_log_likelihood(x_nd, loc_nd),
            OutputSampler::ContinuousBernoulli => {
                continuous_bernoulli_log_likelihood(x_nd, loc_nd)
            }
            OutputSampler::Gaussian { sigma } => gaussian_log_likelihood(x_nd, loc_nd, sigma),
        }
    }
}

/// Bernoulli log-likelihood (binary cross-entropy)
///
/// llik(i) = sum_d x(i,d) * log p(i,d) + (1 - x(i,d)) * log(1 - p(i,d))
///
fn bernoulli_log_likelihood(x_nd: &Tensor, loc_nd: &Tensor) -> Result<Tensor> {
    let p_nd = loc_nd.clamp(EPS, 1. - EPS)?;
    let llik_nd = (x_nd.mul(&p_nd.log()?)?
        + x_nd.affine(-1., 1.)?.mul(&p_nd.affine(-1., 1.)?.log()?)?)?;
    llik_nd.sum(x_nd.rank() - 1)
}

/// Continuous-Bernoulli log-likelihood: the Bernoulli cross-entropy plus
/// the normalizing constant
///
/// log C(p) = log[ log((1 - p) / p) / (1 - 2p) ],  log C(1/2) = log 2
///
fn continuous_bernoulli_log_likelihood(x_nd: &Tensor, loc_nd: &Tensor) -> Result<Tensor> {
    let p_nd = loc_nd.clamp(EPS, 1. - EPS)?;
    let u_nd = p_nd.affine(-2., 1.)?;
    let ratio_nd = p_nd
        .affine(-1., 1.)?
        .log()?
        .sub(&p_nd.log()?)?
        .div(&u_nd)?;
    let ln2_nd = (p_nd.ones_like()? * f64::consts::LN_2)?;
    // the ratio tends to 2 as p -> 1/2; switch to the limit there
    let log_c_nd = u_nd.abs()?.lt(1e-3)?.where_cond(&ln2_nd, &ratio_nd.log()?)?;
    bernoulli_log_likelihood(x_nd, loc_nd)? + log_c_nd.sum(x_nd.rank() - 1)?
}

/// Gaussian log-likelihood with fixed spread `sigma`
///
/// llik(i) = -0.5 * sum_d [ (x(i,d) - loc(i,d)) / sigma ]^2
///           - d * (log sigma + 0.5 * log(2 pi))
///
fn gaussian_log_likelihood(x_nd: &Tensor, loc_nd: &Tensor, sigma: f64) -> Result<Tensor> {
    let d = x_nd.dim(x_nd.rank() - 1)?;
    let u2_nd = ((x_nd - loc_nd)?.powf(2.)? * (1. / (sigma * sigma)))?;
    let constant = d as f64 * (sigma.ln() + HALF_LN_2PI);
    (u2_nd.sum(x_nd.rank() - 1)? * (-0.5))?.affine(1., -constant)
}
