pub mod cli;
pub mod trvae_aux_layers;
pub mod trvae_config;
pub mod trvae_coord_transform;
pub mod trvae_data_loader;
pub mod trvae_decoder;
pub mod trvae_encoder;
pub mod trvae_grid;
pub mod trvae_inference;
pub mod trvae_latent_split;
pub mod trvae_loss_functions;
pub mod trvae_model;
pub mod trvae_model_traits;
pub mod trvae_svi;

pub use candle_core;
pub use candle_nn;
