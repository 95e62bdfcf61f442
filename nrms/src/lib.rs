pub mod attention;
pub mod device;
pub mod embeddings;
pub mod hparams;
pub mod inputs;
pub mod model;
pub mod news;
pub mod user;

pub use hparams::Hparams;
pub use model::Nrms;
