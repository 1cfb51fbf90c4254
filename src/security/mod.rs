pub mod cipher;
pub mod codec;

pub use cipher::TemplateCipher;
pub use codec::FeatureCodec;
