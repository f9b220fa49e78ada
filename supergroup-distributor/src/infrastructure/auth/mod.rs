pub mod token;

pub use token::PlatformTokenSigner;
