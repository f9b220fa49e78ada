pub mod client;

pub use client::{PlatformHttpClient, PlatformHttpClientFactory};
