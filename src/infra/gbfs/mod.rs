pub mod client;

pub use client::GbfsClient;
