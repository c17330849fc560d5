mod cluster_config;

pub use cluster_config::*;
