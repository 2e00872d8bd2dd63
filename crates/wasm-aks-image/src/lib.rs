//! Container image provider for wasm-aks
//!
//! Builds an image from a local context with BuildKit and pushes it to a
//! registry using admin credentials resolved during the apply.

#![deny(missing_docs)]

pub mod builder;
pub mod image;

pub use builder::{BuilderVersion, DockerCli, ImageBuilder, ImageRequest, PushedImage, RegistryAuth};
pub use image::{DockerBuild, Image, ImageArgs, ImageHandle, RegistryLogin};
