//! The container image as an engine node
//!
//! The image is ensured by building and pushing it on every apply. Deleting
//! it is a no-op: pushed content lives in the registry and goes with it.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use wasm_aks_common::{Result, Secret};
use wasm_aks_engine::{dependencies, Deletion, Output, Resource, ResourceOptions, Stack, Urn};

use crate::builder::{BuilderVersion, ImageBuilder, ImageRequest, PushedImage, RegistryAuth};

/// Build settings of an image
#[derive(Debug, Clone)]
pub struct DockerBuild {
    /// Build context directory
    pub context: PathBuf,
    /// Path of the Dockerfile
    pub dockerfile: PathBuf,
    /// Target platform
    pub platform: String,
    /// Builder to use
    pub builder_version: BuilderVersion,
}

/// Registry an image is pushed to
pub struct RegistryLogin {
    /// Registry host
    pub server: Output<String>,
    /// User name
    pub username: Output<String>,
    /// Password
    pub password: Output<Secret<String>>,
}

/// Inputs of an image
pub struct ImageArgs {
    /// Fully qualified image reference including tag
    pub image_name: Output<String>,
    /// Build settings
    pub build: DockerBuild,
    /// Push target and credentials
    pub registry: RegistryLogin,
}

/// A container image built locally and pushed to a registry
pub struct Image {
    builder: Arc<dyn ImageBuilder>,
    image_name: Output<String>,
    build: DockerBuild,
    registry: RegistryLogin,
}

/// Outputs of a declared image
#[derive(Debug, Clone)]
pub struct ImageHandle {
    /// Node identity
    pub urn: Urn,
    /// Fully qualified image reference, available once pushed
    pub image_name: Output<String>,
    /// Repository digest, if the registry reported one
    pub repo_digest: Output<Option<String>>,
}

impl Image {
    /// Declare an image on `stack`
    pub fn declare(
        stack: &Stack,
        name: &str,
        args: ImageArgs,
        builder: Arc<dyn ImageBuilder>,
        opts: ResourceOptions,
    ) -> Result<ImageHandle> {
        let inputs = dependencies([
            args.image_name.dependencies(),
            args.registry.server.dependencies(),
            args.registry.username.dependencies(),
            args.registry.password.dependencies(),
        ]);

        let resource = Self {
            builder,
            image_name: args.image_name,
            build: args.build,
            registry: args.registry,
        };
        let registered = stack.register(name, resource, inputs, opts)?;

        Ok(ImageHandle {
            image_name: registered.state.apply(|s| Ok(s.image_name)),
            repo_digest: registered.state.apply(|s| Ok(s.repo_digest)),
            urn: registered.urn,
        })
    }

    async fn request(&self) -> Result<ImageRequest> {
        Ok(ImageRequest {
            image_name: self.image_name.resolve().await?,
            context: self.build.context.clone(),
            dockerfile: self.build.dockerfile.clone(),
            platform: self.build.platform.clone(),
            builder_version: self.build.builder_version,
            registry: RegistryAuth {
                server: self.registry.server.resolve().await?,
                username: self.registry.username.resolve().await?,
                password: self.registry.password.resolve().await?,
            },
        })
    }
}

#[async_trait]
impl Resource for Image {
    type State = PushedImage;
    const TYPE_TOKEN: &'static str = "docker:index:Image";

    fn describe(&self) -> serde_json::Value {
        json!({
            "imageName": self.image_name.describe(),
            "build": {
                "context": self.build.context.display().to_string(),
                "dockerfile": self.build.dockerfile.display().to_string(),
                "platform": self.build.platform,
                "builderVersion": self.build.builder_version,
            },
            "registry": {
                "server": self.registry.server.describe(),
                "username": self.registry.username.describe(),
                "password": wasm_aks_common::secret::REDACTED,
            },
        })
    }

    async fn create_or_update(&self, urn: &Urn) -> Result<PushedImage> {
        let request = self.request().await?;
        info!(urn = %urn, image = %request.image_name, "Ensuring image");
        let pushed = self.builder.build_and_push(&request).await?;
        info!(
            urn = %urn,
            image = %pushed.image_name,
            digest = pushed.repo_digest.as_deref().unwrap_or("unknown"),
            "Image pushed"
        );
        Ok(pushed)
    }

    async fn read(&self, _urn: &Urn) -> Result<Option<PushedImage>> {
        Ok(Some(PushedImage {
            image_name: self.image_name.resolve().await?,
            repo_digest: None,
        }))
    }

    /// Pushed tags are never removed from the registry
    async fn delete(&self, urn: &Urn, state: &PushedImage) -> Result<Deletion> {
        info!(urn = %urn, image = %state.image_name, "Leaving pushed image in registry");
        Ok(Deletion::Retained)
    }
}
