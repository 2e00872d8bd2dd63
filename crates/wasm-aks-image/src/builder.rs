//! Building and pushing images with the local docker CLI

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};
use wasm_aks_common::{Error, Result, Secret};

/// Which docker builder runs the build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum BuilderVersion {
    /// The classic builder
    BuilderV1,
    /// BuildKit
    #[default]
    BuilderBuildKit,
}

impl BuilderVersion {
    /// Value of `DOCKER_BUILDKIT` selecting this builder
    pub fn docker_buildkit_env(self) -> &'static str {
        match self {
            Self::BuilderV1 => "0",
            Self::BuilderBuildKit => "1",
        }
    }
}

/// Credentials for pushing to a registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryAuth {
    /// Registry host (e.g. "myregistry.azurecr.io")
    pub server: String,
    /// User name
    pub username: String,
    /// Password
    pub password: Secret<String>,
}

/// A fully resolved build-and-push request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    /// Fully qualified image reference including tag
    pub image_name: String,
    /// Build context directory
    pub context: PathBuf,
    /// Path of the Dockerfile
    pub dockerfile: PathBuf,
    /// Target platform (e.g. "linux/amd64")
    pub platform: String,
    /// Builder to use
    pub builder_version: BuilderVersion,
    /// Registry to authenticate against before pushing
    pub registry: RegistryAuth,
}

/// A pushed image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedImage {
    /// Fully qualified image reference including tag
    pub image_name: String,
    /// Repository digest reported after push, if any
    pub repo_digest: Option<String>,
}

/// Builds images and pushes them to a registry
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Log in, build and push; returns once the registry has the image
    async fn build_and_push(&self, request: &ImageRequest) -> Result<PushedImage>;
}

/// Private docker client config holding the registry login of one push
///
/// Removed on drop, so credentials never reach the operator's
/// `~/.docker/config.json`.
#[derive(Debug)]
struct DockerConfigDir {
    path: PathBuf,
}

impl DockerConfigDir {
    fn new() -> Result<Self> {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        let path = std::env::temp_dir().join(format!(
            "wasm-aks-docker-{}-{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        if path.exists() {
            let _ = std::fs::remove_dir_all(&path);
        }

        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(&path).map_err(|e| {
            Error::command(
                "docker login",
                format!("failed to create {}: {}", path.display(), e),
            )
        })?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DockerConfigDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove docker config");
        }
    }
}

/// [`ImageBuilder`] driving the `docker` CLI
///
/// Login and push run against a throwaway `DOCKER_CONFIG`; the build uses
/// the operator's own config so installed CLI plugins keep working.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    /// Use `docker` from `PATH`
    pub fn new() -> Self {
        Self::with_program("docker")
    }

    /// Use a specific docker-compatible binary
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn login_args(auth: &RegistryAuth) -> Vec<String> {
        vec![
            "login".to_string(),
            auth.server.clone(),
            "--username".to_string(),
            auth.username.clone(),
            "--password-stdin".to_string(),
        ]
    }

    fn build_args(request: &ImageRequest) -> Vec<String> {
        vec![
            "build".to_string(),
            "--platform".to_string(),
            request.platform.clone(),
            "-f".to_string(),
            request.dockerfile.display().to_string(),
            "-t".to_string(),
            request.image_name.clone(),
            request.context.display().to_string(),
        ]
    }

    fn command(&self, config: Option<&DockerConfigDir>) -> Command {
        let mut command = Command::new(&self.program);
        if let Some(config) = config {
            command.env("DOCKER_CONFIG", config.path());
        }
        command
    }

    async fn login(&self, auth: &RegistryAuth, config: &DockerConfigDir) -> Result<()> {
        let mut child = self
            .command(Some(config))
            .args(Self::login_args(auth))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::command("docker login", e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(auth.password.expose().as_bytes())
                .await
                .map_err(|e| Error::command("docker login", e.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::command("docker login", e.to_string()))?;
        if !output.status.success() {
            return Err(Error::command(
                "docker login",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }

    async fn run(&self, what: &str, mut command: Command) -> Result<String> {
        debug!(command = %what, "Running docker");
        let output = command
            .output()
            .await
            .map_err(|e| Error::command(what, e.to_string()))?;

        if !output.status.success() {
            return Err(Error::command(
                what,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn repo_digest(&self, image_name: &str) -> Result<Option<String>> {
        let mut command = self.command(None);
        command.args([
            "image",
            "inspect",
            "--format",
            "{{join .RepoDigests \",\"}}",
            image_name,
        ]);
        let stdout = self.run("docker image inspect", command).await?;
        Ok(pick_repo_digest(image_name, &stdout))
    }
}

/// Repository of an image reference, without tag or digest
fn repository(image_name: &str) -> &str {
    let without_digest = image_name.split('@').next().unwrap_or(image_name);
    match without_digest.rfind(':') {
        // a colon after the last slash separates the tag; before it, a port
        Some(idx) if !without_digest[idx..].contains('/') => &without_digest[..idx],
        _ => without_digest,
    }
}

fn pick_repo_digest(image_name: &str, repo_digests: &str) -> Option<String> {
    let repo = repository(image_name);
    repo_digests
        .split(',')
        .map(str::trim)
        .find(|d| d.split('@').next() == Some(repo))
        .map(str::to_string)
}

#[async_trait]
impl ImageBuilder for DockerCli {
    async fn build_and_push(&self, request: &ImageRequest) -> Result<PushedImage> {
        let config = DockerConfigDir::new()?;
        info!(server = %request.registry.server, "Logging in to registry");
        self.login(&request.registry, &config).await?;

        info!(
            image = %request.image_name,
            platform = %request.platform,
            builder = ?request.builder_version,
            "Building image"
        );
        let mut build = self.command(None);
        build
            .args(Self::build_args(request))
            .env("DOCKER_BUILDKIT", request.builder_version.docker_buildkit_env());
        self.run("docker build", build).await?;

        info!(image = %request.image_name, "Pushing image");
        let mut push = self.command(Some(&config));
        push.args(["push", request.image_name.as_str()]);
        self.run("docker push", push).await?;
        drop(config);

        let repo_digest = self.repo_digest(&request.image_name).await?;
        Ok(PushedImage {
            image_name: request.image_name.clone(),
            repo_digest,
        })
    }
}
