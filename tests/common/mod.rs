// Shared helpers for integration tests.
//
// Provides a temporary source tree (`profiles/` + `items/`), a temporary
// target directory and a fluent builder so each integration test can set
// up an isolated deployment without repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use punktf::config::{self, PunktfSource, ResolvedProfile};
use punktf::deploy::prompt::DeclinePrompt;
use punktf::deploy::{self, DeployContext, DeployOptions, Deployment, ManifestStore};
use punktf::error::PunktfError;
use punktf::exec::SystemExecutor;
use punktf::logging::Logger;
use punktf::operations::SystemFileSystemOps;
use punktf::platform::LineEnding;
use punktf::scope::Environment;

/// An isolated source tree and deploy directory backed by temp dirs.
///
/// Both directories are deleted when the context is dropped.
pub struct IntegrationTestContext {
    /// Source root containing `profiles/` and `items/`.
    pub source: tempfile::TempDir,
    /// Deploy directory used as profile target.
    pub target: tempfile::TempDir,
    /// Holds the manifest, outside the deploy directory.
    pub state: tempfile::TempDir,
}

impl IntegrationTestContext {
    /// Create empty `profiles/` and `items/` directories.
    pub fn new() -> Self {
        let source = tempfile::tempdir().expect("create source dir");
        std::fs::create_dir_all(source.path().join("profiles")).expect("create profiles dir");
        std::fs::create_dir_all(source.path().join("items")).expect("create items dir");
        Self {
            source,
            target: tempfile::tempdir().expect("create target dir"),
            state: tempfile::tempdir().expect("create state dir"),
        }
    }

    /// Validated source layout.
    pub fn punktf_source(&self) -> PunktfSource {
        PunktfSource::from_root(self.source.path()).expect("valid source")
    }

    /// Deploy directory path (as written into profiles).
    pub fn target_path(&self) -> &Path {
        self.target.path()
    }

    /// Path of `relative` inside the deploy directory.
    pub fn output(&self, relative: &str) -> PathBuf {
        self.target.path().join(relative)
    }

    /// Manifest location for this context.
    pub fn manifest_path(&self) -> PathBuf {
        self.state.path().join("manifest.json")
    }

    /// Resolve `profile` from the source tree.
    pub fn resolve(&self, profile: &str) -> Result<ResolvedProfile, PunktfError> {
        let source = self.punktf_source();
        Ok(config::resolve(profile, &source.loader())?)
    }

    /// Resolve and deploy `profile` with the given environment.
    pub fn deploy_with_env(
        &self,
        profile: &str,
        dry_run: bool,
        environment: &Environment,
    ) -> Result<Deployment, PunktfError> {
        let source = self.punktf_source();
        let resolved = config::resolve(profile, &source.loader())?;
        let mut manifest = ManifestStore::load(self.manifest_path())?;
        let ctx = DeployContext {
            fs: Arc::new(SystemFileSystemOps),
            executor: Arc::new(SystemExecutor),
            prompt: Arc::new(DeclinePrompt),
            log: Arc::new(Logger::new("test")),
            cancel: Arc::new(AtomicBool::new(false)),
        };
        deploy::run(
            &source,
            &resolved,
            environment,
            &ctx,
            &mut manifest,
            DeployOptions {
                dry_run,
                parallel: true,
                line_ending: LineEnding::Keep,
                interactive: false,
            },
        )
    }

    /// Resolve and deploy `profile` with an empty environment.
    pub fn deploy(&self, profile: &str, dry_run: bool) -> Result<Deployment, PunktfError> {
        self.deploy_with_env(profile, dry_run, &Environment::default())
    }

    /// Every file below the deploy directory with its content.
    pub fn target_snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        let mut files = BTreeMap::new();
        collect(self.target.path(), self.target.path(), &mut files);
        files
    }

    /// Every file below the source root with its content.
    pub fn source_snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        let mut files = BTreeMap::new();
        collect(self.source.path(), self.source.path(), &mut files);
        files
    }
}

fn collect(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
    for entry in std::fs::read_dir(dir).expect("read dir") {
        let path = entry.expect("dir entry").path();
        if path.is_dir() {
            out.insert(path.strip_prefix(root).expect("prefix").to_path_buf(), Vec::new());
            collect(root, &path, out);
        } else {
            let content = std::fs::read(&path).expect("read file");
            out.insert(path.strip_prefix(root).expect("prefix").to_path_buf(), content);
        }
    }
}

/// Fluent builder for [`IntegrationTestContext`].
pub struct TestContextBuilder {
    ctx: IntegrationTestContext,
}

impl TestContextBuilder {
    /// Begin building a new context with an empty source tree.
    pub fn new() -> Self {
        Self {
            ctx: IntegrationTestContext::new(),
        }
    }

    /// Write `profiles/<name>.yaml`.
    ///
    /// `{target}` in `content` is replaced with the deploy directory.
    pub fn with_profile(self, name: &str, content: &str) -> Self {
        let content = content.replace("{target}", &self.ctx.target_path().display().to_string());
        let path = self.ctx.source.path().join("profiles").join(format!("{name}.yaml"));
        std::fs::write(path, content).expect("write profile");
        self
    }

    /// Write `items/<relative>`.
    pub fn with_item(self, relative: &str, content: impl AsRef<[u8]>) -> Self {
        let path = self.ctx.source.path().join("items").join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create item parent");
        }
        std::fs::write(&path, content).expect("write item");
        self
    }

    /// Write a file directly into the deploy directory.
    pub fn with_existing_output(self, relative: &str, content: &str) -> Self {
        let path = self.ctx.output(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create output parent");
        }
        std::fs::write(&path, content).expect("write existing output");
        self
    }

    /// Finish building and return the configured context.
    pub fn build(self) -> IntegrationTestContext {
        self.ctx
    }
}
