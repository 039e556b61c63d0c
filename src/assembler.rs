//! Assembly session: resolve, build, compose.
//!
//! One [`Assembler`] call runs the full pipeline for one binary, consulting
//! the cache before the resolver and layer-builder stages and populating it
//! after. The cache instance is supplied by the caller and can be shared
//! across assemblers; there is no process-wide state.

use std::path::PathBuf;

use crate::artifact::Artifact;
use crate::cache::{AssemblyCache, CacheKey};
use crate::config::ResolverConfig;
use crate::error::AssemblyResult;
use crate::image::{assemble_image, ExecMetadata, ImageManifest};
use crate::layer::{build_layer, Layer};
use crate::resolver::{CancelToken, Resolver};
use crate::users::{user_record_artifacts, UserSpec};

/// Everything one assembly run needs.
#[derive(Debug, Clone)]
pub struct AssemblyRequest {
    /// Host path of the compiled executable.
    pub binary: PathBuf,
    /// Declared auxiliary requirement names (e.g. "trust-anchors").
    pub auxiliary: Vec<String>,
    /// Caller-supplied artifacts merged into the layer.
    pub extra_artifacts: Vec<Artifact>,
    /// Declared non-root user, expanded into passwd/group records.
    pub user: Option<UserSpec>,
    /// Layers the new layer composes on top of (multi-stage composition).
    pub base_layers: Vec<Layer>,
    pub metadata: ExecMetadata,
}

impl AssemblyRequest {
    pub fn new(binary: impl Into<PathBuf>, metadata: ExecMetadata) -> Self {
        Self {
            binary: binary.into(),
            auxiliary: Vec::new(),
            extra_artifacts: Vec::new(),
            user: None,
            base_layers: Vec::new(),
            metadata,
        }
    }

    /// Declare a named auxiliary requirement.
    pub fn with_requirement(mut self, name: impl Into<String>) -> Self {
        self.auxiliary.push(name.into());
        self
    }

    pub fn with_extra_artifact(mut self, artifact: Artifact) -> Self {
        self.extra_artifacts.push(artifact);
        self
    }

    pub fn with_user(mut self, user: UserSpec) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_base_layers(mut self, layers: Vec<Layer>) -> Self {
        self.base_layers = layers;
        self
    }
}

/// Result of one assembly run: the manifest plus the realized layers in
/// manifest order.
#[derive(Debug, Clone)]
pub struct AssemblyOutput {
    pub manifest: ImageManifest,
    pub layers: Vec<Layer>,
}

/// Runs the Resolver -> Layer Builder -> Image Assembler pipeline.
pub struct Assembler<'a> {
    config: &'a ResolverConfig,
    cache: &'a AssemblyCache,
}

impl<'a> Assembler<'a> {
    pub fn new(config: &'a ResolverConfig, cache: &'a AssemblyCache) -> Self {
        Self { config, cache }
    }

    pub fn assemble(&self, request: &AssemblyRequest) -> AssemblyResult<AssemblyOutput> {
        self.assemble_with_cancel(request, &CancelToken::default())
    }

    pub fn assemble_with_cancel(
        &self,
        request: &AssemblyRequest,
        cancel: &CancelToken,
    ) -> AssemblyResult<AssemblyOutput> {
        let resolver = Resolver::new(self.config, self.cache);
        let closure =
            resolver.resolve_with_cancel(&request.binary, &request.auxiliary, cancel)?;

        let mut extras = request.extra_artifacts.clone();
        if let Some(user) = &request.user {
            extras.extend(user_record_artifacts(user));
        }

        let layer_key = self.layer_key(&closure.digest(), &extras, &request.base_layers);
        let layer = match self.cache.get_layer(&layer_key) {
            Some(layer) => {
                tracing::debug!(digest = %layer.digest(), "layer cache hit");
                layer
            }
            None => {
                let layer = build_layer(&closure, &extras, &request.base_layers)?;
                self.cache.put_layer(layer_key, layer.clone());
                layer
            }
        };

        let mut layers = request.base_layers.clone();
        layers.push(layer);

        let metadata = self.effective_metadata(request);
        let manifest = assemble_image(&layers, &metadata)?;

        Ok(AssemblyOutput { manifest, layers })
    }

    /// Layer cache key: closure digest plus extras and base identities.
    fn layer_key(&self, closure_digest: &str, extras: &[Artifact], bases: &[Layer]) -> CacheKey {
        let mut subject = String::from(closure_digest);
        for extra in extras {
            subject.push('+');
            subject.push_str(&extra.content_digest());
            subject.push(':');
            subject.push_str(&extra.dest().to_string_lossy());
        }
        for base in bases {
            subject.push('^');
            subject.push_str(base.digest());
        }
        CacheKey::new(subject, "layer")
    }

    /// A declared user becomes the manifest's runtime user unless the
    /// metadata already names one.
    fn effective_metadata(&self, request: &AssemblyRequest) -> ExecMetadata {
        let mut metadata = request.metadata.clone();
        if metadata.user.is_none() {
            if let Some(user) = &request.user {
                metadata.user = Some(user.name.clone());
            }
        }
        metadata
    }
}
