//! Load pipeline: describe the target, replay resources, reconcile.

use tracing::debug;

use crate::error::ConfigResult;
use crate::flat_map::FlatMap;
use crate::meta::{ConfigItemMeta, Configurable};
use crate::reconcile::{Coercion, Reconciler};
use crate::resource::{
    env_file, json_file, system_env, ConfigResource, EnvProvider, FileReader,
};

/// JSON file read by [`load_defaults`].
pub const DEFAULT_JSON_FILE: &str = "config.json";

/// Env file read by [`load_defaults`].
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Build the metadata tree for `target`.
pub fn load_meta<T: Configurable + ?Sized>(target: &mut T) -> ConfigItemMeta<'_> {
    ConfigItemMeta::root(target)
}

/// Replay `resources` in order into a fresh flat map.
pub fn load_map(resources: &[&dyn ConfigResource]) -> ConfigResult<FlatMap> {
    let mut map = FlatMap::new();
    for resource in resources {
        apply(*resource, &mut map)?;
    }
    Ok(map)
}

/// Load `resources` into `target` with strict coercion.
pub fn load<T: Configurable + ?Sized>(
    target: &mut T,
    resources: &[&dyn ConfigResource],
) -> ConfigResult<()> {
    let meta = load_meta(target);
    let map = load_map(resources)?;
    Reconciler::new(&map).reconcile(meta)
}

/// Load `config.json` (environment-aware), then `.env` (environment-aware,
/// case-insensitive), then the process environment (case-insensitive).
pub fn load_defaults<T: Configurable + ?Sized>(target: &mut T) -> ConfigResult<()> {
    Loader::defaults().load(target).map(|_| ())
}

fn apply(resource: &dyn ConfigResource, map: &mut FlatMap) -> ConfigResult<()> {
    let description = resource.describe();
    let before = map.write_count();

    map.set_origin(Some(&description));
    let result = resource.load(map);
    map.set_origin(None);
    result?;

    debug!(
        resource = %description,
        writes = map.write_count() - before,
        "configuration resource applied"
    );
    Ok(())
}

/// Owned, reusable load pipeline.
///
/// ```ignore
/// let loader = Loader::new()
///     .with_resource(json_file("config.json"))
///     .with_resource(system_env().case_insensitive(true))
///     .coercion(Coercion::Lenient);
/// let map = loader.load(&mut settings)?;
/// ```
#[derive(Default)]
pub struct Loader {
    resources: Vec<Box<dyn ConfigResource + Send + Sync>>,
    coercion: Coercion,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixed pipeline used by [`load_defaults`].
    pub fn defaults() -> Self {
        Self::new()
            .with_resource(json_file(DEFAULT_JSON_FILE))
            .with_resource(env_file(DEFAULT_ENV_FILE).case_insensitive(true))
            .with_resource(system_env().case_insensitive(true))
    }

    /// The default pipeline reading through the given file and environment providers.
    pub fn defaults_with<F, E>(files: F, env: E) -> Self
    where
        F: FileReader + Clone + 'static,
        E: EnvProvider + Clone + 'static,
    {
        Self::new()
            .with_resource(
                json_file(DEFAULT_JSON_FILE)
                    .with_files(files.clone())
                    .with_env(env.clone()),
            )
            .with_resource(
                env_file(DEFAULT_ENV_FILE)
                    .case_insensitive(true)
                    .with_files(files)
                    .with_env(env.clone()),
            )
            .with_resource(system_env().case_insensitive(true).with_env(env))
    }

    pub fn with_resource(mut self, resource: impl ConfigResource + Send + Sync + 'static) -> Self {
        self.push(resource);
        self
    }

    pub fn push(&mut self, resource: impl ConfigResource + Send + Sync + 'static) {
        self.resources.push(Box::new(resource));
    }

    pub fn coercion(mut self, coercion: Coercion) -> Self {
        self.coercion = coercion;
        self
    }

    /// Descriptions of the configured resources, in precedence order.
    pub fn describe(&self) -> Vec<String> {
        self.resources.iter().map(|r| r.describe()).collect()
    }

    pub fn load_map(&self) -> ConfigResult<FlatMap> {
        let mut map = FlatMap::new();
        for resource in &self.resources {
            apply(resource.as_ref(), &mut map)?;
        }
        Ok(map)
    }

    /// Load into `target`, returning the flat map for provenance inspection.
    pub fn load<T: Configurable + ?Sized>(&self, target: &mut T) -> ConfigResult<FlatMap> {
        let meta = load_meta(target);
        let map = self.load_map()?;
        Reconciler::new(&map).coercion(self.coercion).reconcile(meta)?;
        debug!(keys = map.len(), "configuration loaded");
        Ok(map)
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("resources", &self.describe())
            .field("coercion", &self.coercion)
            .finish()
    }
}
