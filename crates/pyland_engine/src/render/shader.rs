//! Shared shader programs and per-context shader caches
//!
//! Programs are identified by name and cached per graphics context. The
//! cache only holds weak references: a program lives exactly as long as some
//! renderable holds its `Arc<Shader>`. When the last holder lets go, the
//! shader removes itself from the cache that served it and queues its GPU
//! program for deletion; the queue is drained on the render thread by
//! [`ShaderCaches::collect_garbage`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use thiserror::Error;

use crate::core::config::{ShaderConfig, ShaderDialect};
use crate::render::api::{GraphicsDevice, ProgramHandle, ShaderStage, VertexAttribute};
use crate::render::context::{ContextId, GraphicsContext};

/// Shader loading errors
#[derive(Error, Debug)]
pub enum LoadError {
    /// A source file could not be read
    #[error("Unable to load shader file \"{}\": {source}", .path.display())]
    Read {
        /// File that failed
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// No sources are known for the program
    #[error("No sources for shader program \"{0}\"")]
    Missing(String),

    /// A stage failed to compile
    #[error("Shader \"{name}\" {stage:?} stage failed to compile:\n{log}")]
    Compile {
        /// Program name
        name: String,
        /// Failing stage
        stage: ShaderStage,
        /// Compiler info log
        log: String,
    },

    /// The program object could not be created or linked
    #[error("Unable to link shader program \"{name}\":\n{log}")]
    Link {
        /// Program name
        name: String,
        /// Linker info log
        log: String,
    },
}

/// Vertex and fragment source text of one program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    /// Vertex stage source
    pub vertex: String,
    /// Fragment stage source
    pub fragment: String,
}

/// Where program sources come from
pub trait ShaderSourceProvider {
    /// Load both stages of program `name`
    fn load_sources(&self, name: &str) -> Result<ShaderSources, LoadError>;
}

/// Reads `<dir>/<name>.<ext>` with extensions chosen by the GLSL dialect
#[derive(Debug, Clone)]
pub struct ShaderDirectory {
    dir: PathBuf,
    dialect: ShaderDialect,
}

impl ShaderDirectory {
    /// Provider reading from `dir`
    pub fn new(dir: impl Into<PathBuf>, dialect: ShaderDialect) -> Self {
        Self {
            dir: dir.into(),
            dialect,
        }
    }

    /// Provider configured from [`ShaderConfig`]
    pub fn from_config(config: &ShaderConfig) -> Self {
        Self::new(config.search_dir.clone(), config.dialect)
    }

    /// Path of one stage's source file
    pub fn stage_path(&self, name: &str, stage: ShaderStage) -> PathBuf {
        let extension = match stage {
            ShaderStage::Vertex => self.dialect.vertex_extension(),
            ShaderStage::Fragment => self.dialect.fragment_extension(),
        };
        self.dir.join(format!("{name}.{extension}"))
    }

    fn read(path: &Path) -> Result<String, LoadError> {
        std::fs::read_to_string(path).map_err(|source| {
            log::error!("Unable to load shader file \"{}\".", path.display());
            LoadError::Read {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

impl ShaderSourceProvider for ShaderDirectory {
    fn load_sources(&self, name: &str) -> Result<ShaderSources, LoadError> {
        Ok(ShaderSources {
            vertex: Self::read(&self.stage_path(name, ShaderStage::Vertex))?,
            fragment: Self::read(&self.stage_path(name, ShaderStage::Fragment))?,
        })
    }
}

/// In-memory sources, keyed by program name
#[derive(Debug, Clone, Default)]
pub struct InlineSources {
    programs: HashMap<String, ShaderSources>,
}

impl InlineSources {
    /// Empty set of programs
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a program
    pub fn with_program(mut self, name: &str, vertex: &str, fragment: &str) -> Self {
        self.programs.insert(
            name.to_string(),
            ShaderSources {
                vertex: vertex.to_string(),
                fragment: fragment.to_string(),
            },
        );
        self
    }
}

impl ShaderSourceProvider for InlineSources {
    fn load_sources(&self, name: &str) -> Result<ShaderSources, LoadError> {
        self.programs
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::Missing(name.to_string()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A linked shader program
pub struct Shader {
    name: String,
    program: ProgramHandle,
    owner: Mutex<Weak<ShaderCache>>,
}

impl Shader {
    /// Compile and link `sources` as program `name`.
    ///
    /// Attribute locations are bound before linking: `a_position` to 0 and
    /// `a_texCoord` to 1. Every partially created GPU object is released
    /// before an error is returned.
    pub(crate) fn load(
        device: &dyn GraphicsDevice,
        name: &str,
        sources: &ShaderSources,
    ) -> Result<Self, LoadError> {
        let compile_error = |stage, info_log: String| {
            log::error!("Shader loading failed:\n{info_log}");
            LoadError::Compile {
                name: name.to_string(),
                stage,
                log: info_log,
            }
        };

        let vertex = device
            .create_shader(ShaderStage::Vertex, &sources.vertex)
            .map_err(|info_log| compile_error(ShaderStage::Vertex, info_log))?;
        let fragment = match device.create_shader(ShaderStage::Fragment, &sources.fragment) {
            Ok(fragment) => fragment,
            Err(info_log) => {
                device.delete_shader(vertex);
                return Err(compile_error(ShaderStage::Fragment, info_log));
            }
        };

        let release_stages = || {
            device.delete_shader(fragment);
            device.delete_shader(vertex);
        };

        let program = match device.create_program() {
            Ok(program) => program,
            Err(info_log) => {
                log::error!("Shader creation: Could not create program object.");
                release_stages();
                return Err(LoadError::Link {
                    name: name.to_string(),
                    log: info_log,
                });
            }
        };

        device.attach_shader(program, vertex);
        device.attach_shader(program, fragment);
        device.bind_attribute_location(program, VertexAttribute::POSITION.location, "a_position");
        device.bind_attribute_location(program, VertexAttribute::TEX_COORD.location, "a_texCoord");

        if let Err(info_log) = device.link_program(program) {
            log::error!("Program linking:\n{info_log}");
            release_stages();
            device.delete_program(program);
            return Err(LoadError::Link {
                name: name.to_string(),
                log: info_log,
            });
        }

        // Attached stages are freed together with the program.
        release_stages();

        Ok(Self {
            name: name.to_string(),
            program,
            owner: Mutex::new(Weak::new()),
        })
    }

    /// Program name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// GPU program handle
    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    /// Bind an extra attribute name to `location`; call [`Shader::link`] after
    pub fn bind_location_to_attribute(&self, device: &dyn GraphicsDevice, location: u32, variable: &str) {
        device.bind_attribute_location(self.program, location, variable);
    }

    /// Relink the program
    pub fn link(&self, device: &dyn GraphicsDevice) -> Result<(), LoadError> {
        device.link_program(self.program).map_err(|info_log| LoadError::Link {
            name: self.name.clone(),
            log: info_log,
        })
    }

    /// Whether `cache` is the cache that served this shader
    pub fn is_owned_by(&self, cache: &Arc<ShaderCache>) -> bool {
        std::ptr::eq(lock(&self.owner).as_ptr(), Arc::as_ptr(cache))
    }

    fn stamp_owner(&self, cache: &Arc<ShaderCache>) {
        *lock(&self.owner) = Arc::downgrade(cache);
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        let owner = lock(&self.owner).upgrade();
        match owner {
            Some(cache) => {
                cache.remove_shader(&self.name);
                cache.retire(self.program);
            }
            None => log::debug!(
                "Shader \"{}\" dropped after its context; program left to the driver",
                self.name
            ),
        }
    }
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("name", &self.name)
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}

/// Name to program cache for one graphics context
pub struct ShaderCache {
    context: ContextId,
    entries: Mutex<HashMap<String, Weak<Shader>>>,
    retired: Mutex<Vec<ProgramHandle>>,
}

impl ShaderCache {
    /// Empty cache for `context`
    pub fn new(context: ContextId) -> Self {
        log::info!("Created shader cache for context {}", context.get());
        Self {
            context,
            entries: Mutex::new(HashMap::new()),
            retired: Mutex::new(Vec::new()),
        }
    }

    /// Return the live program `name`, or compile and link a new one
    pub fn get_or_load(
        self: &Arc<Self>,
        device: &dyn GraphicsDevice,
        provider: &dyn ShaderSourceProvider,
        name: &str,
    ) -> Result<Arc<Shader>, LoadError> {
        log::info!("Getting shader \"{name}\" from cache {}", self.context.get());
        if let Some(shader) = self.lookup(name) {
            return Ok(shader);
        }

        let shader = provider
            .load_sources(name)
            .and_then(|sources| Shader::load(device, name, &sources))
            .map(Arc::new)
            .map_err(|error| {
                log::error!("Error creating shared shader \"{name}\": {error}");
                error
            })?;
        shader.stamp_owner(self);

        let mut entries = lock(&self.entries);
        if let Some(existing) = entries.get(name).and_then(Weak::upgrade) {
            drop(entries);
            // Lost a race with another loader; ours retires through its Drop.
            return Ok(existing);
        }
        entries.insert(name.to_string(), Arc::downgrade(&shader));
        Ok(shader)
    }

    /// Live program `name`, if cached
    pub fn lookup(&self, name: &str) -> Option<Arc<Shader>> {
        lock(&self.entries).get(name).and_then(Weak::upgrade)
    }

    /// Forget `name`, unless the entry was already replaced by a live program
    pub fn remove_shader(&self, name: &str) {
        let mut entries = lock(&self.entries);
        let dead = entries.get(name).is_some_and(|weak| weak.strong_count() == 0);
        if dead {
            log::info!("Removing shader \"{name}\" from cache {}", self.context.get());
            entries.remove(name);
        }
    }

    /// Number of cached names
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    /// Programs waiting for deletion
    pub fn retired_count(&self) -> usize {
        lock(&self.retired).len()
    }

    /// Delete retired programs; must run with this cache's context current
    pub fn collect_garbage(&self, device: &dyn GraphicsDevice) -> usize {
        let retired = std::mem::take(&mut *lock(&self.retired));
        for program in &retired {
            device.delete_program(*program);
        }
        retired.len()
    }

    fn retire(&self, program: ProgramHandle) {
        lock(&self.retired).push(program);
    }
}

impl Drop for ShaderCache {
    fn drop(&mut self) {
        log::info!("Destroyed shader cache for context {}", self.context.get());
    }
}

type CacheTable = RefCell<HashMap<ContextId, Arc<ShaderCache>>>;

/// All shader caches, one per live graphics context
///
/// Cloning is cheap and clones share the same caches.
#[derive(Clone)]
pub struct ShaderCaches {
    caches: Rc<CacheTable>,
    provider: Rc<dyn ShaderSourceProvider>,
}

impl ShaderCaches {
    /// Caches loading sources through `provider`
    pub fn new(provider: impl ShaderSourceProvider + 'static) -> Self {
        Self {
            caches: Rc::new(RefCell::new(HashMap::new())),
            provider: Rc::new(provider),
        }
    }

    /// Shared program `name` for `context`
    pub fn get_shared_shader(
        &self,
        context: &GraphicsContext,
        device: &dyn GraphicsDevice,
        name: &str,
    ) -> Result<Arc<Shader>, LoadError> {
        self.cache_for(context).get_or_load(device, self.provider.as_ref(), name)
    }

    /// The cache of `context`, created on first use. The cache is dropped
    /// when the context is torn down.
    pub fn cache_for(&self, context: &GraphicsContext) -> Arc<ShaderCache> {
        let id = context.id();
        if let Some(cache) = self.caches.borrow().get(&id) {
            return Arc::clone(cache);
        }

        let cache = Arc::new(ShaderCache::new(id));
        self.caches.borrow_mut().insert(id, Arc::clone(&cache));

        let table = Rc::downgrade(&self.caches);
        context.register_resource_releaser(move || {
            if let Some(table) = table.upgrade() {
                table.borrow_mut().remove(&id);
            }
        });
        cache
    }

    /// Delete programs dropped since the last call, for `context`
    pub fn collect_garbage(&self, context: &GraphicsContext, device: &dyn GraphicsDevice) -> usize {
        let cache = self.caches.borrow().get(&context.id()).cloned();
        cache.map_or(0, |cache| cache.collect_garbage(device))
    }

    /// Number of live caches
    pub fn cache_count(&self) -> usize {
        self.caches.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{DeviceCall, RecordingDevice};

    const VERTEX: &str = "attribute vec2 a_position;\nvoid main() {}\n";
    const FRAGMENT: &str = "void main() {}\n";

    fn sources() -> InlineSources {
        InlineSources::new()
            .with_program("tile", VERTEX, FRAGMENT)
            .with_program("sprite", VERTEX, FRAGMENT)
    }

    #[test]
    fn test_get_is_idempotent_while_held() {
        let device = RecordingDevice::new();
        let context = GraphicsContext::new();
        let caches = ShaderCaches::new(sources());

        let first = caches.get_shared_shader(&context, &device, "tile").unwrap();
        let second = caches.get_shared_shader(&context, &device, "tile").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(device.link_count(), 1);
        assert!(first.is_owned_by(&caches.cache_for(&context)));
    }

    #[test]
    fn test_released_shader_is_reclaimed_and_reloaded() {
        let device = RecordingDevice::new();
        let context = GraphicsContext::new();
        let caches = ShaderCaches::new(sources());
        let cache = caches.cache_for(&context);

        let shader = caches.get_shared_shader(&context, &device, "tile").unwrap();
        let program = shader.program();
        assert_eq!(cache.len(), 1);

        drop(shader);
        assert!(cache.is_empty());
        assert_eq!(cache.retired_count(), 1);
        assert_eq!(caches.collect_garbage(&context, &device), 1);
        assert!(device.calls().contains(&DeviceCall::DeleteProgram(program)));

        let _reloaded = caches.get_shared_shader(&context, &device, "tile").unwrap();
        assert_eq!(device.link_count(), 2);
    }

    #[test]
    fn test_attribute_locations_bound_before_link() {
        let device = RecordingDevice::new();
        let context = GraphicsContext::new();
        let caches = ShaderCaches::new(sources());

        let shader = caches.get_shared_shader(&context, &device, "sprite").unwrap();
        let calls = device.calls();
        let bind = calls.iter().position(|call| {
            matches!(call, DeviceCall::BindAttribute { location: 1, name, .. } if name == "a_texCoord")
        });
        let link = calls
            .iter()
            .position(|call| *call == DeviceCall::LinkProgram(shader.program()));

        assert!(bind.is_some());
        assert!(bind < link);
    }

    #[test]
    fn test_compile_failure_releases_partial_objects() {
        let device = RecordingDevice::new();
        device.fail_compile(Some(ShaderStage::Fragment));
        let context = GraphicsContext::new();
        let caches = ShaderCaches::new(sources());

        let result = caches.get_shared_shader(&context, &device, "tile");
        assert!(matches!(
            result,
            Err(LoadError::Compile {
                stage: ShaderStage::Fragment,
                ..
            })
        ));
        assert_eq!(device.live_shader_count(), 0);
        assert!(caches.cache_for(&context).is_empty());

        device.fail_compile(None);
        assert!(caches.get_shared_shader(&context, &device, "tile").is_ok());
    }

    #[test]
    fn test_link_failure_releases_program_and_stages() {
        let device = RecordingDevice::new();
        device.fail_link(true);
        let context = GraphicsContext::new();
        let caches = ShaderCaches::new(sources());

        let result = caches.get_shared_shader(&context, &device, "tile");
        assert!(matches!(result, Err(LoadError::Link { .. })));
        assert_eq!(device.live_shader_count(), 0);
        assert_eq!(device.live_program_count(), 0);
    }

    #[test]
    fn test_unknown_program_is_reported() {
        let device = RecordingDevice::new();
        let context = GraphicsContext::new();
        let caches = ShaderCaches::new(sources());

        assert!(matches!(
            caches.get_shared_shader(&context, &device, "missing"),
            Err(LoadError::Missing(_))
        ));
        assert_eq!(device.link_count(), 0);
    }

    #[test]
    fn test_context_teardown_drops_cache() {
        let device = RecordingDevice::new();
        let caches = ShaderCaches::new(sources());
        let context = GraphicsContext::new();

        let shader = caches.get_shared_shader(&context, &device, "tile").unwrap();
        assert_eq!(caches.cache_count(), 1);

        drop(context);
        assert_eq!(caches.cache_count(), 0);
        assert_eq!(shader.name(), "tile");
        drop(shader);
    }

    #[test]
    fn test_caches_are_per_context() {
        let device = RecordingDevice::new();
        let caches = ShaderCaches::new(sources());
        let first_context = GraphicsContext::new();
        let second_context = GraphicsContext::new();

        let a = caches.get_shared_shader(&first_context, &device, "tile").unwrap();
        let b = caches.get_shared_shader(&second_context, &device, "tile").unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(caches.cache_count(), 2);
    }

    #[test]
    fn test_directory_reads_dialect_extensions() {
        let dir = std::env::temp_dir().join(format!("pyland_shader_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("tile.glesv"), VERTEX).unwrap();
        std::fs::write(dir.join("tile.glesf"), FRAGMENT).unwrap();

        let provider = ShaderDirectory::new(&dir, ShaderDialect::Gles);
        let loaded = provider.load_sources("tile").unwrap();
        assert_eq!(loaded.vertex, VERTEX);
        assert_eq!(loaded.fragment, FRAGMENT);

        let desktop = ShaderDirectory::new(&dir, ShaderDialect::DesktopGl);
        assert!(matches!(desktop.load_sources("tile"), Err(LoadError::Read { .. })));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
