//! The compilation context shared by every load in a process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ppload_cache::{
    serialize, CacheError, CacheHeader, CacheStore, CompiledUnit, DependencyRegistry,
    FingerprintMode, Freshness, StalenessValidator, Trailer, UnitId,
};
use ppload_common::InternalError;
use ppload_config::{LoaderConfig, ResolvedSource};
use ppload_diagnostics::{
    rewrite_error, ErrorReport, ReportRenderer, ReportedError, TerminalRenderer, Traceback,
};
use ppload_preprocess::{MacroEngine, MacroState, Mode, Preprocessor};
use ppload_source::{LineSource, PreprocessedSources, SourceSlot, SourceText};
use rayon::prelude::*;

use crate::error::LoadError;
use crate::host::Host;

/// A freshly compiled unit together with its registry identity.
#[derive(Debug)]
pub struct Compiled<U> {
    /// Key of the unit's dependency list in the [`DependencyRegistry`].
    pub id: UnitId,
    /// The compiled unit.
    pub unit: U,
}

/// Owns all state shared between loads and drives the host through them.
///
/// Loads of the same origin are serialized by a per-origin lock held across
/// preprocessing, compilation and cache writing. Loads of different origins
/// run concurrently. A lock is dropped from the table once no load holds or
/// waits for it.
pub struct CompilationContext<H: Host> {
    config: LoaderConfig,
    host: H,
    preprocessor: Preprocessor,
    dependencies: DependencyRegistry,
    sources: PreprocessedSources,
    store: CacheStore,
    unit_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
    session: Mutex<MacroState>,
}

impl<H: Host> CompilationContext<H> {
    /// Creates a context for `host`, expanding macros with `engine`.
    pub fn new(config: LoaderConfig, host: H, engine: Arc<dyn MacroEngine>) -> Self {
        let session = MacroState::with_defines(&config.defines);
        Self {
            store: CacheStore::new(&config),
            preprocessor: Preprocessor::new(engine),
            dependencies: DependencyRegistry::new(),
            sources: PreprocessedSources::new(),
            unit_locks: Mutex::new(HashMap::new()),
            session: Mutex::new(session),
            config,
            host,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Returns the host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Returns the dependency registry.
    pub fn dependencies(&self) -> &DependencyRegistry {
        &self.dependencies
    }

    /// Returns the preprocessed-source registry.
    pub fn sources(&self) -> &PreprocessedSources {
        &self.sources
    }

    /// Returns the cache store.
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Returns the bytes the host should compile for `origin`.
    ///
    /// Files selected for preprocessing come back expanded, with their
    /// dependencies recorded. Each file starts from the configured defines.
    pub fn get_source_bytes(&self, origin: &Path) -> Result<Vec<u8>, LoadError> {
        let raw = std::fs::read(origin).map_err(|source| LoadError::Io {
            path: origin.to_path_buf(),
            source,
        })?;
        if !self.config.should_preprocess(origin) {
            return Ok(raw);
        }

        let text = String::from_utf8(raw).map_err(|_| LoadError::NotUtf8 {
            path: origin.to_path_buf(),
        })?;
        let mut state = MacroState::with_defines(&self.config.defines);
        let preprocessed = self.preprocessor.preprocess_for_load(
            &text,
            origin,
            &mut state,
            FingerprintMode::for_invalidation(self.config.invalidation),
            &self.dependencies,
            &self.sources,
        )?;
        tracing::debug!(
            target = "ppload.loader",
            origin = %origin.display(),
            dependencies = preprocessed.dependencies.len(),
            "preprocessed source"
        );

        if self.config.persist_preprocessed_text_to_disk && self.config.is_preprocessed(origin) {
            self.persist(origin, &preprocessed.text);
        }
        Ok(preprocessed.text.into_bytes())
    }

    /// Compiles `bytes` for `origin` and binds its dependencies to the unit.
    pub fn source_to_unit(&self, bytes: &[u8], origin: &Path) -> Result<Compiled<H::Unit>, LoadError> {
        let text = std::str::from_utf8(bytes).map_err(|_| LoadError::NotUtf8 {
            path: origin.to_path_buf(),
        })?;
        let unit = match self.host.compile(text, origin) {
            Ok(unit) => unit,
            Err(err) => {
                self.dependencies.discard(origin);
                return Err(err.into());
            }
        };
        if unit.origin() != origin {
            self.dependencies.discard(origin);
            return Err(InternalError::new(format!(
                "host returned a unit for {}",
                unit.origin().display()
            ))
            .while_loading(origin)
            .into());
        }
        let id = self.dependencies.bind(origin);
        Ok(Compiled { id, unit })
    }

    /// Encodes a cache entry for `compiled`, consuming its dependency list.
    ///
    /// `header` must describe the raw origin as it was before its source was
    /// read. Family files get the trailer captured while preprocessing.
    pub fn serialize_cache(
        &self,
        compiled: &Compiled<H::Unit>,
        header: &CacheHeader,
    ) -> Result<Vec<u8>, CacheError> {
        let origin = compiled.unit.origin();
        let snapshot = self.dependencies.take(compiled.id);
        let trailer = self.config.is_preprocessed(origin).then(|| match snapshot {
            Some(snapshot) => snapshot.trailer,
            None => Trailer::capture(&[], FingerprintMode::for_header(header)),
        });
        serialize(&compiled.unit, header, trailer.as_ref())
    }

    /// Decides whether a cache entry read for `origin` can be used.
    pub fn validate_cache(&self, bytes: &[u8], origin: &Path) -> Freshness<H::Unit> {
        StalenessValidator::new(&self.config).validate(bytes, origin)
    }

    /// Returns the compiled unit for `path`, from cache when it is fresh.
    ///
    /// A failed cache write is logged and does not fail the load.
    pub fn get_code(&self, path: &Path) -> Result<H::Unit, LoadError> {
        let origin = absolute(path)?;
        let lock = self.unit_lock(&origin);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.load_locked(&origin)
        };
        self.release_unit_lock(&origin, lock);
        result
    }

    fn load_locked(&self, origin: &Path) -> Result<H::Unit, LoadError> {
        if let Some(bytes) = self.store.read(origin) {
            if let Freshness::Fresh(unit) = self.validate_cache(&bytes, origin) {
                tracing::debug!(target = "ppload.loader", origin = %origin.display(), "cache hit");
                return Ok(unit);
            }
        }

        // Stats first: an edit after this point makes the entry stale.
        let header = CacheHeader::for_origin(origin, self.config.invalidation);
        let source = self.get_source_bytes(origin)?;
        let compiled = self.source_to_unit(&source, origin)?;
        let written = header
            .and_then(|header| self.serialize_cache(&compiled, &header))
            .and_then(|bytes| self.store.write(origin, &bytes));
        if let Err(err) = written {
            self.dependencies.take(compiled.id);
            tracing::warn!(
                target = "ppload.loader",
                origin = %origin.display(),
                error = %err,
                "failed to write cache entry"
            );
        }
        Ok(compiled.unit)
    }

    /// Loads several units in parallel. Results keep the order of `paths`.
    pub fn load_many(&self, paths: &[PathBuf]) -> Vec<Result<H::Unit, LoadError>> {
        paths.par_iter().map(|path| self.get_code(path)).collect()
    }

    /// Preprocesses interactive or evaluated input named `name`.
    ///
    /// Snippets share one macro state for the life of the context, so a
    /// definition made in one snippet is visible to the next. A failing
    /// snippet leaves that state untouched. `Ok(None)` means the snippet
    /// ends inside an open conditional and more input is needed.
    pub fn preprocess_snippet(&self, text: &str, name: &Path) -> Result<Option<String>, LoadError> {
        let mode = if self.config.should_preprocess(name) {
            Mode::Enabled
        } else {
            Mode::Disabled
        };
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self
            .preprocessor
            .preprocess_snippet(text, name, &mut session, mode)?)
    }

    /// Picks the source file for module `name` in `dir`.
    pub fn resolve_module(&self, dir: &Path, name: &str) -> Option<ResolvedSource> {
        ppload_config::resolve_module(&self.config, dir, name)
    }

    /// Builds the report for a failure raised while running `entry`.
    pub fn report(
        &self,
        error: ReportedError,
        trace: &Traceback,
        entry: Option<&Path>,
    ) -> ErrorReport {
        rewrite_error(error, trace, entry, &self.sources)
    }

    /// Renders `report` for a terminal, showing the text the compiler saw.
    pub fn render(&self, report: &ErrorReport, color: bool) -> String {
        TerminalRenderer::new(color).render(report, self)
    }

    fn unit_lock(&self, origin: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.unit_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(origin.to_path_buf()).or_default())
    }

    /// Handles are only cloned out while the table is locked, so a count of
    /// one means no other load holds or waits for this origin.
    fn release_unit_lock(&self, origin: &Path, lock: Arc<Mutex<()>>) {
        let mut locks = self.unit_locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(lock);
        if locks.get(origin).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(origin);
        }
    }

    fn persist(&self, origin: &Path, text: &str) {
        let target = self.config.persisted_path(origin);
        if let Err(err) = std::fs::write(&target, text) {
            tracing::warn!(
                target = "ppload.loader",
                path = %target.display(),
                error = %err,
                "failed to persist preprocessed text"
            );
        }
    }
}

impl<H: Host> LineSource for CompilationContext<H> {
    /// Preprocessed text when available. Otherwise the persisted copy of a
    /// family file that was never preprocessed in this process, then the
    /// file itself.
    fn line(&self, path: &Path, line: u32) -> Option<String> {
        match self.sources.lookup(path) {
            Some(SourceSlot::Ready(text)) => text.line(line).map(str::to_string),
            Some(SourceSlot::Pending) => line_from_disk(path, line),
            None => {
                if self.config.persist_preprocessed_text_to_disk && self.config.is_preprocessed(path) {
                    let persisted = self.config.persisted_path(path);
                    if persisted.is_file() {
                        return line_from_disk(&persisted, line);
                    }
                }
                line_from_disk(path, line)
            }
        }
    }
}

fn line_from_disk(path: &Path, line: u32) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    SourceText::new(path, content).line(line).map(str::to_string)
}

fn absolute(path: &Path) -> Result<PathBuf, LoadError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|dir| dir.join(path))
        .map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })
}
