/// Galaxy3D Engine - Singleton holder for the serializer subsystems
///
/// This module provides global access to the process-wide type registry and
/// to the logger. The registry is frozen once installed: it is shared as an
/// `Arc<TypeRegistry>` and read concurrently by every save and load.

use std::sync::{OnceLock, RwLock, Arc};
use std::time::SystemTime;
use crate::error::{Result, Error};
use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
use crate::record::RecordRef;
use crate::registry::TypeRegistry;
use crate::serializer::{Serializer, LoadedGraph};

// ===== INTERNAL STATE =====

/// Global engine state storage
static ENGINE_STATE: OnceLock<EngineState> = OnceLock::new();

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Entries below this severity never reach the logger
static MIN_SEVERITY: RwLock<LogSeverity> = RwLock::new(LogSeverity::Info);

/// Internal state structure holding all engine singletons
struct EngineState {
    /// Frozen type registry shared by every serializer
    type_registry: RwLock<Option<Arc<TypeRegistry>>>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            type_registry: RwLock::new(None),
        }
    }
}

// ===== PUBLIC API =====

/// Main engine singleton manager
///
/// # Example
///
/// ```no_run
/// use galaxy_3d_serializer::galaxy3d::Engine;
/// use galaxy_3d_serializer::galaxy3d::registry::TypeRegistry;
///
/// Engine::initialize()?;
///
/// let registry = TypeRegistry::new();
/// // registry.register_type::<SceneNode>(TypeTag(0x100), "SceneNode")?;
/// Engine::create_type_registry(registry)?;
///
/// // let bytes = Engine::save_graph(&scene_root)?;
/// // let loaded = Engine::load_graph(&bytes)?;
///
/// Engine::shutdown();
/// # Ok::<(), galaxy_3d_serializer::galaxy3d::Error>(())
/// ```
pub struct Engine;

impl Engine {
    /// Helper to log errors before returning them (internal use)
    fn log_and_return_error(error: Error) -> Error {
        match &error {
            Error::InitializationFailed(msg) => {
                crate::engine_error!("galaxy3d::Engine", "Initialization failed: {}", msg);
            }
            Error::LockPoisoned(msg) => {
                crate::engine_error!("galaxy3d::Engine", "Lock poisoned: {}", msg);
            }
            _ => {
                crate::engine_error!("galaxy3d::Engine", "Engine error: {}", error);
            }
        }
        error
    }

    fn state() -> Result<&'static EngineState> {
        ENGINE_STATE.get()
            .ok_or_else(|| Self::log_and_return_error(
                Error::InitializationFailed("Engine not initialized. Call Engine::initialize() first.".to_string())
            ))
    }

    /// Initialize the engine
    ///
    /// Must be called once before installing the type registry. Idempotent.
    pub fn initialize() -> Result<()> {
        ENGINE_STATE.get_or_init(EngineState::new);
        Ok(())
    }

    /// Shutdown the engine and release the type registry
    ///
    /// Serializers already holding the registry keep it alive until dropped.
    pub fn shutdown() {
        if let Some(state) = ENGINE_STATE.get() {
            if let Ok(mut registry) = state.type_registry.write() {
                *registry = None;
            }
        }
        crate::engine_info!("galaxy3d::Engine", "Engine shutdown");
    }

    // ===== TYPE REGISTRY API =====

    /// Install the process-wide type registry
    ///
    /// The registry is frozen from this point on.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The engine is not initialized
    /// - A type registry is already installed
    /// - The registry lock is poisoned
    pub fn create_type_registry(registry: TypeRegistry) -> Result<()> {
        let state = Self::state()?;

        let mut lock = state.type_registry.write()
            .map_err(|_| Self::log_and_return_error(
                Error::LockPoisoned("TypeRegistry lock".to_string())
            ))?;

        if lock.is_some() {
            return Err(Self::log_and_return_error(
                Error::InitializationFailed("TypeRegistry already exists. Call Engine::destroy_type_registry() first.".to_string())
            ));
        }

        let types = registry.len();
        *lock = Some(Arc::new(registry));

        crate::engine_info!("galaxy3d::Engine", "TypeRegistry singleton created with {} types", types);

        Ok(())
    }

    /// Get the type registry singleton
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The engine is not initialized
    /// - The type registry has not been created
    pub fn type_registry() -> Result<Arc<TypeRegistry>> {
        let state = Self::state()?;

        let lock = state.type_registry.read()
            .map_err(|_| Self::log_and_return_error(
                Error::LockPoisoned("TypeRegistry lock".to_string())
            ))?;

        lock.clone()
            .ok_or_else(|| Self::log_and_return_error(
                Error::InitializationFailed("TypeRegistry not created. Call Engine::create_type_registry() first.".to_string())
            ))
    }

    /// Destroy the type registry singleton, allowing a new one to be installed
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is not initialized
    pub fn destroy_type_registry() -> Result<()> {
        let state = Self::state()?;

        let mut lock = state.type_registry.write()
            .map_err(|_| Self::log_and_return_error(
                Error::LockPoisoned("TypeRegistry lock".to_string())
            ))?;

        *lock = None;

        crate::engine_info!("galaxy3d::Engine", "TypeRegistry singleton destroyed");

        Ok(())
    }

    // ===== SERIALIZATION API =====

    /// Save a graph with the process-wide type registry
    ///
    /// # Errors
    ///
    /// Engine errors from `type_registry()`, then any save error.
    pub fn save_graph(root: &RecordRef) -> Result<Vec<u8>> {
        let registry = Self::type_registry()?;
        let mut serializer = Serializer::new(&registry);
        serializer.save(root)
    }

    /// Load a graph with the process-wide type registry
    ///
    /// # Errors
    ///
    /// Engine errors from `type_registry()`, then any load error.
    pub fn load_graph(bytes: &[u8]) -> Result<LoadedGraph> {
        let registry = Self::type_registry()?;
        let mut serializer = Serializer::new(&registry);
        serializer.load(bytes)
    }

    /// Reset all singletons for testing (only available in test builds)
    #[cfg(test)]
    pub fn reset_for_testing() {
        if let Some(state) = ENGINE_STATE.get() {
            if let Ok(mut registry) = state.type_registry.write() {
                *registry = None;
            }
        }
        Self::reset_logger();
        Self::set_min_severity(LogSeverity::Info);
    }

    // ===== LOGGING API =====

    /// Set a custom logger
    ///
    /// # Example
    ///
    /// ```no_run
    /// use galaxy_3d_serializer::galaxy3d::{Engine, log::{Logger, LogEntry}};
    ///
    /// struct FileLogger;
    /// impl Logger for FileLogger {
    ///     fn log(&self, entry: &LogEntry) {
    ///         // Write to file...
    ///     }
    /// }
    ///
    /// Engine::set_logger(FileLogger);
    /// ```
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(mut lock) = logger_lock.write() {
            *lock = Box::new(logger);
        }
    }

    /// Reset logger to default (DefaultLogger)
    pub fn reset_logger() {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(mut lock) = logger_lock.write() {
            *lock = Box::new(DefaultLogger);
        }
    }

    /// Drop entries below `severity` before they reach the logger (default `Info`)
    pub fn set_min_severity(severity: LogSeverity) {
        if let Ok(mut lock) = MIN_SEVERITY.write() {
            *lock = severity;
        }
    }

    /// Current minimum severity
    pub fn min_severity() -> LogSeverity {
        MIN_SEVERITY.read().map_or(LogSeverity::Info, |lock| *lock)
    }

    /// Internal logging method (for simple logs without file:line)
    ///
    /// Used by macros like engine_info!, engine_debug!, etc.
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        Self::dispatch(LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: None,
            line: None,
        });
    }

    /// Internal logging method with file:line information (for ERROR logs)
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        Self::dispatch(LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: Some(file),
            line: Some(line),
        });
    }

    fn dispatch(entry: LogEntry) {
        if entry.severity < Self::min_severity() {
            return;
        }
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(lock) = logger_lock.read() {
            lock.log(&entry);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
