//! The application context and its process-wide slot.
//!
//! Library code that needs a pile but was not handed one asks
//! [`current_pile`]. Everything else should take an `Arc<dyn Pile>`
//! explicitly.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use pile_store::{InMemoryPile, Pile};
use tracing::info;
use uuid::Uuid;

use crate::config::{AppConfig, MemoryModel};
use crate::error::{AppError, AppResult};

static MEMORY_MODEL: RwLock<MemoryModel> = RwLock::new(MemoryModel::Regular);
static CURRENT: RwLock<Option<Arc<AppContext>>> = RwLock::new(None);

/// Ambient services of a running application.
pub struct AppContext {
    name: String,
    instance_id: Uuid,
    start_time: DateTime<Utc>,
    memory_model: MemoryModel,
    pile: Arc<dyn Pile>,
}

impl AppContext {
    /// Create a context around an existing pile, using the process memory
    /// model.
    pub fn new(name: impl Into<String>, pile: Arc<dyn Pile>) -> AppResult<Self> {
        Ok(Self {
            name: name.into(),
            instance_id: Uuid::now_v7(),
            start_time: Utc::now(),
            memory_model: memory_model()?,
            pile,
        })
    }

    /// Create a context with a fresh [`InMemoryPile`] built from `config`.
    ///
    /// The config's memory model becomes the process memory model if no
    /// application is installed yet.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        if !is_available() {
            set_memory_model(config.memory_model)?;
        }
        let pile = Arc::new(InMemoryPile::with_config(config.pile_config()));
        Ok(Self {
            name: config.name.clone(),
            instance_id: Uuid::now_v7(),
            start_time: Utc::now(),
            memory_model: config.memory_model,
            pile,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn memory_model(&self) -> MemoryModel {
        self.memory_model
    }

    /// The application's pile.
    pub fn pile(&self) -> Arc<dyn Pile> {
        Arc::clone(&self.pile)
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("name", &self.name)
            .field("instance_id", &self.instance_id)
            .field("start_time", &self.start_time)
            .field("memory_model", &self.memory_model)
            .finish_non_exhaustive()
    }
}

/// The process memory model.
pub fn memory_model() -> AppResult<MemoryModel> {
    let model = MEMORY_MODEL
        .read()
        .map_err(|e| AppError::LockPoisoned(e.to_string()))?;
    Ok(*model)
}

/// Change the process memory model. Only allowed while no application is
/// installed.
pub fn set_memory_model(model: MemoryModel) -> AppResult<()> {
    if is_available() {
        return Err(AppError::MemoryModelLocked);
    }
    let mut current = MEMORY_MODEL
        .write()
        .map_err(|e| AppError::LockPoisoned(e.to_string()))?;
    *current = model;
    Ok(())
}

/// Install `ctx` as the process-wide application.
pub fn install(ctx: AppContext) -> AppResult<Arc<AppContext>> {
    let mut slot = CURRENT
        .write()
        .map_err(|e| AppError::LockPoisoned(e.to_string()))?;
    if let Some(existing) = slot.as_ref() {
        return Err(AppError::AlreadyInstalled(existing.name.clone()));
    }
    let ctx = Arc::new(ctx);
    info!(
        app = %ctx.name,
        instance = %ctx.instance_id,
        memory_model = %ctx.memory_model,
        "application installed"
    );
    *slot = Some(Arc::clone(&ctx));
    Ok(ctx)
}

/// Remove the installed application, returning it if there was one.
pub fn uninstall() -> AppResult<Option<Arc<AppContext>>> {
    let mut slot = CURRENT
        .write()
        .map_err(|e| AppError::LockPoisoned(e.to_string()))?;
    let previous = slot.take();
    if let Some(ctx) = previous.as_ref() {
        info!(app = %ctx.name, instance = %ctx.instance_id, "application uninstalled");
    }
    Ok(previous)
}

/// The installed application.
pub fn current() -> AppResult<Arc<AppContext>> {
    let slot = CURRENT
        .read()
        .map_err(|e| AppError::LockPoisoned(e.to_string()))?;
    slot.as_ref().cloned().ok_or(AppError::NotInstalled)
}

/// The installed application's pile.
pub fn current_pile() -> AppResult<Arc<dyn Pile>> {
    Ok(current()?.pile())
}

/// Returns `true` if an application is installed.
pub fn is_available() -> bool {
    CURRENT.read().map(|slot| slot.is_some()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pile_store::PileExt;
    use std::sync::Mutex;

    // The slot is process-wide; tests touching it run one at a time.
    static SERIAL: Mutex<()> = Mutex::new(());

    fn serial() -> std::sync::MutexGuard<'static, ()> {
        SERIAL.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn install_and_resolve_pile() {
        let _g = serial();
        uninstall().unwrap();

        let ctx = AppContext::from_config(&AppConfig::default()).unwrap();
        let installed = install(ctx).unwrap();
        assert!(is_available());
        assert_eq!(current().unwrap().instance_id(), installed.instance_id());

        let pile = current_pile().unwrap();
        let h = pile.put_value(&42u32).unwrap();
        let v: u32 = installed.pile().get_value(h).unwrap();
        assert_eq!(v, 42);

        assert!(uninstall().unwrap().is_some());
        assert!(!is_available());
    }

    #[test]
    fn current_without_install_fails() {
        let _g = serial();
        uninstall().unwrap();
        assert!(matches!(current(), Err(AppError::NotInstalled)));
        assert!(matches!(current_pile(), Err(AppError::NotInstalled)));
    }

    #[test]
    fn second_install_is_rejected() {
        let _g = serial();
        uninstall().unwrap();

        let first = AppContext::new("first", Arc::new(InMemoryPile::new())).unwrap();
        install(first).unwrap();
        let second = AppContext::new("second", Arc::new(InMemoryPile::new())).unwrap();
        let err = install(second).unwrap_err();
        assert!(matches!(err, AppError::AlreadyInstalled(name) if name == "first"));

        uninstall().unwrap();
    }

    #[test]
    fn memory_model_locked_while_installed() {
        let _g = serial();
        uninstall().unwrap();

        set_memory_model(MemoryModel::Tiny).unwrap();
        assert_eq!(memory_model().unwrap(), MemoryModel::Tiny);

        let ctx = AppContext::new("locked", Arc::new(InMemoryPile::new())).unwrap();
        assert_eq!(ctx.memory_model(), MemoryModel::Tiny);
        install(ctx).unwrap();
        assert!(matches!(
            set_memory_model(MemoryModel::Regular),
            Err(AppError::MemoryModelLocked)
        ));

        uninstall().unwrap();
        set_memory_model(MemoryModel::Regular).unwrap();
    }

    #[test]
    fn from_config_sets_memory_model() {
        let _g = serial();
        uninstall().unwrap();

        let config = AppConfig {
            memory_model: MemoryModel::Compact,
            ..Default::default()
        };
        let ctx = AppContext::from_config(&config).unwrap();
        assert_eq!(ctx.memory_model(), MemoryModel::Compact);
        assert_eq!(memory_model().unwrap(), MemoryModel::Compact);
        set_memory_model(MemoryModel::Regular).unwrap();
    }

    #[test]
    fn debug_hides_pile() {
        let ctx = AppContext::new("dbg", Arc::new(InMemoryPile::new())).unwrap();
        let debug = format!("{ctx:?}");
        assert!(debug.contains("dbg"));
        assert!(debug.contains("instance_id"));
    }
}
