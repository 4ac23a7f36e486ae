use std::sync::Arc;

use serde_json::{Map as JsonMap, Value as JsonValue};
use trash_dispatch::{builtins, Dispatch, Dispatcher, HandlerRegistry};
use trash_instance_store::{FlushReport, Instance, InstanceStore, SqliteStore};
use trash_sys::{Config, FallbackBridge, ResolvedConfig};

use crate::RuntimeError;

pub struct Runtime {
    config: ResolvedConfig,
    store: InstanceStore<SqliteStore>,
    dispatcher: Dispatcher,
    bridge: FallbackBridge,
}

impl Runtime {
    /// Open the configured database with the built-in behaviors.
    pub fn open(config: Config) -> Result<Self, RuntimeError> {
        Self::open_with_registry(config, builtins::registry())
    }

    pub fn open_with_registry(
        config: Config,
        registry: HandlerRegistry,
    ) -> Result<Self, RuntimeError> {
        let config = config.resolve()?;
        let backend = SqliteStore::open(&config.store_path, config.busy_timeout).map_err(
            |source| RuntimeError::Open {
                path: config.store_path.clone(),
                source,
            },
        )?;
        log::debug!("Opened instance store at {}", config.store_path.display());

        Ok(Self {
            store: InstanceStore::new(backend),
            dispatcher: Dispatcher::new(Arc::new(registry)),
            bridge: FallbackBridge::from_config(&config),
            config,
        })
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn store(&self) -> &InstanceStore<SqliteStore> {
        &self.store
    }

    pub fn registry(&self) -> &HandlerRegistry {
        self.dispatcher.registry()
    }

    pub fn bridge(&self) -> &FallbackBridge {
        &self.bridge
    }

    /// Create and persist an instance of `class`, returning its id.
    pub fn create(
        &self,
        class: &str,
        defaults: &JsonMap<String, JsonValue>,
    ) -> Result<String, RuntimeError> {
        let (id, _) = self.store.create(class, defaults)?;
        Ok(id)
    }

    pub fn load(&self, id: &str) -> Result<Instance, RuntimeError> {
        Ok(self.store.load(id)?)
    }

    pub fn delete(&self, id: &str) -> Result<(), RuntimeError> {
        Ok(self.store.delete(id)?)
    }

    pub fn find_by_class(&self, class: &str) -> Result<Vec<String>, RuntimeError> {
        Ok(self.store.find_by_class(class)?)
    }

    pub fn flush(&self) -> Result<usize, RuntimeError> {
        Ok(self.store.flush()?)
    }

    /// Send `selector` with `args` to the instance `id`.
    ///
    /// A native behavior runs against the cached instance and any change it
    /// makes is marked dirty. Otherwise the interpreter handles the send: the
    /// cached copy is written back first if dirty, and evicted afterwards so
    /// the next access reads what the interpreter stored.
    pub fn send(
        &self,
        id: &str,
        selector: &str,
        args: &[JsonValue],
    ) -> Result<String, RuntimeError> {
        let outcome = self.store.update(id, |instance| {
            self.dispatcher.dispatch(selector, instance, args)
        })?;

        match outcome {
            Dispatch::Handled(result) => Ok(result),
            Dispatch::Failed(source) => Err(RuntimeError::Handler {
                id: id.to_string(),
                selector: selector.to_string(),
                source,
            }),
            Dispatch::NotHandled => self.forward(id, selector, args),
        }
    }

    fn forward(&self, id: &str, selector: &str, args: &[JsonValue]) -> Result<String, RuntimeError> {
        if self.store.is_dirty(id) {
            self.store.save_cached(id)?;
        }

        let args: Vec<String> = args.iter().map(trash_doc_codec::render).collect();
        let result = self.bridge.send_message(id, selector, &args);
        self.store.evict(id);
        Ok(result?)
    }

    /// Flush dirty instances and close the database.
    pub fn close(self) -> FlushReport {
        self.store.close()
    }
}
