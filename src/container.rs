//! Dependency container.
//!
//! Maps abstract string keys to factories or already-resolved instances and
//! resolves a requested key into a concrete value, memoizing the result
//! (singleton-after-first-resolve). Rust has no runtime reflection, so
//! constructor autowiring is expressed as an explicit capability: types
//! implement [`Construct`] and pull their own dependencies back out of the
//! container. Typed lookups key off `std::any::type_name`, so
//! `container.make::<Engine>()` and `container.resolve("my_app::Engine", …)`
//! hit the same binding.
//!
//! # Scoping
//!
//! A container built at startup holds framework-level singletons and stays
//! read-only while serving. [`Container::scope`] layers a fresh child over
//! it for each request: lookups fall back to the parent, memoization writes
//! land in the child and are dropped with it. Concurrent requests therefore
//! never race on the instance cache.
//!
//! # Cycles
//!
//! Dependency cycles between `Construct` impls are not detected; resolution
//! recurses until the stack limit. Don't write cycles.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::Error;

/// A resolved value held by the container.
pub type Value = Arc<dyn Any + Send + Sync>;

type Factory = Arc<dyn Fn(&Container, &Overrides) -> Result<Value, Error> + Send + Sync>;
type Extender = Arc<dyn Fn(Value, &Container) -> Value + Send + Sync>;

/// Explicit constructor: how a type builds itself out of the container.
///
/// The reflection-free equivalent of constructor autowiring. An impl reads
/// named overrides first, then resolves typed dependencies recursively:
///
/// ```rust
/// use melanth::{Construct, Container, Error, Overrides};
/// use std::sync::Arc;
///
/// struct Engine;
///
/// impl Construct for Engine {
///     fn construct(_: &Container, _: &Overrides) -> Result<Self, Error> {
///         Ok(Engine)
///     }
/// }
///
/// struct Car {
///     engine: Arc<Engine>,
/// }
///
/// impl Construct for Car {
///     fn construct(container: &Container, overrides: &Overrides) -> Result<Self, Error> {
///         let engine = match overrides.get::<Engine>("engine") {
///             Some(engine) => engine,
///             None => container.make::<Engine>()?,
///         };
///         Ok(Car { engine })
///     }
/// }
/// ```
pub trait Construct: Sized + Send + Sync + 'static {
    fn construct(container: &Container, overrides: &Overrides) -> Result<Self, Error>;
}

/// Named parameters that take priority over container resolution for one
/// `make_with`/`resolve` call.
///
/// The map is threaded explicitly through the resolution call frame, so
/// nested resolutions never see an outer call's overrides.
#[derive(Default, Clone)]
pub struct Overrides {
    values: HashMap<String, Value>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named value, wrapping it for storage.
    pub fn with(mut self, name: impl Into<String>, value: impl Any + Send + Sync) -> Self {
        self.values.insert(name.into(), Arc::new(value));
        self
    }

    /// Adds an already-shared value without re-wrapping it.
    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Typed lookup. Returns `None` when the name is absent or the stored
    /// value has a different type.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.values.get(name).cloned().and_then(|v| v.downcast::<T>().ok())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Default)]
struct Registry {
    aliases: HashMap<String, String>,
    bindings: HashMap<String, Factory>,
    instances: HashMap<String, Value>,
    extenders: HashMap<String, Vec<Extender>>,
}

/// The dependency container.
pub struct Container {
    parent: Option<Arc<Container>>,
    registry: RwLock<Registry>,
}

impl Container {
    pub fn new() -> Self {
        Self { parent: None, registry: RwLock::new(Registry::default()) }
    }

    /// Creates a child container layered over this one.
    ///
    /// The child sees every parent binding, instance, alias, and extender,
    /// but its own registrations and memoized instances never reach the
    /// parent. Build one per request.
    pub fn scope(self: Arc<Self>) -> Container {
        Container { parent: Some(self), registry: RwLock::new(Registry::default()) }
    }

    /// The canonical string key for a type.
    pub fn key_of<T: ?Sized>() -> &'static str {
        type_name::<T>()
    }

    // ── Registration ─────────────────────────────────────────────────────────

    /// Registers a factory for an abstract key.
    pub fn bind_factory<F>(&self, key: impl Into<String>, factory: F)
    where
        F: Fn(&Container, &Overrides) -> Result<Value, Error> + Send + Sync + 'static,
    {
        let key = self.get_alias(&key.into());
        self.registry.write().unwrap().bindings.insert(key, Arc::new(factory));
    }

    /// Registers a type under its own name, built through [`Construct`].
    ///
    /// The equivalent of binding an abstract key with no explicit concrete:
    /// the key is its own recipe.
    pub fn bind<T: Construct>(&self) {
        self.bind_factory(Self::key_of::<T>(), |container, overrides| {
            Ok(Arc::new(T::construct(container, overrides)?) as Value)
        });
    }

    /// Registers a one-level indirection: resolving `abstract_key` resolves
    /// `concrete_key` instead.
    pub fn bind_key(&self, abstract_key: impl Into<String>, concrete_key: impl Into<String>) {
        let concrete = concrete_key.into();
        self.bind_factory(abstract_key, move |container, overrides| {
            container.resolve(&concrete, overrides)
        });
    }

    /// Stores an already-resolved singleton for a key. Every later `make`
    /// without overrides returns this exact value.
    pub fn instance(&self, key: impl Into<String>, value: impl Any + Send + Sync) {
        self.instance_value(key, Arc::new(value));
    }

    /// [`Container::instance`] for values that are already shared.
    pub fn instance_value(&self, key: impl Into<String>, value: Value) {
        self.registry.write().unwrap().instances.insert(key.into(), value);
    }

    /// Stores a typed singleton under the type's own key.
    pub fn put<T: Any + Send + Sync>(&self, value: T) {
        self.instance(Self::key_of::<T>(), value);
    }

    /// Registers a lookup alias for an abstract key.
    ///
    /// Fails when a key aliases itself.
    pub fn alias(&self, abstract_key: &str, alias: &str) -> Result<(), Error> {
        if abstract_key == alias {
            return Err(Error::Configuration(format!("[{abstract_key}] cannot alias itself")));
        }
        self.registry
            .write()
            .unwrap()
            .aliases
            .insert(alias.to_owned(), abstract_key.to_owned());
        Ok(())
    }

    /// Appends a post-build transform for a key, applied in registration
    /// order on every fresh resolution (never on a cache hit).
    pub fn extend<F>(&self, key: impl Into<String>, extender: F)
    where
        F: Fn(Value, &Container) -> Value + Send + Sync + 'static,
    {
        self.registry
            .write()
            .unwrap()
            .extenders
            .entry(key.into())
            .or_default()
            .push(Arc::new(extender));
    }

    /// Whether a binding or instance exists for the key, here or in a
    /// parent scope.
    pub fn bound(&self, key: &str) -> bool {
        let key = self.get_alias(key);
        self.has_factory(&key) || self.find_instance(&key).is_some()
    }

    /// Follows the alias indirection exactly once.
    pub fn get_alias(&self, key: &str) -> String {
        self.lookup_alias(key).unwrap_or_else(|| key.to_owned())
    }

    // ── Resolution ───────────────────────────────────────────────────────────

    /// Resolves a typed value, falling back to `T`'s own [`Construct`] impl
    /// when no binding exists for its key.
    pub fn make<T: Construct>(&self) -> Result<Arc<T>, Error> {
        self.make_with(&Overrides::new())
    }

    /// [`Container::make`] with named parameters that win over container
    /// resolution inside `T::construct`.
    pub fn make_with<T: Construct>(&self, overrides: &Overrides) -> Result<Arc<T>, Error> {
        let key = Self::key_of::<T>();
        if !self.has_factory(&self.get_alias(key)) {
            self.bind::<T>();
        }
        self.resolve(key, overrides)?
            .downcast::<T>()
            .map_err(|_| Error::Instantiation(key.to_owned()))
    }

    /// Resolves an abstract key.
    ///
    /// Alias is followed once. With empty overrides a memoized instance is
    /// returned as-is; otherwise the bound factory runs, extenders apply in
    /// order, and the result is memoized as the key's new instance.
    pub fn resolve(&self, key: &str, overrides: &Overrides) -> Result<Value, Error> {
        let key = self.get_alias(key);

        if overrides.is_empty() {
            if let Some(existing) = self.find_instance(&key) {
                return Ok(existing);
            }
        }

        let factory =
            self.find_factory(&key).ok_or_else(|| Error::Instantiation(key.clone()))?;

        let mut value = factory(self, overrides)?;

        for extender in self.find_extenders(&key) {
            value = extender(value, self);
        }

        self.registry.write().unwrap().instances.insert(key, Arc::clone(&value));

        Ok(value)
    }

    /// Resolves an abstract key with no overrides.
    pub fn make_key(&self, key: &str) -> Result<Value, Error> {
        self.resolve(key, &Overrides::new())
    }

    // ── Scope-chain lookups ──────────────────────────────────────────────────

    fn lookup_alias(&self, key: &str) -> Option<String> {
        if let Some(target) = self.registry.read().unwrap().aliases.get(key) {
            return Some(target.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup_alias(key))
    }

    fn has_factory(&self, key: &str) -> bool {
        self.find_factory(key).is_some()
    }

    fn find_factory(&self, key: &str) -> Option<Factory> {
        if let Some(factory) = self.registry.read().unwrap().bindings.get(key) {
            return Some(Arc::clone(factory));
        }
        self.parent.as_ref().and_then(|parent| parent.find_factory(key))
    }

    fn find_instance(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.registry.read().unwrap().instances.get(key) {
            return Some(Arc::clone(value));
        }
        self.parent.as_ref().and_then(|parent| parent.find_instance(key))
    }

    fn find_extenders(&self, key: &str) -> Vec<Extender> {
        let mut extenders = match &self.parent {
            Some(parent) => parent.find_extenders(key),
            None => Vec::new(),
        };
        if let Some(own) = self.registry.read().unwrap().extenders.get(key) {
            extenders.extend(own.iter().cloned());
        }
        extenders
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Engine {
        serial: usize,
    }

    impl Construct for Engine {
        fn construct(_: &Container, _: &Overrides) -> Result<Self, Error> {
            Ok(Engine::default())
        }
    }

    struct Car {
        engine: Arc<Engine>,
    }

    impl Construct for Car {
        fn construct(container: &Container, overrides: &Overrides) -> Result<Self, Error> {
            let engine = match overrides.get::<Engine>("engine") {
                Some(engine) => engine,
                None => container.make::<Engine>()?,
            };
            Ok(Car { engine })
        }
    }

    #[test]
    fn resolve_memoizes_factory_results() {
        let container = Container::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        container.bind_factory("service", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(String::from("built")) as Value)
        });

        let first = container.make_key("service").unwrap();
        let second = container.make_key("service").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn alias_resolves_to_the_same_instance() {
        let container = Container::new();
        container.bind_factory("cache.store", |_, _| Ok(Arc::new(42_u32) as Value));
        container.alias("cache.store", "cache").unwrap();

        let direct = container.make_key("cache.store").unwrap();
        let aliased = container.make_key("cache").unwrap();

        assert!(Arc::ptr_eq(&direct, &aliased));
    }

    #[test]
    fn self_alias_is_rejected() {
        let container = Container::new();
        let err = container.alias("cache", "cache").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn construct_fallback_autowires_dependencies() {
        let container = Container::new();

        // No bindings at all: Car pulls Engine through Construct.
        let car = container.make::<Car>().unwrap();
        assert_eq!(car.engine.serial, 0);

        // The nested Engine resolution memoized too.
        let engine = container.make::<Engine>().unwrap();
        assert!(Arc::ptr_eq(&car.engine, &engine));
    }

    #[test]
    fn overrides_win_over_autowiring() {
        let container = Container::new();
        let engine: Arc<Engine> = Arc::new(Engine { serial: 7 });

        let overrides = Overrides::new().with_value("engine", engine.clone() as Value);
        let car = container.make_with::<Car>(&overrides).unwrap();

        assert!(Arc::ptr_eq(&car.engine, &engine));
        assert_eq!(car.engine.serial, 7);
    }

    #[test]
    fn instances_are_returned_verbatim() {
        let container = Container::new();
        let value: Arc<Engine> = Arc::new(Engine { serial: 3 });
        container.instance_value("engine", value.clone() as Value);

        let resolved = container.make_key("engine").unwrap();
        assert!(Arc::ptr_eq(&resolved, &(value as Value)));
    }

    #[test]
    fn extenders_apply_in_order_on_fresh_builds_only() {
        let container = Container::new();
        container.bind_factory("greeting", |_, _| Ok(Arc::new(String::from("hello")) as Value));
        container.extend("greeting", |value, _| {
            let s = value.downcast::<String>().unwrap();
            Arc::new(format!("{s}, world")) as Value
        });
        container.extend("greeting", |value, _| {
            let s = value.downcast::<String>().unwrap();
            Arc::new(format!("{s}!")) as Value
        });

        let first = container.make_key("greeting").unwrap();
        assert_eq!(*first.downcast::<String>().unwrap(), "hello, world!");

        // Cache hit: extenders must not run again.
        let second = container.make_key("greeting").unwrap();
        assert_eq!(*second.downcast::<String>().unwrap(), "hello, world!");
    }

    #[test]
    fn bind_key_is_a_one_level_indirection() {
        let container = Container::new();
        container.bind_factory("logger.stderr", |_, _| Ok(Arc::new(String::from("stderr")) as Value));
        container.bind_key("logger", "logger.stderr");

        let resolved = container.make_key("logger").unwrap();
        assert_eq!(*resolved.downcast::<String>().unwrap(), "stderr");
    }

    #[test]
    fn unbound_string_key_fails_to_instantiate() {
        let container = Container::new();
        let err = container.make_key("nothing.here").unwrap_err();
        assert!(matches!(err, Error::Instantiation(_)));
    }

    #[test]
    fn scoped_children_read_through_but_never_write_back() {
        let base = Arc::new(Container::new());
        base.bind_factory("service", |_, _| Ok(Arc::new(String::from("shared")) as Value));

        let scope = Arc::clone(&base).scope();
        let from_scope = scope.make_key("service").unwrap();
        assert_eq!(*from_scope.clone().downcast::<String>().unwrap(), "shared");

        // The memoized instance lives in the scope, not the base.
        assert!(base.find_instance("service").is_none());
        assert!(scope.find_instance("service").is_some());

        // A second request scope builds its own copy.
        let other = Arc::clone(&base).scope();
        let from_other = other.make_key("service").unwrap();
        assert!(!Arc::ptr_eq(&from_scope, &from_other));
    }
}
