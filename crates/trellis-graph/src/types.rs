//! Registry of constructible types and factories.

use std::{collections::HashMap, fmt, rc::Rc};

use config::{Component, Configuration, ObjectRef, Value};

use crate::{Container, Record, Result};

/// Builds a bare instance of a class.
pub type Constructor = Rc<dyn Fn() -> ObjectRef>;

/// Fully takes over construction and configuration of a node carrying a
/// `-factory` hint.
pub trait Factory {
    /// Build the value for `config`. `container` builds nested values.
    fn build(&self, config: &Configuration, container: &Container) -> Result<Value>;
}

impl<F> Factory for F
where
    F: Fn(&Configuration, &Container) -> Result<Value>,
{
    fn build(&self, config: &Configuration, container: &Container) -> Result<Value> {
        self(config, container)
    }
}

/// Maps class names to constructors, logical `-type` names to classes and
/// factory names to factories. Populated before a build pass.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    /// Constructor per class name.
    classes: HashMap<String, Constructor>,
    /// Class name per logical type name.
    types: HashMap<String, String>,
    /// Factory per name.
    factories: HashMap<String, Rc<dyn Factory>>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with [`Record`] registered as `record`.
    pub fn with_builtins() -> Self {
        let mut types = Self::new();
        types.register::<Record>("record");
        types
    }

    /// Register `T` under `class`, constructed with `Default`.
    pub fn register<T: Component + Default>(&mut self, class: &str) -> &mut Self {
        self.register_with(class, || ObjectRef::new(T::default()))
    }

    /// Register a custom constructor under `class`.
    pub fn register_with(
        &mut self,
        class: &str,
        constructor: impl Fn() -> ObjectRef + 'static,
    ) -> &mut Self {
        self.classes.insert(class.to_string(), Rc::new(constructor));
        self
    }

    /// Map the logical type name `logical` to a registered class.
    pub fn register_type(&mut self, logical: &str, class: &str) -> &mut Self {
        self.types.insert(logical.to_string(), class.to_string());
        self
    }

    /// Register a factory for `-factory` hints.
    pub fn register_factory(&mut self, name: &str, factory: impl Factory + 'static) -> &mut Self {
        self.factories.insert(name.to_string(), Rc::new(factory));
        self
    }

    /// Class registered for a logical type name.
    pub fn class_for_type(&self, logical: &str) -> Option<&str> {
        self.types.get(logical).map(String::as_str)
    }

    /// True when `class` has a constructor.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    /// Construct a bare instance of `class`.
    pub fn construct(&self, class: &str) -> Option<ObjectRef> {
        self.classes.get(class).map(|ctor| ctor())
    }

    /// Construct by class name, falling back to a logical type name.
    pub fn construct_named(&self, name: &str) -> Option<ObjectRef> {
        self.construct(name)
            .or_else(|| self.class_for_type(name).and_then(|c| self.construct(c)))
    }

    /// Factory registered under `name`.
    pub fn factory(&self, name: &str) -> Option<Rc<dyn Factory>> {
        self.factories.get(name).cloned()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut classes: Vec<&String> = self.classes.keys().collect();
        classes.sort_unstable();
        let mut factories: Vec<&String> = self.factories.keys().collect();
        factories.sort_unstable();
        f.debug_struct("TypeRegistry")
            .field("classes", &classes)
            .field("types", &self.types)
            .field("factories", &factories)
            .finish()
    }
}
