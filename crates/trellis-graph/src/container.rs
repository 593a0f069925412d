//! The object graph builder.
//!
//! A [`Container`] walks a normalized root configuration and builds every
//! top-level name into a live value. Names move through an explicit state
//! machine:
//!
//! ```text
//! Unbuilt ──▶ Building(waiters) ──▶ Built(value)
//! ```
//!
//! When building a name needs another name that is itself `Building`, the
//! builder does not recurse. It hands back a [`Pending`] placeholder, and the
//! property (or named collection) that receives it is parked as a deferred
//! assignment with a waiter registered against the building name. Finishing a
//! name drains its waiters; an object's `after_configured` hook fires once its
//! last deferred assignment lands.

use std::{
    cell::{Ref, RefCell, RefMut},
    collections::{BTreeMap, HashMap, HashSet},
    fmt, mem,
    rc::{Rc, Weak},
};

use config::{
    Configuration, ObjectRef, Params, Pending, PropertyDescriptor, PropertyType, Representation,
    UriHandler, Value,
};
use tracing::{debug, trace, warn};

use crate::{
    Error, Registry, Result, TypeRegistry,
    schemes::{MakeScheme, NamedScheme, NewScheme},
};

/// Tracing target of cycle diagnostics.
pub const CYCLE_TARGET: &str = "trellis_graph::cycle";

/// Class hint that takes precedence over every other hint.
const AND_CLASS_KEY: &str = "-and-class";
/// Class hint.
const CLASS_KEY: &str = "-class";
/// Logical type hint, mapped to a class through the [`TypeRegistry`].
const TYPE_KEY: &str = "-type";
/// Factory hint.
const FACTORY_KEY: &str = "-factory";
/// Prefix that lets a reserved-looking key name an ordinary property.
const AND_PREFIX: &str = "-and:";

/// Keys that steer construction and are never injected.
const HINT_KEYS: [&str; 4] = [AND_CLASS_KEY, CLASS_KEY, TYPE_KEY, FACTORY_KEY];

/// True for keys consumed by the builder rather than injected.
fn is_directive(key: &str) -> bool {
    key.starts_with('*') || key.starts_with('$') || HINT_KEYS.contains(&key)
}

/// One step into a partially built value.
#[derive(Debug, Clone)]
enum Seg {
    /// Sequence position.
    Index(usize),
    /// Mapping key.
    Key(String),
}

/// Where a resolved placeholder is delivered.
#[derive(Debug, Clone, Copy)]
enum Slot {
    /// A deferred property assignment.
    Property(usize),
    /// A named entry whose value still holds placeholders.
    Named(usize),
}

/// A placeholder waiting on a building name.
#[derive(Debug)]
struct Waiter {
    /// Receiver of the value.
    slot: Slot,
    /// Position of the placeholder inside the receiver's value.
    at: Vec<Seg>,
    /// Key path applied to the named value before delivery.
    path: Option<String>,
}

/// Build state of a top-level name. Absent names are unbuilt.
#[derive(Debug)]
enum NameState {
    /// Under construction.
    Building(Vec<Waiter>),
    /// Finished.
    Built(Value),
}

/// A property assignment parked until its placeholders resolve.
struct Deferred {
    /// Arena index of the receiving object.
    owner: usize,
    /// Receiving property.
    property: PropertyDescriptor,
    /// Value with placeholders, filled in as names finish.
    value: Value,
    /// Placeholders not yet filled.
    outstanding: usize,
    /// Handler whose converter coerces the final value.
    handler: UriHandler,
}

/// A named value parked until its placeholders resolve.
struct DeferredNamed {
    /// The name.
    name: String,
    /// Value with placeholders.
    value: Value,
    /// Placeholders not yet filled.
    outstanding: usize,
}

/// Lifecycle of one configured object.
struct ObjectRecord {
    /// The instance.
    object: ObjectRef,
    /// Deferred assignments still owed to this object.
    pending: usize,
    /// All properties have been visited.
    configured: bool,
    /// `after_configured` has run.
    notified: bool,
}

/// Mutable builder state.
#[derive(Default)]
struct State {
    /// Normalized root of the current pass.
    root: Option<Configuration>,
    /// Names built before all others.
    priority: Vec<String>,
    /// State per top-level name.
    names: HashMap<String, NameState>,
    /// Built names in completion order.
    order: Vec<String>,
    /// Arena of configured objects.
    objects: Vec<ObjectRecord>,
    /// Arena index per object identity.
    by_addr: HashMap<usize, usize>,
    /// Parked property assignments; `None` once delivered.
    deferred: Vec<Option<Deferred>>,
    /// Parked named values; `None` once delivered.
    deferred_named: Vec<Option<DeferredNamed>>,
}

/// Shared container internals.
struct Inner {
    /// Constructible types and factories.
    types: TypeRegistry,
    /// Handler the container's schemes are attached to.
    handler: UriHandler,
    /// Builder state.
    state: RefCell<State>,
}

/// Builds and owns the named object registry.
///
/// Cloning yields another handle to the same container.
#[derive(Clone)]
pub struct Container {
    /// Shared internals.
    inner: Rc<Inner>,
}

/// Non-owning handle held by the container's URI schemes.
#[derive(Clone)]
pub struct WeakContainer(Weak<Inner>);

impl WeakContainer {
    /// The container, if it is still alive.
    pub fn upgrade(&self) -> Option<Container> {
        self.0.upgrade().map(|inner| Container { inner })
    }
}

impl Container {
    /// A container building `types`, with `handler` as the base for the
    /// container's own URI schemes.
    pub fn new(types: TypeRegistry, handler: UriHandler) -> Self {
        Self {
            inner: Rc::new(Inner {
                types,
                handler,
                state: RefCell::default(),
            }),
        }
    }

    /// Build these names first, in this order.
    pub fn with_priority_names<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state_mut().priority = names.into_iter().map(Into::into).collect();
        self
    }

    /// The type registry.
    pub fn types(&self) -> &TypeRegistry {
        &self.inner.types
    }

    /// A non-owning handle.
    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer(Rc::downgrade(&self.inner))
    }

    /// The base handler with `named:`, `make:` and `new:` attached.
    pub fn uri_handler(&self) -> UriHandler {
        self.attach(&self.inner.handler)
    }

    /// `base` with the container's schemes attached.
    fn attach(&self, base: &UriHandler) -> UriHandler {
        base.with_scheme("named", NamedScheme::new(self.downgrade()))
            .with_scheme("make", MakeScheme::new(self.downgrade()))
            .with_scheme("new", NewScheme::new(self.downgrade()))
    }

    /// Shared borrow of the builder state.
    fn state(&self) -> Ref<'_, State> {
        self.inner.state.borrow()
    }

    /// Exclusive borrow of the builder state.
    fn state_mut(&self) -> RefMut<'_, State> {
        self.inner.state.borrow_mut()
    }

    /// Build every top-level name of `config`: priority names first, then the
    /// rest in declaration order.
    ///
    /// Each call starts a fresh pass; names and objects of an earlier pass are
    /// forgotten.
    ///
    /// Individual entries that fail are logged and left out. The pass fails
    /// when the root is not a map or when a placeholder is left unresolved.
    pub fn resolve(&self, config: &Configuration) -> Result<Registry> {
        if !config.data().is_object() {
            return Err(Error::RootConfiguration {
                message: "top-level configuration must be a map".to_string(),
            });
        }
        let root = config
            .with_uri_handler(self.attach(config.uri_handler()))
            .normalize();
        {
            let mut state = self.state_mut();
            let priority = mem::take(&mut state.priority);
            *state = State {
                root: Some(root.clone()),
                priority,
                ..State::default()
            };
        }

        for name in self.build_order(&root) {
            if let Err(err) = self.try_get_named(&name) {
                warn!(name = %name, error = %err, "named entry failed");
            }
        }
        self.check_settled()?;
        Ok(self.registry())
    }

    /// Priority names present in `root`, then the remaining top-level keys.
    fn build_order(&self, root: &Configuration) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        let priority = self.state().priority.clone();
        for name in priority.into_iter().chain(root.keys()) {
            if is_directive(&name) || name.starts_with('-') || order.contains(&name) {
                continue;
            }
            if root.has_value(&name) {
                order.push(name);
            }
        }
        order
    }

    /// Fail when any name is still building, any assignment still waits, or
    /// a placeholder survives in a built value or object property.
    fn check_settled(&self) -> Result<()> {
        let (mut names, parked, values) = {
            let state = self.state();
            let names: Vec<String> = state
                .names
                .iter()
                .filter(|(_, s)| matches!(s, NameState::Building(_)))
                .map(|(name, _)| name.clone())
                .collect();
            let parked = state.deferred.iter().flatten().count();
            let mut values: Vec<Value> = state
                .names
                .values()
                .filter_map(|s| match s {
                    NameState::Built(value) => Some(value.clone()),
                    NameState::Building(_) => None,
                })
                .collect();
            values.extend(state.objects.iter().map(|r| Value::Object(r.object.clone())));
            (names, parked, values)
        };
        let mut visited = HashSet::new();
        for value in &values {
            collect_unresolved(value, &mut visited, &mut names);
        }
        if names.is_empty() && parked == 0 {
            return Ok(());
        }
        names.sort_unstable();
        names.dedup();
        Err(Error::UnresolvedPending { names })
    }

    /// Snapshot of the built names in completion order.
    pub fn registry(&self) -> Registry {
        let state = self.state();
        let registry = state
            .order
            .iter()
            .filter_map(|name| match state.names.get(name) {
                Some(NameState::Built(value)) => Some((name.clone(), value.clone())),
                _ => None,
            })
            .collect();
        registry
    }

    /// Built names in completion order.
    pub fn names(&self) -> Vec<String> {
        self.state().order.clone()
    }

    /// Number of objects configured so far.
    pub fn object_count(&self) -> usize {
        self.state().objects.len()
    }

    /// The normalized root of the current pass.
    pub fn root(&self) -> Option<Configuration> {
        self.state().root.clone()
    }

    /// A named value, building it on demand. Failures are logged.
    pub fn get_named(&self, name: &str) -> Option<Value> {
        match self.try_get_named(name) {
            Ok(value) => value,
            Err(err) => {
                warn!(name, error = %err, "named lookup failed");
                None
            }
        }
    }

    /// A named value, building it on demand.
    ///
    /// A name that is already building yields a [`Pending`] placeholder.
    pub fn try_get_named(&self, name: &str) -> Result<Option<Value>> {
        match self.state().names.get(name) {
            Some(NameState::Built(value)) => return Ok(Some(value.clone())),
            Some(NameState::Building(_)) => {
                debug!(target: "trellis_graph::cycle", name, "cycle detected; handing out placeholder");
                return Ok(Some(Value::Pending(Pending::new(name, None))));
            }
            None => {}
        }
        let root = self.root().ok_or_else(|| Error::RootConfiguration {
            message: "no configuration has been resolved".to_string(),
        })?;
        if !root.has_value(name) {
            return Ok(None);
        }
        self.build_named(name, &root)
    }

    /// Drive `name` from unbuilt to building and, when possible, to built.
    fn build_named(&self, name: &str, root: &Configuration) -> Result<Option<Value>> {
        self.state_mut()
            .names
            .insert(name.to_string(), NameState::Building(Vec::new()));
        trace!(name, "building");
        match self.build_value(root, name, PropertyType::Any, None, name) {
            Ok(Some(value)) => {
                self.settle_named(name, value);
                Ok(self.current(name))
            }
            Ok(None) => {
                self.abandon(name);
                Ok(None)
            }
            Err(err) => {
                self.abandon(name);
                Err(err)
            }
        }
    }

    /// The built value of `name`, or a placeholder while it still waits.
    fn current(&self, name: &str) -> Option<Value> {
        match self.state().names.get(name)? {
            NameState::Built(value) => Some(value.clone()),
            NameState::Building(_) => Some(Value::Pending(Pending::new(name, None))),
        }
    }

    /// Finish `name` with `value`, or park it while placeholders remain.
    fn settle_named(&self, name: &str, value: Value) {
        let leaves = pending_leaves(&value);
        if leaves.is_empty() {
            self.finish_named(name, value);
            return;
        }
        debug!(target: "trellis_graph::cycle", name, waiting = leaves.len(), "named value waits on placeholders");
        let slot = {
            let mut state = self.state_mut();
            state.deferred_named.push(Some(DeferredNamed {
                name: name.to_string(),
                value,
                outstanding: leaves.len(),
            }));
            Slot::Named(state.deferred_named.len() - 1)
        };
        for (at, pending) in leaves {
            self.wait_on(pending, slot, at);
        }
    }

    /// Move `name` to built and drain its waiters.
    fn finish_named(&self, name: &str, value: Value) {
        let waiters = {
            let mut state = self.state_mut();
            state.order.push(name.to_string());
            match state
                .names
                .insert(name.to_string(), NameState::Built(value.clone()))
            {
                Some(NameState::Building(waiters)) => waiters,
                _ => Vec::new(),
            }
        };
        debug!(name, kind = value.kind(), waiters = waiters.len(), "built");
        for waiter in waiters {
            self.deliver(waiter, Some(&value));
        }
    }

    /// Return `name` to unbuilt; its waiters receive nothing.
    fn abandon(&self, name: &str) {
        let removed = self.state_mut().names.remove(name);
        if let Some(NameState::Building(waiters)) = removed {
            for waiter in waiters {
                self.deliver(waiter, None);
            }
        }
    }

    /// Register a waiter for `pending`, delivering at once if its name is no
    /// longer building.
    fn wait_on(&self, pending: Pending, slot: Slot, at: Vec<Seg>) {
        let waiter = Waiter {
            slot,
            at,
            path: pending.path,
        };
        let ready = {
            let mut state = self.state_mut();
            match state.names.get_mut(&pending.name) {
                Some(NameState::Building(waiters)) => {
                    waiters.push(waiter);
                    return;
                }
                Some(NameState::Built(value)) => Some(value.clone()),
                None => None,
            }
        };
        self.deliver(waiter, ready.as_ref());
    }

    /// Hand a finished name's value to one waiter.
    fn deliver(&self, waiter: Waiter, value: Option<&Value>) {
        let resolved = value.and_then(|v| match &waiter.path {
            Some(path) => v.value_at_path(path),
            None => Some(v.clone()),
        });
        match waiter.slot {
            Slot::Property(id) => self.fill_property(id, &waiter.at, resolved),
            Slot::Named(id) => self.fill_named(id, &waiter.at, resolved),
        }
    }

    /// Fill one placeholder of a deferred assignment; assign when complete.
    fn fill_property(&self, id: usize, at: &[Seg], resolved: Option<Value>) {
        let complete = {
            let mut state = self.state_mut();
            let Some(Some(entry)) = state.deferred.get_mut(id) else {
                return;
            };
            set_at(&mut entry.value, at, resolved.unwrap_or(Value::Null));
            entry.outstanding = entry.outstanding.saturating_sub(1);
            if entry.outstanding > 0 {
                return;
            }
            state.deferred[id].take()
        };
        let Some(entry) = complete else {
            return;
        };
        let object = self.state().objects[entry.owner].object.clone();
        if entry.value.is_null() {
            debug!(property = %entry.property.name, "deferred reference resolved to nothing");
        } else {
            assign(&object, &entry.property, entry.value, &entry.handler);
        }
        self.release(entry.owner);
    }

    /// Fill one placeholder of a parked named value; finish it when complete.
    fn fill_named(&self, id: usize, at: &[Seg], resolved: Option<Value>) {
        let complete = {
            let mut state = self.state_mut();
            let Some(Some(entry)) = state.deferred_named.get_mut(id) else {
                return;
            };
            set_at(&mut entry.value, at, resolved.unwrap_or(Value::Null));
            entry.outstanding = entry.outstanding.saturating_sub(1);
            if entry.outstanding > 0 {
                return;
            }
            state.deferred_named[id].take()
        };
        if let Some(entry) = complete {
            self.finish_named(&entry.name, entry.value);
        }
    }

    /// Build the value at `key` of `parent` for a property of type `kind`.
    ///
    /// Factories may call this to build nested values through the standard
    /// rules. The result may hold [`Pending`] placeholders when it refers to a
    /// name that is still building; hand it to [`Container::inject`] rather
    /// than setting it directly.
    pub fn build(
        &self,
        parent: &Configuration,
        key: &str,
        kind: PropertyType,
    ) -> Result<Option<Value>> {
        self.build_value(parent, key, kind, None, key)
    }

    /// Build the value at `key` of `parent`. `existing` is the receiving
    /// property's current value; `context` names the node in diagnostics.
    fn build_value(
        &self,
        parent: &Configuration,
        key: &str,
        kind: PropertyType,
        existing: Option<Value>,
        context: &str,
    ) -> Result<Option<Value>> {
        let is_container = parent
            .raw(key)
            .is_some_and(|raw| raw.is_object() || raw.is_array());
        if is_container {
            return match parent.get_configuration(key) {
                Some(node) => self.build_node(&node, kind, existing, context),
                None => Ok(None),
            };
        }
        let Some(value) = parent.get_value(key) else {
            return Ok(None);
        };
        match value {
            Value::Configuration(node) => self.build_node(&node, kind, existing, context),
            Value::Resource(res) if builds_objects(kind) => match res.to_configuration() {
                Some(node) => self.build_node(&node, kind, existing, context),
                None => Ok(Some(Value::Resource(res))),
            },
            other => Ok(Some(other)),
        }
    }

    /// Build a value from a configuration sub-tree.
    ///
    /// Precedence: a factory hint, then a class or type hint, then the
    /// instance already held by the receiving property, then the property's
    /// declared type. Anything else becomes a collection.
    fn build_node(
        &self,
        node: &Configuration,
        kind: PropertyType,
        existing: Option<Value>,
        context: &str,
    ) -> Result<Option<Value>> {
        let node = node.normalize();
        if kind == PropertyType::Configuration {
            return Ok(Some(Value::Configuration(node)));
        }
        if let Some(name) = node.get_string(FACTORY_KEY) {
            let factory =
                self.inner
                    .types
                    .factory(&name)
                    .ok_or_else(|| Error::UnknownFactory {
                        name: name.clone(),
                        context: context.to_string(),
                    })?;
            trace!(factory = %name, context, "delegating to factory");
            let value = factory.build(&node, self)?;
            self.finish_factory_output(&value);
            return Ok(Some(value));
        }
        let object = match self.class_hint(&node, context)? {
            Some(class) => Some(self.construct(&class, context)?),
            None => match (existing, kind) {
                (Some(Value::Object(current)), _) => Some(current),
                (_, PropertyType::Object(Some(declared))) => {
                    Some(self.construct(declared, context)?)
                }
                (_, PropertyType::Object(None)) => {
                    return Err(Error::MissingTypeHint {
                        context: context.to_string(),
                    });
                }
                _ => None,
            },
        };
        match object {
            Some(object) => {
                self.configure_at(&object, &node, context);
                Ok(Some(Value::Object(object)))
            }
            None => self.build_collection(&node, context).map(Some),
        }
    }

    /// Class named by `-and-class`, `-class` or `-type`, in that order.
    fn class_hint(&self, node: &Configuration, context: &str) -> Result<Option<String>> {
        if let Some(class) = node
            .get_string(AND_CLASS_KEY)
            .or_else(|| node.get_string(CLASS_KEY))
        {
            return Ok(Some(class));
        }
        let Some(logical) = node.get_string(TYPE_KEY) else {
            return Ok(None);
        };
        if let Some(class) = self.inner.types.class_for_type(&logical) {
            return Ok(Some(class.to_string()));
        }
        if self.inner.types.has_class(&logical) {
            return Ok(Some(logical));
        }
        Err(Error::UnknownType {
            name: logical,
            context: context.to_string(),
        })
    }

    /// A bare instance of `class`.
    fn construct(&self, class: &str, context: &str) -> Result<ObjectRef> {
        self.inner
            .types
            .construct_named(class)
            .ok_or_else(|| Error::UnknownType {
                name: class.to_string(),
                context: context.to_string(),
            })
    }

    /// Build each entry of a sequence or mapping.
    fn build_collection(&self, node: &Configuration, context: &str) -> Result<Value> {
        if node.is_list() {
            let mut items = Vec::new();
            for key in node.keys() {
                let entry = format!("{}.{}", context, key);
                items.push(
                    self.build_entry(node, &key, &entry)
                        .unwrap_or(Value::Null),
                );
            }
            return Ok(Value::List(items));
        }
        let mut map = BTreeMap::new();
        for key in node.keys() {
            if is_directive(&key) {
                continue;
            }
            let name = key.strip_prefix(AND_PREFIX).unwrap_or(&key);
            let entry = format!("{}.{}", context, name);
            if let Some(value) = self.build_entry(node, &key, &entry) {
                map.insert(name.to_string(), value);
            }
        }
        Ok(Value::Map(map))
    }

    /// Build one collection entry, logging failures.
    fn build_entry(&self, node: &Configuration, key: &str, context: &str) -> Option<Value> {
        match self.build_value(node, key, PropertyType::Any, None, context) {
            Ok(value) => value,
            Err(err) => {
                warn!(context, error = %err, "collection entry failed");
                None
            }
        }
    }

    /// Inject the properties of `node` into `object`, then run its hook
    /// unless assignments are still parked.
    pub fn configure(&self, object: &ObjectRef, node: &Configuration) {
        self.configure_at(object, &node.normalize(), object.type_name());
    }

    /// Inject the properties of an already normalized `node`.
    fn configure_at(&self, object: &ObjectRef, node: &Configuration, context: &str) {
        let id = self.track(object);
        for key in node.keys() {
            if is_directive(&key) {
                continue;
            }
            let name = key.strip_prefix(AND_PREFIX).unwrap_or(&key);
            let path = format!("{}.{}", context, name);
            let descriptor = object.borrow().property(name);
            let Some(descriptor) = descriptor else {
                warn!(context = %path, type_name = object.type_name(), "no such property");
                continue;
            };
            let existing = match descriptor.kind {
                PropertyType::Any | PropertyType::Object(_) => object.get(&descriptor.name),
                _ => None,
            };
            match self.build_value(node, &key, descriptor.kind, existing, &path) {
                Ok(Some(value)) => {
                    self.inject_at(id, object, &descriptor, value, node.uri_handler());
                }
                Ok(None) => debug!(context = %path, "property resolved to nothing"),
                Err(err) => warn!(context = %path, error = %err, "property failed"),
            }
        }
        self.mark_configured(id);
    }

    /// Arena index of `object`, tracking it if new.
    fn track(&self, object: &ObjectRef) -> usize {
        let mut state = self.state_mut();
        if let Some(&id) = state.by_addr.get(&object.addr()) {
            return id;
        }
        state.objects.push(ObjectRecord {
            object: object.clone(),
            pending: 0,
            configured: false,
            notified: false,
        });
        let id = state.objects.len() - 1;
        state.by_addr.insert(object.addr(), id);
        id
    }

    /// Record that every property of object `id` has been visited.
    fn mark_configured(&self, id: usize) {
        self.state_mut().objects[id].configured = true;
        self.notify_if_ready(id);
    }

    /// One deferred assignment of object `id` has landed.
    fn release(&self, id: usize) {
        {
            let mut state = self.state_mut();
            let record = &mut state.objects[id];
            record.pending = record.pending.saturating_sub(1);
        }
        self.notify_if_ready(id);
    }

    /// Run `after_configured` on object `id` once it is fully wired.
    fn notify_if_ready(&self, id: usize) {
        let object = {
            let mut state = self.state_mut();
            let record = &mut state.objects[id];
            if !record.configured || record.pending > 0 || record.notified {
                return;
            }
            record.notified = true;
            record.object.clone()
        };
        trace!(type_name = object.type_name(), "after_configured");
        object.borrow_mut().after_configured();
    }

    /// Assign `value` to property `name` of `object`, parking it while it
    /// holds placeholders. Returns false when `object` has no such property.
    ///
    /// Factories use this for values from [`Container::build`]. An object first
    /// seen here counts as configured once its factory returns, and its
    /// `after_configured` hook runs when the last parked assignment lands.
    pub fn inject(&self, object: &ObjectRef, name: &str, value: Value) -> bool {
        let descriptor = object.borrow().property(name);
        let Some(descriptor) = descriptor else {
            warn!(type_name = object.type_name(), property = name, "no such property");
            return false;
        };
        let id = self.track(object);
        self.inject_at(id, object, &descriptor, value, &self.inner.handler);
        true
    }

    /// Mark objects a factory produced through [`Container::inject`] as
    /// configured.
    fn finish_factory_output(&self, value: &Value) {
        match value {
            Value::Object(object) => {
                let id = self.state().by_addr.get(&object.addr()).copied();
                let Some(id) = id else {
                    return;
                };
                let configured = self.state().objects[id].configured;
                if !configured {
                    self.mark_configured(id);
                }
            }
            Value::List(items) => items.iter().for_each(|v| self.finish_factory_output(v)),
            Value::Map(map) => map.values().for_each(|v| self.finish_factory_output(v)),
            _ => {}
        }
    }

    /// Assign `value` to a property, or park it while it holds placeholders.
    fn inject_at(
        &self,
        id: usize,
        object: &ObjectRef,
        descriptor: &PropertyDescriptor,
        value: Value,
        handler: &UriHandler,
    ) {
        let leaves = pending_leaves(&value);
        if leaves.is_empty() {
            assign(object, descriptor, value, handler);
            return;
        }
        debug!(
            target: "trellis_graph::cycle",
            type_name = object.type_name(),
            property = %descriptor.name,
            waiting = leaves.len(),
            "deferring injection"
        );
        let slot = {
            let mut state = self.state_mut();
            state.objects[id].pending += 1;
            state.deferred.push(Some(Deferred {
                owner: id,
                property: descriptor.clone(),
                value,
                outstanding: leaves.len(),
                handler: handler.clone(),
            }));
            Slot::Property(state.deferred.len() - 1)
        };
        for (at, pending) in leaves {
            self.wait_on(pending, slot, at);
        }
    }

    /// Build the template at `key_path` of the root, with `params` bound as
    /// context parameters, into a fresh value.
    pub fn make(&self, key_path: &str, params: &Params) -> Result<Option<Value>> {
        let root = self.root().ok_or_else(|| Error::RootConfiguration {
            message: "no configuration has been resolved".to_string(),
        })?;
        let Some(template) = root.get_configuration(key_path) else {
            debug!(template = key_path, "no template at key path");
            return Ok(None);
        };
        let node = template.extend_with_parameters(params);
        self.build_node(&node, PropertyType::Any, None, key_path)
    }

    /// A bare instance of `class` with `params` injected as properties.
    pub fn instantiate(&self, class: &str, params: &Params) -> Result<ObjectRef> {
        let object = self.construct(class, class)?;
        let id = self.track(&object);
        for (name, value) in params {
            let descriptor = object.borrow().property(name);
            match descriptor {
                Some(descriptor) => {
                    self.inject_at(id, &object, &descriptor, value.clone(), &self.inner.handler);
                }
                None => warn!(class, property = %name, "no such property"),
            }
        }
        self.mark_configured(id);
        Ok(object)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Container")
            .field("types", &self.inner.types)
            .field("built", &state.order)
            .field("objects", &state.objects.len())
            .finish()
    }
}

/// True when a structured value for `kind` is built rather than passed on.
fn builds_objects(kind: PropertyType) -> bool {
    matches!(
        kind,
        PropertyType::Any | PropertyType::List | PropertyType::Map | PropertyType::Object(_)
    )
}

/// Convert `value` to the property's representation and set it.
fn assign(object: &ObjectRef, descriptor: &PropertyDescriptor, value: Value, handler: &UriHandler) {
    let value = match descriptor.kind.representation() {
        Representation::Default | Representation::Configuration => Some(value),
        repr => handler.converter().convert(&value, repr),
    };
    let Some(value) = value else {
        warn!(
            type_name = object.type_name(),
            property = %descriptor.name,
            "value does not convert to the property type"
        );
        return;
    };
    if !object.set(&descriptor.name, value) {
        warn!(
            type_name = object.type_name(),
            property = %descriptor.name,
            "property rejected value"
        );
    }
}

/// Every placeholder inside `value`, with its position.
fn pending_leaves(value: &Value) -> Vec<(Vec<Seg>, Pending)> {
    /// Depth-first walk.
    fn walk(value: &Value, at: &mut Vec<Seg>, out: &mut Vec<(Vec<Seg>, Pending)>) {
        match value {
            Value::Pending(p) => out.push((at.clone(), p.clone())),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    at.push(Seg::Index(i));
                    walk(item, at, out);
                    at.pop();
                }
            }
            Value::Map(map) => {
                for (key, item) in map {
                    at.push(Seg::Key(key.clone()));
                    walk(item, at, out);
                    at.pop();
                }
            }
            _ => {}
        }
    }
    let mut out = Vec::new();
    walk(value, &mut Vec::new(), &mut out);
    out
}

/// Names of placeholders left anywhere in `value`, following object
/// properties.
fn collect_unresolved(value: &Value, visited: &mut HashSet<usize>, out: &mut Vec<String>) {
    match value {
        Value::Pending(pending) => out.push(pending.name.clone()),
        Value::List(items) => {
            for item in items {
                collect_unresolved(item, visited, out);
            }
        }
        Value::Map(map) => {
            for item in map.values() {
                collect_unresolved(item, visited, out);
            }
        }
        Value::Object(object) => {
            if !visited.insert(object.addr()) {
                return;
            }
            let props = object.borrow().properties();
            for prop in props {
                if let Some(value) = object.get(&prop.name) {
                    collect_unresolved(&value, visited, out);
                }
            }
        }
        _ => {}
    }
}

/// Replace the value at position `at`.
fn set_at(value: &mut Value, at: &[Seg], new: Value) {
    let Some((first, rest)) = at.split_first() else {
        *value = new;
        return;
    };
    let child = match (value, first) {
        (Value::List(items), Seg::Index(i)) => items.get_mut(*i),
        (Value::Map(map), Seg::Key(key)) => map.get_mut(key),
        _ => None,
    };
    if let Some(child) = child {
        set_at(child, rest, new);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_found_and_replaced_in_nested_collections() {
        let mut value = Value::List(vec![
            Value::from(1),
            Value::Map(
                [(
                    "peer".to_string(),
                    Value::Pending(Pending::new("a", Some("name"))),
                )]
                .into_iter()
                .collect(),
            ),
            Value::Pending(Pending::new("b", None)),
        ]);
        let leaves = pending_leaves(&value);
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].1.name, "a");
        assert_eq!(leaves[0].1.path.as_deref(), Some("name"));

        for (at, pending) in leaves {
            set_at(&mut value, &at, Value::from(pending.name));
        }
        assert!(!value.contains_pending());
        assert_eq!(value.value_at_path("1.peer"), Some(Value::from("a")));
        assert_eq!(value.value_at_path("2"), Some(Value::from("b")));
    }

    #[test]
    fn directive_keys() {
        assert!(is_directive("*mixin"));
        assert!(is_directive("-class"));
        assert!(is_directive("-and-class"));
        assert!(!is_directive("-and:class"));
        assert!(!is_directive("name"));
    }
}
