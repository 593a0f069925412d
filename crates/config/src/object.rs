//! Property introspection for live component instances.
//!
//! A [`Component`] describes its configurable properties as an ordered list of
//! [`PropertyDescriptor`]s with typed get/set accessors. Implementations are
//! normally generated by the builder crate's `component!` macro rather than
//! written by hand.

use std::{
    any::Any,
    borrow::Cow,
    cell::{Ref, RefCell, RefMut},
    collections::BTreeMap,
    fmt,
    rc::Rc,
};

use chrono::{DateTime, Utc};
use compound_uri::CompoundUri;

use crate::{Configuration, Representation, Value};

/// Declared type of a component property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    /// Accepts any value unconverted.
    Any,
    /// Boolean.
    Bool,
    /// Whole number.
    Integer,
    /// Any number.
    Number,
    /// Text.
    String,
    /// Point in time.
    Date,
    /// Compound URI.
    Uri,
    /// Raw bytes.
    Binary,
    /// Ordered sequence.
    List,
    /// Key/value mapping.
    Map,
    /// Receives its configuration sub-tree unbuilt.
    Configuration,
    /// Component instance, optionally naming the type to build when
    /// configuration gives no hint.
    Object(Option<&'static str>),
}

impl PropertyType {
    /// Representation a raw configuration value is converted to before injection.
    pub fn representation(self) -> Representation {
        match self {
            Self::Bool => Representation::Boolean,
            Self::Integer | Self::Number => Representation::Number,
            Self::String => Representation::String,
            Self::Date => Representation::Date,
            Self::Uri => Representation::Url,
            Self::Binary => Representation::Binary,
            Self::Configuration => Representation::Configuration,
            Self::Any | Self::List | Self::Map | Self::Object(_) => Representation::Default,
        }
    }
}

/// Name and declared type of a single property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    /// Property name as it appears in configuration.
    pub name: Cow<'static, str>,
    /// Declared type.
    pub kind: PropertyType,
}

impl PropertyDescriptor {
    /// Describe a property.
    pub fn new(name: impl Into<Cow<'static, str>>, kind: PropertyType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A configurable, introspectable component.
pub trait Component: Any {
    /// Logical type name, used in diagnostics and for `-type` round-tripping.
    fn type_name(&self) -> &'static str;

    /// Ordered property descriptors.
    fn properties(&self) -> Vec<PropertyDescriptor>;

    /// Descriptor for `name`. Boolean properties are also found under their
    /// `is`/`has` accessor names, so `isEnabled` and `hasEnabled` both map to `enabled`.
    fn property(&self, name: &str) -> Option<PropertyDescriptor> {
        let props = self.properties();
        if let Some(found) = props.iter().find(|p| p.name == name) {
            return Some(found.clone());
        }
        let stem = name
            .strip_prefix("is")
            .or_else(|| name.strip_prefix("has"))?;
        let mut chars = stem.chars();
        let first = chars.next()?;
        let lowered: String = first.to_lowercase().chain(chars).collect();
        props
            .into_iter()
            .find(|p| p.kind == PropertyType::Bool && (p.name == lowered || p.name == stem))
    }

    /// Current value of a property.
    fn get_property(&self, name: &str) -> Option<Value>;

    /// Assign a property. Returns false when the name is unknown or the value
    /// does not fit the property's type.
    fn set_property(&mut self, name: &str, value: Value) -> bool;

    /// Called once, after every property has been injected, including those
    /// that waited on a circular reference.
    fn after_configured(&mut self) {}

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Shared handle to a live component.
///
/// Identity matters: two handles are the same object only when they point at
/// the same allocation.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<dyn Component>>);

impl ObjectRef {
    /// Wrap a component.
    pub fn new<T: Component>(component: T) -> Self {
        Self(Rc::new(RefCell::new(component)))
    }

    /// Immutable borrow of the component.
    pub fn borrow(&self) -> Ref<'_, dyn Component> {
        self.0.borrow()
    }

    /// Mutable borrow of the component.
    pub fn borrow_mut(&self) -> RefMut<'_, dyn Component> {
        self.0.borrow_mut()
    }

    /// Logical type name of the component.
    pub fn type_name(&self) -> &'static str {
        self.0.borrow().type_name()
    }

    /// Address of the shared allocation, usable as an identity key.
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }

    /// True when both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }

    /// True when the component's concrete type is `T`.
    pub fn is<T: Component>(&self) -> bool {
        self.0.borrow().as_any().is::<T>()
    }

    /// Run `f` against the concrete component, if it is a `T`.
    pub fn with<T: Component, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let guard = self.0.borrow();
        guard.as_any().downcast_ref::<T>().map(f)
    }

    /// Run `f` against the mutable concrete component, if it is a `T`.
    pub fn with_mut<T: Component, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.0.borrow_mut();
        guard.as_any_mut().downcast_mut::<T>().map(f)
    }

    /// Read a property.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().get_property(name)
    }

    /// Write a property.
    pub fn set(&self, name: &str, value: Value) -> bool {
        self.0.borrow_mut().set_property(name, value)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(c) => write!(f, "ObjectRef({} @ {:#x})", c.type_name(), self.addr()),
            Err(_) => write!(f, "ObjectRef(<borrowed> @ {:#x})", self.addr()),
        }
    }
}

/// Extraction of a typed field value from a [`Value`].
pub trait FromValue: Sized {
    /// Convert, or `None` when the value does not fit.
    fn from_value(value: Value) -> Option<Self>;
}

/// Conversion of a typed field value into a [`Value`].
pub trait IntoValue {
    /// Convert.
    fn into_value(self) -> Value;
}

/// Static property type of a field type.
pub trait PropertyKind {
    /// Declared type used for property descriptors.
    const KIND: PropertyType;
}

macro_rules! scalar {
    ($ty:ty, $kind:expr, |$v:ident| $from:expr, |$s:ident| $into:expr) => {
        impl FromValue for $ty {
            fn from_value($v: Value) -> Option<Self> {
                $from
            }
        }
        impl IntoValue for $ty {
            fn into_value(self) -> Value {
                let $s = self;
                $into
            }
        }
        impl PropertyKind for $ty {
            const KIND: PropertyType = $kind;
        }
    };
}

scalar!(bool, PropertyType::Bool, |v| v.as_bool(), |s| Value::Bool(s));
scalar!(i64, PropertyType::Integer, |v| v.as_i64(), |s| Value::from(s));
scalar!(
    i32,
    PropertyType::Integer,
    |v| v.as_i64().and_then(|n| i32::try_from(n).ok()),
    |s| Value::from(i64::from(s))
);
scalar!(
    u32,
    PropertyType::Integer,
    |v| v.as_i64().and_then(|n| u32::try_from(n).ok()),
    |s| Value::from(i64::from(s))
);
scalar!(
    usize,
    PropertyType::Integer,
    |v| v.as_i64().and_then(|n| usize::try_from(n).ok()),
    |s| i64::try_from(s).map_or(Value::Null, Value::from)
);
scalar!(f64, PropertyType::Number, |v| v.as_f64(), |s| Value::from(s));
scalar!(
    f32,
    PropertyType::Number,
    |v| v.as_f64().map(|n| n as f32),
    |s| Value::from(f64::from(s))
);
scalar!(
    String,
    PropertyType::String,
    |v| match v {
        Value::String(s) => Some(s),
        _ => None,
    },
    |s| Value::String(s)
);
scalar!(
    DateTime<Utc>,
    PropertyType::Date,
    |v| match v {
        Value::Date(d) => Some(d),
        _ => None,
    },
    |s| Value::Date(s)
);
scalar!(
    CompoundUri,
    PropertyType::Uri,
    |v| match v {
        Value::Uri(u) => Some(u),
        _ => None,
    },
    |s| Value::Uri(s)
);
scalar!(
    ObjectRef,
    PropertyType::Object(None),
    |v| match v {
        Value::Object(o) => Some(o),
        _ => None,
    },
    |s| Value::Object(s)
);
scalar!(
    Configuration,
    PropertyType::Configuration,
    |v| match v {
        Value::Configuration(c) => Some(c),
        _ => None,
    },
    |s| Value::Configuration(s)
);
scalar!(Value, PropertyType::Any, |v| Some(v), |s| s);

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Null, IntoValue::into_value)
    }
}

impl<T: PropertyKind> PropertyKind for Option<T> {
    const KIND: PropertyType = T::KIND;
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T> PropertyKind for Vec<T> {
    const KIND: PropertyType = PropertyType::List;
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Map(map) => map
                .into_iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
                .collect(),
            _ => None,
        }
    }
}

impl<T: IntoValue> IntoValue for BTreeMap<String, T> {
    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }
}

impl<T> PropertyKind for BTreeMap<String, T> {
    const KIND: PropertyType = PropertyType::Map;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Lamp {
        enabled: bool,
        label: String,
    }

    impl Component for Lamp {
        fn type_name(&self) -> &'static str {
            "Lamp"
        }
        fn properties(&self) -> Vec<PropertyDescriptor> {
            vec![
                PropertyDescriptor::new("enabled", PropertyType::Bool),
                PropertyDescriptor::new("label", PropertyType::String),
            ]
        }
        fn get_property(&self, name: &str) -> Option<Value> {
            match name {
                "enabled" => Some(self.enabled.into_value()),
                "label" => Some(self.label.clone().into_value()),
                _ => None,
            }
        }
        fn set_property(&mut self, name: &str, value: Value) -> bool {
            match (name, value) {
                ("enabled", Value::Bool(b)) => {
                    self.enabled = b;
                    true
                }
                ("label", Value::String(s)) => {
                    self.label = s;
                    true
                }
                _ => false,
            }
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn boolean_accessor_names_fall_back() {
        let lamp = Lamp::default();
        assert_eq!(lamp.property("isEnabled").map(|p| p.name), Some("enabled".into()));
        assert_eq!(lamp.property("hasEnabled").map(|p| p.name), Some("enabled".into()));
        assert!(lamp.property("isLabel").is_none());
        assert!(lamp.property("missing").is_none());
    }

    #[test]
    fn handles_downcast_and_compare_by_identity() {
        let a = ObjectRef::new(Lamp::default());
        let b = a.clone();
        let c = ObjectRef::new(Lamp::default());
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert!(a.set("label", Value::from("hall")));
        assert_eq!(b.with(|l: &Lamp| l.label.clone()).as_deref(), Some("hall"));
        assert!(!a.set("label", Value::from(3)));
    }

    #[test]
    fn typed_fields_convert() {
        assert_eq!(Option::<i32>::from_value(Value::Null), Some(None));
        assert_eq!(Option::<i32>::from_value(Value::from(7)), Some(Some(7)));
        assert_eq!(
            Vec::<String>::from_value(Value::List(vec!["a".into(), "b".into()])),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(Vec::<String>::from_value(Value::List(vec![Value::from(1)])), None);
        assert_eq!(<Option<ObjectRef> as PropertyKind>::KIND, PropertyType::Object(None));
    }
}
