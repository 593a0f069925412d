//! A schemaless component.

use std::{any::Any, collections::BTreeMap};

use config::{Component, PropertyDescriptor, PropertyType, Value};

/// A component that accepts any property.
///
/// Useful when a graph is built without compile-time types: every key of the
/// configuration lands in [`fields`](Self::fields) unconverted.
#[derive(Debug, Default)]
pub struct Record {
    /// Assigned properties.
    fields: BTreeMap<String, Value>,
    /// How often the post-configuration hook has run.
    configured: u32,
}

impl Record {
    /// Assigned properties.
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// One assigned property.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Number of times `after_configured` has run.
    pub fn configured_count(&self) -> u32 {
        self.configured
    }
}

impl Component for Record {
    fn type_name(&self) -> &'static str {
        "Record"
    }

    fn properties(&self) -> Vec<PropertyDescriptor> {
        self.fields
            .keys()
            .map(|k| PropertyDescriptor::new(k.clone(), PropertyType::Any))
            .collect()
    }

    fn property(&self, name: &str) -> Option<PropertyDescriptor> {
        Some(PropertyDescriptor::new(name.to_string(), PropertyType::Any))
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    fn set_property(&mut self, name: &str, value: Value) -> bool {
        self.fields.insert(name.to_string(), value);
        true
    }

    fn after_configured(&mut self) {
        self.configured += 1;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
