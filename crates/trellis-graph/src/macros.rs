/// Declare a struct and derive its [`Component`](crate::Component)
/// descriptor table from the field list.
///
/// Every field becomes a property named after the field, typed by its Rust
/// type through [`PropertyKind`](crate::PropertyKind). A field annotated with
/// `=> "Class"` is an object property that builds `Class` when configuration
/// gives no type hint. An optional `after_configured = path;` names the hook.
///
/// ```
/// use trellis_graph::{ObjectRef, component};
///
/// fn ready(engine: &mut Engine) {
///     engine.started = true;
/// }
///
/// component! {
///     /// A motor.
///     #[derive(Default)]
///     pub struct Engine {
///         /// Cylinder count.
///         pub cylinders: i64,
///         /// Running flag.
///         pub started: bool,
///         /// Backup motor.
///         pub spare: Option<ObjectRef> => "Engine",
///     }
///     after_configured = ready;
/// }
/// ```
#[macro_export]
macro_rules! component {
    (@kind $ty:ty) => {
        <$ty as $crate::PropertyKind>::KIND
    };
    (@kind $ty:ty, $class:literal) => {
        $crate::PropertyType::Object(Some($class))
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty $(=> $class:literal)?
            ),* $(,)?
        }
        $(after_configured = $hook:path;)?
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )*
        }

        impl $crate::Component for $name {
            fn type_name(&self) -> &'static str {
                stringify!($name)
            }

            fn properties(&self) -> Vec<$crate::PropertyDescriptor> {
                vec![$(
                    $crate::PropertyDescriptor::new(
                        stringify!($field),
                        $crate::component!(@kind $ty $(, $class)?),
                    )
                ),*]
            }

            fn get_property(&self, name: &str) -> Option<$crate::Value> {
                match name {
                    $(stringify!($field) => Some($crate::IntoValue::into_value(
                        ::std::clone::Clone::clone(&self.$field),
                    )),)*
                    _ => None,
                }
            }

            fn set_property(&mut self, name: &str, value: $crate::Value) -> bool {
                match name {
                    $(stringify!($field) => match <$ty as $crate::FromValue>::from_value(value) {
                        Some(v) => {
                            self.$field = v;
                            true
                        }
                        None => false,
                    },)*
                    _ => {
                        let _ = value;
                        false
                    }
                }
            }

            $(
                fn after_configured(&mut self) {
                    $hook(self)
                }
            )?

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }
    };
}
