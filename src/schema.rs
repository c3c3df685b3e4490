//! Schema binding: a declarative record of named, typed sinks.
//!
//! A schema is a plain struct whose fields are sinks; implementing [`JMux`]
//! hands the engine an ordered field map. The [`jmux_schema!`] macro writes
//! the struct and the impl in one go.

use std::rc::Rc;

use crate::sink::RawSink;

/// One entry of a schema's field map: a name bound to a sink handle.
pub struct Field {
    name: &'static str,
    sink: Rc<dyn RawSink>,
}

impl Field {
    /// Binds `name` to a handle of `sink`.
    pub fn new<S: RawSink + Clone + 'static>(name: &'static str, sink: &S) -> Self {
        Self {
            name,
            sink: Rc::new(sink.clone()),
        }
    }

    /// The field name as it appears in the JSON input.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The engine-facing sink handle.
    #[must_use]
    pub fn sink(&self) -> &Rc<dyn RawSink> {
        &self.sink
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.sink.sink_kind())
            .field("element_types", &self.sink.element_types())
            .finish()
    }
}

/// A demultiplexable schema: a named record of typed sinks.
///
/// Field order is the declaration order; names must be unique. Instances are
/// created per document via `Default` — nested dispatch relies on this to
/// materialize fresh nested schemas.
pub trait JMux: Default + 'static {
    /// The ordered field map of this schema.
    fn fields(&self) -> Vec<Field>;

    /// The schema's name, for error reporting.
    fn schema_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Declares a schema struct together with its [`JMux`] impl.
///
/// ```
/// use jmux::{AwaitableValue, JMux, StreamableValues};
///
/// jmux::jmux_schema! {
///     pub struct City {
///         pub name: StreamableValues<String>,
///         pub population: AwaitableValue<i64>,
///     }
/// }
///
/// let city = City::default();
/// let names: Vec<_> = city.fields().iter().map(|f| f.name()).collect();
/// assert_eq!(names, ["name", "population"]);
/// ```
#[macro_export]
macro_rules! jmux_schema {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $sink:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Default)]
        $vis struct $name {
            $( $(#[$fmeta])* $fvis $field : $sink ),*
        }

        impl $crate::JMux for $name {
            fn schema_name() -> &'static str {
                stringify!($name)
            }

            fn fields(&self) -> ::std::vec::Vec<$crate::Field> {
                ::std::vec![
                    $( $crate::Field::new(stringify!($field), &self.$field) ),*
                ]
            }
        }
    };
}
