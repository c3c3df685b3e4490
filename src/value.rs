//! The value space routed through sinks: scalar kinds, element type sets and
//! the conversion from wire scalars to typed elements.

use std::rc::Rc;

use crate::demux::{DynDemux, JsonDemux};
use crate::schema::JMux;

/// A leaf kind of the value space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// JSON integer, produced as `i64`.
    Int,
    /// JSON number with a fractional or exponent part, produced as `f64`.
    Float,
    /// JSON string, produced decoded.
    Str,
    /// JSON `true` / `false`.
    Bool,
    /// JSON `null`.
    Null,
    /// A string-valued enumeration.
    Enum,
    /// A nested schema object.
    Object,
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ElementKind::Int => "int",
            ElementKind::Float => "float",
            ElementKind::Str => "str",
            ElementKind::Bool => "bool",
            ElementKind::Null => "null",
            ElementKind::Enum => "enum",
            ElementKind::Object => "object",
        };
        f.write_str(name)
    }
}

/// The set of element kinds a sink accepts: a main kind, optionally extended
/// with `null`.
///
/// This is the whole universe of legal sets — a union of two non-null kinds
/// is not expressible, which is exactly the restriction the engine requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementTypeSet {
    main: ElementKind,
    nullable: bool,
}

impl ElementTypeSet {
    /// The singleton set `{kind}`.
    #[must_use]
    pub fn of(kind: ElementKind) -> Self {
        Self {
            main: kind,
            nullable: false,
        }
    }

    /// This set extended with `null`.
    #[must_use]
    pub fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    /// The single non-null member — the sink's main element type.
    #[must_use]
    pub fn main(&self) -> ElementKind {
        self.main
    }

    /// Whether `null` is a member.
    #[must_use]
    pub fn allows_null(&self) -> bool {
        self.nullable || self.main == ElementKind::Null
    }

    /// Whether `kind` is a member of the set.
    #[must_use]
    pub fn contains(&self, kind: ElementKind) -> bool {
        kind == self.main || (kind == ElementKind::Null && self.nullable)
    }
}

impl std::fmt::Display for ElementTypeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.nullable && self.main != ElementKind::Null {
            write!(f, "{} | null", self.main)
        } else {
            write!(f, "{}", self.main)
        }
    }
}

/// A scalar decoded off the wire, on its way into a sink.
///
/// Nested schema instances do not pass through here; they are materialized
/// by the typed dispatch path (see [`Element::begin_nested`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON `null`.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON integer.
    Int(i64),
    /// JSON float.
    Float(f64),
    /// Decoded JSON string.
    Str(String),
}

impl Value {
    /// The kind of this scalar. Strings report [`ElementKind::Str`] even
    /// when destined for an enum-typed sink.
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        match self {
            Value::Null => ElementKind::Null,
            Value::Bool(_) => ElementKind::Bool,
            Value::Int(_) => ElementKind::Int,
            Value::Float(_) => ElementKind::Float,
            Value::Str(_) => ElementKind::Str,
        }
    }
}

/// Why a [`Value`] did not convert into an element type.
#[derive(Debug)]
pub enum ValueRejected {
    /// The value's kind is not in the element type set.
    WrongKind(ElementKind),
    /// The string names no variant of the enum element type.
    UnknownVariant(String),
}

/// A type that can sit at the element position of a sink.
///
/// Implemented for the scalar leaves (`i64`, `f64`, `String`, `bool`, `()`),
/// for `Option<T>` of any element (nullable), for `Rc<S>` of any schema
/// (nested objects), and for enums declared with [`jmux_enum!`].
pub trait Element: Clone + 'static {
    /// The element type set this type occupies.
    fn element_types() -> ElementTypeSet;

    /// Converts a wire scalar into this element type.
    ///
    /// # Errors
    ///
    /// [`ValueRejected`] when the scalar's kind is outside the element type
    /// set, or names no variant of an enum element.
    fn from_value(value: Value) -> std::result::Result<Self, ValueRejected>
    where
        Self: Sized;

    /// The logical null, for element types that admit one.
    fn null_value() -> Option<Self>
    where
        Self: Sized,
    {
        None
    }

    /// Materializes a fresh nested schema instance together with the engine
    /// that will populate it. `None` for non-schema element types.
    fn begin_nested() -> Option<(Self, Box<dyn DynDemux>)>
    where
        Self: Sized,
    {
        None
    }
}

/// Marker for element types admissible in [`StreamableValues`]: every kind
/// except nullable ones, which only awaitable sinks may carry.
///
/// [`StreamableValues`]: crate::sink::StreamableValues
pub trait StreamElement: Element {}

impl Element for i64 {
    fn element_types() -> ElementTypeSet {
        ElementTypeSet::of(ElementKind::Int)
    }

    fn from_value(value: Value) -> std::result::Result<Self, ValueRejected> {
        match value {
            Value::Int(n) => Ok(n),
            other => Err(ValueRejected::WrongKind(other.kind())),
        }
    }
}

impl StreamElement for i64 {}

impl Element for f64 {
    fn element_types() -> ElementTypeSet {
        ElementTypeSet::of(ElementKind::Float)
    }

    fn from_value(value: Value) -> std::result::Result<Self, ValueRejected> {
        match value {
            Value::Float(x) => Ok(x),
            other => Err(ValueRejected::WrongKind(other.kind())),
        }
    }
}

impl StreamElement for f64 {}

impl Element for String {
    fn element_types() -> ElementTypeSet {
        ElementTypeSet::of(ElementKind::Str)
    }

    fn from_value(value: Value) -> std::result::Result<Self, ValueRejected> {
        match value {
            Value::Str(text) => Ok(text),
            other => Err(ValueRejected::WrongKind(other.kind())),
        }
    }
}

impl StreamElement for String {}

impl Element for bool {
    fn element_types() -> ElementTypeSet {
        ElementTypeSet::of(ElementKind::Bool)
    }

    fn from_value(value: Value) -> std::result::Result<Self, ValueRejected> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(ValueRejected::WrongKind(other.kind())),
        }
    }
}

impl StreamElement for bool {}

/// `()` is the always-null element type, mirroring fields that are declared
/// to hold nothing but `null`.
impl Element for () {
    fn element_types() -> ElementTypeSet {
        ElementTypeSet::of(ElementKind::Null)
    }

    fn from_value(value: Value) -> std::result::Result<Self, ValueRejected> {
        match value {
            Value::Null => Ok(()),
            other => Err(ValueRejected::WrongKind(other.kind())),
        }
    }

    fn null_value() -> Option<Self> {
        Some(())
    }
}

impl StreamElement for () {}

impl<T: Element> Element for Option<T> {
    fn element_types() -> ElementTypeSet {
        T::element_types().nullable()
    }

    fn from_value(value: Value) -> std::result::Result<Self, ValueRejected> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn null_value() -> Option<Self> {
        Some(None)
    }

    fn begin_nested() -> Option<(Self, Box<dyn DynDemux>)> {
        T::begin_nested().map(|(instance, engine)| (Some(instance), engine))
    }
}

impl<S: JMux> Element for Rc<S> {
    fn element_types() -> ElementTypeSet {
        ElementTypeSet::of(ElementKind::Object)
    }

    fn from_value(value: Value) -> std::result::Result<Self, ValueRejected> {
        Err(ValueRejected::WrongKind(value.kind()))
    }

    fn begin_nested() -> Option<(Self, Box<dyn DynDemux>)> {
        let instance = Rc::new(S::default());
        let engine: Box<dyn DynDemux> = Box::new(JsonDemux::new(Rc::clone(&instance)));
        Some((instance, engine))
    }
}

impl<S: JMux> StreamElement for Rc<S> {}

/// Declares a string-valued enumeration usable as a sink element type.
///
/// ```
/// jmux::jmux_enum! {
///     pub enum Unit { Celsius = "celsius", Fahrenheit = "fahrenheit" }
/// }
///
/// assert_eq!(Unit::Celsius.as_str(), "celsius");
/// ```
#[macro_export]
macro_rules! jmux_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// The wire spelling of this variant.
            #[must_use]
            $vis fn as_str(&self) -> &'static str {
                match self { $( Self::$variant => $text ),+ }
            }
        }

        impl $crate::Element for $name {
            fn element_types() -> $crate::ElementTypeSet {
                $crate::ElementTypeSet::of($crate::ElementKind::Enum)
            }

            fn from_value(
                value: $crate::Value,
            ) -> ::std::result::Result<Self, $crate::ValueRejected> {
                match value {
                    $crate::Value::Str(text) => match text.as_str() {
                        $( $text => Ok(Self::$variant), )+
                        _ => Err($crate::ValueRejected::UnknownVariant(text)),
                    },
                    other => Err($crate::ValueRejected::WrongKind(other.kind())),
                }
            }
        }

        impl $crate::StreamElement for $name {}
    };
}
