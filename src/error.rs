use crate::pda::{Mode, State};
use crate::sink::SinkKind;
use crate::value::{ElementKind, ElementTypeSet};

/// Convenient type alias for demultiplexer results.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the demultiplexer engine and its sinks.
///
/// All errors are fatal to the parse: the engine moves to its `error` state,
/// clears its stack, and the schema instance must be discarded.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The state machine received a character that is not legal in its
    /// current state, or that the current sink's element types disallow.
    #[error("unexpected character {character:?} in state {state:?} with stack {stack:?}: {hint}")]
    UnexpectedCharacter {
        /// The offending character.
        character: char,
        /// Engine state at the time of the failure.
        state: State,
        /// Mode stack at the time of the failure.
        stack: Vec<Mode>,
        /// What the engine would have accepted instead.
        hint: &'static str,
    },

    /// An object key terminated with an empty buffer (`""`).
    #[error("object key cannot be empty")]
    EmptyKey,

    /// A parsed key names no field of the schema.
    #[error("'{object}' has no field '{attribute}'")]
    MissingAttribute {
        /// Schema name.
        object: &'static str,
        /// The key found in the input.
        attribute: String,
    },

    /// A field was addressed in a way its sink cannot serve, e.g. nested
    /// dispatch on a sink whose element type is not a schema.
    #[error("'{object}' field '{attribute}' must be {expected}")]
    UnexpectedAttributeType {
        /// Schema name.
        object: &'static str,
        /// The field name.
        attribute: &'static str,
        /// Shape the engine required.
        expected: &'static str,
    },

    /// A completed literal could not be converted to the sink's main type.
    #[error("failed to parse primitive {buffer:?}: {reason}")]
    ParsePrimitive {
        /// The accumulated literal.
        buffer: String,
        /// Why conversion failed.
        reason: String,
    },

    /// A value of the wrong kind was emitted into a sink.
    #[error("cannot emit {actual} into a sink accepting {expected}")]
    TypeEmit {
        /// Element types the sink accepts.
        expected: ElementTypeSet,
        /// Kind of the value that was emitted.
        actual: ElementKind,
    },

    /// The engine needed a current sink but none was bound. Indicates a bug
    /// in the state machine rather than bad input.
    #[error("no current sink is set")]
    NoCurrentSink,

    /// An awaitable sink was closed, or read via `get_current`, without ever
    /// receiving a value.
    #[error("sink received no value")]
    NothingEmitted,

    /// Finalization found a required field that never appeared in the
    /// document.
    #[error("required field '{field}' was never set")]
    NotAllPropertiesSet {
        /// Name of the unset field.
        field: &'static str,
    },

    /// `put` or `close` on a sink that is already closed (or, for an
    /// awaitable sink, already set).
    #[error("{kind} sink of {element} is already closed")]
    SinkClosed {
        /// Which sink variant rejected the operation.
        kind: SinkKind,
        /// The sink's main element type.
        element: ElementKind,
    },

    /// `feed_char` after the root object was closed.
    #[error("object is already closed")]
    ObjectAlreadyClosed,

    /// The string decoder met an invalid `\u` sequence.
    #[error("invalid unicode escape (code unit {code_unit:#06x}): {context}")]
    StreamParse {
        /// The offending UTF-16 code unit.
        code_unit: u32,
        /// What the decoder was expecting.
        context: &'static str,
    },
}
