//! The demultiplexer engine: binds the push-down automaton, the string
//! decoder and a schema's sinks into a character-fed state machine.

use std::rc::Rc;

use crate::decoder::StringDecoder;
use crate::error::{Error, Result};
use crate::pda::{Mode, PushDownAutomata, State};
use crate::schema::{Field, JMux};
use crate::sink::{RawSink, SinkKind};
use crate::value::{ElementKind, Value};

/// Object-safe engine surface, used to forward characters into nested
/// engines without knowing their schema type.
pub trait DynDemux: std::fmt::Debug {
    /// Feeds one character.
    ///
    /// # Errors
    ///
    /// As [`JsonDemux::feed_char`].
    fn feed_char(&mut self, ch: char) -> Result<()>;

    /// Whether the engine has closed its root object.
    fn is_complete(&self) -> bool;
}

/// A streaming JSON demultiplexer over a schema `S`.
///
/// Characters go in through [`JsonDemux::feed_char`] / [`JsonDemux::feed_chunks`];
/// data comes out exclusively through the schema's sinks, which consumers
/// await or iterate concurrently with the producer.
///
/// The engine never looks ahead or back, and any error is fatal: the engine
/// poisons itself and the schema instance must be discarded.
pub struct JsonDemux<S: JMux> {
    schema: Rc<S>,
    fields: Vec<Field>,
    pda: PushDownAutomata<Mode, State>,
    decoder: StringDecoder,
    current: Option<usize>,
    nested: Option<Box<dyn DynDemux>>,
    array_empty: bool,
}

impl<S: JMux> std::fmt::Debug for JsonDemux<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonDemux")
            .field("current", &self.current)
            .field("array_empty", &self.array_empty)
            .finish_non_exhaustive()
    }
}

impl<S: JMux> JsonDemux<S> {
    /// Creates an engine feeding the given schema instance.
    #[must_use]
    pub fn new(schema: Rc<S>) -> Self {
        let fields = schema.fields();
        Self {
            schema,
            fields,
            pda: PushDownAutomata::new(State::Start),
            decoder: StringDecoder::new(),
            current: None,
            nested: None,
            array_empty: false,
        }
    }

    /// The schema instance this engine populates.
    #[must_use]
    pub fn schema(&self) -> &Rc<S> {
        &self.schema
    }

    /// The engine's current state.
    #[must_use]
    pub fn state(&self) -> State {
        self.pda.state()
    }

    /// The engine's mode stack, oldest frame first.
    #[must_use]
    pub fn modes(&self) -> &[Mode] {
        self.pda.stack()
    }

    /// Whether the root object has closed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pda.state() == State::End
    }

    /// Consumes one character of the document.
    ///
    /// # Errors
    ///
    /// The first unexpected character fails with a variant of [`Error`]; the
    /// engine then moves to its error state and rejects further input.
    pub fn feed_char(&mut self, ch: char) -> Result<()> {
        match self.step(ch) {
            Ok(()) => Ok(()),
            Err(error) => {
                if self.pda.state() != State::End {
                    self.pda = PushDownAutomata::new(State::Error);
                    self.current = None;
                    self.nested = None;
                }
                Err(error)
            }
        }
    }

    /// Consumes a chunk of the document character by character.
    ///
    /// # Errors
    ///
    /// Stops at the first failing character, as [`JsonDemux::feed_char`].
    pub fn feed_chunks(&mut self, chunk: &str) -> Result<()> {
        for ch in chunk.chars() {
            self.feed_char(ch)?;
        }
        Ok(())
    }

    fn step(&mut self, ch: char) -> Result<()> {
        match self.pda.state() {
            State::End => {
                if is_json_whitespace(ch) {
                    Ok(())
                } else {
                    Err(Error::ObjectAlreadyClosed)
                }
            }
            State::Error => {
                Err(self.unexpected(ch, "the demultiplexer previously failed and must be discarded"))
            }
            State::Start => {
                if is_json_whitespace(ch) {
                    return Ok(());
                }
                if ch == '{' {
                    self.pda.push(Mode::Root);
                    self.pda.set_state(State::ExpectKey);
                    return Ok(());
                }
                Err(self.unexpected(ch, "a document must start with '{'"))
            }
            _ => match self.pda.top() {
                Some(Mode::Object) => self.step_object(ch),
                Some(Mode::Array) => self.step_array(ch),
                Some(Mode::Root) => self.step_root(ch),
                None => Err(self.unexpected(ch, "no structural context is open")),
            },
        }
    }

    fn step_root(&mut self, ch: char) -> Result<()> {
        match self.pda.state() {
            State::ExpectKey => {
                if is_json_whitespace(ch) {
                    return Ok(());
                }
                if ch == '"' {
                    self.decoder.reset();
                    self.pda.set_state(State::ParsingKey);
                    return Ok(());
                }
                if ch == '}' && self.current.is_none() {
                    return self.finalize();
                }
                Err(self.unexpected(ch, "expected '\"' to start a key"))
            }
            State::ParsingKey => {
                if self.decoder.is_terminating_quote(ch) {
                    let key = self.decoder.take_buffer();
                    if key.is_empty() {
                        return Err(Error::EmptyKey);
                    }
                    self.bind_current(&key)?;
                    self.pda.set_state(State::ExpectColon);
                    return Ok(());
                }
                self.decoder.push(ch)?;
                Ok(())
            }
            State::ExpectColon => {
                if is_json_whitespace(ch) {
                    return Ok(());
                }
                if ch == ':' {
                    self.pda.set_state(State::ExpectValue);
                    return Ok(());
                }
                Err(self.unexpected(ch, "expected ':' after a key"))
            }
            State::ExpectValue => self.dispatch_value(ch, false),
            State::ParsingString => self.string_step(ch, false),
            state if state.is_parsing_primitive() => self.primitive_step(ch, false),
            State::ExpectCommaOrEoc => {
                if is_json_whitespace(ch) {
                    return Ok(());
                }
                if ch == ',' {
                    self.pda.set_state(State::ExpectKey);
                    return Ok(());
                }
                if ch == '}' {
                    return self.finalize();
                }
                Err(self.unexpected(ch, "expected ',' or '}'"))
            }
            _ => Err(self.unexpected(ch, "illegal state in the root context")),
        }
    }

    fn step_array(&mut self, ch: char) -> Result<()> {
        match self.pda.state() {
            State::ExpectValue => self.dispatch_value(ch, true),
            State::ParsingString => self.string_step(ch, true),
            state if state.is_parsing_primitive() => self.primitive_step(ch, true),
            State::ExpectCommaOrEoc => {
                if is_json_whitespace(ch) {
                    return Ok(());
                }
                if ch == ',' {
                    self.pda.set_state(State::ExpectValue);
                    return Ok(());
                }
                if ch == ']' {
                    self.current_sink()?.close()?;
                    let _ = self.pda.pop();
                    self.pda.set_state(State::ExpectCommaOrEoc);
                    return Ok(());
                }
                Err(self.unexpected(ch, "expected ',' or ']'"))
            }
            _ => Err(self.unexpected(ch, "illegal state in the array context")),
        }
    }

    fn step_object(&mut self, ch: char) -> Result<()> {
        if self.pda.state() != State::ParsingObject {
            return Err(self.unexpected(ch, "the object context only delegates to a nested engine"));
        }
        let nested = self.nested.as_mut().ok_or(Error::NoCurrentSink)?;
        nested.feed_char(ch)?;
        if nested.is_complete() {
            self.nested = None;
            let _ = self.pda.pop();
            if self.pda.top() == Some(Mode::Root) {
                self.current_sink()?.close()?;
            }
            tracing::trace!(schema = S::schema_name(), "nested engine complete");
            self.pda.set_state(State::ExpectCommaOrEoc);
        }
        Ok(())
    }

    fn dispatch_value(&mut self, ch: char, in_array: bool) -> Result<()> {
        if is_json_whitespace(ch) {
            return Ok(());
        }

        if in_array {
            if ch == '[' {
                return Err(self.unexpected(ch, "arrays are one-dimensional"));
            }
            if ch == ']' {
                if !self.array_empty {
                    return Err(self.unexpected(ch, "expected a value after ','"));
                }
                self.current_sink()?.close()?;
                let _ = self.pda.pop();
                self.pda.set_state(State::ExpectCommaOrEoc);
                return Ok(());
            }
            self.array_empty = false;
        }

        let sink = self.current_sink()?;
        let types = sink.element_types();
        let kind = sink.sink_kind();

        // At root level a streaming sink takes a whole string (streamed as
        // characters) or an array; scalars-in-place have nowhere to go.
        if !in_array && kind == SinkKind::Streaming && !matches!(ch, '"' | '[') {
            return Err(self.unexpected(ch, "a streaming sink accepts only a string or an array"));
        }

        match ch {
            '"' => {
                if !matches!(types.main(), ElementKind::Str | ElementKind::Enum) {
                    return Err(self.unexpected(ch, "the current sink does not accept strings"));
                }
                // Entering an array already requires a streaming sink, so a
                // single-shot sink can never see a string element here.
                debug_assert!(!(in_array && kind == SinkKind::Awaitable));
                if !in_array && kind == SinkKind::Streaming && types.main() != ElementKind::Str {
                    return Err(
                        self.unexpected(ch, "only str elements stream character by character")
                    );
                }
                self.decoder.reset();
                self.pda.set_state(State::ParsingString);
                Ok(())
            }
            '0'..='9' | '-' => {
                let next = match types.main() {
                    ElementKind::Int => State::ParsingInteger,
                    ElementKind::Float => State::ParsingFloat,
                    _ => return Err(self.unexpected(ch, "the current sink does not accept numbers")),
                };
                self.decoder.reset();
                self.decoder.push(ch)?;
                self.pda.set_state(next);
                Ok(())
            }
            't' | 'f' => {
                if types.main() != ElementKind::Bool {
                    return Err(self.unexpected(ch, "the current sink does not accept booleans"));
                }
                self.decoder.reset();
                self.decoder.push(ch)?;
                self.pda.set_state(State::ParsingBoolean);
                Ok(())
            }
            'n' => {
                if !types.allows_null() {
                    return Err(self.unexpected(ch, "the current sink does not accept null"));
                }
                self.decoder.reset();
                self.decoder.push(ch)?;
                self.pda.set_state(State::ParsingNull);
                Ok(())
            }
            '{' => {
                if types.main() != ElementKind::Object {
                    return Err(
                        self.unexpected(ch, "the current sink does not accept nested objects")
                    );
                }
                let field = self.current_field()?;
                let mut engine = field.sink().begin_nested(S::schema_name(), field.name())?;
                tracing::trace!(
                    schema = S::schema_name(),
                    field = field.name(),
                    "delegating to nested engine"
                );
                engine.feed_char('{')?;
                self.nested = Some(engine);
                self.pda.push(Mode::Object);
                self.pda.set_state(State::ParsingObject);
                Ok(())
            }
            '[' => {
                if kind != SinkKind::Streaming {
                    return Err(self.unexpected(ch, "only streaming sinks accept arrays"));
                }
                self.array_empty = true;
                self.pda.push(Mode::Array);
                Ok(())
            }
            _ => Err(self.unexpected(ch, "expected the first character of a value")),
        }
    }

    fn string_step(&mut self, ch: char, in_array: bool) -> Result<()> {
        if self.decoder.is_terminating_quote(ch) {
            let buffer = self.decoder.take_buffer();
            let sink = self.current_sink()?;
            if in_array {
                // One whole element; the sink stays open for the next one.
                sink.put_value(Value::Str(buffer))?;
            } else if sink.sink_kind() == SinkKind::Awaitable {
                sink.put_value(Value::Str(buffer))?;
                sink.close()?;
            } else {
                // Streaming: every character already went out.
                sink.close()?;
            }
            self.pda.set_state(State::ExpectCommaOrEoc);
            return Ok(());
        }

        let decoded = self.decoder.push(ch)?;
        if !in_array {
            let sink = self.current_sink()?;
            if sink.sink_kind() == SinkKind::Streaming {
                if let Some(decoded) = decoded {
                    sink.put_value(Value::Str(decoded.to_string()))?;
                }
            }
        }
        Ok(())
    }

    fn primitive_step(&mut self, ch: char, in_array: bool) -> Result<()> {
        let is_terminator = is_json_whitespace(ch)
            || if in_array {
                matches!(ch, ',' | ']')
            } else {
                matches!(ch, ',' | '}')
            };
        if !is_terminator {
            self.class_check(ch)?;
            self.decoder.push(ch)?;
            return Ok(());
        }

        let buffer = self.decoder.take_buffer();
        let value = self.parse_primitive(&buffer)?;
        let sink = self.current_sink()?;
        sink.put_value(value)?;

        if in_array {
            match ch {
                ',' => self.pda.set_state(State::ExpectValue),
                ']' => {
                    sink.close()?;
                    let _ = self.pda.pop();
                    self.pda.set_state(State::ExpectCommaOrEoc);
                }
                _ => self.pda.set_state(State::ExpectCommaOrEoc),
            }
            return Ok(());
        }

        sink.close()?;
        match ch {
            ',' => {
                self.pda.set_state(State::ExpectKey);
                Ok(())
            }
            '}' => self.finalize(),
            _ => {
                self.pda.set_state(State::ExpectCommaOrEoc);
                Ok(())
            }
        }
    }

    fn class_check(&self, ch: char) -> Result<()> {
        let (ok, hint) = match self.pda.state() {
            State::ParsingInteger => (ch.is_ascii_digit(), "expected a digit or a terminator"),
            State::ParsingFloat => (
                matches!(ch, '0'..='9' | '+' | '-' | 'e' | 'E' | '.'),
                "expected a number character or a terminator",
            ),
            State::ParsingBoolean => {
                let mut literal = self.decoder.buffer().to_owned();
                literal.push(ch);
                (
                    "true".starts_with(&literal) || "false".starts_with(&literal),
                    "not a prefix of 'true' or 'false'",
                )
            }
            State::ParsingNull => {
                let mut literal = self.decoder.buffer().to_owned();
                literal.push(ch);
                ("null".starts_with(&literal), "not a prefix of 'null'")
            }
            _ => (false, "not inside a primitive literal"),
        };
        if ok {
            Ok(())
        } else {
            Err(self.unexpected(ch, hint))
        }
    }

    fn parse_primitive(&self, buffer: &str) -> Result<Value> {
        let fail = |reason: String| Error::ParsePrimitive {
            buffer: buffer.to_string(),
            reason,
        };
        match self.pda.state() {
            State::ParsingNull => {
                if buffer == "null" {
                    Ok(Value::Null)
                } else {
                    Err(fail("expected the literal 'null'".to_string()))
                }
            }
            State::ParsingBoolean => match buffer {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(fail("expected 'true' or 'false'".to_string())),
            },
            State::ParsingInteger => buffer
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| fail(e.to_string())),
            State::ParsingFloat => buffer
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| fail(e.to_string())),
            _ => Err(fail("not inside a primitive literal".to_string())),
        }
    }

    fn finalize(&mut self) -> Result<()> {
        for index in 0..self.fields.len() {
            self.current = Some(index);
            let field = &self.fields[index];
            field.sink().ensure_closed().map_err(|error| match error {
                Error::NothingEmitted => Error::NotAllPropertiesSet {
                    field: field.name(),
                },
                other => other,
            })?;
        }
        let _ = self.pda.pop();
        self.pda.set_state(State::End);
        self.current = None;
        tracing::debug!(schema = S::schema_name(), "document complete");
        Ok(())
    }

    fn bind_current(&mut self, key: &str) -> Result<()> {
        let index = self
            .fields
            .iter()
            .position(|field| field.name() == key)
            .ok_or_else(|| Error::MissingAttribute {
                object: S::schema_name(),
                attribute: key.to_string(),
            })?;
        tracing::trace!(schema = S::schema_name(), field = key, "bound current sink");
        self.current = Some(index);
        Ok(())
    }

    fn current_field(&self) -> Result<&Field> {
        self.current
            .and_then(|index| self.fields.get(index))
            .ok_or(Error::NoCurrentSink)
    }

    fn current_sink(&self) -> Result<Rc<dyn RawSink>> {
        Ok(Rc::clone(self.current_field()?.sink()))
    }

    fn unexpected(&self, character: char, hint: &'static str) -> Error {
        Error::UnexpectedCharacter {
            character,
            state: self.pda.state(),
            stack: self.pda.stack().to_vec(),
            hint,
        }
    }
}

impl<S: JMux> DynDemux for JsonDemux<S> {
    fn feed_char(&mut self, ch: char) -> Result<()> {
        JsonDemux::feed_char(self, ch)
    }

    fn is_complete(&self) -> bool {
        JsonDemux::is_complete(self)
    }
}

fn is_json_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r')
}
