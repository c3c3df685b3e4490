//! Per-field sinks: the channel between the engine and one consumer.
//!
//! Both variants are cheap-clone handles over shared interior state, so the
//! producing engine and the consuming task can each hold one. The producer
//! side commits synchronously (the backing queue is unbounded); the consumer
//! side suspends on [`tokio::sync::Notify`] until the next commit or close.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tokio::sync::Notify;

use crate::demux::DynDemux;
use crate::error::{Error, Result};
use crate::value::{Element, ElementKind, ElementTypeSet, StreamElement, Value, ValueRejected};

/// The two sink variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// Yields one value eventually.
    Awaitable,
    /// Yields a finite ordered sequence of values.
    Streaming,
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkKind::Awaitable => f.write_str("awaitable"),
            SinkKind::Streaming => f.write_str("streaming"),
        }
    }
}

/// The engine-facing surface of a sink: untyped emission, closure and nested
/// dispatch. Consumers use the typed surfaces of [`AwaitableValue`] and
/// [`StreamableValues`] instead.
pub trait RawSink {
    /// Which variant this sink is.
    fn sink_kind(&self) -> SinkKind;

    /// The element types this sink accepts.
    fn element_types(&self) -> ElementTypeSet;

    /// Emits a wire scalar into the sink.
    ///
    /// # Errors
    ///
    /// [`Error::TypeEmit`] when the scalar's kind is outside the element
    /// type set, [`Error::ParsePrimitive`] when a string names no enum
    /// variant, [`Error::SinkClosed`] when the sink no longer accepts values.
    fn put_value(&self, value: Value) -> Result<()>;

    /// Closes the sink; terminal.
    ///
    /// # Errors
    ///
    /// [`Error::SinkClosed`] if already closed; [`Error::NothingEmitted`]
    /// for an unset awaitable sink whose element types exclude `null`.
    fn close(&self) -> Result<()>;

    /// Closes the sink if it is not closed yet.
    ///
    /// # Errors
    ///
    /// As [`RawSink::close`], except that an already-closed sink is fine.
    fn ensure_closed(&self) -> Result<()>;

    /// Materializes a fresh nested schema instance, emits it into this sink
    /// and returns the engine that will populate it.
    ///
    /// # Errors
    ///
    /// [`Error::UnexpectedAttributeType`] when the element type is not a
    /// schema; emission errors as in [`RawSink::put_value`].
    fn begin_nested(
        &self,
        object: &'static str,
        attribute: &'static str,
    ) -> Result<Box<dyn DynDemux>>;
}

fn rejected(expected: ElementTypeSet, rejection: ValueRejected) -> Error {
    match rejection {
        ValueRejected::WrongKind(actual) => Error::TypeEmit { expected, actual },
        ValueRejected::UnknownVariant(text) => Error::ParsePrimitive {
            buffer: text,
            reason: "not a declared enum variant".to_string(),
        },
    }
}

#[derive(Debug)]
struct AwaitableShared<T> {
    value: RefCell<Option<T>>,
    closed: Cell<bool>,
    notify: Notify,
}

/// A single-shot sink: holds at most one value of element type `T`.
///
/// Lifecycle is unset → set → closed. Closing while unset is permitted only
/// when the element type admits `null` (e.g. `Option<T>`), in which case the
/// logical value is the null value.
#[derive(Debug)]
pub struct AwaitableValue<T: Element> {
    shared: Rc<AwaitableShared<T>>,
}

impl<T: Element> Clone for AwaitableValue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T: Element> Default for AwaitableValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> AwaitableValue<T> {
    /// Creates an unset, open sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Rc::new(AwaitableShared {
                value: RefCell::new(None),
                closed: Cell::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// The element types this sink accepts.
    #[must_use]
    pub fn element_types(&self) -> ElementTypeSet {
        T::element_types()
    }

    /// The single non-null element type.
    #[must_use]
    pub fn main_element_type(&self) -> ElementKind {
        T::element_types().main()
    }

    /// Which variant this sink is.
    #[must_use]
    pub fn sink_kind(&self) -> SinkKind {
        SinkKind::Awaitable
    }

    /// Whether the sink has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.get()
    }

    /// Sets the value and wakes the waiting consumer.
    ///
    /// # Errors
    ///
    /// [`Error::SinkClosed`] when the sink is closed or already set: a set
    /// single-shot sink is sealed.
    pub fn put(&self, value: T) -> Result<()> {
        if self.shared.closed.get() || self.shared.value.borrow().is_some() {
            return Err(self.closed_error());
        }
        *self.shared.value.borrow_mut() = Some(value);
        self.shared.notify.notify_waiters();
        Ok(())
    }

    /// Closes the sink; terminal.
    ///
    /// # Errors
    ///
    /// [`Error::SinkClosed`] if already closed. [`Error::NothingEmitted`] if
    /// unset and the element type excludes `null`; otherwise closing an
    /// unset sink sets the null value.
    pub fn close(&self) -> Result<()> {
        if self.shared.closed.get() {
            return Err(self.closed_error());
        }
        if self.shared.value.borrow().is_none() {
            match T::null_value() {
                Some(null) => *self.shared.value.borrow_mut() = Some(null),
                None => return Err(Error::NothingEmitted),
            }
        }
        self.shared.closed.set(true);
        self.shared.notify.notify_waiters();
        Ok(())
    }

    /// Closes the sink if it is not closed yet; idempotent.
    ///
    /// # Errors
    ///
    /// As [`AwaitableValue::close`], except that an already-closed sink is
    /// fine.
    pub fn ensure_closed(&self) -> Result<()> {
        if self.shared.closed.get() {
            return Ok(());
        }
        self.close()
    }

    /// The value, if one has been committed.
    ///
    /// # Errors
    ///
    /// [`Error::NothingEmitted`] while unset.
    pub fn get_current(&self) -> Result<T> {
        self.shared.value.borrow().clone().ok_or(Error::NothingEmitted)
    }

    /// Suspends until the value is committed, then yields it. For nullable
    /// element types a close-without-value resolves to the null value.
    pub async fn get(&self) -> T {
        loop {
            let notified = self.shared.notify.notified();
            if let Some(value) = self.shared.value.borrow().clone() {
                return value;
            }
            notified.await;
        }
    }

    fn closed_error(&self) -> Error {
        Error::SinkClosed {
            kind: SinkKind::Awaitable,
            element: T::element_types().main(),
        }
    }
}

impl<T: Element> RawSink for AwaitableValue<T> {
    fn sink_kind(&self) -> SinkKind {
        SinkKind::Awaitable
    }

    fn element_types(&self) -> ElementTypeSet {
        T::element_types()
    }

    fn put_value(&self, value: Value) -> Result<()> {
        let item = T::from_value(value).map_err(|r| rejected(T::element_types(), r))?;
        AwaitableValue::put(self, item)
    }

    fn close(&self) -> Result<()> {
        AwaitableValue::close(self)
    }

    fn ensure_closed(&self) -> Result<()> {
        AwaitableValue::ensure_closed(self)
    }

    fn begin_nested(
        &self,
        object: &'static str,
        attribute: &'static str,
    ) -> Result<Box<dyn DynDemux>> {
        let (instance, engine) = T::begin_nested().ok_or(Error::UnexpectedAttributeType {
            object,
            attribute,
            expected: "a sink over a nested schema",
        })?;
        AwaitableValue::put(self, instance)?;
        Ok(engine)
    }
}

#[derive(Debug)]
struct StreamShared<T> {
    queue: RefCell<VecDeque<T>>,
    last: RefCell<Option<T>>,
    closed: Cell<bool>,
    notify: Notify,
}

/// A streaming sink: an ordered finite sequence of values of element type
/// `T`, consumed in FIFO order with [`StreamableValues::next`].
///
/// The element type itself is never nullable (enforced by the
/// [`StreamElement`] bound); arrays of `null` use the `()` element type.
#[derive(Debug)]
pub struct StreamableValues<T: StreamElement> {
    shared: Rc<StreamShared<T>>,
}

impl<T: StreamElement> Clone for StreamableValues<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T: StreamElement> Default for StreamableValues<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StreamElement> StreamableValues<T> {
    /// Creates an empty, open sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Rc::new(StreamShared {
                queue: RefCell::new(VecDeque::new()),
                last: RefCell::new(None),
                closed: Cell::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// The element types this sink accepts.
    #[must_use]
    pub fn element_types(&self) -> ElementTypeSet {
        T::element_types()
    }

    /// The single element type.
    #[must_use]
    pub fn main_element_type(&self) -> ElementKind {
        T::element_types().main()
    }

    /// Which variant this sink is.
    #[must_use]
    pub fn sink_kind(&self) -> SinkKind {
        SinkKind::Streaming
    }

    /// Whether the sink has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.get()
    }

    /// Appends an item and wakes the waiting consumer.
    ///
    /// # Errors
    ///
    /// [`Error::SinkClosed`] when the sink is closed.
    pub fn put(&self, item: T) -> Result<()> {
        if self.shared.closed.get() {
            return Err(self.closed_error());
        }
        *self.shared.last.borrow_mut() = Some(item.clone());
        self.shared.queue.borrow_mut().push_back(item);
        self.shared.notify.notify_waiters();
        Ok(())
    }

    /// Closes the sink; terminal. Queued items remain consumable.
    ///
    /// # Errors
    ///
    /// [`Error::SinkClosed`] if already closed.
    pub fn close(&self) -> Result<()> {
        if self.shared.closed.get() {
            return Err(self.closed_error());
        }
        self.shared.closed.set(true);
        self.shared.notify.notify_waiters();
        Ok(())
    }

    /// Closes the sink if it is not closed yet; idempotent.
    ///
    /// # Errors
    ///
    /// Never fails in practice; shares the [`StreamableValues::close`]
    /// signature.
    pub fn ensure_closed(&self) -> Result<()> {
        if self.shared.closed.get() {
            return Ok(());
        }
        self.close()
    }

    /// The most recently emitted item.
    ///
    /// # Errors
    ///
    /// [`Error::NothingEmitted`] before the first item.
    pub fn get_current(&self) -> Result<T> {
        self.shared.last.borrow().clone().ok_or(Error::NothingEmitted)
    }

    /// Yields the next item in FIFO order, suspending while the sink is open
    /// and empty. Returns `None` once the sink is closed and drained.
    pub async fn next(&self) -> Option<T> {
        loop {
            let notified = self.shared.notify.notified();
            if let Some(item) = self.shared.queue.borrow_mut().pop_front() {
                return Some(item);
            }
            if self.shared.closed.get() {
                return None;
            }
            notified.await;
        }
    }

    fn closed_error(&self) -> Error {
        Error::SinkClosed {
            kind: SinkKind::Streaming,
            element: T::element_types().main(),
        }
    }
}

impl<T: StreamElement> RawSink for StreamableValues<T> {
    fn sink_kind(&self) -> SinkKind {
        SinkKind::Streaming
    }

    fn element_types(&self) -> ElementTypeSet {
        T::element_types()
    }

    fn put_value(&self, value: Value) -> Result<()> {
        let item = T::from_value(value).map_err(|r| rejected(T::element_types(), r))?;
        StreamableValues::put(self, item)
    }

    fn close(&self) -> Result<()> {
        StreamableValues::close(self)
    }

    fn ensure_closed(&self) -> Result<()> {
        StreamableValues::ensure_closed(self)
    }

    fn begin_nested(
        &self,
        object: &'static str,
        attribute: &'static str,
    ) -> Result<Box<dyn DynDemux>> {
        let (instance, engine) = T::begin_nested().ok_or(Error::UnexpectedAttributeType {
            object,
            attribute,
            expected: "a sink over a nested schema",
        })?;
        StreamableValues::put(self, instance)?;
        Ok(engine)
    }
}
