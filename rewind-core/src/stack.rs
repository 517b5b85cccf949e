/*!
The snapshot stack: one binding registry plus one history for one target.

`SnapshotStack<T>` is a cheap cloneable handle over a shared core. Handles
drive registration, the store/restore protocol, serialiser binding and the
lock-step group fan-out. The engine is single-threaded by design: targets
and cores are shared through `Rc<RefCell<_>>` and callers own any external
synchronization.

Restore semantics are non-destructive time travel: restoring applies an
older snapshot and moves the history cursor, but neither truncates the
history nor appends to it, so `restore(1)` followed by `restore(0)` lands
back on the most recent snapshot.
*/

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::binding::{BindingRegistry, Getter, Setter};
use crate::config::StackConfig;
use crate::error::MemberFailure;
use crate::group::{self, GroupSet, SharedCore, SharedGroup};
use crate::serialiser::Serialiser;
use crate::signal::{Signal, SlotId};
use crate::snapshot::{History, Snapshot};
use crate::{Result, RewindError};

/// Lifecycle events a stack emits, see [`SnapshotStack::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackEvent {
    /// A snapshot was committed to the history
    Stored,
    /// A snapshot was applied to the target
    Restored,
    /// A binding was registered
    Registered,
    /// A binding was unregistered
    Unregistered,
}

#[derive(Default)]
pub(crate) struct StackEvents {
    stored: Signal,
    restored: Signal,
    registered: Signal,
    unregistered: Signal,
}

impl StackEvents {
    fn signal_mut(&mut self, event: StackEvent) -> &mut Signal {
        match event {
            StackEvent::Stored => &mut self.stored,
            StackEvent::Restored => &mut self.restored,
            StackEvent::Registered => &mut self.registered,
            StackEvent::Unregistered => &mut self.unregistered,
        }
    }
}

pub(crate) struct SerialiserBinding {
    adapter: Rc<dyn Serialiser>,
    identifier: String,
}

/// Shared state behind every handle of one stack.
pub(crate) struct StackCore {
    pub(crate) id: String,
    pub(crate) registry: BindingRegistry,
    pub(crate) history: History,
    pub(crate) config: StackConfig,
    pub(crate) serialiser: Option<SerialiserBinding>,
    pub(crate) group: SharedGroup,
    pub(crate) deferred: bool,
    pub(crate) events: StackEvents,
}

/// Snapshot stack over a single target object.
///
/// # Example
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use rewind_core::SnapshotStack;
///
/// struct Player {
///     score: u32,
/// }
///
/// let player = Rc::new(RefCell::new(Player { score: 0 }));
/// let stack = SnapshotStack::new(Rc::clone(&player));
/// stack.register("score", |p: &Player| p.score, |p: &mut Player, v| p.score = v)?;
///
/// stack.store()?;
/// player.borrow_mut().score = 42;
/// stack.store()?;
///
/// stack.restore(1)?;
/// assert_eq!(player.borrow().score, 0);
/// # Ok::<(), rewind_core::RewindError>(())
/// ```
pub struct SnapshotStack<T> {
    target: Rc<RefCell<T>>,
    core: SharedCore,
}

impl<T> Clone for SnapshotStack<T> {
    fn clone(&self) -> Self {
        Self {
            target: Rc::clone(&self.target),
            core: Rc::clone(&self.core),
        }
    }
}

impl<T> fmt::Debug for SnapshotStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.borrow();
        f.debug_struct("SnapshotStack")
            .field("name", &core.id)
            .field("depth", &core.history.depth())
            .finish()
    }
}

impl<T> SnapshotStack<T> {
    /// Create a stack for `target` with the default configuration.
    pub fn new(target: Rc<RefCell<T>>) -> Self {
        Self::build(target, StackConfig::default())
    }

    /// Create a stack for `target` with the given configuration.
    ///
    /// # Errors
    /// [`RewindError::Validation`] if the configuration is invalid.
    pub fn with_config(target: Rc<RefCell<T>>, config: StackConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(target, config))
    }

    fn build(target: Rc<RefCell<T>>, config: StackConfig) -> Self {
        let id = config.name.clone().unwrap_or_else(|| {
            let mut id = Uuid::new_v4().simple().to_string();
            id.truncate(8);
            id
        });
        let core = Rc::new(RefCell::new(StackCore {
            id,
            registry: BindingRegistry::default(),
            history: History::new(config.max_depth),
            config,
            serialiser: None,
            group: GroupSet::detached(),
            deferred: false,
            events: StackEvents::default(),
        }));
        GroupSet::attach(&core);
        debug!(stack = %core.borrow().id, "created snapshot stack");
        Self { target, core }
    }

    /// Register a property through typed accessor closures.
    ///
    /// The getter/setter pair is the Rust rendering of direct field access:
    /// `|t| t.field` and `|t, v| t.field = v`. Values are converted through
    /// serde, so any `Serialize + DeserializeOwned` type works.
    ///
    /// # Errors
    /// [`RewindError::DuplicateLabel`] if the label is already registered.
    pub fn register<V, G, S>(&self, label: impl Into<String>, get: G, set: S) -> Result<()>
    where
        T: 'static,
        V: Serialize + DeserializeOwned,
        G: Fn(&T) -> V + 'static,
        S: Fn(&mut T, V) + 'static,
    {
        let target = Rc::clone(&self.target);
        let getter: Getter = Box::new(move || {
            let value = get(&*target.borrow());
            serde_json::to_value(value).map_err(RewindError::from)
        });

        let target = Rc::clone(&self.target);
        let setter: Setter = Box::new(move |value: &Value| {
            let value: V = serde_json::from_value(value.clone())?;
            set(&mut *target.borrow_mut(), value);
            Ok(())
        });

        self.register_with(label, getter, setter)
    }

    /// Register a property through explicit pre-erased callables.
    ///
    /// This is the low-level path for accessors that are fallible or that do
    /// not map onto a plain field, e.g. computed values.
    ///
    /// # Errors
    /// [`RewindError::DuplicateLabel`] if the label is already registered.
    pub fn register_with(&self, label: impl Into<String>, getter: Getter, setter: Setter) -> Result<()> {
        let label = label.into();
        let handlers = {
            let mut core = self.core.borrow_mut();
            core.registry.register(label.clone(), getter, setter)?;
            debug!(stack = %core.id, label = %label, "registered binding");
            core.events.registered.handlers()
        };
        for handler in handlers {
            handler();
        }
        Ok(())
    }

    /// Remove a binding. Existing snapshots keep the label; applying them
    /// skips it from now on.
    ///
    /// Returns whether a binding was removed.
    pub fn unregister(&self, label: &str) -> bool {
        let (removed, handlers) = {
            let mut core = self.core.borrow_mut();
            let removed = core.registry.unregister(label);
            let handlers = if removed {
                debug!(stack = %core.id, label = %label, "unregistered binding");
                core.events.unregistered.handlers()
            } else {
                Vec::new()
            };
            (removed, handlers)
        };
        for handler in handlers {
            handler();
        }
        removed
    }

    /// Capture a snapshot on every member of this stack's group.
    ///
    /// Capture is two-phase across the group: every member's values are read
    /// first, then all snapshots are committed, so a capture failure leaves
    /// every history untouched. Members running inside [`defer`](Self::defer)
    /// or [`muted`](Self::muted) are skipped; so is the entire call when this
    /// stack itself is deferred. Members configured with `always_serialise`
    /// also serialise.
    ///
    /// # Errors
    /// [`RewindError::Capture`] (wrapped in [`RewindError::Member`] when the
    /// failing stack is another group member) if a getter fails;
    /// [`RewindError::Propagation`] if serialisation fails on some members
    /// after the snapshots were committed.
    pub fn store(&self) -> Result<()> {
        self.store_impl(false)
    }

    /// Like [`store`](Self::store), and additionally externalise the history
    /// of every member with a bound serialiser. Members without one are
    /// skipped.
    pub fn store_and_serialise(&self) -> Result<()> {
        self.store_impl(true)
    }

    fn store_impl(&self, serialise: bool) -> Result<()> {
        {
            let core = self.core.borrow();
            if core.deferred {
                debug!(stack = %core.id, "store deferred, skipped");
                return Ok(());
            }
        }

        let members = group::members_of(&self.core);
        let total = members.len();

        // Capture phase: read every member before committing anywhere.
        let mut staged: Vec<(SharedCore, Snapshot)> = Vec::with_capacity(total);
        for member in &members {
            let core = member.borrow();
            if core.deferred {
                continue;
            }
            match core.registry.capture() {
                Ok(snapshot) => staged.push((Rc::clone(member), snapshot)),
                Err(error) => return Err(self.tag_member_error(member, error)),
            }
        }

        // Commit phase: append and serialise, collecting per-member failures.
        let mut failures = Vec::new();
        let mut handlers = Vec::new();
        for (member, snapshot) in staged {
            let mut core = member.borrow_mut();
            core.history.push(snapshot);
            debug!(stack = %core.id, depth = core.history.depth(), "stored snapshot");
            handlers.extend(core.events.stored.handlers());

            if serialise || core.config.always_serialise {
                if let Some(binding) = &core.serialiser {
                    match binding.adapter.serialise(core.history.snapshots(), &binding.identifier) {
                        Ok(()) => {
                            debug!(stack = %core.id, identifier = %binding.identifier, "serialised history");
                        }
                        Err(error) => failures.push(MemberFailure {
                            member: core.id.clone(),
                            error,
                        }),
                    }
                }
            }
        }

        for handler in handlers {
            handler();
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RewindError::Propagation { failures, total })
        }
    }

    /// Restore the snapshot `offset` store-calls back on every member of
    /// this stack's group, each against its own bindings and history.
    ///
    /// Validation is all-or-nothing: every member's offset is range-checked
    /// before any setter runs, so an out-of-range member leaves all targets
    /// untouched. Apply failures after that point are collected per member
    /// and do not undo the members that succeeded.
    ///
    /// # Errors
    /// [`RewindError::OutOfRange`] (wrapped in [`RewindError::Member`] when
    /// the short history belongs to another group member) if
    /// `offset >= depth` anywhere; [`RewindError::Propagation`] if setters
    /// fail on some members during apply.
    pub fn restore(&self, offset: usize) -> Result<()> {
        let members = group::members_of(&self.core);
        let total = members.len();

        // Validation phase: stage every member's snapshot before any apply.
        let mut staged: Vec<(SharedCore, Snapshot)> = Vec::with_capacity(total);
        for member in &members {
            let core = member.borrow();
            match core.history.at_offset(offset) {
                Ok(snapshot) => staged.push((Rc::clone(member), snapshot.clone())),
                Err(error) => return Err(self.tag_member_error(member, error)),
            }
        }

        // Apply phase: best-effort across members.
        let mut failures = Vec::new();
        let mut handlers = Vec::new();
        for (member, snapshot) in staged {
            let applied = member.borrow().registry.apply(&snapshot);
            match applied {
                Ok(()) => {
                    let mut core = member.borrow_mut();
                    core.history.mark_restored(offset);
                    debug!(stack = %core.id, offset, "restored snapshot");
                    handlers.extend(core.events.restored.handlers());
                }
                Err(error) => failures.push(MemberFailure {
                    member: member.borrow().id.clone(),
                    error,
                }),
            }
        }

        for handler in handlers {
            handler();
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RewindError::Propagation { failures, total })
        }
    }

    fn tag_member_error(&self, member: &SharedCore, error: RewindError) -> RewindError {
        if Rc::ptr_eq(member, &self.core) {
            error
        } else {
            RewindError::on_member(member.borrow().id.clone(), error)
        }
    }

    /// Put this stack and `other` into lock-step: the union of both groups
    /// becomes one transitively-closed set, and any store/restore on any
    /// member fans out to all of them. Stacks over different target types
    /// can be grouped.
    pub fn group<U>(&self, other: &SnapshotStack<U>) {
        group::merge(&self.core, &other.core);
        debug!(
            stack = %self.core.borrow().id,
            members = group::members_of(&self.core).len(),
            "joined lock-step group"
        );
    }

    /// Number of live members in this stack's group, self included.
    pub fn group_size(&self) -> usize {
        group::members_of(&self.core).len()
    }

    /// Bind a serialiser adapter and identifier to this stack.
    ///
    /// # Errors
    /// [`RewindError::SerialiserAlreadyBound`] if one is already bound.
    pub fn register_serialiser<S>(&self, adapter: S, identifier: impl Into<String>) -> Result<()>
    where
        S: Serialiser + 'static,
    {
        let mut core = self.core.borrow_mut();
        if core.serialiser.is_some() {
            return Err(RewindError::SerialiserAlreadyBound);
        }
        let identifier = identifier.into();
        debug!(stack = %core.id, identifier = %identifier, "bound serialiser");
        core.serialiser = Some(SerialiserBinding {
            adapter: Rc::new(adapter),
            identifier,
        });
        Ok(())
    }

    /// Remove the bound serialiser, if any.
    pub fn unregister_serialiser(&self) {
        self.core.borrow_mut().serialiser = None;
    }

    /// Whether a serialiser is bound.
    pub fn has_serialiser(&self) -> bool {
        self.core.borrow().serialiser.is_some()
    }

    /// Externalise the full history through the bound serialiser.
    ///
    /// # Errors
    /// [`RewindError::NoSerialiser`] if none is bound, otherwise whatever
    /// the adapter reports.
    pub fn serialise(&self) -> Result<()> {
        let core = self.core.borrow();
        let binding = core.serialiser.as_ref().ok_or(RewindError::NoSerialiser)?;
        binding.adapter.serialise(core.history.snapshots(), &binding.identifier)?;
        debug!(stack = %core.id, identifier = %binding.identifier, "serialised history");
        Ok(())
    }

    /// Replace the local history with the persisted one and apply its most
    /// recent snapshot (if any) so the target reflects the restored state
    /// immediately. Local to this stack; no group fan-out.
    ///
    /// # Errors
    /// [`RewindError::NoSerialiser`] if none is bound;
    /// [`RewindError::NotFound`] if nothing was persisted under the bound
    /// identifier; apply errors from the registry.
    pub fn deserialise(&self) -> Result<()> {
        let (adapter, identifier) = {
            let core = self.core.borrow();
            let binding = core.serialiser.as_ref().ok_or(RewindError::NoSerialiser)?;
            (Rc::clone(&binding.adapter), binding.identifier.clone())
        };

        let snapshots = adapter.deserialise(&identifier)?;

        let handlers = {
            let mut core = self.core.borrow_mut();
            core.history.replace(snapshots);
            let latest = core.history.latest().cloned();
            if let Some(snapshot) = latest {
                core.registry.apply(&snapshot)?;
            }
            debug!(stack = %core.id, depth = core.history.depth(), "deserialised history");
            core.events.restored.handlers()
        };
        for handler in handlers {
            handler();
        }
        Ok(())
    }

    /// Run `f` with stores suppressed on this stack, then commit a single
    /// store for all the changes made inside.
    ///
    /// # Errors
    /// Whatever the trailing [`store`](Self::store) reports.
    pub fn defer<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        let result = self.muted(f);
        self.store()?;
        Ok(result)
    }

    /// Run `f` with stores suppressed on this stack and commit nothing.
    pub fn muted<R>(&self, f: impl FnOnce() -> R) -> R {
        let previous = {
            let mut core = self.core.borrow_mut();
            std::mem::replace(&mut core.deferred, true)
        };
        let _guard = DeferGuard {
            core: Rc::clone(&self.core),
            previous,
        };
        f()
    }

    /// Connect a callback to a lifecycle event.
    ///
    /// Callbacks run after the triggering operation has completed and must
    /// not re-enter this stack.
    pub fn on(&self, event: StackEvent, slot: impl Fn() + 'static) -> SlotId {
        self.core.borrow_mut().events.signal_mut(event).connect(slot)
    }

    /// Disconnect a callback connected through [`on`](Self::on).
    ///
    /// Returns whether the slot was still connected.
    pub fn disconnect(&self, event: StackEvent, id: SlotId) -> bool {
        self.core.borrow_mut().events.signal_mut(event).disconnect(id)
    }

    /// The stack's name: the configured one or a short generated id.
    pub fn name(&self) -> String {
        self.core.borrow().id.clone()
    }

    /// Number of stored snapshots.
    pub fn depth(&self) -> usize {
        self.core.borrow().history.depth()
    }

    /// Whether no snapshot has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.core.borrow().history.is_empty()
    }

    /// Offset of the last restore, `None` when live at the latest store.
    pub fn cursor(&self) -> Option<usize> {
        self.core.borrow().history.cursor()
    }

    /// Registered labels, in registration order.
    pub fn labels(&self) -> Vec<String> {
        self.core.borrow().registry.labels()
    }

    /// The most recent snapshot.
    pub fn latest(&self) -> Option<Snapshot> {
        self.core.borrow().history.latest().cloned()
    }

    /// All stored snapshots, oldest first.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.core.borrow().history.snapshots().to_vec()
    }

    /// The target object this stack snapshots.
    pub fn target(&self) -> Rc<RefCell<T>> {
        Rc::clone(&self.target)
    }
}

struct DeferGuard {
    core: SharedCore,
    previous: bool,
}

impl Drop for DeferGuard {
    fn drop(&mut self) {
        self.core.borrow_mut().deferred = self.previous;
    }
}
