/*!
# Rewind Core Engine

Versioned-state engine: register accessor bindings for the properties of a
target object, capture point-in-time snapshots of them, and roll the target
back to any prior snapshot on demand — optionally keeping several stacks in
lock-step and persisting history through pluggable serialisers.

## Architecture

- A [`SnapshotStack`] owns one binding registry and one history for one
  target object and drives the store/restore protocol.
- Stacks can be [grouped](SnapshotStack::group) into a transitively-closed
  set; store/restore on any member fans out to all of them, each applying
  the call against its own bindings and history.
- A [`Serialiser`] adapter may be bound to a stack to externalise its
  history and re-hydrate it later; file-based and in-memory adapters ship
  with the crate.

Restores are non-destructive: they move a cursor over the history without
truncating it, so stepping back and forward between snapshots is always
possible. The engine is single-threaded and synchronous; callers using
threads supply their own synchronization around each stack and its group.

## Usage

```
use std::cell::RefCell;
use std::rc::Rc;
use rewind_core::SnapshotStack;

struct Settings {
    volume: u8,
}

let settings = Rc::new(RefCell::new(Settings { volume: 40 }));
let stack = SnapshotStack::new(Rc::clone(&settings));
stack.register(
    "volume",
    |s: &Settings| s.volume,
    |s: &mut Settings, v| s.volume = v,
)?;

stack.store()?;
settings.borrow_mut().volume = 90;
stack.store()?;

// Roll back one step.
stack.restore(1)?;
assert_eq!(settings.borrow().volume, 40);

// Non-destructive: the newer snapshot is still reachable.
stack.restore(0)?;
assert_eq!(settings.borrow().volume, 90);
# Ok::<(), rewind_core::RewindError>(())
```
*/

pub mod binding;
pub mod compression;
pub mod config;
pub mod error;
mod group;
pub mod observability;
pub mod serialiser;
pub mod signal;
pub mod snapshot;
pub mod stack;

pub use binding::{Binding, BindingRegistry, Getter, Setter};
pub use compression::{CompressionAdapter, GzipCompressor, NoCompression};
pub use config::StackConfig;
pub use error::{MemberFailure, Result, RewindError};
pub use observability::init_tracing;
pub use serialiser::{
    GzipFileSerialiser, JsonFileSerialiser, MemorySerialiser, PersistedHistory, Serialiser,
    HISTORY_FORMAT_VERSION,
};
pub use signal::{Signal, SlotId};
pub use snapshot::{History, Snapshot};
pub use stack::{SnapshotStack, StackEvent};
