/*!
Binding registry: the label-to-accessor table of one snapshot stack.

A binding pairs a label with a fallible getter/setter over a single property
of the stack's target. Capture is all-or-nothing: if any getter fails, no
snapshot is produced. Apply walks the bindings in registration order and
skips labels the snapshot does not contain, as well as snapshot labels that
no longer have a binding.
*/

use std::fmt;

use serde_json::Value;
use tracing::trace;

use crate::{Result, RewindError, Snapshot};

/// Type-erased getter invoked on capture.
pub type Getter = Box<dyn Fn() -> Result<Value>>;

/// Type-erased setter invoked on apply.
pub type Setter = Box<dyn Fn(&Value) -> Result<()>>;

/// One registered accessor pair.
pub struct Binding {
    label: String,
    getter: Getter,
    setter: Setter,
}

impl Binding {
    fn new(label: String, getter: Getter, setter: Setter) -> Self {
        Self {
            label,
            getter,
            setter,
        }
    }

    /// The label values captured through this binding are stored under.
    pub fn label(&self) -> &str {
        &self.label
    }

    fn capture(&self) -> Result<Value> {
        (self.getter)().map_err(|source| RewindError::Capture {
            label: self.label.clone(),
            source: Box::new(source),
        })
    }

    fn apply(&self, value: &Value) -> Result<()> {
        (self.setter)(value).map_err(|source| RewindError::Apply {
            label: self.label.clone(),
            source: Box::new(source),
        })
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding").field("label", &self.label).finish()
    }
}

/// The ordered set of bindings registered on one stack.
#[derive(Debug, Default)]
pub struct BindingRegistry {
    bindings: Vec<Binding>,
}

impl BindingRegistry {
    /// Register an accessor pair under a unique label.
    ///
    /// # Errors
    /// [`RewindError::DuplicateLabel`] if the label is already registered.
    pub fn register(&mut self, label: impl Into<String>, getter: Getter, setter: Setter) -> Result<()> {
        let label = label.into();
        if self.contains(&label) {
            return Err(RewindError::DuplicateLabel(label));
        }
        trace!(label = %label, "registered binding");
        self.bindings.push(Binding::new(label, getter, setter));
        Ok(())
    }

    /// Remove a binding. Snapshots that already captured the label keep it;
    /// apply will skip it from now on.
    ///
    /// Returns whether a binding was removed.
    pub fn unregister(&mut self, label: &str) -> bool {
        let before = self.bindings.len();
        self.bindings.retain(|binding| binding.label != label);
        before != self.bindings.len()
    }

    /// Whether a label is currently registered.
    pub fn contains(&self, label: &str) -> bool {
        self.bindings.iter().any(|binding| binding.label == label)
    }

    /// Registered labels, in registration order.
    pub fn labels(&self) -> Vec<String> {
        self.bindings
            .iter()
            .map(|binding| binding.label.clone())
            .collect()
    }

    /// Number of registered bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no binding is registered.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Invoke every getter in registration order and produce a snapshot.
    ///
    /// Side-effect free on failure: a getter error aborts the capture and no
    /// partial snapshot is committed anywhere.
    ///
    /// # Errors
    /// [`RewindError::Capture`] naming the failing label.
    pub fn capture(&self) -> Result<Snapshot> {
        let mut snapshot = Snapshot::new();
        for binding in &self.bindings {
            snapshot.insert(binding.label.clone(), binding.capture()?);
        }
        Ok(snapshot)
    }

    /// Apply a snapshot through the setters, in registration order.
    ///
    /// Labels present in the snapshot with no current binding are skipped,
    /// as are bindings the snapshot has no value for. Setter errors abort
    /// the remaining bindings and propagate with the failing label.
    ///
    /// # Errors
    /// [`RewindError::Apply`] naming the failing label.
    pub fn apply(&self, snapshot: &Snapshot) -> Result<()> {
        for binding in &self.bindings {
            match snapshot.get(&binding.label) {
                Some(value) => binding.apply(value)?,
                None => trace!(label = %binding.label, "label absent from snapshot, skipped"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn value_binding(slot: &Rc<RefCell<i64>>) -> (Getter, Setter) {
        let read = Rc::clone(slot);
        let write = Rc::clone(slot);
        (
            Box::new(move || Ok(json!(*read.borrow()))),
            Box::new(move |value: &Value| {
                *write.borrow_mut() = serde_json::from_value(value.clone())?;
                Ok(())
            }),
        )
    }

    #[test]
    fn test_capture_and_apply_roundtrip() {
        let slot = Rc::new(RefCell::new(7));
        let mut registry = BindingRegistry::default();
        let (getter, setter) = value_binding(&slot);
        registry.register("number", getter, setter).unwrap();

        let snapshot = registry.capture().unwrap();
        assert_eq!(snapshot.get("number"), Some(&json!(7)));

        *slot.borrow_mut() = 99;
        registry.apply(&snapshot).unwrap();
        assert_eq!(*slot.borrow(), 7);
    }

    #[test]
    fn test_duplicate_label_is_rejected() {
        let slot = Rc::new(RefCell::new(0));
        let mut registry = BindingRegistry::default();
        let (getter, setter) = value_binding(&slot);
        registry.register("number", getter, setter).unwrap();

        let (getter, setter) = value_binding(&slot);
        let err = registry.register("number", getter, setter).unwrap_err();
        assert!(matches!(err, RewindError::DuplicateLabel(label) if label == "number"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_capture_is_all_or_nothing() {
        let slot = Rc::new(RefCell::new(1));
        let mut registry = BindingRegistry::default();
        let (getter, setter) = value_binding(&slot);
        registry.register("good", getter, setter).unwrap();
        registry
            .register(
                "bad",
                Box::new(|| Err(RewindError::validation("getter broke"))),
                Box::new(|_| Ok(())),
            )
            .unwrap();

        let err = registry.capture().unwrap_err();
        assert!(matches!(err, RewindError::Capture { ref label, .. } if label == "bad"));
    }

    #[test]
    fn test_apply_skips_unresolved_labels() {
        let slot = Rc::new(RefCell::new(1));
        let mut registry = BindingRegistry::default();
        let (getter, setter) = value_binding(&slot);
        registry.register("number", getter, setter).unwrap();

        // Snapshot captured under an older registration set.
        let mut snapshot = Snapshot::default();
        snapshot.insert("gone".to_string(), json!("stale"));
        snapshot.insert("number".to_string(), json!(42));

        registry.apply(&snapshot).unwrap();
        assert_eq!(*slot.borrow(), 42);
    }

    #[test]
    fn test_apply_skips_bindings_missing_from_snapshot() {
        let slot = Rc::new(RefCell::new(5));
        let mut registry = BindingRegistry::default();
        let (getter, setter) = value_binding(&slot);
        registry.register("number", getter, setter).unwrap();

        registry.apply(&Snapshot::default()).unwrap();
        assert_eq!(*slot.borrow(), 5);
    }

    #[test]
    fn test_unregister_removes_binding() {
        let slot = Rc::new(RefCell::new(3));
        let mut registry = BindingRegistry::default();
        let (getter, setter) = value_binding(&slot);
        registry.register("number", getter, setter).unwrap();

        assert!(registry.unregister("number"));
        assert!(!registry.unregister("number"));
        assert!(registry.is_empty());

        let snapshot = registry.capture().unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_setter_error_names_label() {
        let mut registry = BindingRegistry::default();
        registry
            .register(
                "fragile",
                Box::new(|| Ok(json!(1))),
                Box::new(|_| Err(RewindError::validation("setter broke"))),
            )
            .unwrap();

        let snapshot = registry.capture().unwrap();
        let err = registry.apply(&snapshot).unwrap_err();
        assert!(matches!(err, RewindError::Apply { ref label, .. } if label == "fragile"));
    }
}
