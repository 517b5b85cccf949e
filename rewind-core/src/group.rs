//! Lock-step group membership.
//!
//! Every stack core points at a shared, transitively-closed membership set.
//! A stack starts in a singleton set holding only itself; `group()` unions
//! two sets and repoints every merged member at the surviving one, so
//! transitivity holds by construction. Members are tracked weakly: dropping
//! the last handle of a stack removes it from its group on the next access.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::stack::StackCore;

pub(crate) type SharedCore = Rc<RefCell<StackCore>>;
pub(crate) type SharedGroup = Rc<RefCell<GroupSet>>;

/// The membership set shared by every stack in one lock-step group.
pub(crate) struct GroupSet {
    members: Vec<Weak<RefCell<StackCore>>>,
}

impl GroupSet {
    /// A set with no members yet; the owning core attaches itself after the
    /// core cell exists.
    pub(crate) fn detached() -> SharedGroup {
        Rc::new(RefCell::new(GroupSet {
            members: Vec::new(),
        }))
    }

    /// Enroll a freshly created core into its own singleton set.
    pub(crate) fn attach(core: &SharedCore) {
        let group = Rc::clone(&core.borrow().group);
        group.borrow_mut().members.push(Rc::downgrade(core));
    }

    fn live_members(&self) -> Vec<SharedCore> {
        self.members.iter().filter_map(Weak::upgrade).collect()
    }

    fn contains(&self, core: &SharedCore) -> bool {
        self.members
            .iter()
            .filter_map(Weak::upgrade)
            .any(|member| Rc::ptr_eq(&member, core))
    }

    fn prune(&mut self) {
        self.members.retain(|member| member.upgrade().is_some());
    }
}

/// The members of `core`'s group in join order, self included, dropped
/// stacks pruned. Fan-out iterates over this snapshot of the membership, so
/// a group mutation from an event callback cannot interleave with it.
pub(crate) fn members_of(core: &SharedCore) -> Vec<SharedCore> {
    let group = Rc::clone(&core.borrow().group);
    let mut set = group.borrow_mut();
    set.prune();
    set.live_members()
}

/// Union the groups of `a` and `b` into one transitively-closed set.
///
/// Idempotent: merging two stacks that already share a set is a no-op.
pub(crate) fn merge(a: &SharedCore, b: &SharedCore) {
    let group_a = Rc::clone(&a.borrow().group);
    let group_b = Rc::clone(&b.borrow().group);
    if Rc::ptr_eq(&group_a, &group_b) {
        return;
    }

    let incoming = {
        let mut set_b = group_b.borrow_mut();
        set_b.prune();
        set_b.live_members()
    };

    {
        let mut set_a = group_a.borrow_mut();
        set_a.prune();
        for member in &incoming {
            if !set_a.contains(member) {
                set_a.members.push(Rc::downgrade(member));
            }
        }
    }

    for member in &incoming {
        member.borrow_mut().group = Rc::clone(&group_a);
    }
}
