//! Dependency resolver.
//!
//! Expands a requested [`ServiceSet`] into the set of every service it
//! transitively needs.  Walking the catalog's topological order backwards
//! visits each dependent before its prerequisites, so one pass reaches the
//! fixed point.

use crate::catalog::{ServiceKind, ServiceSet};

/// Transitive closure of `requested` under [`ServiceKind::depends_on`].
///
/// Pure and idempotent: `closure(closure(s)) == closure(s)`.
pub fn closure(requested: ServiceSet) -> ServiceSet {
    let mut set = requested;
    for kind in ServiceKind::TOPO_ORDER.iter().rev() {
        if set.contains(*kind) {
            set = set.union(kind.depends_on());
        }
    }
    debug_assert!(is_closed(set), "closure left a dependency out: {set}");
    set
}

/// `true` if every member's prerequisites are also members.
pub fn is_closed(set: ServiceSet) -> bool {
    set.iter().all(|kind| kind.depends_on().is_subset(set))
}
