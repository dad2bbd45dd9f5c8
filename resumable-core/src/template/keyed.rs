//! Keyed List Reconciliation
//!
//! [`KeyedList`] keeps one [`TemplateInstance`] per item identity across
//! renders. A reconciliation pass:
//!
//! 1. Checks every item against its template, then creates instances for
//!    identities seen for the first time (or whose template changed).
//!    Nothing in the document is touched yet, so a failing item leaves the
//!    list as it was.
//! 2. Removes instances whose identity is gone.
//! 3. Updates surviving instances in place with their item's new values.
//! 4. Walks the new order from the end, moving an instance only when it is
//!    not already directly before its successor.
//!
//! Surviving nodes are never recreated, so per-node state (focus, scroll,
//! listeners) follows the item.

use std::fmt;
use std::hash::Hash;

use indexmap::IndexMap;

use super::error::TemplateError;
use super::instance::{check_result, TemplateInstance};
use super::value::TemplateResult;
use crate::dom::{Document, Node};

/// Rendered list items indexed by identity, in document order.
pub struct KeyedList<K> {
    entries: IndexMap<K, TemplateInstance>,
}

impl<K> Default for KeyedList<K> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<K: Hash + Eq + Clone + fmt::Debug> KeyedList<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identities in document order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn instance(&self, key: &K) -> Option<&TemplateInstance> {
        self.entries.get(key)
    }

    /// The first node rendered for `key`.
    pub fn node(&self, key: &K) -> Option<Node> {
        self.entries.get(key).and_then(TemplateInstance::first_node)
    }

    /// Append an instance bound to existing markup. Returns `false` if the
    /// key is already present.
    pub(crate) fn push_adopted(&mut self, key: K, instance: TemplateInstance) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, instance);
        true
    }

    /// Bring the rendered items in `parent` in line with `items`, inserting
    /// before `before` (or at the end of `parent`).
    ///
    /// If a key repeats, the later item wins: the key keeps one instance,
    /// rendered with the later item's values at the later item's position.
    pub fn reconcile<'a, I>(
        &mut self,
        doc: &Document,
        parent: &Node,
        before: Option<&Node>,
        items: I,
    ) -> Result<(), TemplateError>
    where
        I: IntoIterator<Item = (K, &'a TemplateResult)>,
    {
        let items: Vec<(K, &TemplateResult)> = items.into_iter().collect();
        for (_, result) in &items {
            check_result(result)?;
        }
        self.patch(doc, parent, before, items)
    }

    /// [`reconcile`](Self::reconcile) for items already checked.
    pub(crate) fn patch<'a, I>(
        &mut self,
        doc: &Document,
        parent: &Node,
        before: Option<&Node>,
        items: I,
    ) -> Result<(), TemplateError>
    where
        I: IntoIterator<Item = (K, &'a TemplateResult)>,
    {
        let mut next: IndexMap<K, &TemplateResult> = IndexMap::new();
        for (key, result) in items {
            next.shift_remove(&key);
            next.insert(key, result);
        }

        let mut fresh = Vec::with_capacity(next.len());
        for (key, result) in &next {
            let reusable = self
                .entries
                .get(key)
                .is_some_and(|instance| instance.key() == result.key());
            fresh.push(if reusable {
                None
            } else {
                Some(TemplateInstance::build(doc, result)?)
            });
        }
        let created = fresh.iter().filter(|f| f.is_some()).count();

        let mut previous = std::mem::take(&mut self.entries);
        let mut removed = 0;
        previous.retain(|key, instance| {
            let keep = next
                .get(key)
                .is_some_and(|result| result.key() == instance.key());
            if !keep {
                instance.unmount();
                removed += 1;
            }
            keep
        });

        let mut first_error = None;
        for ((key, result), fresh) in next.into_iter().zip(fresh) {
            let instance = match fresh {
                Some(instance) => instance,
                None => match previous.swap_remove(&key) {
                    Some(mut instance) => {
                        if let Err(error) = instance.patch(result.values()) {
                            first_error.get_or_insert(error);
                        }
                        instance
                    }
                    None => continue,
                },
            };
            self.entries.insert(key, instance);
        }

        let mut anchor = before.cloned();
        let mut moved = 0;
        for instance in self.entries.values().rev() {
            let Some(last) = instance.last_node() else {
                continue;
            };
            let in_place = last.parent().is_some_and(|p| p.ptr_eq(parent))
                && match (&anchor, last.next_sibling()) {
                    (Some(anchor), Some(next)) => anchor.ptr_eq(&next),
                    (None, None) => true,
                    _ => false,
                };
            if !in_place {
                instance.mount(parent, anchor.as_ref());
                moved += 1;
            }
            anchor = instance.first_node();
        }

        tracing::trace!(
            len = self.entries.len(),
            created,
            removed,
            moved,
            "reconciled keyed list"
        );
        first_error.map_or(Ok(()), Err)
    }

    /// Remove every item from the document.
    pub fn clear(&mut self) {
        for instance in self.entries.values() {
            instance.unmount();
        }
        self.entries.clear();
    }
}

impl<K: fmt::Debug> fmt::Debug for KeyedList<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}
