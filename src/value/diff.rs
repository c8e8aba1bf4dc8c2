//! Change annotation between consecutive trace states.
//!
//! Keyed containers pair children by key and recurse into pairs. Sets pair
//! children by text, so a matched element is unchanged by construction.
//! Among equal keys or texts, the first unmatched old child pairs with the
//! first unmatched new one. Unpaired new children are `Added`; unpaired old
//! children are cloned into `deleted_items` as `Deleted`, in old order.

use super::{ChangeType, Shape, ValueNode};
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Annotate `next` in place against the previous state `prev`.
pub fn diff_states(prev: &ValueNode, next: &mut ValueNode) {
    diff_node(prev, next);
}

/// Returns whether `next` differs from `prev`.
fn diff_node(prev: &ValueNode, next: &mut ValueNode) -> bool {
    let changed = match (&prev.shape, &mut next.shape) {
        (
            Shape::Record {
                style: old_style,
                items: old_items,
                ..
            },
            Shape::Record {
                style,
                items,
                deleted_items,
            },
        ) if *old_style == *style => {
            pair_children(old_items, items, deleted_items, |n| &n.key, true)
        }
        (
            Shape::Collection { items: old_items, .. },
            Shape::Collection { items, deleted_items },
        ) => pair_children(old_items, items, deleted_items, |n| n.text.as_str(), false),
        _ => prev.text != next.text,
    };
    next.change_type = if changed {
        ChangeType::Modified
    } else {
        ChangeType::Unchanged
    };
    changed
}

fn pair_children<Q: Hash + Eq + ?Sized>(
    old: &[ValueNode],
    new: &mut [ValueNode],
    deleted: &mut Vec<ValueNode>,
    ident: impl Fn(&ValueNode) -> &Q,
    recurse: bool,
) -> bool {
    // Old positions per identity, front first.
    let mut index: HashMap<&Q, VecDeque<usize>> = HashMap::with_capacity(old.len());
    for (i, candidate) in old.iter().enumerate() {
        index.entry(ident(candidate)).or_default().push_back(i);
    }
    let mut used = vec![false; old.len()];
    let mut changed = false;

    for child in new.iter_mut() {
        let paired = index.get_mut(ident(&*child)).and_then(VecDeque::pop_front);
        match paired {
            Some(i) => {
                used[i] = true;
                if recurse {
                    changed |= diff_node(&old[i], child);
                } else {
                    child.mark_subtree(ChangeType::Unchanged);
                }
            }
            None => {
                child.mark_subtree(ChangeType::Added);
                changed = true;
            }
        }
    }

    deleted.clear();
    for (candidate, _) in old.iter().zip(&used).filter(|(_, used)| !**used) {
        let mut gone = candidate.clone();
        gone.mark_subtree(ChangeType::Deleted);
        deleted.push(gone);
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{parse_state, ValueIds};

    fn state(lines: &[&str]) -> ValueNode {
        parse_state(lines, &mut ValueIds::disabled())
    }

    fn kinds(node: &ValueNode) -> Vec<ChangeType> {
        node.items().iter().map(|n| n.change_type).collect()
    }

    #[test]
    fn modified_leaf_marks_root() {
        let prev = state(&["/\\ Foo = 1", "/\\ Bar = 3"]);
        let mut next = state(&["/\\ Foo = 2", "/\\ Bar = 3"]);
        diff_states(&prev, &mut next);
        assert_eq!(next.change_type, ChangeType::Modified);
        assert_eq!(kinds(&next), vec![ChangeType::Modified, ChangeType::Unchanged]);
    }

    #[test]
    fn identical_states_are_unchanged() {
        let prev = state(&["/\\ s = {1, 2}", "/\\ r = [a |-> 1]"]);
        let mut next = prev.clone();
        diff_states(&prev, &mut next);
        assert_eq!(next.change_type, ChangeType::Unchanged);
        assert!(next.deleted_items().is_empty());
    }

    #[test]
    fn set_elements_match_by_text() {
        let prev = state(&["/\\ s = {1, 2, 3}"]);
        let mut next = state(&["/\\ s = {3, 4, 1}"]);
        diff_states(&prev, &mut next);
        let s = next.get("s").unwrap();
        assert_eq!(s.change_type, ChangeType::Modified);
        assert_eq!(kinds(s), vec![ChangeType::Unchanged, ChangeType::Added, ChangeType::Unchanged]);
        assert_eq!(s.deleted_items().len(), 1);
        assert_eq!(s.deleted_items()[0].text, "2");
        assert_eq!(s.deleted_items()[0].change_type, ChangeType::Deleted);
    }

    #[test]
    fn duplicate_surplus_and_deficit() {
        let prev = state(&["/\\ s = {a, a}"]);
        let mut next = state(&["/\\ s = {a, a, a}"]);
        diff_states(&prev, &mut next);
        let s = next.get("s").unwrap();
        assert_eq!(kinds(s), vec![ChangeType::Unchanged, ChangeType::Unchanged, ChangeType::Added]);

        let prev = state(&["/\\ s = {a, a, a}"]);
        let mut next = state(&["/\\ s = {a}"]);
        diff_states(&prev, &mut next);
        assert_eq!(next.get("s").unwrap().deleted_items().len(), 2);
    }

    #[test]
    fn record_keys_added_and_deleted() {
        let prev = state(&["/\\ r = [a |-> 1, b |-> 2]"]);
        let mut next = state(&["/\\ r = [a |-> 1, c |-> 2]"]);
        diff_states(&prev, &mut next);
        let r = next.get("r").unwrap();
        assert_eq!(kinds(r), vec![ChangeType::Unchanged, ChangeType::Added]);
        assert_eq!(r.deleted_items()[0].key, crate::value::ValueKey::name("b"));
    }

    #[test]
    fn sequence_modified_and_appended() {
        let prev = state(&["/\\ s = <<1>>"]);
        let mut next = state(&["/\\ s = <<4, TRUE>>"]);
        diff_states(&prev, &mut next);
        let s = next.get("s").unwrap();
        assert_eq!(kinds(s), vec![ChangeType::Modified, ChangeType::Added]);
        assert_eq!(next.change_type, ChangeType::Modified);
    }

    #[test]
    fn large_reordered_set_pairs_every_element() {
        let elements: Vec<String> = (0..20_000).map(|i| i.to_string()).collect();
        let reversed: Vec<String> = elements.iter().rev().cloned().collect();
        let prev = state(&[format!("/\\ s = {{{}}}", elements.join(", ")).as_str()]);
        let mut next = state(&[format!("/\\ s = {{{}, x}}", reversed.join(", ")).as_str()]);
        diff_states(&prev, &mut next);
        let s = next.get("s").unwrap();
        assert_eq!(s.items().len(), 20_001);
        assert!(s.items()[..20_000].iter().all(|n| n.change_type == ChangeType::Unchanged));
        assert_eq!(s.items()[20_000].change_type, ChangeType::Added);
        assert!(s.deleted_items().is_empty());
    }

    #[test]
    fn set_element_replaced_by_two_new_ones() {
        // Set elements have no key to pair on, so nothing is Modified.
        let prev = state(&["/\\ s = {1}"]);
        let mut next = state(&["/\\ s = {4, TRUE}"]);
        diff_states(&prev, &mut next);
        let s = next.get("s").unwrap();
        assert_eq!(s.change_type, ChangeType::Modified);
        assert_eq!(kinds(s), vec![ChangeType::Added, ChangeType::Added]);
        assert_eq!(s.deleted_items().len(), 1);
        assert_eq!(s.deleted_items()[0].text, "1");
        assert_eq!(s.deleted_items()[0].change_type, ChangeType::Deleted);
    }

    #[test]
    fn shape_change_compares_text() {
        let prev = state(&["/\\ v = 1..2"]);
        let mut next = state(&["/\\ v = {1}"]);
        diff_states(&prev, &mut next);
        let v = next.get("v").unwrap();
        assert_eq!(v.change_type, ChangeType::Modified);
        assert_eq!(kinds(v), vec![ChangeType::Unchanged]);
    }

    #[test]
    fn deleted_clone_keeps_old_id() {
        let mut ids = ValueIds::new();
        let prev = parse_state(&["/\\ s = {1, 2}"], &mut ids);
        let mut next = parse_state(&["/\\ s = {1}"], &mut ids);
        diff_states(&prev, &mut next);
        let old_two = prev.get("s").unwrap().items()[1].id;
        assert_eq!(next.get("s").unwrap().deleted_items()[0].id, old_two);
    }
}
