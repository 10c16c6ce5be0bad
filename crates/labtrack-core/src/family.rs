//! Canonical family ordering.
//!
//! Members of a case sort as child, alleged father, mother, then anyone else,
//! ties broken by lab number sequence. Intake assigns lab numbers in this
//! order, so within a family the child always holds the lowest number.

use std::cmp::Ordering;

use labtrack_model::{Relation, Sample};

/// Compares two samples of one case in display order.
pub fn family_order(left: &Sample, right: &Sample) -> Ordering {
    left.family_key().cmp(&right.family_key())
}

/// Sorts samples in place into display order.
pub fn sort_family(samples: &mut [Sample]) {
    samples.sort_by(family_order);
}

/// Stable sort of intake members by relation rank, keeping the caller's order
/// among members of equal rank.
pub fn sort_for_intake<T>(members: &mut [T], relation: impl Fn(&T) -> &Relation) {
    members.sort_by(|left, right| relation(left).family_cmp(relation(right)));
}
