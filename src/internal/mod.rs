//! Internal implementation details.

mod stoppable;

pub(crate) use stoppable::CompositeStoppable;
