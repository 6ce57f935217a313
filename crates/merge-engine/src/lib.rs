//! Three-way reconciliation of a base timetable, previously-persisted
//! real-time state and a newly-arrived update, followed by the consistency
//! pass that turns the merge's raw candidate stops into a trip update whose
//! arrival/departure fields are monotonic and fully populated.

pub mod adjust;
pub mod merge;

pub use adjust::adjust_consistency;
pub use merge::merge_trip_update;
