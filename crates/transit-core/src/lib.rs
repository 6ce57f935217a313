pub mod database;
pub mod parsed_update;
pub mod publish;
pub mod timetable;

pub use database::{Store, StoreError, StoreResult};
pub use parsed_update::ParsedTripUpdate;
pub use publish::{MessageNotPublished, Publisher, PublishError};
pub use timetable::{TimetableClient, TimetableError, TimetableResult};
