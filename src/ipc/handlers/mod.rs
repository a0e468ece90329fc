pub mod assignments;
pub mod attendance;
pub mod backup;
pub mod classes;
pub mod core;
pub mod dashboard;
pub mod documents;
pub mod events;
pub mod messages;
pub mod parents;
pub mod payments;
pub mod profile;
pub mod results;
pub mod setup;
pub mod students;
