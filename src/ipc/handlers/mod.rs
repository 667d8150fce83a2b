pub mod backup_exchange;
pub mod catalog;
pub mod core;
pub mod flow;
pub mod lecturers;
pub mod setup;
pub mod timetable;
