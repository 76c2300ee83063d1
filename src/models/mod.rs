pub mod lesson;
pub mod report;
pub mod schedule;
