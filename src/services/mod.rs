pub mod dispatch;
pub mod lesson_time;
pub mod provisioner;
pub mod scheduler;
pub mod send_ledger;

#[cfg(test)]
mod scheduler_test;
