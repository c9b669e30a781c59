pub mod checklist;
pub mod config;
pub mod init;
pub mod report;
pub mod run;
pub mod status;
pub mod step;
pub mod task;
pub mod verify;
