pub mod auth;
pub mod calendar;
pub mod date_remarks;
pub mod directory;
pub mod init;
pub mod leave;
pub mod schedule;
pub mod shifts;
pub mod templates;
