pub mod attendance;
pub mod dashboard;
pub mod department;
pub mod ml;
pub mod notification;
pub mod report;
pub mod settings;
pub mod user;
