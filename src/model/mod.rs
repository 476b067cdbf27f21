pub mod attendance;
pub mod department;
pub mod notification;
pub mod role;
pub mod user;
