pub mod announcements;
pub mod auth;
pub mod maintenance;
pub mod root;
