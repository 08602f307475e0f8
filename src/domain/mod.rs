pub mod announcement;
pub mod maintenance;
pub mod role;
pub mod user;
pub mod window;

pub use announcement::*;
pub use maintenance::*;
pub use role::*;
pub use user::*;
