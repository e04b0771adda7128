//! Business-level services over the request executor.

pub mod poller;
pub mod users;

pub use poller::UserPoller;
pub use users::{UserService, UserServiceTrait};
