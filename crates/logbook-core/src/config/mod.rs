pub mod follow;
pub mod open;

pub use follow::FollowConfig;
pub use open::OpenOptions;
