mod build;
mod decrypt;
mod deps;
mod info;
mod inspect;

pub use build::{BuildArgs, cmd_build};
pub use decrypt::cmd_decrypt;
pub use deps::cmd_deps;
pub use info::cmd_info;
pub use inspect::cmd_inspect;
