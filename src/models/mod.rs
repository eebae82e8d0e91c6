pub mod enrollment;
pub mod event;
pub mod user;

pub use enrollment::*;
pub use event::*;
pub use user::*;
