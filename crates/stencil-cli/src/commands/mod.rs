//! Command implementations.

mod check;
mod list;
mod render;
mod watch;

pub use check::CheckCommand;
pub use list::ListCommand;
pub use render::RenderCommand;
pub use watch::WatchCommand;
