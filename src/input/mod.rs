pub mod events;
pub mod hook;

pub use events::{InputEvent, MouseButton};
pub use hook::{HookError, HookHandler, HookThread};
