pub mod enums;
pub mod event;
pub mod receipt;

pub use enums::*;
pub use event::*;
pub use receipt::*;
