//! Input and output plugin lifecycles
//!
//! Each plugin owns its own session; nothing is shared between the two.

pub mod input;
pub mod output;

pub use input::RwsInput;
pub use output::RwsOutput;
