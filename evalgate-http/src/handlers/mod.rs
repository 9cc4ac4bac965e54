pub mod evaluate;
pub mod system;

pub use evaluate::*;
pub use system::*;
