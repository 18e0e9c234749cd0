pub mod handle;
pub mod memory;
pub mod traits;
pub mod versioned;

pub use handle::*;
pub use memory::*;
pub use traits::*;
pub use versioned::*;
