pub mod changes;
pub mod copy;
pub mod publish;
pub mod schedule;
pub mod serialize;

pub use changes::*;
pub use copy::*;
pub use publish::*;
pub use schedule::*;
pub use serialize::*;
