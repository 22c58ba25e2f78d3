mod gate;
mod types;

pub use gate::*;
pub use types::*;
