//! Core primitives shared by the scripting bridge and the runtime binary:
//! frame timing and the pool/handle allocation pattern used to recycle
//! short-lived per-frame data without reallocating every tick.

// crate-specific lint exceptions:
#![allow(clippy::needless_pass_by_value)]
#![warn(missing_docs)]

mod memory;
mod time;

pub use bytemuck::{bytes_of, cast_slice, Pod, Zeroable};
pub use memory::{Handle, ObjectPool};
pub use time::Time;

pub mod prelude {
    //! The Legion Core Prelude.
    #[doc(hidden)]
    pub use crate::{Handle, ObjectPool, Time};
}
