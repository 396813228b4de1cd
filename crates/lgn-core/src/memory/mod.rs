mod handle;
mod object_pool;

pub use handle::Handle;
pub use object_pool::ObjectPool;
