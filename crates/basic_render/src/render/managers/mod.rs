//! Resource managers
//!
//! Each manager owns a [`HandleTable`](crate::foundation::collections::HandleTable)
//! of records for one resource kind and runs its own garbage collection.

pub mod buffer_manager;
pub mod deferred;
pub mod material_manager;
pub mod shader_manager;
pub mod texture_manager;

pub use buffer_manager::BufferManager;
pub use deferred::{collect_step, CollectAction, CollectPass};
pub use material_manager::MaterialManager;
pub use shader_manager::ShaderManager;
pub use texture_manager::TextureManager;
