pub mod hit_testing;
pub mod transform;

pub use hit_testing::Handle;
pub use transform::{PageView, Rotation, ViewState};
