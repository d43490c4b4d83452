mod traits;

pub use traits::BlockProvider;
