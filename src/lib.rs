pub mod core;
pub mod cosmos;
pub mod primitives;
pub mod testsuite;
