pub mod bench;
pub mod flaky;

pub use bench::*;
pub use flaky::FlakyStore;
