pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use fixtures::{CacheFixture, narinfo_body};
#[allow(unused_imports)]
pub use mocks::{MemoryStore, ScriptedClosure};
