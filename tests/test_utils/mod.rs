pub mod builders;
pub mod http_stub;

#[allow(unused_imports)]
pub use builders::{ConfigBuilder, TrackerFixture, at};
#[allow(unused_imports)]
pub use http_stub::HttpStub;
