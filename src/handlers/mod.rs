mod example;
mod gateway;

pub use example::{EchoResponse, example_post};
pub use gateway::{forward, method_not_allowed};
