#![allow(dead_code)]

mod test_engine;

pub use test_engine::{TestEngine, loc, manager};
