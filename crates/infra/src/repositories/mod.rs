pub mod testimony;

pub use testimony::*;
