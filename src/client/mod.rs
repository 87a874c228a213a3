//! Draw service client module.

mod requester;
mod response;

pub use requester::*;
pub use response::*;
