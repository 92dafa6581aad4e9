pub mod assembler;
pub mod constants;
pub mod error;
pub mod events;
pub mod format;
pub mod header;
pub mod lazy;
pub mod model;
pub mod options;
pub mod reader;
pub mod samples;
pub mod stream;

#[cfg(test)]
pub(crate) mod testutil;
