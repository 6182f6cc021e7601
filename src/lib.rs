#[macro_use]
extern crate log;

pub use dumper::{create_data_dumper, DataDumper};
pub use reader::KKVTableReader;

pub mod chunk;
pub mod doc;
pub mod dumper;
pub mod env;
pub mod error;
mod ioutils;
pub mod options;
pub mod reader;
pub mod skey;
pub mod sort;
pub mod value;
pub mod varint;

pub type Result<T> = std::result::Result<T, error::KKVError>;
