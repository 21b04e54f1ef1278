#![doc = include_str!("../README.md")]

mod error;

pub mod bytes;
pub mod checksum;
pub mod config;
pub mod estimate;
pub mod reader;
pub mod record;
pub mod store;
pub mod synchronizer;
pub mod time;

pub use config::{Config, CoordSystem, InstrumentKind};
pub use error::{Error, Result};
pub use reader::{decode, decode_file, DecodeOptions, Decoded};
pub use store::{AwacStore, DataStore, VectorStore};
