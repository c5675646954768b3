pub mod common;
pub mod pack;
pub mod reflect;
pub mod transcode;
