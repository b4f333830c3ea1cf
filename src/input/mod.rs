//! Input devices: event decoding, naming and the device registry

pub mod device;
pub mod event;
pub mod names;
pub mod registry;
