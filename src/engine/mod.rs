// Transcoding engine - independent of the command line front end

pub mod core;
pub mod elements;
pub mod launch;
pub mod probe;
pub mod worker;

pub use core::*;
