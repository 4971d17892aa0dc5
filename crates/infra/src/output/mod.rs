//! Output side: records in, controller commands out

pub mod writer;

pub use writer::CommandWriter;
