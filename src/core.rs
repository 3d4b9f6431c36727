pub mod curve;
pub mod optimizer;
pub mod price;
pub mod sample;
pub mod slicer;
pub mod timer;
pub mod tracker;
