/*
[INPUT]:  Stream schema definitions and serde requirements
[OUTPUT]: Typed Rust structs/enums for every decoded stream event
[POS]:    Data layer - typed event model
[UPDATE]: When stream schema changes or new event shapes are added
*/

pub mod enums;
pub mod events;

pub use enums::*;
pub use events::*;
