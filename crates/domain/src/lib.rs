pub mod errors;
pub mod models;
pub mod ports;
pub mod tx;
pub mod value_objects;
