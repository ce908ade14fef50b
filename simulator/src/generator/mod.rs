pub mod array;
pub mod scenario;
