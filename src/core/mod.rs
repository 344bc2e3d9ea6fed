// Core modules implementing the record store and error modeling.
pub mod error;
pub mod store;
