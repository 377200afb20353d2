pub mod base_model;
pub mod consistent_rescaling;
