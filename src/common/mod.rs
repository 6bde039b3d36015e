pub mod geometry;
pub mod site;
