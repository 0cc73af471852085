pub mod area;
pub mod goal;
pub mod plan;
pub mod routine;
pub mod temporal;
