pub mod compensation;
pub mod sync;
pub mod trial;
