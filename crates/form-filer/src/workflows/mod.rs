pub mod archive;
pub mod intake;
