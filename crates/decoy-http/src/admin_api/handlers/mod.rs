pub mod expectations;
pub mod system;
pub mod verification;
