pub mod errors;
pub mod harvest;
pub mod layout;
pub mod objective;
pub mod problem;
pub mod progress;
pub mod run;
pub mod supervisor;
