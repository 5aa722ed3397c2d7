pub mod driver;
pub mod scenario;
pub mod set;
