pub mod dcf;
pub mod forecast;
pub mod sensitivity;
pub mod wacc;
