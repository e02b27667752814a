pub mod grid;
pub mod orders;
pub mod readings;
pub mod wallet;
