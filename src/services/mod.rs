pub mod automation;
pub mod error;
pub mod jokes;
pub mod youtube;
