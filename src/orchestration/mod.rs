pub mod scratch;
pub mod validation;

pub use scratch::ScratchImage;
pub use validation::ValidationCoordinator;
