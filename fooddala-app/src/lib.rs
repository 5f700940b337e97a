pub mod state;
pub mod summary;
pub mod worker;

pub use state::AppContext;
