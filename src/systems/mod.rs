mod adjacency;
mod bookkeeping;
pub mod epidemic;

pub use adjacency::{spread_across_borders, AdjacencySpreadSystem};
pub use bookkeeping::BookkeepingSystem;
pub use epidemic::EpidemicSystem;
