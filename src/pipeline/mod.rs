pub mod query;
pub mod recent;
pub mod relocate;
pub mod save;

pub use query::QueryPipeline;
pub use recent::RecentEvents;
pub use save::{SaveOutcome, SavePipeline};
