pub mod session;

pub use session::{PlotRefresh, Session};
