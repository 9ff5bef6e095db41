mod devices;
mod links;
mod report;
mod templates;

pub use devices::*;
pub use links::*;
pub use report::*;
pub use templates::*;
