pub mod util;

pub use util::{load_config, load_submissions, split_csv};
