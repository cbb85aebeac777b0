#![warn(clippy::pedantic)]
// Noisy doc/signature lints — would require annotating most pub functions
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Style preference — keeping format!("{}", x) over format!("{x}") for readability with complex exprs
#![allow(clippy::uninlined_format_args)]
// Module structure — card::ReplyCard etc. by design
#![allow(clippy::module_name_repetitions)]

pub mod card;
pub mod completion;
pub mod config;
pub mod errors;
pub mod keyword;
pub mod line;
pub mod links;
pub mod memory;
pub mod server;
pub mod suggest;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
