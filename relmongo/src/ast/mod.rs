pub(crate) mod definitions;
pub(crate) mod pretty_print;
pub use definitions::*;
pub use pretty_print::PrettyPrint;

#[cfg(test)]
mod pretty_print_test;
