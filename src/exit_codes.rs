//! Process exit codes for the `wikisplice` binary

/// I/O, configuration or grammar failure
pub const TOOL_ERROR: i32 = 1;

pub mod exit {
    use super::TOOL_ERROR;

    pub fn tool_error() -> ! {
        std::process::exit(TOOL_ERROR);
    }
}
