//! Sanitize command: repair a model-generated query read from stdin.

use std::io::Read;

use chatbi_core::sanitize;

/// Read stdin and print the sanitized query.
///
/// # Errors
///
/// Returns an error if stdin cannot be read as UTF-8.
pub fn run() -> std::io::Result<()> {
    let mut raw = String::new();
    std::io::stdin().read_to_string(&mut raw)?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", sanitize(&raw));
    }
    Ok(())
}
