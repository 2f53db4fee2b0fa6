//! Result types for launch and session operations

mod error;

pub use error::{CommandError, LaunchError, SessionError};

/// Result of an interactive session that ran to completion.
///
/// A session counts as completed once its seed process exits, whatever the
/// exit code: SSH clients routinely exit non-zero on an ordinary disconnect,
/// so a non-zero code here is information, not an error.
///
/// # Examples
///
/// ```no_run
/// use sshhop::{Script, SessionBuilder};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let script = Script::parse(&["ssh host".to_string(), "INTERACT".to_string()])?;
/// let outcome = SessionBuilder::new().spawn(&script)?.run().await?;
/// if let Some(reason) = &outcome.automation_error {
///     eprintln!("automation stopped early: {reason}");
/// }
/// println!("remote exited with {}", outcome.exit_code);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Exit code reported for the seed process.
    pub exit_code: u32,

    /// Whether the seed process reported success.
    pub success: bool,

    /// Why the automation script stopped early, if it did.
    ///
    /// `None` when every directive was replayed (or the session ended while
    /// automation was still waiting).
    pub automation_error: Option<String>,
}
