//! Choosing between the direct and the interactive path

use crate::chain::{validate_commands, ChainCompiler, CompiledCommand};
use crate::directive::Script;
use crate::result::CommandError;
use std::fmt;
use tracing::debug;

/// What to do with a host's command list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchPlan {
    /// No automation directives: run one compiled command.
    Direct(CompiledCommand),
    /// At least one `SEND`, `SENDPASS`, `WAIT` or `INTERACT`: drive a PTY.
    Interactive(Script),
}

impl fmt::Display for LaunchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchPlan::Direct(compiled) => {
                write!(f, "direct ({:?}): {}", compiled.strategy, compiled.command)
            }
            LaunchPlan::Interactive(script) => {
                writeln!(f, "interactive:")?;
                for (i, directive) in script.directives().iter().enumerate() {
                    writeln!(f, "  {}. {directive}", i + 1)?;
                }
                Ok(())
            }
        }
    }
}

/// Validate `commands` and pick the path that runs them.
///
/// # Examples
///
/// ```
/// use sshhop::{launch, ChainCompiler, LaunchPlan};
///
/// let plan = launch::plan(&["ssh a", "ssh b"], &ChainCompiler::new())?;
/// assert!(matches!(plan, LaunchPlan::Direct(c) if c.command == "ssh -tt a 'exec ssh b'"));
///
/// let plan = launch::plan(&["ssh a", "SEND:ls"], &ChainCompiler::new())?;
/// assert!(matches!(plan, LaunchPlan::Interactive(_)));
/// # Ok::<(), sshhop::CommandError>(())
/// ```
pub fn plan<S: AsRef<str>>(commands: &[S], compiler: &ChainCompiler) -> Result<LaunchPlan, CommandError> {
    validate_commands(commands)?;
    let script = Script::parse(commands)?;
    if script.is_interactive() {
        debug!(directives = script.directives().len(), "interactive plan");
        return Ok(LaunchPlan::Interactive(script));
    }
    let compiled = compiler.compile(commands)?;
    debug!(strategy = ?compiled.strategy, "direct plan");
    Ok(LaunchPlan::Direct(compiled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainStrategy;

    #[test]
    fn test_invalid_list_rejected() {
        let compiler = ChainCompiler::new();
        assert_eq!(plan::<&str>(&[], &compiler), Err(CommandError::Empty));
        assert_eq!(
            plan(&["ls", "pwd"], &compiler),
            Err(CommandError::MissingSsh)
        );
        assert_eq!(
            plan(&["ssh a", ""], &compiler),
            Err(CommandError::EmptyEntry { index: 1 })
        );
    }

    #[test]
    fn test_direct_plan() {
        let plan = plan(&["ssh bastion", "ssh db"], &ChainCompiler::new()).unwrap();
        match plan {
            LaunchPlan::Direct(c) => assert_eq!(c.strategy, ChainStrategy::Tunneled),
            other => panic!("unexpected plan {other:?}"),
        }
    }

    #[test]
    fn test_any_directive_makes_it_interactive() {
        for directive in ["SEND:x", "SENDPASS:db", "WAIT:1", "INTERACT"] {
            let plan = plan(&["ssh host", directive], &ChainCompiler::new()).unwrap();
            assert!(matches!(plan, LaunchPlan::Interactive(_)), "{directive}");
        }
    }

    #[test]
    fn test_display_lists_directives() {
        let plan = plan(&["ssh host", "SENDPASS:db"], &ChainCompiler::new()).unwrap();
        let shown = plan.to_string();
        assert!(shown.contains("1. exec ssh host"));
        assert!(shown.contains("2. send secret 'db'"));
    }
}
