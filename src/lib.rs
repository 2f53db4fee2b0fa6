//! sshhop: multi-hop SSH launching with scripted PTY sessions
//!
//! sshhop turns a host's ordered command list into a running connection.
//! Plain command lists (jump hosts, setup steps, the final `ssh`) are
//! compiled into one shell command and executed directly. Lists carrying
//! automation directives are replayed into a live pseudo-terminal, with
//! passwords pulled from an encrypted credential store, before the keyboard
//! is handed to the user.
//!
//! # Features
//!
//! - **Chain compilation**: nests later hops inside the first SSH session's
//!   remote command, quoting them so the remote shell reads them verbatim
//! - **Automation directives**: `SEND:`, `SENDPASS:`, `WAIT:`, `INTERACT`
//! - **Async sessions**: built on tokio, with raw-mode terminal handling and
//!   window-resize forwarding
//! - **Output filtering**: drops terminal query replies that would otherwise
//!   print as garbage
//! - **Credential store**: PBKDF2 + AES-256-GCM, owner-only file permissions
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sshhop::{launch, ChainCompiler, LaunchPlan, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let commands = ["ssh admin@bastion", "WAIT:1", "SEND:sudo -i", "INTERACT"];
//!
//!     match launch::plan(&commands, &ChainCompiler::new())? {
//!         LaunchPlan::Direct(compiled) => {
//!             let shell = sshhop::config::login_shell();
//!             sshhop::run_direct(&shell, &compiled, &mut std::io::stdout())?;
//!         }
//!         LaunchPlan::Interactive(script) => {
//!             let outcome = Session::builder().spawn(&script)?.run().await?;
//!             println!("remote exited with {}", outcome.exit_code);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Chain Compilation
//!
//! ```rust
//! use sshhop::{ChainCompiler, ChainStrategy};
//!
//! let compiled = ChainCompiler::new().compile(&["ssh bastion", "ssh db"])?;
//! assert_eq!(compiled.command, "ssh -tt bastion 'exec ssh db'");
//! assert_eq!(compiled.strategy, ChainStrategy::Tunneled);
//! # Ok::<(), sshhop::CommandError>(())
//! ```
//!
//! # Stored Credentials
//!
//! ```rust,no_run
//! use sshhop::{CredentialStore, Script, Session};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = CredentialStore::new(sshhop::config::default_store_path());
//! store.load("master passphrase")?;
//!
//! let script = Script::parse(&["ssh legacy-host", "SENDPASS:legacy", "INTERACT"])?;
//! Session::builder()
//!     .credentials(Arc::new(store))
//!     .spawn(&script)?
//!     .run()
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod chain;
mod directive;
mod filter;
mod result;
mod session;
mod terminal;
mod vault;

pub mod config;
pub mod launch;

// Public API exports
pub use chain::{
    announce, exec_replace, run_direct, run_subprocess, validate_commands, ChainCompiler,
    ChainStrategy, CompiledCommand,
};
pub use directive::{parse_commands, Directive, DirectiveKind, Script};
pub use filter::OutputFilter;
pub use launch::LaunchPlan;
pub use result::{CommandError, LaunchError, SessionError, SessionOutcome};
pub use session::{
    Session, SessionBuilder, SessionInput, DEFAULT_PTY_COLS, DEFAULT_PTY_ROWS,
    DEFAULT_SEND_PAUSE_MS, DEFAULT_SETTLE_DELAY_MS,
};
pub use terminal::{current_size, forward_resizes, RawModeGuard, SharedMaster};
pub use vault::{CredentialEntry, CredentialStore, Salt, StoreError, MASKED_SECRET, PBKDF2_ROUNDS, SALT_LEN};

// Re-export commonly used types
pub use portable_pty::PtySize;
