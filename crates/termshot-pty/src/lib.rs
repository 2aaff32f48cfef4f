//! termshot-pty: async pseudo-terminal layer for termshot
//!
//! Allocates a pty pair, spawns a child on the slave side as a session leader
//! with a controlling terminal, and exposes the master as a read half plus a
//! cloneable write/control half for use from tokio tasks.
//!
//! # Quick Start
//!
//! ```ignore
//! use termshot_pty::{PtyConfig, PtyControl, WindowSize};
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PtyConfig::builder().window_size(80, 24).build();
//!     let (master, mut child) = termshot_pty::spawn("cat", Vec::<&str>::new(), &config)?;
//!     let (mut reader, mut writer) = master.into_split();
//!
//!     writer.write_all(b"hello\r").await?;
//!     let mut buf = [0u8; 1024];
//!     let n = reader.read(&mut buf).await?;
//!     println!("{}", String::from_utf8_lossy(&buf[..n]));
//!
//!     writer.resize(WindowSize::new(120, 40))?;
//!     child.kill()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod unix;

pub use config::{PtyConfig, PtyConfigBuilder, PtySignal, WindowSize};
pub use error::{PtyError, Result};
pub use traits::{ExitStatus, PtyControl};

#[cfg(unix)]
pub use unix::{
    PtyReader, PtyWriter, UnixPtyChild, UnixPtyMaster, signal_process_group, spawn,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PtyConfig::default();
        assert_eq!(config.window_size, WindowSize::new(80, 24));
        assert!(config.working_directory.is_none());
    }
}
