//! hatt: replay a raw byte stream through an incremental HTTP classifier, one request at a time.
//! Synchronous and single-threaded: the host supplies the byte source and a reporter.

pub mod classifier;
pub mod config;
pub mod dump;
pub mod engine;
pub mod multiplexer;
pub mod reader;
pub mod report;
pub mod window;

pub use classifier::{Classifier, Decision, Engine, EngineError, MatchPoint, SerializeError};
pub use config::RunOptions;
pub use dump::{dump_file_name, DumpError, DumpWriter};
pub use engine::{HttpRequest, RuleEngine, RuleSet};
pub use multiplexer::{replay, run, Multiplexer, RunError, RunSummary};
pub use reader::{read_chunk, ReadBuffer, ReadOutcome};
pub use report::{ConsoleReporter, FeedEvent, Reporter, Silent};
pub use window::{Window, Windows};
