use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::time::Duration;

use crate::dispatcher::OperationRequest;
use crate::error::Result;
use crate::registry::EngineSelector;
use crate::types::Verb;

/// vdbctl - list, start, stop, enable or disable virtual databases
#[derive(Parser, Debug)]
#[command(name = "vdbctl")]
#[command(about = "List all VDBs or start, stop, enable, disable a VDB on one or more engines")]
#[command(version)]
#[command(group(
    ArgGroup::new("operation")
        .required(true)
        .args(["start", "stop", "enable", "disable", "list"])
))]
#[command(group(ArgGroup::new("engines").args(["engine_id", "engine", "all"])))]
pub struct Cli {
    /// Name of the VDB to operate on
    #[arg(long, value_name = "NAME")]
    pub vdb: Option<String>,

    /// Start the VDB
    #[arg(long, requires = "vdb")]
    pub start: bool,

    /// Stop the VDB
    #[arg(long, requires = "vdb")]
    pub stop: bool,

    /// Enable the VDB
    #[arg(long, requires = "vdb")]
    pub enable: bool,

    /// Disable the VDB
    #[arg(long, requires = "vdb")]
    pub disable: bool,

    /// List all databases on the engine(s)
    #[arg(long, conflicts_with = "vdb")]
    pub list: bool,

    /// Identifier of the engine in the configuration file
    #[arg(short = 'd', value_name = "IDENTIFIER")]
    pub engine_id: Option<String>,

    /// Alternative spelling of -d
    #[arg(long, value_name = "IDENTIFIER")]
    pub engine: Option<String>,

    /// Run against every engine in the configuration file
    #[arg(long)]
    pub all: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Seconds to wait between job polls (at least 1)
    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll: u64,

    /// Path to the engine configuration file
    #[arg(long, value_name = "PATH", default_value = "./dxtools.conf")]
    pub config: PathBuf,

    /// Path to the log file
    #[arg(long, value_name = "PATH", default_value = "./vdbctl.log")]
    pub logdir: PathBuf,

    /// Also wait for jobs that were already running on the engine
    #[arg(long)]
    pub wait_all: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// The requested verb; clap guarantees exactly one flag is set
    pub fn verb(&self) -> Verb {
        if self.start {
            Verb::Start
        } else if self.stop {
            Verb::Stop
        } else if self.enable {
            Verb::Enable
        } else if self.disable {
            Verb::Disable
        } else {
            Verb::List
        }
    }

    pub fn selector(&self) -> EngineSelector {
        if self.all {
            EngineSelector::All
        } else if let Some(id) = self.engine.as_ref().or(self.engine_id.as_ref()) {
            EngineSelector::Named(id.clone())
        } else {
            EngineSelector::Default
        }
    }

    pub fn operation_request(&self) -> Result<OperationRequest> {
        OperationRequest::new(self.verb(), self.vdb.clone())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll)
    }
}
