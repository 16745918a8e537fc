//! CLI command implementations.

pub(crate) mod extract;
pub(crate) mod replay;
pub(crate) mod script;
pub(crate) mod suggest;
pub(crate) mod threads;

use std::io::{self, Read};
use std::path::Path;

pub(crate) use extract::ExtractArgs;
pub(crate) use replay::ReplayArgs;
pub(crate) use script::ScriptArgs;
pub(crate) use suggest::SuggestArgs;
pub(crate) use threads::ThreadsArgs;

/// Read a whole input file. `-` reads stdin.
pub(crate) fn read_input(path: &Path) -> io::Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path)
    }
}

/// Single-threaded runtime for commands that drive async collaborators.
pub(crate) fn runtime() -> io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread().build()
}
