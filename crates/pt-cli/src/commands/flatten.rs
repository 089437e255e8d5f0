//! Flatten command: prints the canonical event stream in wire format.

use std::io::Write;

use anyhow::Result;

use crate::Config;
use crate::commands::util::write_json;

pub fn run<W: Write>(writer: &mut W, input: &str, config: &Config) -> Result<()> {
    let response = pt_core::handle_flatten(input);
    write_json(writer, &response, config.pretty)
}
