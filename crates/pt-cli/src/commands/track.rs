//! Track command: request in, tracking result (or error object) out.

use std::io::Write;

use anyhow::Result;

use crate::Config;
use crate::commands::util::write_json;

pub fn run<W: Write>(writer: &mut W, input: &str, config: &Config) -> Result<()> {
    let response = pt_core::handle(input);
    if let pt_core::Response::Ok(result) = &response {
        tracing::debug!(
            tracked_time = %result.tracked_time,
            state = result.state.code(),
            "tracking complete"
        );
    }
    write_json(writer, &response, config.pretty)
}
