//! Batch channel: the per-connection frame loop.
//!
//! Each frame: read the length from the control socket, map that many bytes
//! of the input file, decode, invoke, encode, rewrite the output file and
//! report `(status, size)`. A failed frame is reported as `(500, 0)` and ends
//! the connection.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};

use super::control::{Binding, ControlChannel};
use super::mmap::MappedSegment;
use super::{ConnectionContext, MIN_OUTPUT_SIZE, STATUS_ERROR, STATUS_OK};
use crate::error::ExtFuncResult;
use crate::timer::{CallTimer, CALL_FUNCTION, FORMAT_OUTPUT, PARSE_INPUT, SEND_RESPONSE};

/// Grow (or shrink) the output file to `max(MIN_OUTPUT_SIZE, len)`, then
/// write `data` at offset 0.
pub fn write_output(file: &File, data: &[u8]) -> std::io::Result<()> {
    let mut file = file;
    file.set_len(MIN_OUTPUT_SIZE.max(data.len()) as u64)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(data)?;
    file.flush()
}

pub struct BatchChannel<'a> {
    control: ControlChannel,
    binding: Binding,
    ctx: &'a ConnectionContext,
}

impl<'a> BatchChannel<'a> {
    pub fn new(control: ControlChannel, binding: Binding, ctx: &'a ConnectionContext) -> Self {
        BatchChannel {
            control,
            binding,
            ctx,
        }
    }

    pub fn function(&self) -> &str {
        &self.binding.function
    }

    /// Decode, invoke, encode and write one frame; returns the response size.
    fn process_frame(&self, input: &[u8]) -> ExtFuncResult<usize> {
        let mut timer = CallTimer::start(self.binding.function.as_str());
        let endpoint = self.ctx.registry.get(&self.binding.function)?;
        let payload = timer.time(PARSE_INPUT, || {
            self.ctx
                .codec
                .load(endpoint.input_shape(), &endpoint.args, input)
        })?;
        let result = timer.time(CALL_FUNCTION, || endpoint.invoke(payload))?;
        let output = timer.time(FORMAT_OUTPUT, || {
            self.ctx.codec.dump_single(&endpoint.returns, &result)
        })?;
        timer.time(SEND_RESPONSE, || write_output(&self.binding.output, &output))?;
        timer.finish(self.ctx.metrics);
        Ok(output.len())
    }

    /// Serve frames until the peer ends the stream; returns frames served.
    ///
    /// Protocol violations abort without a reply. A failed frame is
    /// reported, logged with its full cause chain, and returned as the error.
    pub fn run(mut self) -> ExtFuncResult<usize> {
        let mut frames = 0;
        loop {
            let Some(length) = self.control.read_frame_length()? else {
                break;
            };
            let segment = MappedSegment::map(&self.binding.input, length)?;
            match self.process_frame(segment.as_slice()) {
                Ok(size) => {
                    drop(segment);
                    self.control.send_status(STATUS_OK, size)?;
                    frames += 1;
                }
                Err(err) => {
                    drop(segment);
                    tracing::error!(
                        function = %self.binding.function,
                        frame = frames,
                        value_error = err.is_value_error(),
                        error = %err.chain(),
                        "frame_failed"
                    );
                    if let Err(send_err) = self.control.send_status(STATUS_ERROR, 0) {
                        tracing::warn!(error = %send_err, "status_send_failed");
                    }
                    self.control.close();
                    return Err(err);
                }
            }
        }
        self.control.close();
        Ok(frames)
    }
}
