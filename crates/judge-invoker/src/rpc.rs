//! Invoker RPC Handler
//!
//! Line-delimited JSON over stdin/stdout: one request per line, one response
//! per line, until the master closes stdin.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use judge_protocol::{ops::names, RpcError, RpcRequest, RpcResponse};

use crate::handlers;
use crate::invoker::Invoker;

/// Main RPC handler for the invoker.
pub struct RpcHandler {
    invoker: Arc<Invoker>,
}

impl RpcHandler {
    pub fn new(invoker: Arc<Invoker>) -> Self {
        Self { invoker }
    }

    pub fn invoker(&self) -> &Arc<Invoker> {
        &self.invoker
    }

    /// Serve requests from stdin until EOF.
    pub fn run(&self) -> io::Result<()> {
        self.run_with_io(&mut io::stdin().lock(), &mut io::stdout().lock())
    }

    /// Serve requests from `reader` until EOF (custom I/O for tests).
    pub fn run_with_io<R: BufRead, W: Write>(&self, reader: &mut R, writer: &mut W) -> io::Result<()> {
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                tracing::debug!("rpc input closed");
                return Ok(());
            }
            if line.trim().is_empty() {
                continue;
            }

            let response = self.handle_line(&line);
            self.write_response(writer, &response)?;
        }
    }

    /// Handle one request line.
    pub fn handle_line(&self, line: &str) -> RpcResponse {
        let request: RpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                return RpcResponse::unparsed(RpcError::invalid_request(format!("invalid JSON: {}", e)));
            }
        };

        if let Err(e) = self.validate_protocol_version(&request) {
            return RpcResponse::error(request.protocol_version, request.request_id, e);
        }

        self.dispatch(&request)
    }

    fn validate_protocol_version(&self, request: &RpcRequest) -> Result<(), RpcError> {
        let config = self.invoker.config();
        if request.protocol_version < config.protocol_min || request.protocol_version > config.protocol_max {
            return Err(RpcError::unsupported_protocol(
                request.protocol_version,
                config.protocol_min,
                config.protocol_max,
            ));
        }
        Ok(())
    }

    fn dispatch(&self, request: &RpcRequest) -> RpcResponse {
        let invoker = self.invoker.as_ref();
        let result = match request.op.as_str() {
            names::STATUS => handlers::status::handle(request, invoker),
            names::SUBMIT => handlers::submit::handle(request, invoker),
            names::FINISH => handlers::finish::handle(request, invoker),
            names::RESET => handlers::reset::handle(request, invoker),
            names::RESOURCE => handlers::resource::handle(request, invoker),
            _ => Err(RpcError::unknown_operation(&request.op)),
        };

        match result {
            Ok(payload) => RpcResponse::success(request.protocol_version, request.request_id.clone(), payload),
            Err(e) => {
                tracing::debug!(op = %request.op, request_id = %request.request_id, error = %e, "request failed");
                RpcResponse::error(request.protocol_version, request.request_id.clone(), e)
            }
        }
    }

    fn write_response<W: Write>(&self, writer: &mut W, response: &RpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(writer, "{}", json)?;
        writer.flush()
    }
}
