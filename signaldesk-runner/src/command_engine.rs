//! Backtest engine adapter that runs an external program.
//!
//! Protocol: the request is written to the program's stdin as one JSON
//! object (`tickers`, `strategies`, `parameters`, `data_source`); the
//! program prints a JSON array of `{symbol, status, sqn, earnings}` on stdout
//! and exits 0. Anything else is an engine error.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use signaldesk_core::{BacktestEngine, BacktestRequest, BacktestResult, EngineError};

/// Runs `program args...` once per engine invocation.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: PathBuf,
    args: Vec<String>,
    name: String,
}

impl CommandEngine {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        let program = program.into();
        let name = program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.display().to_string());
        Self {
            program,
            args,
            name,
        }
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }
}

impl BacktestEngine for CommandEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, request: &BacktestRequest<'_>) -> Result<Vec<BacktestResult>, EngineError> {
        let symbol = request.tickers.join(",");
        let strategy = request
            .strategies
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let payload = serde_json::to_vec(request).map_err(|e| EngineError::Other(e.to_string()))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::Unavailable {
                engine: self.name.clone(),
                reason: e.to_string(),
            })?;

        // feed stdin on its own thread so a chatty engine can't fill stdout and block us
        let stdin = child.stdin.take();
        let (output, written) = thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(&payload),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            (output, writer.join())
        });

        let output =
            output.map_err(|e| EngineError::Other(format!("failed to wait for engine: {e}")))?;

        // exit status and stderr explain a closed stdin better than EPIPE does
        if !output.status.success() {
            return Err(EngineError::Failed {
                symbol,
                strategy,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(EngineError::Other(format!("failed to write request: {e}")));
            }
            Err(_) => return Err(EngineError::Other("request writer panicked".into())),
        }

        let results: Vec<BacktestResult> =
            serde_json::from_slice(&output.stdout).map_err(|e| EngineError::MalformedOutput {
                symbol: symbol.clone(),
                strategy: strategy.clone(),
                reason: e.to_string(),
            })?;

        if results.iter().any(|r| r.symbol.trim().is_empty()) {
            return Err(EngineError::MalformedOutput {
                symbol,
                strategy,
                reason: "result with empty symbol".into(),
            });
        }

        Ok(results)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use signaldesk_core::{DataSource, ParamValue, StrategyDescriptor, StrategyParameterSet, Status};

    /// A request well past the usual 64 KiB pipe buffer.
    fn bulky_params() -> StrategyParameterSet {
        let mut params = StrategyParameterSet::new();
        for i in 0..4000 {
            params.insert(format!("p{i}"), ParamValue::Text("x".repeat(64)));
        }
        params
    }

    fn sh(script: &str) -> CommandEngine {
        CommandEngine::new("/bin/sh", vec!["-c".into(), script.into()])
    }

    fn invoke(engine: &CommandEngine) -> Result<Vec<BacktestResult>, EngineError> {
        invoke_with(engine, &StrategyParameterSet::new())
    }

    fn invoke_with(
        engine: &CommandEngine,
        params: &StrategyParameterSet,
    ) -> Result<Vec<BacktestResult>, EngineError> {
        let strategy = StrategyDescriptor::new("RSIStrategy", "rsi");
        let source = DataSource::default();
        let request = BacktestRequest::single("AAPL", &strategy, params, &source);
        engine.invoke(&request)
    }

    #[test]
    fn parses_results_from_stdout() {
        let engine = sh(
            r#"cat > /dev/null; echo '[{"symbol":"AAPL","status":"BUY","sqn":1.5,"earnings":120.0}]'"#,
        );
        let results = invoke(&engine).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, Status::Buy);
        assert_eq!(results[0].earnings, 120.0);
    }

    #[test]
    fn request_reaches_stdin() {
        // echo the ticker from the request back as the symbol
        let engine = sh(
            r#"t=$(sed -n 's/.*"tickers":\["\([^"]*\)".*/\1/p'); printf '[{"symbol":"%s","status":"HOLD","sqn":0,"earnings":0}]' "$t""#,
        );
        let results = invoke(&engine).unwrap();
        assert_eq!(results[0].symbol, "AAPL");
    }

    #[test]
    fn non_zero_exit_is_engine_failure() {
        let engine = sh("cat > /dev/null; echo 'no data for AAPL' >&2; exit 3");
        match invoke(&engine) {
            Err(EngineError::Failed { stderr, symbol, .. }) => {
                assert_eq!(stderr, "no data for AAPL");
                assert_eq!(symbol, "AAPL");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn garbage_output_is_malformed() {
        let engine = sh("cat > /dev/null; echo 'not json'");
        assert!(matches!(
            invoke(&engine),
            Err(EngineError::MalformedOutput { .. })
        ));
    }

    #[test]
    fn empty_symbol_is_malformed() {
        let engine = sh(
            r#"cat > /dev/null; echo '[{"symbol":"","status":"BUY","sqn":1,"earnings":1}]'"#,
        );
        assert!(matches!(
            invoke(&engine),
            Err(EngineError::MalformedOutput { .. })
        ));
    }

    #[test]
    fn missing_program_is_unavailable() {
        let engine = CommandEngine::new("/nonexistent/backtest-engine", vec![]);
        assert!(matches!(
            invoke(&engine),
            Err(EngineError::Unavailable { .. })
        ));
    }

    #[test]
    fn engine_exiting_without_reading_input_reports_its_stderr() {
        let engine = sh("echo 'license expired' >&2; exit 3");
        match invoke_with(&engine, &bulky_params()) {
            Err(EngineError::Failed { stderr, status, .. }) => {
                assert_eq!(stderr, "license expired");
                assert!(status.contains('3'), "status was {status}");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn output_written_before_input_is_read_does_not_block() {
        // ~200 KiB of leading whitespace, then the input is consumed
        let engine = sh(
            r#"head -c 200000 /dev/zero | tr '\0' ' '; cat > /dev/null; echo '[{"symbol":"AAPL","status":"BUY","sqn":1,"earnings":2}]'"#,
        );
        let results = invoke_with(&engine, &bulky_params()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].symbol, "AAPL");
    }
}
