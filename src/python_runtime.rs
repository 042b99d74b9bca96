//! The Python bridge: a child `python3` process speaking a private,
//! worker-internal line-JSON protocol on its stdin/stdout. One bridge is
//! spawned per `execute()` call and reused across fetch and transform; it
//! is torn down with a SIGTERM-then-grace-then-SIGKILL sequence, the same
//! shape used elsewhere in this codebase for terminating child processes.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use worker_discovery::ClassRecord;

use crate::loader::{Bridge, BridgeError, BridgeTarget, InstantiateOutcome, ResolvedKwarg, UserCodeError};

/// How long to wait for a single command's response before treating the
/// bridge as hung.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// The bootstrap script run inside the child interpreter. It owns the
/// normalization fallback chain (map → field-dump → ordered-field-iterate
/// → attribute bag → wrap) described in the Design Notes, since only
/// Python-side introspection can tell which capability a given record
/// object actually has.
const BOOTSTRAP_SCRIPT: &str = r#"
import sys, json, importlib.util, inspect, asyncio, traceback

_classes = {}     # role ("adapter"/"data_client") -> class object
_instances = {}   # role -> instance

class _EmptyMockClient:
    def get_data(self):
        return []

def _normalize(record):
    if isinstance(record, dict):
        return record
    for attr in ("model_dump", "dict", "to_dict"):
        fn = getattr(record, attr, None)
        if callable(fn):
            try:
                return fn()
            except Exception:
                pass
    if hasattr(record, "_fields"):
        return dict(zip(record._fields, record))
    if hasattr(record, "__dict__"):
        return dict(record.__dict__)
    return {"data": record}

def _load(params):
    role = params["role"]
    sys.path.insert(0, params["project_root"])
    sys.path.insert(0, params["project_root"] + "/src")
    spec = importlib.util.spec_from_file_location(params["module_path"], params["file_path"])
    module = importlib.util.module_from_spec(spec)
    sys.modules[params["module_path"]] = module
    spec.loader.exec_module(module)
    _classes[role] = getattr(module, params["class_name"])
    return {"ok": True, "result": {}}

def _constructor_params(role):
    sig = inspect.signature(_classes[role].__init__)
    names = [n for n in sig.parameters if n != "self"]
    return {"ok": True, "result": {"params": names}}

def _try_call(role, make):
    try:
        _instances[role] = make()
        return {"ok": True, "result": {}}
    except Exception as e:
        return {"ok": False, "error": str(e), "error_type": type(e).__name__}

def _configuration_name():
    cls = _classes.get("adapter")
    config = getattr(cls, "configuration", None)
    name = getattr(config, "name", None) if config is not None else None
    return {"ok": True, "result": {"name": name}}

def _collect(items):
    if hasattr(items, "__aiter__"):
        async def _drain():
            return [item async for item in items]
        return asyncio.run(_drain())
    return list(items)

def _handle(cmd):
    op = cmd["cmd"]
    if op == "load":
        return _load(cmd)
    if op == "constructor_params":
        return _constructor_params(cmd["role"])
    if op == "try_noargs":
        role = cmd["role"]
        return _try_call(role, lambda: _classes[role]())
    if op == "try_kwargs":
        role = cmd["role"]
        kwargs = cmd["kwargs"]
        return _try_call(role, lambda: _classes[role](**kwargs))
    if op == "try_all_none":
        role = cmd["role"]
        kwargs = {name: None for name in cmd["params"]}
        return _try_call(role, lambda: _classes[role](**kwargs))
    if op == "adapter_configuration_name":
        return _configuration_name()
    if op == "try_adapter_with_data_client":
        return _try_call("adapter", lambda: _classes["adapter"](cmd["name"], _instances.get("data_client")))
    if op == "try_adapter_with_mock_client":
        return _try_call("adapter", lambda: _classes["adapter"](cmd["name"], _EmptyMockClient()))
    if op == "call_data_client":
        try:
            instance = _instances["data_client"]
            method = None
            for name in ("get_data", "fetch", "stream"):
                if hasattr(instance, name):
                    method = getattr(instance, name)
                    break
            items = method() if method else []
            records = [_normalize(r) for r in _collect(items)]
            return {"ok": True, "result": {"records": records}}
        except Exception as e:
            return {"ok": False, "error": str(e), "error_type": type(e).__name__, "traceback": traceback.format_exc()}
    if op == "call_transform":
        try:
            out = _instances["adapter"].transform([cmd["record"]])
            result = out[0] if isinstance(out, (list, tuple)) and out else out
            return {"ok": True, "result": {"record": _normalize(result)}}
        except Exception as e:
            return {"ok": False, "error": str(e), "error_type": type(e).__name__, "traceback": traceback.format_exc()}
    if op == "shutdown":
        return {"ok": True, "result": {}}
    return {"ok": False, "error": "unknown command: " + op, "error_type": "ProtocolError"}

for line in sys.stdin:
    line = line.strip()
    if not line:
        continue
    try:
        cmd = json.loads(line)
    except Exception as e:
        print(json.dumps({"ok": False, "error": str(e), "error_type": "ParseError"}), flush=True)
        continue
    response = _handle(cmd)
    print(json.dumps(response), flush=True)
    if cmd.get("cmd") == "shutdown":
        break
"#;

pub struct PythonBridge {
    child: Child,
    stdin: ChildStdin,
    responses: Receiver<String>,
    grace_period: Duration,
    /// Role of whichever class `load` most recently selected, so later
    /// `try_*` commands know which of the bootstrap's two instance slots
    /// to address.
    current_role: &'static str,
}

fn role_of(target: BridgeTarget) -> &'static str {
    match target {
        BridgeTarget::Adapter => "adapter",
        BridgeTarget::DataClient => "data_client",
    }
}

impl PythonBridge {
    /// Spawn the bridge child process. `python_executable` is typically
    /// `"python3"`; it is taken as a parameter so tests can point at a
    /// stub interpreter instead.
    pub fn spawn(python_executable: &str, grace_period: Duration) -> std::io::Result<Self> {
        let mut child = Command::new(python_executable)
            .arg("-c")
            .arg(BOOTSTRAP_SCRIPT)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdin = child.stdin.take().expect("child stdin was piped");
        let stdout = child.stdout.take().expect("child stdout was piped");
        let stderr = child.stderr.take().expect("child stderr was piped");

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });
        thread::spawn(move || {
            let reader = BufReader::new(stderr);
            for line in reader.lines().map_while(Result::ok) {
                log::debug!("python bridge stderr: {line}");
            }
        });

        Ok(Self {
            child,
            stdin,
            responses: rx,
            grace_period,
            current_role: "adapter",
        })
    }

    fn send(&mut self, command: Value) -> std::io::Result<Value> {
        let mut line = serde_json::to_string(&command)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes())?;
        self.stdin.flush()?;

        let response = self.responses.recv_timeout(COMMAND_TIMEOUT).map_err(|e| {
            let reason = match e {
                RecvTimeoutError::Timeout => "bridge did not respond in time",
                RecvTimeoutError::Disconnected => "bridge process exited unexpectedly",
            };
            std::io::Error::new(std::io::ErrorKind::TimedOut, reason)
        })?;

        serde_json::from_str(&response)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    fn outcome_from(&self, response: &Value) -> InstantiateOutcome {
        if response["ok"].as_bool().unwrap_or(false) {
            InstantiateOutcome::Success
        } else {
            let message = response["error"].as_str().unwrap_or("instantiation failed");
            InstantiateOutcome::Failure(message.to_string())
        }
    }

    /// Terminate the bridge: SIGTERM, wait up to `grace_period`, then
    /// SIGKILL.
    pub fn terminate(&mut self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;
            let pid = Pid::from_raw(self.child.id() as i32);
            let _ = signal::kill(pid, Signal::SIGTERM);
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.kill();
        }

        let start = Instant::now();
        while start.elapsed() < self.grace_period {
            match self.child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) => thread::sleep(Duration::from_millis(100)),
                Err(_) => return,
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn user_code_error(response: &Value) -> UserCodeError {
    UserCodeError {
        error_type: response["error_type"].as_str().unwrap_or("Exception").to_string(),
        message: response["error"].as_str().unwrap_or("bridge call failed").to_string(),
        traceback: response["traceback"].as_str().unwrap_or("").to_string(),
    }
}

impl Drop for PythonBridge {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl Bridge for PythonBridge {
    fn load(&mut self, class_record: &ClassRecord, target: BridgeTarget, project_root: &Path) -> std::io::Result<()> {
        let role = role_of(target);
        let response = self.send(json!({
            "cmd": "load",
            "role": role,
            "project_root": project_root.to_string_lossy(),
            "module_path": class_record.module_path,
            "file_path": class_record.file_path.to_string_lossy(),
            "class_name": class_record.class_name,
        }))?;
        if !response["ok"].as_bool().unwrap_or(false) {
            let message = response["error"].as_str().unwrap_or("load failed");
            return Err(std::io::Error::new(std::io::ErrorKind::Other, message));
        }
        self.current_role = role;
        Ok(())
    }

    fn constructor_params(&mut self) -> std::io::Result<Vec<String>> {
        let response = self.send(json!({ "cmd": "constructor_params", "role": self.current_role }))?;
        let params = response["result"]["params"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        Ok(params)
    }

    fn try_noargs(&mut self) -> std::io::Result<InstantiateOutcome> {
        let response = self.send(json!({ "cmd": "try_noargs", "role": self.current_role }))?;
        Ok(self.outcome_from(&response))
    }

    fn try_kwargs(&mut self, kwargs: &[ResolvedKwarg]) -> std::io::Result<InstantiateOutcome> {
        let map: serde_json::Map<String, Value> = kwargs
            .iter()
            .map(|kw| (kw.name.clone(), kw.value.clone().map(Value::String).unwrap_or(Value::Null)))
            .collect();
        let response = self.send(json!({ "cmd": "try_kwargs", "role": self.current_role, "kwargs": map }))?;
        Ok(self.outcome_from(&response))
    }

    fn try_all_none(&mut self, param_names: &[String]) -> std::io::Result<InstantiateOutcome> {
        let response =
            self.send(json!({ "cmd": "try_all_none", "role": self.current_role, "params": param_names }))?;
        Ok(self.outcome_from(&response))
    }

    fn call_data_client(&mut self) -> Result<Vec<Value>, BridgeError> {
        let response = self.send(json!({ "cmd": "call_data_client" }))?;
        if !response["ok"].as_bool().unwrap_or(false) {
            return Err(BridgeError::UserCode(user_code_error(&response)));
        }
        Ok(response["result"]["records"].as_array().cloned().unwrap_or_default())
    }

    fn call_transform(&mut self, record: &Value) -> Result<Value, BridgeError> {
        let response = self.send(json!({ "cmd": "call_transform", "record": record }))?;
        if !response["ok"].as_bool().unwrap_or(false) {
            return Err(BridgeError::UserCode(user_code_error(&response)));
        }
        Ok(response["result"]["record"].clone())
    }

    fn adapter_configuration_name(&mut self) -> std::io::Result<Option<String>> {
        let response = self.send(json!({ "cmd": "adapter_configuration_name" }))?;
        Ok(response["result"]["name"].as_str().map(String::from))
    }

    fn try_adapter_with_data_client(&mut self, name: &str) -> Result<InstantiateOutcome, BridgeError> {
        let response = self.send(json!({ "cmd": "try_adapter_with_data_client", "name": name }))?;
        self.current_role = "adapter";
        Ok(self.outcome_from(&response))
    }

    fn try_adapter_with_mock_client(&mut self, name: &str) -> Result<InstantiateOutcome, BridgeError> {
        let response = self.send(json!({ "cmd": "try_adapter_with_mock_client", "name": name }))?;
        self.current_role = "adapter";
        Ok(self.outcome_from(&response))
    }
}
