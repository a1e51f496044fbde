//! Canned RPC transport for node and sync tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RpcError;
use crate::request::{JsonRpcError, RpcParam};
use crate::transport::RpcTransport;

#[derive(Default)]
struct Script {
    /// Responses per method; the last one repeats.
    responses: HashMap<String, VecDeque<Result<Value, JsonRpcError>>>,
    calls: Vec<(String, Vec<Value>)>,
}

#[derive(Default)]
pub struct FakeRpc {
    script: Mutex<Script>,
}

impl FakeRpc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, method: &str, value: Value) -> Self {
        self.push(method, Ok(value))
    }

    pub fn fail(self, method: &str, code: i64, message: &str) -> Self {
        self.push(
            method,
            Err(JsonRpcError {
                code,
                message: message.into(),
            }),
        )
    }

    fn push(self, method: &str, response: Result<Value, JsonRpcError>) -> Self {
        self.script
            .lock()
            .unwrap()
            .responses
            .entry(method.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls().iter().filter(|(m, _)| m == method).count()
    }
}

#[async_trait]
impl RpcTransport for FakeRpc {
    async fn call(&self, method: &str, params: Vec<RpcParam>) -> Result<Value, RpcError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push((method.to_string(), params));
        let queue = script
            .responses
            .get_mut(method)
            .ok_or_else(|| RpcError::Http(format!("no scripted response for {method}")))?;
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        match response {
            Some(Ok(v)) => Ok(v),
            Some(Err(e)) => Err(RpcError::Rpc(e)),
            None => Err(RpcError::Http(format!("no scripted response for {method}"))),
        }
    }

    fn url(&self) -> &str {
        "fake://node"
    }
}
