//! Scripted transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;

type Key = (String, String);

/// Replays canned responses keyed by method and path (query ignored). The
/// last response queued for a key repeats; unscripted calls get a 404.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<HashMap<Key, VecDeque<Result<HttpResponse, String>>>>,
    sent: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: &str, path: &str, response: HttpResponse) {
        self.push(method, path, Ok(response));
    }

    pub fn fail(&self, method: &str, path: &str, message: &str) {
        self.push(method, path, Err(message.to_string()));
    }

    /// Drop everything queued for a key, then queue `response`.
    pub fn replace(&self, method: &str, path: &str, response: HttpResponse) {
        self.script
            .lock()
            .unwrap()
            .remove(&(method.to_string(), path.to_string()));
        self.respond(method, path, response);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method.as_str() == method && path_of(&r.url) == path)
            .count()
    }

    fn push(&self, method: &str, path: &str, entry: Result<HttpResponse, String>) {
        self.script
            .lock()
            .unwrap()
            .entry((method.to_string(), path.to_string()))
            .or_default()
            .push_back(entry);
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        self.sent.lock().unwrap().push(request.clone());
        let key = (request.method.as_str().to_string(), path_of(&request.url).to_string());
        let mut script = self.script.lock().unwrap();
        let entry = match script.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        match entry {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(ApiError::Transport(message)),
            None => Ok(HttpResponse::json(
                404,
                format!(r#"{{"detail":"no scripted response for {} {}"}}"#, key.0, key.1),
            )),
        }
    }
}

fn path_of(url: &str) -> &str {
    let after_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = after_scheme
        .find('/')
        .map_or("/", |idx| &after_scheme[idx..]);
    path.split('?').next().unwrap_or(path)
}
