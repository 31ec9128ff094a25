//! Blocking obs-websocket v5 client.

use crate::control::protocol::{
    decode, encode_identify, encode_request, identify_for, Envelope, Hello, RequestResponse,
    OP_EVENT, OP_HELLO, OP_IDENTIFIED, OP_REQUEST_RESPONSE,
};
use crate::config::Settings;
use crate::control::{ControlSurface, SurfaceDialer};
use crate::util::{ControlError, ControlResult};
use serde_json::{json, Value};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info};
use tungstenite::{Message, WebSocket};

/// Default read/write/connect timeout for a session.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens authenticated sessions to obs-websocket.
#[derive(Clone, Debug)]
pub struct ObsDialer {
    host: String,
    port: u16,
    password: String,
    timeout: Duration,
}

impl ObsDialer {
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
            timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    /// Builds a dialer for the validated connection settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.host.clone(),
            settings.port,
            settings.password.clone(),
        )
        .with_timeout(settings.io_timeout)
    }

    /// Overrides the socket timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn open_stream(&self) -> Result<TcpStream, String> {
        let addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|err| format!("cannot resolve {}:{}: {err}", self.host, self.port))?;
        let mut last_err = format!("no address for {}:{}", self.host, self.port);
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(self.timeout))
                        .and_then(|_| stream.set_write_timeout(Some(self.timeout)))
                        .and_then(|_| stream.set_nodelay(true))
                        .map_err(|err| err.to_string())?;
                    return Ok(stream);
                }
                Err(err) => last_err = format!("{addr}: {err}"),
            }
        }
        Err(last_err)
    }
}

impl SurfaceDialer for ObsDialer {
    type Surface = ObsSession;

    fn dial(&mut self) -> ControlResult<ObsSession> {
        let connect_failed = |reason: String| ControlError::ConnectFailed { reason };

        let stream = self.open_stream().map_err(connect_failed)?;
        let url = format!("ws://{}:{}", self.host, self.port);
        let (mut socket, _) = tungstenite::client(url.as_str(), stream)
            .map_err(|err| connect_failed(format!("websocket handshake: {err}")))?;

        let hello = read_envelope(&mut socket).map_err(connect_failed)?;
        if hello.op != OP_HELLO {
            return Err(connect_failed(format!("expected Hello, got op {}", hello.op)));
        }
        let hello: Hello = serde_json::from_value(hello.d)
            .map_err(|err| connect_failed(format!("malformed Hello: {err}")))?;
        if hello.authentication.is_some() && self.password.is_empty() {
            return Err(connect_failed("server requires a password".to_string()));
        }

        let identify = encode_identify(&identify_for(&hello, &self.password))
            .map_err(|err| connect_failed(err.to_string()))?;
        socket
            .send(Message::text(identify))
            .map_err(|err| connect_failed(err.to_string()))?;

        // A rejected password closes the socket instead of answering.
        let identified = read_envelope(&mut socket)
            .map_err(|err| connect_failed(format!("identify rejected: {err}")))?;
        if identified.op != OP_IDENTIFIED {
            return Err(connect_failed(format!(
                "expected Identified, got op {}",
                identified.op
            )));
        }

        info!(
            host = %self.host,
            port = self.port,
            server = %hello.obs_web_socket_version,
            "connected to obs-websocket"
        );
        Ok(ObsSession {
            socket,
            next_id: 0,
        })
    }
}

/// One identified obs-websocket session.
pub struct ObsSession {
    socket: WebSocket<TcpStream>,
    next_id: u64,
}

impl ObsSession {
    fn request(&mut self, request_type: &'static str, data: Value) -> ControlResult<Option<Value>> {
        let call_failed = |reason: String| ControlError::CallFailed {
            request: request_type,
            reason,
        };

        self.next_id += 1;
        let request_id = self.next_id.to_string();
        let frame = encode_request(request_type, &request_id, data)
            .map_err(|err| call_failed(err.to_string()))?;
        self.socket
            .send(Message::text(frame))
            .map_err(|err| call_failed(err.to_string()))?;

        loop {
            let env = read_envelope(&mut self.socket).map_err(call_failed)?;
            if env.op == OP_EVENT {
                continue;
            }
            if env.op != OP_REQUEST_RESPONSE {
                debug!(op = env.op, "ignoring frame while awaiting response");
                continue;
            }
            let resp: RequestResponse =
                serde_json::from_value(env.d).map_err(|err| call_failed(err.to_string()))?;
            if resp.request_id != request_id {
                debug!(id = %resp.request_id, "ignoring stale response");
                continue;
            }
            if !resp.request_status.result {
                return Err(call_failed(format!(
                    "code {}: {}",
                    resp.request_status.code,
                    resp.request_status.comment.unwrap_or_default()
                )));
            }
            return Ok(resp.response_data);
        }
    }
}

impl ControlSurface for ObsSession {
    fn set_current_program_scene(&mut self, scene: &str) -> ControlResult<()> {
        self.request("SetCurrentProgramScene", json!({ "sceneName": scene }))
            .map(|_| ())
    }

    fn scene_item_id(&mut self, scene: &str, source: &str) -> ControlResult<i64> {
        let data = self.request(
            "GetSceneItemId",
            json!({ "sceneName": scene, "sourceName": source }),
        )?;
        data.as_ref()
            .and_then(|d| d.get("sceneItemId"))
            .and_then(Value::as_i64)
            .ok_or(ControlError::CallFailed {
                request: "GetSceneItemId",
                reason: "response has no sceneItemId".to_string(),
            })
    }

    fn set_scene_item_enabled(&mut self, scene: &str, item_id: i64, enabled: bool) -> ControlResult<()> {
        self.request(
            "SetSceneItemEnabled",
            json!({
                "sceneName": scene,
                "sceneItemId": item_id,
                "sceneItemEnabled": enabled,
            }),
        )
        .map(|_| ())
    }

    fn version(&mut self) -> ControlResult<String> {
        let data = self.request("GetVersion", json!({}))?;
        Ok(data
            .as_ref()
            .and_then(|d| d.get("obsVersion"))
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string())
    }
}

impl Drop for ObsSession {
    fn drop(&mut self) {
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
    }
}

fn read_envelope(socket: &mut WebSocket<TcpStream>) -> Result<Envelope, String> {
    loop {
        let msg = socket.read().map_err(|err| err.to_string())?;
        match msg {
            Message::Text(_) => {
                let text = msg.to_text().map_err(|err| err.to_string())?;
                return decode(text).map_err(|err| format!("malformed frame: {err}"));
            }
            Message::Close(frame) => {
                return Err(match frame {
                    Some(frame) => format!("closed by server: {} {}", frame.code, frame.reason),
                    None => "closed by server".to_string(),
                })
            }
            _ => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ObsDialer, DEFAULT_IO_TIMEOUT};
    use crate::config::EngineConfig;
    use std::time::Duration;

    #[test]
    fn dialer_follows_validated_settings() {
        let cfg = EngineConfig {
            obs_websocket_host: "obs.lan".into(),
            obs_websocket_port: 4456,
            obs_websocket_password: "pw".into(),
            obs_scene_name: "Game".into(),
            obs_overlay_source_name: "Loading".into(),
            obs_io_timeout_secs: 3,
            ..EngineConfig::default()
        };
        let dialer = ObsDialer::from_settings(&cfg.validate().unwrap());
        assert_eq!(dialer.host, "obs.lan");
        assert_eq!(dialer.port, 4456);
        assert_eq!(dialer.password, "pw");
        assert_eq!(dialer.timeout, Duration::from_secs(3));

        let plain = ObsDialer::new("localhost", 4455, "pw");
        assert_eq!(plain.timeout, DEFAULT_IO_TIMEOUT);
    }
}
