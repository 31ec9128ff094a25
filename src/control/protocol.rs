//! obs-websocket v5 message codec.
//!
//! Every frame is a JSON object `{"op": <opcode>, "d": <payload>}`. A session
//! opens with Hello (server) → Identify (client) → Identified (server), then
//! exchanges Request / RequestResponse pairs correlated by `requestId`.
//! Authentication, when the server asks for it, is
//! `base64(sha256(base64(sha256(password + salt)) + challenge))`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// RPC version this client speaks.
pub const RPC_VERSION: u32 = 1;

pub const OP_HELLO: u8 = 0;
pub const OP_IDENTIFY: u8 = 1;
pub const OP_IDENTIFIED: u8 = 2;
pub const OP_EVENT: u8 = 5;
pub const OP_REQUEST: u8 = 6;
pub const OP_REQUEST_RESPONSE: u8 = 7;

/// Raw frame.
#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct Envelope {
    pub op: u8,
    pub d: Value,
}

/// Authentication parameters offered in Hello.
#[derive(Debug, Deserialize, PartialEq)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

/// Hello payload (op 0).
#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    #[serde(default)]
    pub obs_web_socket_version: String,
    pub rpc_version: u32,
    pub authentication: Option<AuthChallenge>,
}

/// Identify payload (op 1).
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub rpc_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    pub event_subscriptions: u32,
}

/// Status block of a RequestResponse.
#[derive(Debug, Deserialize, PartialEq)]
pub struct RequestStatus {
    pub result: bool,
    pub code: u16,
    #[serde(default)]
    pub comment: Option<String>,
}

/// RequestResponse payload (op 7).
#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request_type: String,
    pub request_id: String,
    pub request_status: RequestStatus,
    #[serde(default)]
    pub response_data: Option<Value>,
}

/// Computes the Identify authentication string.
pub fn auth_response(password: &str, challenge: &str, salt: &str) -> String {
    let secret = STANDARD.encode(Sha256::digest(format!("{password}{salt}").as_bytes()));
    STANDARD.encode(Sha256::digest(format!("{secret}{challenge}").as_bytes()))
}

/// Builds the Identify reply to `hello`. Events are not subscribed.
pub fn identify_for(hello: &Hello, password: &str) -> Identify {
    Identify {
        rpc_version: RPC_VERSION,
        authentication: hello
            .authentication
            .as_ref()
            .map(|auth| auth_response(password, &auth.challenge, &auth.salt)),
        event_subscriptions: 0,
    }
}

/// Serializes an Identify frame.
pub fn encode_identify(identify: &Identify) -> serde_json::Result<String> {
    serde_json::to_string(&json!({ "op": OP_IDENTIFY, "d": identify }))
}

/// Serializes a Request frame.
pub fn encode_request(request_type: &str, request_id: &str, data: Value) -> serde_json::Result<String> {
    serde_json::to_string(&json!({
        "op": OP_REQUEST,
        "d": {
            "requestType": request_type,
            "requestId": request_id,
            "requestData": data,
        }
    }))
}

/// Parses any frame.
pub fn decode(text: &str) -> serde_json::Result<Envelope> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_with_auth_produces_identify_with_auth() {
        let env = decode(
            r#"{"op":0,"d":{"obsWebSocketVersion":"5.1.0","rpcVersion":1,
               "authentication":{"challenge":"+IxH4CnCiqpX1rM9scsNynZzbOe4KhDeYcTNS3PDaeY=",
                                 "salt":"lM1GncleQOaCu9lT1yeUZhFYnqhsLLP1G5lAGo3ixaI="}}}"#,
        )
        .unwrap();
        assert_eq!(env.op, OP_HELLO);
        let hello: Hello = serde_json::from_value(env.d).unwrap();
        let identify = identify_for(&hello, "supersecretpassword");
        let auth = identify.authentication.clone().unwrap();
        assert_eq!(auth.len(), 44);
        assert_eq!(
            auth,
            auth_response(
                "supersecretpassword",
                "+IxH4CnCiqpX1rM9scsNynZzbOe4KhDeYcTNS3PDaeY=",
                "lM1GncleQOaCu9lT1yeUZhFYnqhsLLP1G5lAGo3ixaI="
            )
        );
        assert_ne!(auth, auth_response("other", "c", "s"));

        let text = encode_identify(&identify).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back["op"], 1);
        assert_eq!(back["d"]["rpcVersion"], 1);
        assert_eq!(back["d"]["eventSubscriptions"], 0);
        assert_eq!(back["d"]["authentication"], Value::String(auth));
    }

    #[test]
    fn identify_omits_auth_when_not_requested() {
        let hello: Hello = serde_json::from_value(json!({"rpcVersion": 1})).unwrap();
        let text = encode_identify(&identify_for(&hello, "")).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert!(back["d"].get("authentication").is_none());
    }

    #[test]
    fn request_frame_shape() {
        let text = encode_request(
            "SetSceneItemEnabled",
            "7",
            json!({"sceneName": "Game", "sceneItemId": 3, "sceneItemEnabled": true}),
        )
        .unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back["op"], 6);
        assert_eq!(back["d"]["requestType"], "SetSceneItemEnabled");
        assert_eq!(back["d"]["requestId"], "7");
        assert_eq!(back["d"]["requestData"]["sceneItemId"], 3);
    }

    #[test]
    fn failed_response_decodes_status() {
        let env = decode(
            r#"{"op":7,"d":{"requestType":"GetSceneItemId","requestId":"2",
               "requestStatus":{"result":false,"code":600,"comment":"No source was found"}}}"#,
        )
        .unwrap();
        let resp: RequestResponse = serde_json::from_value(env.d).unwrap();
        assert!(!resp.request_status.result);
        assert_eq!(resp.request_status.code, 600);
        assert_eq!(resp.response_data, None);
    }
}
