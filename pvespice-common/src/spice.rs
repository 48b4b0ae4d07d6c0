use crate::error::{Error, Result};
use crate::pve::{Envelope, SpiceProxy, VmApi};
use hyper::Method;
use tracing::debug;

/// Request a spice proxy session descriptor for the VM.
///
/// `proxy_host` is the address the viewer should tunnel through, normally
/// the same host the API is reached on.
#[tracing::instrument(name = "spice.fetch", skip(api))]
pub async fn fetch_descriptor<A: VmApi>(api: &A, proxy_host: &str) -> Result<SpiceProxy> {
    let body = api
        .call(Method::POST, "/spiceproxy", &[("proxy", proxy_host)])
        .await
        .map_err(Error::DecodeTransport)?;

    let descriptor = decode_descriptor(&body)?;
    debug!(
        kind = %descriptor.kind,
        tls_port = descriptor.tls_port,
        "Spice proxy descriptor received"
    );
    Ok(descriptor)
}

/// Decode the `data` object of a spiceproxy response.
pub fn decode_descriptor(body: &[u8]) -> Result<SpiceProxy> {
    let envelope: Envelope<serde_json::Value> = serde_json::from_slice(body)
        .map_err(|e| Error::Decode(format!("malformed response: {e}")))?;

    let data = envelope
        .data
        .ok_or_else(|| Error::Decode("response missing data".to_string()))?;

    serde_json::from_value(data).map_err(|e| Error::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::body::Bytes;
    use std::cell::RefCell;

    const DESCRIPTOR: &str = r#"{"data":{
        "secure-attention":"Ctrl+Alt+Ins",
        "delete-this-file":1,
        "proxy":"http://10.0.0.5:3128",
        "type":"spice",
        "ca":"-----BEGIN CERTIFICATE-----\\nMIIF\\n-----END CERTIFICATE-----\\n",
        "toggle-fullscreen":"Shift+F11",
        "title":"VM 105 - win11",
        "host":"pvespiceproxy:65f1a2b3:105:pve1::abcdef",
        "password":"s3cr3t",
        "host-subject":"OU=PVE Cluster Node,O=Proxmox Virtual Environment,CN=pve1",
        "release-cursor":"Ctrl+Alt+R",
        "tls-port":61000,
        "zoom-level":"100"
    }}"#;

    struct CannedApi {
        body: &'static str,
        calls: RefCell<Vec<(Method, String, Vec<(String, String)>)>>,
    }

    impl VmApi for CannedApi {
        async fn call(
            &self,
            method: Method,
            path: &str,
            form: &[(&str, &str)],
        ) -> anyhow::Result<Bytes> {
            self.calls.borrow_mut().push((
                method,
                path.to_string(),
                form.iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            ));
            Ok(Bytes::from_static(self.body.as_bytes()))
        }
    }

    #[tokio::test]
    async fn test_fetch_descriptor() {
        let api = CannedApi {
            body: DESCRIPTOR,
            calls: RefCell::new(Vec::new()),
        };

        let descriptor = fetch_descriptor(&api, "10.0.0.5").await.unwrap();

        assert_eq!(descriptor.tls_port, 61000);
        assert_eq!(descriptor.delete_this_file, 1);
        assert_eq!(descriptor.kind, "spice");
        assert_eq!(descriptor.host, "pvespiceproxy:65f1a2b3:105:pve1::abcdef");
        assert!(descriptor.ca.contains("\\n"));

        let calls = api.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, Method::POST);
        assert_eq!(calls[0].1, "/spiceproxy");
        assert_eq!(
            calls[0].2,
            vec![("proxy".to_string(), "10.0.0.5".to_string())]
        );
    }

    #[test]
    fn test_decode_rejects_missing_data() {
        let err = decode_descriptor(br#"{"data":null}"#).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Decode);
        assert_eq!(err.stage(), "spice");
    }

    #[test]
    fn test_decode_rejects_incomplete_descriptor() {
        let err = decode_descriptor(br#"{"data":{"type":"spice","tls-port":61000}}"#).unwrap_err();
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn test_decode_rejects_wrong_types() {
        let body = DESCRIPTOR.replace("\"tls-port\":61000", "\"tls-port\":\"61000\"");
        assert!(decode_descriptor(body.as_bytes()).is_err());
    }

    #[test]
    fn test_decode_rejects_non_json() {
        assert!(decode_descriptor(b"").is_err());
    }
}
